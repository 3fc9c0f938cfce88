pub mod b64;
pub mod error;
pub mod messages;
pub mod model;
pub mod traits;

pub use error::ProtocolError;
pub use model::{IssuerTrustEntry, IssuerTrustEntryMetadata, IssuerTrustList};
pub use traits::{
	AssertionGenerator, AssertionValidator, AttestationGenerator, AttestationPolicy, AttestationTrust, AttestationValidator,
	KeyInfo, SecureKeyStore, Storage, Transport,
};
