pub mod config;
pub mod error;
pub mod issuer_feed;
pub mod jwk;
pub mod pool;
pub mod registration;
mod rpc;
pub mod software;
pub mod storage;
pub mod transport;

pub use config::ClientConfig;
pub use error::ClientError;
pub use pool::{CertifiedKeyRecord, ReaderBackendClient};
