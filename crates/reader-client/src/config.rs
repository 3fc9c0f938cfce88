use std::sync::Arc;

use reader_protocol::{AssertionGenerator, AttestationGenerator, SecureKeyStore, Storage, Transport};

/// `{readerBackendUrl, storage, secureArea, numKeys}` from the component design, realized
/// as constructor arguments rather than a config file — the host mobile app owns
/// configuration delivery, which is out of scope here.
pub struct ClientConfig {
	pub reader_backend_url: String,
	pub storage: Arc<dyn Storage>,
	pub secure_area: Arc<dyn SecureKeyStore>,
	pub attestation_generator: Arc<dyn AttestationGenerator>,
	pub assertion_generator: Arc<dyn AssertionGenerator>,
	pub transport: Arc<dyn Transport>,
	/// `targetCount` in the pool configuration (typ. 10).
	pub num_keys: usize,
}
