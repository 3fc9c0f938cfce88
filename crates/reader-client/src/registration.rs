use serde::{Deserialize, Serialize};

/// `ReaderBackendClientRegistrationData`, the single row persisted under key `"default"`.
/// The platform's local handle to the attestation plus the server-issued registration id.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistrationData {
	pub device_attestation_id: String,
	pub registration_id: String,
}

pub const TABLE_REGISTRATION: &str = "reader_backend_client_registration_data";
pub const TABLE_CERTIFIED_KEYS: &str = "reader_backend_client_certified_keys";
/// Row id within [`TABLE_REGISTRATION`]; there is only ever one registration per device.
pub const REGISTRATION_KEY: &str = "default";
