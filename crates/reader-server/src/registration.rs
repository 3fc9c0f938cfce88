use reader_protocol::b64::B64Bytes;
use serde::{Deserialize, Serialize};

/// What `register` persists under the auto-generated `registrationId`: the attestation
/// blob (read back on `certifyKeys`) and which root subsequent certifications use.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistrationRecord {
	pub device_attestation: B64Bytes,
	pub untrusted: bool,
}
