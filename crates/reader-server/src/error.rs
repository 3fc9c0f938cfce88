use reader_protocol::ProtocolError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServerError {
	#[error("nonce not found or expired")]
	NonceUnknown,

	#[error("device attestation rejected by policy: {0}")]
	AttestationInvalid(String),

	#[error("device assertion invalid: {0}")]
	AssertionMismatch(String),

	#[error("registration not found")]
	RegistrationUnknown,

	#[error("key/certification count mismatch: {submitted} keys, {certified} certifications")]
	CountMismatch { submitted: usize, certified: usize },

	#[error("reader root identity error: {0}")]
	ReaderRoot(String),

	#[error("storage error: {0}")]
	Storage(String),

	#[error("invalid configuration: {0}")]
	Config(String),

	#[error("malformed request body: {0}")]
	Codec(#[from] serde_json::Error),
}

impl From<ProtocolError> for ServerError {
	fn from(e: ProtocolError) -> Self {
		match e {
			ProtocolError::NonceUnknown => ServerError::NonceUnknown,
			ProtocolError::AttestationInvalid(m) => ServerError::AttestationInvalid(m),
			ProtocolError::AssertionMismatch(m) => ServerError::AssertionMismatch(m),
			ProtocolError::RegistrationLost => ServerError::RegistrationUnknown,
			ProtocolError::Codec(e) => ServerError::Codec(e),
			other => ServerError::Storage(other.to_string()),
		}
	}
}

impl ServerError {
	/// Maps to the HTTP status the wire contract requires: 404 only for the
	/// registration-unknown signal on `certifyKeys`, 4xx for other validation failures,
	/// 5xx for storage/internal failures.
	pub fn status_code(&self) -> u16 {
		match self {
			ServerError::RegistrationUnknown => 404,
			ServerError::NonceUnknown
			| ServerError::AttestationInvalid(_)
			| ServerError::AssertionMismatch(_)
			| ServerError::CountMismatch { .. }
			| ServerError::Codec(_) => 400,
			ServerError::ReaderRoot(_) | ServerError::Storage(_) | ServerError::Config(_) => 500,
		}
	}
}
