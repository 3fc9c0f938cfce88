use reader_protocol::ProtocolError;
use thiserror::Error;

/// Client-facing failure kinds. Matches the error table in the component design: each
/// kind carries exactly the information a caller needs to decide whether to retry.
#[derive(Debug, Error)]
pub enum ClientError {
	#[error("pool has no currently-valid key")]
	NoValidKey,

	#[error("unknown key alias: {0}")]
	UnknownKey(String),

	#[error("server registration was lost and could not be recovered")]
	RegistrationLost,

	#[error("device attestation rejected by policy: {0}")]
	AttestationInvalid(String),

	#[error("device assertion challenge mismatch or binding failure: {0}")]
	AssertionMismatch(String),

	#[error("transport error: {0}")]
	Transport(String),

	#[error("secure key store error: {0}")]
	KeyStore(String),

	#[error("local storage error: {0}")]
	Storage(String),

	#[error("malformed server response: {0}")]
	Codec(String),
}

impl From<ProtocolError> for ClientError {
	fn from(e: ProtocolError) -> Self {
		match e {
			ProtocolError::NonceUnknown => ClientError::Transport("nonce unknown or expired".into()),
			ProtocolError::AttestationInvalid(m) => ClientError::AttestationInvalid(m),
			ProtocolError::AssertionMismatch(m) => ClientError::AssertionMismatch(m),
			ProtocolError::RegistrationLost => ClientError::RegistrationLost,
			ProtocolError::NoValidKey => ClientError::NoValidKey,
			ProtocolError::UnknownKey => ClientError::UnknownKey(String::new()),
			ProtocolError::Transport(m) => ClientError::Transport(m),
			ProtocolError::Codec(e) => ClientError::Codec(e.to_string()),
		}
	}
}

impl ClientError {
	/// True for the only server-side signal that should cause the caller to drop locally
	/// cached registration state (a 404 on `certifyKeys`).
	pub fn is_registration_lost(&self) -> bool {
		matches!(self, ClientError::RegistrationLost)
	}

	/// True for failures `getKey`'s best-effort replenishment should swallow rather than
	/// surface — anything short of an unrecoverable local-pool state.
	pub fn is_transient(&self) -> bool {
		matches!(self, ClientError::Transport(_) | ClientError::RegistrationLost)
	}
}
