use thiserror::Error;

/// Wire-visible failure kinds shared by both sides of the protocol. Matches the error
/// table in the component design: each kind carries exactly the information a caller
/// needs to decide whether to retry.
#[derive(Debug, Error)]
pub enum ProtocolError {
	#[error("nonce not found or expired")]
	NonceUnknown,

	#[error("device attestation rejected by policy: {0}")]
	AttestationInvalid(String),

	#[error("device assertion challenge mismatch or binding failure: {0}")]
	AssertionMismatch(String),

	#[error("registration unknown to server")]
	RegistrationLost,

	#[error("pool has no currently-valid key")]
	NoValidKey,

	#[error("unknown key alias")]
	UnknownKey,

	#[error("transport error: {0}")]
	Transport(String),

	#[error("malformed wire message: {0}")]
	Codec(#[from] serde_json::Error),
}

impl ProtocolError {
	/// True for failures that must never cause the caller to drop locally cached
	/// registration state (only `RegistrationLost` may do that).
	pub fn is_registration_lost(&self) -> bool {
		matches!(self, ProtocolError::RegistrationLost)
	}
}
