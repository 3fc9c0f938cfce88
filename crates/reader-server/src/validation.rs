//! A software reference `AttestationValidator`/`AssertionValidator` pair. Real iOS/Android
//! attestation parsing is out of scope; this treats the blob as a small self-describing
//! JSON structure instead of a platform-signed envelope, so the policy checks and the
//! attestation-to-assertion binding can still be exercised end to end in tests.

use async_trait::async_trait;
use reader_protocol::b64::B64Bytes;
use reader_protocol::{AssertionValidator, AttestationPolicy, AttestationTrust, AttestationValidator, ProtocolError};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Mirrors [`reader_client::software::SoftwareAttestationBlob`] — kept as a plain,
/// independently defined struct here since the two crates don't share a dependency edge.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SoftwareAttestationBlob {
	pub challenge: B64Bytes,
	pub platform: String,
	#[serde(default)]
	pub ios_release_build: bool,
	#[serde(default)]
	pub ios_app_identifier: Option<String>,
	#[serde(default)]
	pub android_gms_attestation: bool,
	#[serde(default)]
	pub android_verified_boot_green: bool,
	#[serde(default)]
	pub android_signing_certificate_digest: Option<B64Bytes>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SoftwareAssertionBlob {
	pub challenge: B64Bytes,
	pub attestation_digest: B64Bytes,
}

#[derive(Default)]
pub struct SoftwareAttestationValidator;

#[async_trait]
impl AttestationValidator for SoftwareAttestationValidator {
	async fn validate(&self, attestation: &[u8], challenge: &[u8], policy: &AttestationPolicy) -> Result<AttestationTrust, ProtocolError> {
		let blob: SoftwareAttestationBlob =
			serde_json::from_slice(attestation).map_err(|e| ProtocolError::AttestationInvalid(format!("malformed attestation: {e}")))?;

		if blob.challenge.0 != challenge {
			return Err(ProtocolError::AttestationInvalid("challenge mismatch".into()));
		}

		match blob.platform.as_str() {
			"ios" => {
				if policy.ios_release_build && !blob.ios_release_build {
					return Err(ProtocolError::AttestationInvalid("non-release iOS build".into()));
				}
				if let Some(expected) = &policy.ios_app_identifier {
					if blob.ios_app_identifier.as_deref() != Some(expected.as_str()) {
						return Err(ProtocolError::AttestationInvalid("unexpected iOS app identifier".into()));
					}
				}
				Ok(AttestationTrust::Trusted)
			},
			"android" => {
				if policy.android_require_gms_attestation && !blob.android_gms_attestation {
					return Err(ProtocolError::AttestationInvalid("missing GMS attestation".into()));
				}
				if policy.android_require_verified_boot_green && !blob.android_verified_boot_green {
					return Err(ProtocolError::AttestationInvalid("verified boot state is not green".into()));
				}
				if !policy.android_app_signature_certificate_digests.is_empty() {
					let digest = blob
						.android_signing_certificate_digest
						.as_ref()
						.ok_or_else(|| ProtocolError::AttestationInvalid("missing signing certificate digest".into()))?;
					if !policy.android_app_signature_certificate_digests.iter().any(|d| d == &digest.0) {
						return Err(ProtocolError::AttestationInvalid("signing certificate digest not allowed".into()));
					}
				}
				Ok(AttestationTrust::Trusted)
			},
			// No platform-backed assurance at all: accepted (useful for local testing and
			// development devices) but certified under the untrusted-devices root.
			"software" => Ok(AttestationTrust::Untrusted),
			other => Err(ProtocolError::AttestationInvalid(format!("unknown platform {other}"))),
		}
	}
}

#[derive(Default)]
pub struct SoftwareAssertionValidator;

#[async_trait]
impl AssertionValidator for SoftwareAssertionValidator {
	async fn validate(&self, assertion: &[u8], challenge: &[u8], device_attestation: &[u8]) -> Result<(), ProtocolError> {
		let blob: SoftwareAssertionBlob =
			serde_json::from_slice(assertion).map_err(|e| ProtocolError::AssertionMismatch(format!("malformed assertion: {e}")))?;

		if blob.challenge.0 != challenge {
			return Err(ProtocolError::AssertionMismatch("challenge mismatch".into()));
		}

		let expected_digest = Sha256::digest(device_attestation);
		if blob.attestation_digest.0 != expected_digest.as_slice() {
			return Err(ProtocolError::AssertionMismatch("assertion does not bind to the registered attestation".into()));
		}

		Ok(())
	}
}

#[cfg(test)]
mod test {
	use super::*;

	fn attestation_bytes(challenge: &[u8]) -> Vec<u8> {
		serde_json::to_vec(&SoftwareAttestationBlob {
			challenge: B64Bytes(challenge.to_vec()),
			platform: "software".into(),
			ios_release_build: false,
			ios_app_identifier: None,
			android_gms_attestation: false,
			android_verified_boot_green: false,
			android_signing_certificate_digest: None,
		})
		.unwrap()
	}

	#[tokio::test]
	async fn attestation_accepts_matching_challenge_as_untrusted() {
		let validator = SoftwareAttestationValidator;
		let blob = attestation_bytes(b"nonce-1");
		let trust = validator.validate(&blob, b"nonce-1", &AttestationPolicy::default()).await.unwrap();
		assert_eq!(trust, AttestationTrust::Untrusted);
	}

	#[tokio::test]
	async fn attestation_rejects_challenge_mismatch() {
		let validator = SoftwareAttestationValidator;
		let blob = attestation_bytes(b"nonce-1");
		let err = validator.validate(&blob, b"nonce-2", &AttestationPolicy::default()).await.unwrap_err();
		assert!(matches!(err, ProtocolError::AttestationInvalid(_)));
	}

	#[tokio::test]
	async fn assertion_binds_to_the_registered_attestation() {
		let attestation = attestation_bytes(b"register-nonce");
		let digest = Sha256::digest(&attestation);
		let assertion = serde_json::to_vec(&SoftwareAssertionBlob {
			challenge: B64Bytes(b"certify-nonce".to_vec()),
			attestation_digest: B64Bytes(digest.to_vec()),
		})
		.unwrap();

		let validator = SoftwareAssertionValidator;
		validator.validate(&assertion, b"certify-nonce", &attestation).await.unwrap();

		let err = validator.validate(&assertion, b"wrong-nonce", &attestation).await.unwrap_err();
		assert!(matches!(err, ProtocolError::AssertionMismatch(_)));
	}
}
