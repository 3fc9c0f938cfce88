//! The four RPC handlers. Each owns exactly the contract spelled out for it: nonce
//! minting, device registration, batch key certification, and issuer-list distribution.

use std::sync::Arc;
use std::time::{Duration, SystemTime};

use rand::RngCore;
use reader_protocol::b64::{self, B64Bytes};
use reader_protocol::messages::{
	CertifyKeysRequest, CertifyKeysResponse, GetIssuerListRequest, GetIssuerListResponse, GetNonceResponse, RegisterRequest,
	RegisterResponse, X5c,
};
use reader_protocol::{AssertionValidator, AttestationTrust, AttestationValidator, Storage};
use tracing::{info, instrument};

use crate::config::Config;
use crate::error::ServerError;
use crate::reader_root::{jittered_validity, ReaderRootIdentity};
use crate::registration::RegistrationRecord;

const NONCE_TTL: Duration = Duration::from_secs(5 * 60);
const NONCE_LEN: usize = 16;

pub const TABLE_NONCES: &str = "reader_backend_nonces";
pub const TABLE_CLIENTS: &str = "reader_backend_clients";

pub struct ServerState {
	pub storage: Arc<dyn Storage>,
	pub trusted_root: ReaderRootIdentity,
	pub untrusted_root: ReaderRootIdentity,
	pub attestation_validator: Arc<dyn AttestationValidator>,
	pub assertion_validator: Arc<dyn AssertionValidator>,
	pub config: Config,
}

impl ServerState {
	fn root_for(&self, untrusted: bool) -> &ReaderRootIdentity {
		if untrusted {
			&self.untrusted_root
		} else {
			&self.trusted_root
		}
	}
}

fn nonce_key(nonce: &[u8]) -> String {
	format!("{TABLE_NONCES}/{}", b64::encode(nonce))
}

#[instrument(skip_all)]
pub async fn get_nonce(state: &ServerState) -> Result<GetNonceResponse, ServerError> {
	let mut bytes = vec![0u8; NONCE_LEN];
	rand::rng().fill_bytes(&mut bytes);
	let key = nonce_key(&bytes);
	state
		.storage
		.insert(Some(key), Vec::new(), Some(NONCE_TTL))
		.await
		.map_err(|e| ServerError::Storage(e.to_string()))?;
	Ok(GetNonceResponse { nonce: B64Bytes(bytes) })
}

/// Looks up a presented nonce and, only on success, removes it so it cannot be reused
/// (the strict, single-use reading of the nonce invariant).
async fn consume_nonce(state: &ServerState, nonce: &[u8]) -> Result<(), ServerError> {
	let key = nonce_key(nonce);
	let present = state.storage.get(&key).await.map_err(|e| ServerError::Storage(e.to_string()))?;
    if present.is_none() {
        return Err(ServerError::NonceUnknown);
    }
    state.storage.delete(&key).await.map_err(|e| ServerError::Storage(e.to_string()))?;
    Ok(())
}

/// Same as [`consume_nonce`] but does not delete the nonce; used when a later step in the
/// same call may still fail and the caller wants to decide separately when to consume it.
async fn peek_nonce(state: &ServerState, nonce: &[u8]) -> Result<(), ServerError> {
	let key = nonce_key(nonce);
	let present = state.storage.get(&key).await.map_err(|e| ServerError::Storage(e.to_string()))?;
	if present.is_none() {
		return Err(ServerError::NonceUnknown);
	}
	Ok(())
}

#[instrument(skip_all)]
pub async fn register(state: &ServerState, req: RegisterRequest) -> Result<RegisterResponse, ServerError> {
	// register consumes its nonce on success; on attestation failure it is left intact so a
	// genuinely transient client-side bug does not burn the caller's only nonce.
	peek_nonce(state, &req.nonce.0).await?;

	let policy = reader_protocol::AttestationPolicy {
		ios_release_build: state.config.ios_release_build,
		ios_app_identifier: state.config.ios_app_identifier.clone(),
		android_require_gms_attestation: state.config.android_require_gms_attestation,
		android_require_verified_boot_green: state.config.android_require_verified_boot_green,
		android_app_signature_certificate_digests: state.config.android_app_signature_certificate_digests.clone(),
	};

	let trust = state
		.attestation_validator
		.validate(&req.device_attestation.0, &req.nonce.0, &policy)
		.await
		.map_err(|e| match e {
			reader_protocol::ProtocolError::AttestationInvalid(m) => ServerError::AttestationInvalid(m),
			other => ServerError::Storage(other.to_string()),
		})?;

	consume_nonce(state, &req.nonce.0).await?;

	let record = RegistrationRecord { device_attestation: req.device_attestation.clone(), untrusted: trust == AttestationTrust::Untrusted };
	let body = serde_json::to_vec(&record).map_err(ServerError::Codec)?;
	let registration_id = format!("{TABLE_CLIENTS}/{}", uuid::Uuid::new_v4());
	state
		.storage
		.insert(Some(registration_id.clone()), body, None)
		.await
		.map_err(|e| ServerError::Storage(e.to_string()))?;

	info!(untrusted = record.untrusted, "registered device");
	Ok(RegisterResponse { registration_id })
}

#[instrument(skip_all, fields(keys = req.keys.len()))]
pub async fn certify_keys(state: &ServerState, req: CertifyKeysRequest) -> Result<CertifyKeysResponse, ServerError> {
	let raw = state
		.storage
		.get(&req.registration_id)
		.await
		.map_err(|e| ServerError::Storage(e.to_string()))?
		.ok_or(ServerError::RegistrationUnknown)?;
	let record: RegistrationRecord = serde_json::from_slice(&raw).map_err(ServerError::Codec)?;

	peek_nonce(state, &req.nonce.0).await?;

	state
		.assertion_validator
		.validate(&req.device_assertion.0, &req.nonce.0, &record.device_attestation.0)
		.await
		.map_err(|e| match e {
			reader_protocol::ProtocolError::AssertionMismatch(m) => ServerError::AssertionMismatch(m),
			other => ServerError::Storage(other.to_string()),
		})?;

	// Deleted only once binding succeeds, atomically with the certification that follows,
	// so a `DeviceAssertion` cannot be replayed within the nonce's validity window.
	consume_nonce(state, &req.nonce.0).await?;

	let root = state.root_for(record.untrusted);
	let now = SystemTime::now();

	let mut chains = Vec::with_capacity(req.keys.len());
	for jwk in &req.keys {
		let (valid_from, valid_until) = jittered_validity(now, state.config.reader_cert_validity_days);
		let public_key_der = jwk_to_spki_der(&jwk.0)?;
		let chain = root.issue_leaf(&public_key_der, valid_from, valid_until)?;
		chains.push(X5c(chain.into_iter().map(B64Bytes).collect()));
	}

	if chains.len() != req.keys.len() {
		return Err(ServerError::CountMismatch { submitted: req.keys.len(), certified: chains.len() });
	}

	Ok(CertifyKeysResponse { reader_certifications: chains })
}

#[instrument(skip_all)]
pub async fn get_issuer_list(state: &ServerState, req: GetIssuerListRequest) -> Result<GetIssuerListResponse, ServerError> {
	match req.current_version {
		Some(v) if v == state.config.trusted_issuers_version => Ok(GetIssuerListResponse::up_to_date()),
		_ => Ok(GetIssuerListResponse::update(state.config.trusted_issuers_version, state.config.trusted_issuers.clone())),
	}
}

/// Converts a submitted JWK to an SPKI DER public key. Supports the EC key shapes the
/// reader root itself issues under (`crv: P-256`/`P-384`); anything else is rejected as
/// an assertion-adjacent client error rather than a storage failure.
fn jwk_to_spki_der(jwk: &serde_json::Value) -> Result<Vec<u8>, ServerError> {
	let kty = jwk.get("kty").and_then(|v| v.as_str()).unwrap_or_default();
	if kty != "EC" {
		return Err(ServerError::AttestationInvalid(format!("unsupported key type {kty}")));
	}
	let x = jwk.get("x").and_then(|v| v.as_str()).ok_or_else(|| ServerError::AttestationInvalid("jwk missing x".into()))?;
	let y = jwk.get("y").and_then(|v| v.as_str()).ok_or_else(|| ServerError::AttestationInvalid("jwk missing y".into()))?;
	let x = b64::decode(x).map_err(|e| ServerError::AttestationInvalid(format!("invalid jwk.x: {e}")))?;
	let y = b64::decode(y).map_err(|e| ServerError::AttestationInvalid(format!("invalid jwk.y: {e}")))?;

	// Uncompressed EC point, then wrapped as an SPKI for P-384 (the curve the reader root
	// issues leaves under).
	let mut point = vec![0x04u8];
	point.extend_from_slice(&x);
	point.extend_from_slice(&y);
	crate::spki::wrap_ec_point_p384(&point).map_err(|e| ServerError::AttestationInvalid(e.to_string()))
}
