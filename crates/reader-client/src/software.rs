//! Software reference implementations of the platform seams: a non-exportable-in-spirit
//! (but in-process) secure key store, and attestation/assertion generators that produce
//! the same small self-describing JSON blob shape the server's software validators
//! expect. Real iOS/Android attestation and platform secure-element bindings are out of
//! scope; this is what the tests in this crate run against, and what an embedder would
//! swap out for a real platform adapter.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use rcgen::{KeyPair, PKCS_ECDSA_P384_SHA384};
use reader_protocol::b64::B64Bytes;
use reader_protocol::{AssertionGenerator, AttestationGenerator, KeyInfo, ProtocolError, SecureKeyStore};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

/// Mirrors `reader_server::validation::SoftwareAttestationBlob`. Kept as an independently
/// defined struct since the two crates don't share a dependency edge — each side of the
/// wire owns its own copy of the shape it (de)serializes, same as the rest of the
/// protocol's hand-off structs.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SoftwareAttestationBlob {
	challenge: B64Bytes,
	platform: String,
	#[serde(default)]
	ios_release_build: bool,
	#[serde(default)]
	ios_app_identifier: Option<String>,
	#[serde(default)]
	android_gms_attestation: bool,
	#[serde(default)]
	android_verified_boot_green: bool,
	#[serde(default)]
	android_signing_certificate_digest: Option<B64Bytes>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SoftwareAssertionBlob {
	challenge: B64Bytes,
	attestation_digest: B64Bytes,
}

/// A non-exportable-in-spirit key pair store: keys never leave the process, are created
/// under an opaque alias, and are deleted by alias. Backed by an in-memory map since
/// there is no real secure element to bind to outside a device.
#[derive(Default)]
pub struct SoftwareKeyStore {
	keys: Mutex<HashMap<String, Vec<u8>>>,
}

impl SoftwareKeyStore {
	pub fn new() -> Self {
		SoftwareKeyStore::default()
	}
}

#[async_trait]
impl SecureKeyStore for SoftwareKeyStore {
	async fn create_key(&self) -> Result<KeyInfo, ProtocolError> {
		let key_pair = KeyPair::generate_for(&PKCS_ECDSA_P384_SHA384).map_err(|e| ProtocolError::Transport(e.to_string()))?;
		let public_key = key_pair.public_key_der();
		let alias = Uuid::new_v4().to_string();
		self.keys.lock().expect("key store lock poisoned").insert(alias.clone(), public_key.clone());
		Ok(KeyInfo { alias, public_key })
	}

	async fn get_key_info(&self, alias: &str) -> Result<Option<KeyInfo>, ProtocolError> {
		let keys = self.keys.lock().expect("key store lock poisoned");
		Ok(keys.get(alias).map(|public_key| KeyInfo { alias: alias.to_string(), public_key: public_key.clone() }))
	}

	/// Not exercised by the pool manager (the component design notes the core only ever
	/// calls `createKey`/`getKeyInfo`/`deleteKey`); provided for trait completeness with a
	/// digest-based placeholder rather than a real ECDSA signature.
	async fn sign(&self, alias: &str, data: &[u8]) -> Result<Vec<u8>, ProtocolError> {
		let keys = self.keys.lock().expect("key store lock poisoned");
		let public_key = keys.get(alias).ok_or(ProtocolError::UnknownKey)?;
		let mut hasher = Sha256::new();
		hasher.update(public_key);
		hasher.update(data);
		Ok(hasher.finalize().to_vec())
	}

	async fn delete_key(&self, alias: &str) -> Result<(), ProtocolError> {
		self.keys.lock().expect("key store lock poisoned").remove(alias);
		Ok(())
	}
}

/// Attestation blobs keyed by the local `deviceAttestationId` handle, shared between a
/// [`SoftwareAttestationGenerator`] and its paired [`SoftwareAssertionGenerator`] so the
/// latter can re-digest the same bytes the server persisted at registration time. A real
/// platform pair does the analogous thing through the secure element itself, keyed by
/// the platform's own attestation-record handle.
type AttestationMemory = Arc<Mutex<HashMap<String, Vec<u8>>>>;

/// Produces a fresh device attestation blob bound to a challenge nonce, tagged as a
/// `"software"` platform so the server's policy routes it to the untrusted-devices root
/// (see `reader_server::validation`).
pub struct SoftwareAttestationGenerator {
	memory: AttestationMemory,
}

/// Produces a live signature-equivalent assertion binding a challenge back to a
/// previously generated attestation. The software reference signs nothing real; it binds
/// by digest, matching what `reader_server::validation::SoftwareAssertionValidator` checks.
pub struct SoftwareAssertionGenerator {
	memory: AttestationMemory,
}

/// Builds a matched attestation/assertion generator pair sharing one attestation memory,
/// mirroring how a single platform secure element backs both operations in practice.
pub fn software_attestation_pair() -> (SoftwareAttestationGenerator, SoftwareAssertionGenerator) {
	let memory: AttestationMemory = Arc::new(Mutex::new(HashMap::new()));
	(SoftwareAttestationGenerator { memory: memory.clone() }, SoftwareAssertionGenerator { memory })
}

#[async_trait]
impl AttestationGenerator for SoftwareAttestationGenerator {
	async fn generate(&self, challenge: &[u8]) -> Result<(Vec<u8>, String), ProtocolError> {
		let blob = SoftwareAttestationBlob {
			challenge: B64Bytes(challenge.to_vec()),
			platform: "software".into(),
			ios_release_build: false,
			ios_app_identifier: None,
			android_gms_attestation: false,
			android_verified_boot_green: false,
			android_signing_certificate_digest: None,
		};
		let bytes = serde_json::to_vec(&blob)?;
		let device_attestation_id = Uuid::new_v4().to_string();
		self.memory.lock().expect("attestation memory lock poisoned").insert(device_attestation_id.clone(), bytes.clone());
		Ok((bytes, device_attestation_id))
	}
}

#[async_trait]
impl AssertionGenerator for SoftwareAssertionGenerator {
	async fn generate(&self, challenge: &[u8], device_attestation_id: &str) -> Result<Vec<u8>, ProtocolError> {
		let attestation = self
			.memory
			.lock()
			.expect("attestation memory lock poisoned")
			.get(device_attestation_id)
			.cloned()
			.ok_or_else(|| ProtocolError::AssertionMismatch(format!("no attestation remembered for {device_attestation_id}")))?;
		let digest = Sha256::digest(&attestation);
		let blob = SoftwareAssertionBlob { challenge: B64Bytes(challenge.to_vec()), attestation_digest: B64Bytes(digest.to_vec()) };
		Ok(serde_json::to_vec(&blob)?)
	}
}

#[cfg(test)]
mod test {
	use super::*;

	#[tokio::test]
	async fn created_key_is_retrievable_and_deletable() {
		let store = SoftwareKeyStore::new();
		let info = store.create_key().await.unwrap();
		assert_eq!(store.get_key_info(&info.alias).await.unwrap().unwrap().public_key, info.public_key);
		store.delete_key(&info.alias).await.unwrap();
		assert!(store.get_key_info(&info.alias).await.unwrap().is_none());
	}

	#[tokio::test]
	async fn assertion_binds_to_remembered_attestation() {
		let (attestation_gen, assertion_gen) = software_attestation_pair();
		let (attestation, device_attestation_id) = attestation_gen.generate(b"register-nonce").await.unwrap();
		let assertion = assertion_gen.generate(b"certify-nonce", &device_attestation_id).await.unwrap();

		let blob: SoftwareAssertionBlob = serde_json::from_slice(&assertion).unwrap();
		assert_eq!(blob.attestation_digest.0, Sha256::digest(&attestation).to_vec());
	}
}
