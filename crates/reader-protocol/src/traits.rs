//! Seam traits. Everything platform-specific (a real secure element, a real attestation
//! parser, a real HTTP stack, a real database) sits behind one of these; this crate
//! defines only the boundary and the shapes that cross it.

use std::time::Duration;

use async_trait::async_trait;

use crate::error::ProtocolError;

/// A keyed byte-string table with optional per-entry expiration. Two independent
/// instances exist in the system (client, server); this crate defines the boundary,
/// `reader-server`/`reader-client` each ship one reference implementation.
#[async_trait]
pub trait Storage: Send + Sync {
	/// Inserts under `key`, or auto-generates one when `key` is `None`. Returns the key
	/// actually used. `ttl` of `None` means the entry never expires.
	async fn insert(&self, key: Option<String>, value: Vec<u8>, ttl: Option<Duration>) -> Result<String, ProtocolError>;

	/// Returns `None` both when the key was never present and when it expired.
	async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, ProtocolError>;

	async fn update(&self, key: &str, value: Vec<u8>) -> Result<(), ProtocolError>;

	/// Idempotent: deleting an absent key is not an error.
	async fn delete(&self, key: &str) -> Result<(), ProtocolError>;

	async fn enumerate(&self) -> Result<Vec<(String, Vec<u8>)>, ProtocolError>;
}

/// A non-exportable key pair under an opaque alias. The core only ever creates, inspects,
/// signs with, and deletes keys through this trait — it never touches raw key material.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyInfo {
	pub alias: String,
	/// SPKI DER of the public key.
	pub public_key: Vec<u8>,
}

#[async_trait]
pub trait SecureKeyStore: Send + Sync {
	async fn create_key(&self) -> Result<KeyInfo, ProtocolError>;
	async fn get_key_info(&self, alias: &str) -> Result<Option<KeyInfo>, ProtocolError>;
	async fn sign(&self, alias: &str, data: &[u8]) -> Result<Vec<u8>, ProtocolError>;
	async fn delete_key(&self, alias: &str) -> Result<(), ProtocolError>;
}

/// Server-configured policy an attestation blob must satisfy. Mirrors the configuration
/// table: release-build/app-identifier checks on iOS, GMS/verified-boot/signature-digest
/// checks on Android.
#[derive(Debug, Clone, Default)]
pub struct AttestationPolicy {
	pub ios_release_build: bool,
	pub ios_app_identifier: Option<String>,
	pub android_require_gms_attestation: bool,
	pub android_require_verified_boot_green: bool,
	pub android_app_signature_certificate_digests: Vec<Vec<u8>>,
}

/// Whether a validated attestation carries enough platform assurance to be certified
/// under the trusted reader root, or should be routed to the untrusted-devices root
/// instead. A policy *rejection* is a hard `AttestationInvalid` error and never produces
/// this value — `Untrusted` is a deliberate classification of an attestation that passed
/// validation but offers weaker evidence (for example, a software/test attestation with
/// no platform-backed assurance at all).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttestationTrust {
	Trusted,
	Untrusted,
}

/// Server-side: validates an opaque attestation blob against a freshly minted challenge
/// and the configured policy. Real iOS/Android parsing is out of scope; implementations
/// treat the blob as a sealed byte string.
#[async_trait]
pub trait AttestationValidator: Send + Sync {
	async fn validate(&self, attestation: &[u8], challenge: &[u8], policy: &AttestationPolicy) -> Result<AttestationTrust, ProtocolError>;
}

/// Server-side: validates that an assertion blob is a live signature over `challenge`
/// that binds back to the attestation persisted at registration time.
#[async_trait]
pub trait AssertionValidator: Send + Sync {
	async fn validate(&self, assertion: &[u8], challenge: &[u8], device_attestation: &[u8]) -> Result<(), ProtocolError>;
}

/// Client-side: produces a fresh device attestation blob bound to `challenge`, and a
/// local handle (`deviceAttestationId`) the platform uses to refer back to it later.
#[async_trait]
pub trait AttestationGenerator: Send + Sync {
	async fn generate(&self, challenge: &[u8]) -> Result<(Vec<u8>, String), ProtocolError>;
}

/// Client-side: produces a device assertion blob — a live signature over `challenge`
/// binding back to the attestation referenced by `device_attestation_id`.
#[async_trait]
pub trait AssertionGenerator: Send + Sync {
	async fn generate(&self, challenge: &[u8], device_attestation_id: &str) -> Result<Vec<u8>, ProtocolError>;
}

/// A POST-only JSON request/response channel. `method` is the RPC name (`getNonce`,
/// `register`, `certifyKeys`, `getIssuerList`); callers append it to a configured base
/// URL. Returns the raw status code and body so callers can interpret protocol-specific
/// signals like `certifyKeys`'s 404.
#[async_trait]
pub trait Transport: Send + Sync {
	async fn post(&self, method: &str, body: Vec<u8>) -> Result<(u16, Vec<u8>), ProtocolError>;
}
