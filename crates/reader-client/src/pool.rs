//! The `ReaderBackendClient`: the pool manager at the center of the client side of the
//! reader credential lifecycle. Owns local pool state and drives the four RPCs against
//! the server through [`Transport`]; see the component design for the full contract.
//!
//! The single-flight, narrow-API-over-authoritative-state shape mirrors
//! `control::caclient::CaClient`'s own design: callers read through `get_key`/
//! `mark_key_as_used` while replenishment does the actual work. Unlike that
//! background-task model, this pool manager is NOT autonomous — the component design
//! requires a single mutex, caller-driven model, not a periodic refresh task (the
//! issuer feed's optional scheduler in [`crate::issuer_feed`] is the one exception,
//! and it is opt-in for whatever embeds this crate).

use std::collections::HashMap;
use std::time::{Duration, SystemTime};

use reader_protocol::messages::{CertifyKeysRequest, GetNonceResponse, RegisterRequest, RegisterResponse};
use reader_protocol::{KeyInfo, Storage};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::config::ClientConfig;
use crate::error::ClientError;
use crate::registration::{RegistrationData, REGISTRATION_KEY, TABLE_CERTIFIED_KEYS, TABLE_REGISTRATION};
use crate::rpc;

/// `CertifiedKey`, persisted under an auto-generated row id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CertifiedKeyRecord {
	pub alias: String,
	pub cert_chain: Vec<Vec<u8>>,
	#[serde(with = "unix_seconds")]
	pub valid_from: SystemTime,
	#[serde(with = "unix_seconds")]
	pub valid_until: SystemTime,
	#[serde(with = "unix_seconds")]
	pub refresh_at: SystemTime,
}

impl CertifiedKeyRecord {
	fn is_currently_valid(&self, now: SystemTime) -> bool {
		self.valid_from < now && now < self.valid_until
	}

	fn is_good(&self, now: SystemTime) -> bool {
		self.is_currently_valid(now) && now <= self.refresh_at
	}

	fn needs_refresh(&self, now: SystemTime) -> bool {
		now > self.refresh_at
	}
}

mod unix_seconds {
	use std::time::{Duration, SystemTime, UNIX_EPOCH};

	use serde::{Deserialize, Deserializer, Serialize, Serializer};

	pub fn serialize<S: Serializer>(t: &SystemTime, serializer: S) -> Result<S::Ok, S::Error> {
		let secs = t.duration_since(UNIX_EPOCH).unwrap_or_default().as_secs();
		secs.serialize(serializer)
	}

	pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<SystemTime, D::Error> {
		let secs = u64::deserialize(deserializer)?;
		Ok(UNIX_EPOCH + Duration::from_secs(secs))
	}
}

/// Pool configuration's replenishment threshold: `⌊N/2⌋ + 1`, expressed as the
/// equivalent `goodCount * 2 > targetCount` integer comparison `ensureReplenished` uses.
fn above_replenish_threshold(good_count: usize, target_count: usize) -> bool {
	good_count * 2 > target_count
}

fn registration_row_key() -> String {
	format!("{TABLE_REGISTRATION}/{REGISTRATION_KEY}")
}

pub struct ReaderBackendClient {
	config: ClientConfig,
	state: Mutex<()>,
}

impl ReaderBackendClient {
	pub fn new(config: ClientConfig) -> Self {
		ReaderBackendClient { config, state: Mutex::new(()) }
	}

    /// Returns the oldest still-valid key (smallest `validFrom` among currently-valid
    /// candidates), best-effort replenishing the pool first. Fails with `NoValidKey` only
    /// if no currently-valid key exists and replenishment failed.
    #[instrument(skip(self))]
    pub async fn get_key(&self, now: SystemTime) -> Result<(KeyInfo, Vec<Vec<u8>>), ClientError> {
        let _guard = self.state.lock().await;

        if let Err(e) = self.ensure_replenished(now).await {
            if e.is_registration_lost() {
                // retry-once on RegistrationLost: the 404 handler already dropped local
                // registration state, so a second attempt re-registers from scratch.
                if let Err(e2) = self.ensure_replenished(now).await {
                    warn!(error = %e2, "replenishment retry after registration loss failed");
                }
            } else {
                warn!(error = %e, "best-effort replenishment failed, serving from existing pool");
            }
        }

        let rows = self.load_rows().await?;
        let best = rows
            .into_iter()
            .map(|(_, record)| record)
            .filter(|record| record.is_currently_valid(now))
            .min_by_key(|record| record.valid_from);

        let record = best.ok_or(ClientError::NoValidKey)?;
        let public_key = self
            .config
            .secure_area
            .get_key_info(&record.alias)
            .await
            .map_err(|e| ClientError::KeyStore(e.to_string()))?
            .ok_or_else(|| ClientError::KeyStore(format!("secure store missing alias {}", record.alias)))?;
        Ok((public_key, record.cert_chain))
    }

    /// Deletes the used key from the pool unless it is the last remaining key, in which
    /// case a replenishment is attempted first; if that fails the last key is retained so
    /// a device that goes offline can still present some reader identity.
    #[instrument(skip(self))]
    pub async fn mark_key_as_used(&self, alias: &str, now: SystemTime) -> Result<(), ClientError> {
        let _guard = self.state.lock().await;

        let rows = self.load_rows().await?;
        let (row_id, _) = rows.iter().find(|(_, r)| r.alias == alias).ok_or_else(|| ClientError::UnknownKey(alias.to_string()))?;
        let row_id = row_id.clone();

        if rows.len() > 1 {
            self.evict_row(&row_id).await?;
            return Ok(());
        }

        // Last remaining key: never delete it unless replenishment just succeeded.
        match self.ensure_replenished(now).await {
            Ok(()) => {
                let rows_after = self.load_rows().await?;
                if rows_after.len() > 1 {
                    self.evict_row(&row_id).await?;
                }
                // else: replenishment ran but produced nothing new (e.g. already above
                // threshold with no stale keys) — still only one key, so retain it.
                Ok(())
            },
            Err(e) => {
                info!(error = %e, "replenishment failed while retaining the last key (offline continuity)");
                Ok(())
            },
        }
    }

	/// Delegates to the server; caller replaces the local built-in trust list atomically
	/// if `Some` is returned.
	#[instrument(skip(self))]
	pub async fn get_trusted_issuers(
		&self,
		current_version: Option<i64>,
	) -> Result<Option<(i64, Vec<reader_protocol::IssuerTrustEntry>)>, ClientError> {
		rpc::get_issuer_list(self.config.transport.as_ref(), current_version).await
	}

	/// Returns cached `RegistrationData` if present, else registers fresh: `getNonce ->
	/// generateAttestation(challenge=nonce) -> register`. Callers must hold `self.state`
	/// while calling this so concurrent registration attempts are serialised.
	async fn ensure_registered(&self) -> Result<RegistrationData, ClientError> {
		if let Some(bytes) = self.config.storage.get(&registration_row_key()).await.map_err(|e| ClientError::Storage(e.to_string()))? {
			let registration: RegistrationData = serde_json::from_slice(&bytes).map_err(|e| ClientError::Codec(e.to_string()))?;
			return Ok(registration);
		}

		let GetNonceResponse { nonce } = rpc::get_nonce(self.config.transport.as_ref()).await?;
		let (attestation, device_attestation_id) =
			self.config.attestation_generator.generate(&nonce.0).await.map_err(ClientError::from)?;

		let RegisterResponse { registration_id } = rpc::register(
			self.config.transport.as_ref(),
			RegisterRequest { nonce, device_attestation: attestation.into() },
		)
		.await?;

		let registration = RegistrationData { device_attestation_id, registration_id };
		let body = serde_json::to_vec(&registration).map_err(|e| ClientError::Codec(e.to_string()))?;
		self.config.storage.update(&registration_row_key(), body).await.map_err(|e| ClientError::Storage(e.to_string()))?;
		Ok(registration)
	}

	/// The pool replenishment algorithm in full, per the component design's numbered steps.
	async fn ensure_replenished(&self, now: SystemTime) -> Result<(), ClientError> {
		let rows = self.load_rows().await?;

		let to_delete: Vec<String> = rows.iter().filter(|(_, r)| r.needs_refresh(now)).map(|(id, _)| id.clone()).collect();
		let good_count = rows.values().filter(|r| r.is_good(now)).count();

		if above_replenish_threshold(good_count, self.config.num_keys) {
			for row_id in to_delete {
				self.evict_row(&row_id).await?;
			}
			return Ok(());
		}

		let registration = self.ensure_registered().await?;

		let GetNonceResponse { nonce } = rpc::get_nonce(self.config.transport.as_ref()).await?;
		let assertion = self
			.config
			.assertion_generator
			.generate(&nonce.0, &registration.device_attestation_id)
			.await
			.map_err(ClientError::from)?;

		let need = self.config.num_keys.saturating_sub(good_count);
		let mut created = Vec::with_capacity(need);
		for _ in 0..need {
			let key_info = self.config.secure_area.create_key().await.map_err(|e| ClientError::KeyStore(e.to_string()))?;
			created.push(key_info);
		}

		let keys = created.iter().map(|k| crate::jwk::jwk_from_public_key_der(&k.public_key)).collect::<Result<Vec<_>, _>>();
		let keys = match keys {
			Ok(keys) => keys,
			Err(e) => {
				self.rollback_created_keys(&created).await;
				return Err(e);
			},
		};

		let request = CertifyKeysRequest {
			registration_id: registration.registration_id.clone(),
			nonce,
			device_assertion: assertion.into(),
			keys: keys.into_iter().map(reader_protocol::messages::Jwk).collect(),
		};

		let response = match rpc::certify_keys(self.config.transport.as_ref(), request).await {
			Ok(response) => response,
			Err(e) if e.is_registration_lost() => {
				// Strict reading of the 404-retry open question: roll back the secure-store
				// keys created above rather than leaving them orphaned, then drop the local
				// registration so the next attempt re-registers from scratch.
				self.rollback_created_keys(&created).await;
				self.config.storage.delete(&registration_row_key()).await.map_err(|e| ClientError::Storage(e.to_string()))?;
				return Err(e);
			},
			Err(e) => {
				self.rollback_created_keys(&created).await;
				return Err(e);
			},
		};

		if response.reader_certifications.len() != created.len() {
			self.rollback_created_keys(&created).await;
			return Err(ClientError::Codec(format!(
				"server returned {} certifications for {} submitted keys",
				response.reader_certifications.len(),
				created.len()
			)));
		}

		for (key_info, x5c) in created.iter().zip(response.reader_certifications.into_iter()) {
			let cert_chain: Vec<Vec<u8>> = x5c.0.into_iter().map(|b| b.0).collect();
			let (valid_from, valid_until) = leaf_validity(&cert_chain)?;
			let refresh_at = refresh_at_for(valid_from, valid_until);
			let record = CertifiedKeyRecord { alias: key_info.alias.clone(), cert_chain, valid_from, valid_until, refresh_at };
			let body = serde_json::to_vec(&record).map_err(|e| ClientError::Codec(e.to_string()))?;
			let row_key = format!("{TABLE_CERTIFIED_KEYS}/{}", Uuid::new_v4());
			self.config.storage.insert(Some(row_key), body, None).await.map_err(|e| ClientError::Storage(e.to_string()))?;
		}

		// Only deleted after the new keys are durably recorded, so a crash between
		// certification and this point leaves stale-but-valid keys rather than a gap.
		for row_id in to_delete {
			self.evict_row(&row_id).await?;
		}

		Ok(())
	}

	async fn rollback_created_keys(&self, created: &[KeyInfo]) {
		for key_info in created {
			if let Err(e) = self.config.secure_area.delete_key(&key_info.alias).await {
				warn!(alias = %key_info.alias, error = %e, "failed to roll back orphaned secure-store key");
			}
		}
	}

	/// Deletes a certified-key row and its secure-store material together. Idempotent:
	/// deleting an already-absent row or alias is not an error, so a crash between the two
	/// deletes is safely retried on the next invocation.
	async fn evict_row(&self, row_id: &str) -> Result<(), ClientError> {
		let raw = self.config.storage.get(row_id).await.map_err(|e| ClientError::Storage(e.to_string()))?;
		if let Some(raw) = raw {
			let record: CertifiedKeyRecord = serde_json::from_slice(&raw).map_err(|e| ClientError::Codec(e.to_string()))?;
			self.config.secure_area.delete_key(&record.alias).await.map_err(|e| ClientError::KeyStore(e.to_string()))?;
		}
		self.config.storage.delete(row_id).await.map_err(|e| ClientError::Storage(e.to_string()))?;
		Ok(())
	}

	async fn load_rows(&self) -> Result<HashMap<String, CertifiedKeyRecord>, ClientError> {
		let rows = self.config.storage.enumerate().await.map_err(|e| ClientError::Storage(e.to_string()))?;
		rows.into_iter()
			.filter(|(id, _)| id.starts_with(TABLE_CERTIFIED_KEYS))
			.map(|(id, bytes)| {
				let record: CertifiedKeyRecord = serde_json::from_slice(&bytes).map_err(|e| ClientError::Codec(e.to_string()))?;
				Ok((id, record))
			})
			.collect()
	}
}

/// Extracts `(notBefore, notAfter)` from the leaf (first) entry of a DER certificate chain.
fn leaf_validity(chain: &[Vec<u8>]) -> Result<(SystemTime, SystemTime), ClientError> {
	let leaf = chain.first().ok_or_else(|| ClientError::Codec("empty certificate chain".into()))?;
	let (_, cert) = x509_parser::parse_x509_certificate(leaf).map_err(|e| ClientError::Codec(format!("invalid leaf certificate: {e}")))?;
	let not_before = SystemTime::UNIX_EPOCH + Duration::from_secs(cert.validity().not_before.timestamp().max(0) as u64);
	let not_after = SystemTime::UNIX_EPOCH + Duration::from_secs(cert.validity().not_after.timestamp().max(0) as u64);
	Ok((not_before, not_after))
}

/// `refreshAt = validFrom + (validUntil - validFrom) * 2/3`.
fn refresh_at_for(valid_from: SystemTime, valid_until: SystemTime) -> SystemTime {
	let span = valid_until.duration_since(valid_from).unwrap_or_default();
	valid_from + (span * 2) / 3
}
