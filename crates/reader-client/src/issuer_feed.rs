//! The issuer trust feed: a versioned pull that atomically rebuilds the client's built-in
//! trust manager storage. Coexists with (and never touches) a user-managed trust list,
//! which lives entirely outside this crate.

use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use reader_protocol::{IssuerTrustEntry, Storage, Transport};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::ClientError;
use crate::rpc;

const TABLE_PREFIX: &str = "reader_backend_client_built_in_issuers";
const META_KEY: &str = "reader_backend_client_built_in_issuers/__meta__";

/// Default refresh cadence the component design calls for: every four hours.
pub const DEFAULT_REFRESH_INTERVAL: Duration = Duration::from_secs(4 * 60 * 60);

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
struct FeedMeta {
	version: i64,
	#[serde(default)]
	updated_at_unix: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefreshOutcome {
	UpToDate,
	Updated { version: i64, entry_count: usize },
}

/// Owns the client-side "built-in" issuer trust manager storage and drives its refresh
/// against the server's `getIssuerList` RPC. A separate `Storage` instance from the pool
/// manager's — the component design calls out that persisted tables have independent
/// lifetimes even when both sides happen to be the same process.
pub struct IssuerTrustFeed {
	transport: Arc<dyn Transport>,
	storage: Arc<dyn Storage>,
}

impl IssuerTrustFeed {
	pub fn new(transport: Arc<dyn Transport>, storage: Arc<dyn Storage>) -> Self {
		IssuerTrustFeed { transport, storage }
	}

	async fn meta(&self) -> Result<FeedMeta, ClientError> {
		match self.storage.get(META_KEY).await.map_err(|e| ClientError::Storage(e.to_string()))? {
			Some(bytes) => serde_json::from_slice(&bytes).map_err(|e| ClientError::Codec(e.to_string())),
			None => Ok(FeedMeta::default()),
		}
	}

	/// The version and entries currently applied to the built-in trust manager, for tests
	/// and for callers that want to read back what was last persisted.
	pub async fn current(&self) -> Result<(i64, Vec<IssuerTrustEntry>), ClientError> {
		let meta = self.meta().await?;
		let rows = self.storage.enumerate().await.map_err(|e| ClientError::Storage(e.to_string()))?;
		let mut entries = Vec::new();
		for (key, value) in rows {
			if key == META_KEY {
				continue;
			}
			let entry: IssuerTrustEntry = serde_json::from_slice(&value).map_err(|e| ClientError::Codec(e.to_string()))?;
			entries.push(entry);
		}
		Ok((meta.version, entries))
	}

	/// Pulls `getIssuerList(currentVersion)` and, on an update, atomically rebuilds the
	/// built-in trust manager: enumerate existing entries, delete them, insert the new
	/// entries in order, then persist the new version and timestamp.
	pub async fn refresh(&self, now: SystemTime) -> Result<RefreshOutcome, ClientError> {
		let meta = self.meta().await?;
		let current_version = if meta.version == 0 && meta.updated_at_unix == 0 { None } else { Some(meta.version) };

		let update = rpc::get_issuer_list(self.transport.as_ref(), current_version).await?;
		let Some((version, entries)) = update else {
			return Ok(RefreshOutcome::UpToDate);
		};

		let existing = self.storage.enumerate().await.map_err(|e| ClientError::Storage(e.to_string()))?;
		for (key, _) in existing {
			if key != META_KEY {
				self.storage.delete(&key).await.map_err(|e| ClientError::Storage(e.to_string()))?;
			}
		}

		let entry_count = entries.len();
		for entry in &entries {
			let body = serde_json::to_vec(entry).map_err(|e| ClientError::Codec(e.to_string()))?;
			self.storage
				.insert(Some(format!("{TABLE_PREFIX}/{}", Uuid::new_v4())), body, None)
				.await
				.map_err(|e| ClientError::Storage(e.to_string()))?;
		}

		let updated_at_unix = now.duration_since(UNIX_EPOCH).unwrap_or_default().as_secs();
		let new_meta = FeedMeta { version, updated_at_unix };
		let meta_body = serde_json::to_vec(&new_meta).map_err(|e| ClientError::Codec(e.to_string()))?;
		self.storage.update(META_KEY, meta_body).await.map_err(|e| ClientError::Storage(e.to_string()))?;

		info!(version, entry_count, "rebuilt built-in issuer trust manager");
		Ok(RefreshOutcome::Updated { version, entry_count })
	}

	/// Spawns a background task that calls `refresh` once immediately and then on
	/// `interval`. Opt-in: the issuer feed itself is a plain pull method; this scheduler is
	/// for whatever embeds this crate (the mobile app shell, out of scope here) to use
	/// instead of hand-rolling its own timer.
	pub fn spawn_periodic_refresh(self: Arc<Self>, interval: Duration) -> tokio::task::JoinHandle<()> {
		tokio::spawn(async move {
			loop {
				if let Err(e) = self.refresh(SystemTime::now()).await {
					warn!(error = %e, "issuer trust feed refresh failed, will retry next interval");
				}
				tokio::time::sleep(interval).await;
			}
		})
	}
}

#[cfg(test)]
mod test {
	use async_trait::async_trait;
	use reader_protocol::messages::GetIssuerListResponse;
	use reader_protocol::{IssuerTrustEntryMetadata, ProtocolError};

	use super::*;
	use crate::storage::MemoryStorage;

	struct FixedTransport {
		version: i64,
		entries: Vec<IssuerTrustEntry>,
	}

	#[async_trait]
	impl Transport for FixedTransport {
		async fn post(&self, method: &str, body: Vec<u8>) -> Result<(u16, Vec<u8>), ProtocolError> {
			assert_eq!(method, "getIssuerList");
			let req: reader_protocol::messages::GetIssuerListRequest = serde_json::from_slice(&body).unwrap();
			let resp = match req.current_version {
				Some(v) if v == self.version => GetIssuerListResponse::up_to_date(),
				_ => GetIssuerListResponse::update(self.version, self.entries.clone()),
			};
			Ok((200, serde_json::to_vec(&resp).unwrap()))
		}
	}

	fn one_entry() -> IssuerTrustEntry {
		IssuerTrustEntry::Iaca {
			cert: vec![1, 2, 3].into(),
			metadata: IssuerTrustEntryMetadata { display_name: "Example DMV".into(), icon: None, privacy_policy_url: None, test_only: false },
		}
	}

	#[tokio::test]
	async fn first_refresh_applies_the_full_list() {
		let feed = IssuerTrustFeed::new(Arc::new(FixedTransport { version: 42, entries: vec![one_entry()] }), Arc::new(MemoryStorage::new()));
		let outcome = feed.refresh(SystemTime::now()).await.unwrap();
		assert_eq!(outcome, RefreshOutcome::Updated { version: 42, entry_count: 1 });
		let (version, entries) = feed.current().await.unwrap();
		assert_eq!(version, 42);
		assert_eq!(entries.len(), 1);
	}

	#[tokio::test]
	async fn second_refresh_at_same_version_is_a_no_op() {
		let feed = IssuerTrustFeed::new(Arc::new(FixedTransport { version: 42, entries: vec![one_entry()] }), Arc::new(MemoryStorage::new()));
		feed.refresh(SystemTime::now()).await.unwrap();
		let outcome = feed.refresh(SystemTime::now()).await.unwrap();
		assert_eq!(outcome, RefreshOutcome::UpToDate);
		let (_, entries) = feed.current().await.unwrap();
		assert_eq!(entries.len(), 1, "no-op refresh must not duplicate or drop entries");
	}

	/// Any version other than the server's current one (lower or higher) gets the same
	/// full update, not just the lower case — a stale client and a client that somehow
	/// saw a newer version than the server currently has both simply resync.
	#[tokio::test]
	async fn any_version_mismatch_resyncs_identically() {
		let entries = vec![one_entry()];
		for queried in [41_i64, 43_i64] {
			let transport = Arc::new(FixedTransport { version: 42, entries: entries.clone() });
			let req = reader_protocol::messages::GetIssuerListRequest { current_version: Some(queried) };
			let body = serde_json::to_vec(&req).unwrap();
			let (status, body) = transport.post("getIssuerList", body).await.unwrap();
			assert_eq!(status, 200);
			let response: GetIssuerListResponse = serde_json::from_slice(&body).unwrap();
			let (version, returned) = response.into_update().unwrap();
			assert_eq!(version, 42);
			assert_eq!(returned.len(), 1);
		}
	}
}
