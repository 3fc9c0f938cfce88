//! The literal end-to-end scenarios from the component design's testable-properties
//! section, run against an in-process `reader-server` bound to an ephemeral port —
//! a real `axum::Router` rather than a hand-mocked transport layer.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use async_trait::async_trait;
use reader_client::config::ClientConfig;
use reader_client::error::ClientError;
use reader_client::pool::ReaderBackendClient;
use reader_client::software::{software_attestation_pair, SoftwareKeyStore};
use reader_client::storage::MemoryStorage;
use reader_client::transport::HttpTransport;
use reader_protocol::{ProtocolError, Transport};

/// Wraps a real transport, counting every RPC and allowing tests to flip connectivity off
/// to exercise the offline-continuity and server-amnesia scenarios.
struct InstrumentedTransport {
	inner: HttpTransport,
	count: AtomicUsize,
	online: AtomicBool,
}

impl InstrumentedTransport {
	fn new(base_url: String) -> Self {
		InstrumentedTransport { inner: HttpTransport::new(base_url), count: AtomicUsize::new(0), online: AtomicBool::new(true) }
	}

	fn calls(&self) -> usize {
		self.count.load(Ordering::SeqCst)
	}

	fn set_online(&self, online: bool) {
		self.online.store(online, Ordering::SeqCst);
	}
}

#[async_trait]
impl Transport for InstrumentedTransport {
	async fn post(&self, method: &str, body: Vec<u8>) -> Result<(u16, Vec<u8>), ProtocolError> {
		if !self.online.load(Ordering::SeqCst) {
			return Err(ProtocolError::Transport("offline".into()));
		}
		self.count.fetch_add(1, Ordering::SeqCst);
		self.inner.post(method, body).await
	}
}

async fn spawn_server() -> String {
	let storage: Arc<dyn reader_protocol::Storage> = Arc::new(reader_server::storage::MemoryStorage::new());
	let config = reader_server::config::parse_config(None).unwrap();
	let app_state = reader_server::build_app(config, storage).await.unwrap();
	let router = reader_server::app::router(app_state);
	let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
	let addr = listener.local_addr().unwrap();
	tokio::spawn(async move {
		axum::serve(listener, router).await.unwrap();
    });
	format!("http://{addr}")
}

/// The device-local parts of a client: secure store and pool/registration storage. Kept
/// separate from the transport so a test can rebuild a client pointed at a different server
/// while keeping the same on-device state, exactly what "the server forgot everything but
/// the phone did not" means.
struct LocalParts {
	storage: Arc<MemoryStorage>,
	secure_area: Arc<SoftwareKeyStore>,
	attestation_generator: Arc<reader_client::software::SoftwareAttestationGenerator>,
	assertion_generator: Arc<reader_client::software::SoftwareAssertionGenerator>,
}

impl LocalParts {
	fn new() -> Self {
		let (attestation_generator, assertion_generator) = software_attestation_pair();
		LocalParts {
			storage: Arc::new(MemoryStorage::new()),
			secure_area: Arc::new(SoftwareKeyStore::new()),
			attestation_generator: Arc::new(attestation_generator),
			assertion_generator: Arc::new(assertion_generator),
		}
	}

	fn client_for(&self, transport: Arc<InstrumentedTransport>, num_keys: usize) -> ReaderBackendClient {
		let config = ClientConfig {
			reader_backend_url: String::new(),
			storage: self.storage.clone(),
			secure_area: self.secure_area.clone(),
			attestation_generator: self.attestation_generator.clone(),
			assertion_generator: self.assertion_generator.clone(),
			transport,
			num_keys,
		};
		ReaderBackendClient::new(config)
	}
}

fn make_client(base_url: String, num_keys: usize) -> (Arc<ReaderBackendClient>, Arc<InstrumentedTransport>) {
	let transport = Arc::new(InstrumentedTransport::new(base_url));
	let parts = LocalParts::new();
	let client = parts.client_for(transport.clone(), num_keys);
	(Arc::new(client), transport)
}

#[tokio::test]
async fn happy_path_cold_client_issues_exactly_four_rpcs() {
	let base_url = spawn_server().await;
	let (client, transport) = make_client(base_url, 10);

	let now = SystemTime::now();
	let (key_info, chain) = client.get_key(now).await.unwrap();
	assert_eq!(transport.calls(), 4, "getNonce, register, getNonce, certifyKeys");
	assert_eq!(chain.len(), 2, "leaf + reader root");
	assert!(!key_info.alias.is_empty());
}

#[tokio::test]
async fn replenish_at_half_triggers_exactly_two_more_rpcs_on_the_sixth_call() {
	let base_url = spawn_server().await;
	let (client, transport) = make_client(base_url, 10);

	let now = SystemTime::now();
	client.get_key(now).await.unwrap();
	assert_eq!(transport.calls(), 4);

	let mut aliases = Vec::new();
	for _ in 0..5 {
		let (key_info, _) = client.get_key(now).await.unwrap();
		client.mark_key_as_used(&key_info.alias, now).await.unwrap();
		aliases.push(key_info.alias);
	}
	assert_eq!(transport.calls(), 4, "five uses out of ten keys do not cross the replenish threshold");
	assert_eq!(aliases.iter().collect::<std::collections::HashSet<_>>().len(), 5, "five distinct aliases");

	let (key_info, _) = client.get_key(now).await.unwrap();
	client.mark_key_as_used(&key_info.alias, now).await.unwrap();
	assert_eq!(transport.calls(), 6, "sixth getKey replenishes: getNonce + certifyKeys");
}

#[tokio::test]
async fn offline_survival_retains_the_last_key_until_it_expires() {
	let base_url = spawn_server().await;
	let (client, transport) = make_client(base_url, 10);

	let now = SystemTime::now();
	client.get_key(now).await.unwrap();

	transport.set_online(false);

	let mut last_alias = String::new();
	for _ in 0..10 {
		let (key_info, _) = client.get_key(now).await.unwrap();
		client.mark_key_as_used(&key_info.alias, now).await.unwrap();
		last_alias = key_info.alias;
	}

	for _ in 0..10 {
		let (key_info, _) = client.get_key(now).await.unwrap();
		assert_eq!(key_info.alias, last_alias, "the same retained alias must be returned while offline");
		client.mark_key_as_used(&key_info.alias, now).await.unwrap();
	}

	let far_future = now + Duration::from_secs(60 * 24 * 60 * 60);
	let err = client.get_key(far_future).await.unwrap_err();
	assert!(matches!(err, ClientError::NoValidKey));
}

#[tokio::test]
async fn time_passes_replenishes_only_once_keys_cross_refresh_at() {
	let base_url = spawn_server().await;
	let (client, transport) = make_client(base_url, 10);

	let t0 = SystemTime::now();
	client.get_key(t0).await.unwrap();
	assert_eq!(transport.calls(), 4);

	let t0_plus_15d = t0 + Duration::from_secs(15 * 24 * 60 * 60);
	client.get_key(t0_plus_15d).await.unwrap();
	assert_eq!(transport.calls(), 4, "refreshAt is ~20d out; nothing to replenish at 15d");

	let t0_plus_21d = t0 + Duration::from_secs(21 * 24 * 60 * 60);
	client.get_key(t0_plus_21d).await.unwrap();
	assert_eq!(transport.calls(), 6, "all keys are past refreshAt by 21d: getNonce + certifyKeys");
}

#[tokio::test]
async fn server_amnesia_triggers_registration_lost_recovery() {
	let parts = LocalParts::new();

	let first_transport = Arc::new(InstrumentedTransport::new(spawn_server().await));
	let client = parts.client_for(first_transport.clone(), 10);

	let now = SystemTime::now();
	client.get_key(now).await.unwrap();
	assert_eq!(first_transport.calls(), 4);
	drop(client);

	// The server forgets everything (a fresh process, or a wiped store); the phone's local
	// state — the secure store and the pool/registration tables in `parts` — survives.
	let fresh_transport = Arc::new(InstrumentedTransport::new(spawn_server().await));
	let client = parts.client_for(fresh_transport.clone(), 10);

	let far_future = now + Duration::from_secs(21 * 24 * 60 * 60);
	let (key_info, _) = client.get_key(far_future).await.unwrap();
	assert!(!key_info.alias.is_empty());
	assert_eq!(
		fresh_transport.calls(),
		6,
		"certifyKeys fails with 404 (getNonce + certifyKeys), then register + getNonce + certifyKeys recovers, \
		 plus the outer getKey's own leading getNonce is folded into ensureReplenished above"
	);
}
