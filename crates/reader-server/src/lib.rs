pub mod app;
pub mod config;
pub mod error;
pub mod handlers;
pub mod reader_root;
pub mod registration;
pub mod spki;
pub mod storage;
pub mod validation;

use std::sync::Arc;

use reader_core::drain::DrainWatcher;
use reader_core::readiness::Ready;
use reader_protocol::{AssertionValidator, AttestationValidator, Storage};
use tracing::info;

use crate::app::AppState;
use crate::config::Config;
use crate::error::ServerError;
use crate::handlers::ServerState;
use crate::reader_root::{ReaderRootIdentity, SLOT_TRUSTED, SLOT_UNTRUSTED};

/// Loads the reader root identities from `storage`, generating and persisting them on
/// first use. Mirrors the "global state: process-wide secret loaded at server start"
/// design note.
pub async fn load_or_generate_roots(storage: &dyn Storage) -> Result<(ReaderRootIdentity, ReaderRootIdentity), ServerError> {
	let trusted = load_or_generate_one(storage, SLOT_TRUSTED, "Reader Root").await?;
	let untrusted = load_or_generate_one(storage, SLOT_UNTRUSTED, "Reader Root (Untrusted Devices)").await?;
	Ok((trusted, untrusted))
}

async fn load_or_generate_one(storage: &dyn Storage, slot: &str, common_name: &str) -> Result<ReaderRootIdentity, ServerError> {
	match storage.get(slot).await.map_err(|e| ServerError::Storage(e.to_string()))? {
		Some(pem_bytes) => {
			let combined = String::from_utf8(pem_bytes).map_err(|e| ServerError::ReaderRoot(e.to_string()))?;
			let (key_pem, cert_pem) = combined.split_once("\n-----ROOT-IDENTITY-SEPARATOR-----\n").ok_or_else(|| {
				ServerError::ReaderRoot("corrupt reader root identity slot".into())
			})?;
			ReaderRootIdentity::from_pem(key_pem, cert_pem)
		},
		None => {
			let identity = ReaderRootIdentity::generate(common_name)?;
			let (key_pem, cert_pem) = identity.to_pem();
			let combined = format!("{key_pem}\n-----ROOT-IDENTITY-SEPARATOR-----\n{cert_pem}");
			storage.insert(Some(slot.to_string()), combined.into_bytes(), None).await.map_err(|e| ServerError::Storage(e.to_string()))?;
			Ok(identity)
		},
	}
}

/// Builds the full application: loads or generates the reader roots, wires up the
/// default software validators, and returns a ready-to-serve axum app.
pub async fn build_app(config: Config, storage: Arc<dyn Storage>) -> Result<AppState, ServerError> {
	let ready = Ready::new();
	let blocker = ready.register_task("reader-root-identity");

	let (trusted_root, untrusted_root) = load_or_generate_roots(storage.as_ref()).await?;
	drop(blocker);

	let attestation_validator: Arc<dyn AttestationValidator> = Arc::new(validation::SoftwareAttestationValidator);
	let assertion_validator: Arc<dyn AssertionValidator> = Arc::new(validation::SoftwareAssertionValidator);

	let server = Arc::new(ServerState { storage, trusted_root, untrusted_root, attestation_validator, assertion_validator, config });
	Ok(AppState { server, ready })
}

/// Binds `bind_addr` and serves the router until `drain` signals a shutdown, then waits for
/// in-flight requests to finish (axum's own graceful-shutdown grace period, not the drain
/// deadline that `reader_core::drain::run_with_drain` enforces for other components).
pub async fn serve(state: AppState, bind_addr: &str, drain: DrainWatcher) -> anyhow::Result<()> {
	let listener = tokio::net::TcpListener::bind(bind_addr).await?;
	info!(addr = %listener.local_addr()?, "reader backend listening");
	let router = app::router(state);
	axum::serve(listener, router)
		.with_graceful_shutdown(async move {
			let _blocker = drain.wait_for_drain().await;
		})
		.await?;
	Ok(())
}
