//! The axum router: the four RPC endpoints plus `/healthz`/`/readyz`, following the
//! same `State` + `axum::Router` wiring style used elsewhere in this workspace.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use reader_core::readiness::Ready;
use reader_protocol::messages::{CertifyKeysRequest, GetIssuerListRequest, RegisterRequest};
use tower_http::trace::TraceLayer;

use crate::error::ServerError;
use crate::handlers::{self, ServerState};

#[derive(Clone)]
pub struct AppState {
	pub server: Arc<ServerState>,
	pub ready: Ready,
}

pub fn router(state: AppState) -> Router {
	Router::new()
		.route("/getNonce", post(get_nonce))
		.route("/register", post(register))
		.route("/certifyKeys", post(certify_keys))
		.route("/getIssuerList", post(get_issuer_list))
		.route("/healthz", get(healthz))
		.route("/readyz", get(readyz))
		.layer(TraceLayer::new_for_http())
		.with_state(state)
}

impl IntoResponse for ServerError {
	fn into_response(self) -> Response {
		let status = StatusCode::from_u16(self.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
		(status, self.to_string()).into_response()
	}
}

async fn get_nonce(State(state): State<AppState>) -> Result<Json<reader_protocol::messages::GetNonceResponse>, ServerError> {
	Ok(Json(handlers::get_nonce(&state.server).await?))
}

async fn register(
	State(state): State<AppState>,
	Json(req): Json<RegisterRequest>,
) -> Result<Json<reader_protocol::messages::RegisterResponse>, ServerError> {
	Ok(Json(handlers::register(&state.server, req).await?))
}

async fn certify_keys(
	State(state): State<AppState>,
	Json(req): Json<CertifyKeysRequest>,
) -> Result<Json<reader_protocol::messages::CertifyKeysResponse>, ServerError> {
	Ok(Json(handlers::certify_keys(&state.server, req).await?))
}

async fn get_issuer_list(
	State(state): State<AppState>,
	Json(req): Json<GetIssuerListRequest>,
) -> Result<Json<reader_protocol::messages::GetIssuerListResponse>, ServerError> {
	Ok(Json(handlers::get_issuer_list(&state.server, req).await?))
}

async fn healthz() -> &'static str {
	"ok"
}

async fn readyz(State(state): State<AppState>) -> Response {
	let pending = state.ready.pending();
	if pending.is_empty() {
		(StatusCode::OK, "ready").into_response()
	} else {
		(StatusCode::SERVICE_UNAVAILABLE, format!("pending: {pending:?}")).into_response()
	}
}
