//! Thin per-method wrappers around [`Transport::post`]: serialize the request, interpret
//! the status code, deserialize the response. `certifyKeys`'s 404 is the one
//! protocol-significant status; everything else outside 2xx is a generic transport error.

use reader_protocol::messages::{
	CertifyKeysRequest, CertifyKeysResponse, GetIssuerListRequest, GetIssuerListResponse, GetNonceRequest, GetNonceResponse,
	RegisterRequest, RegisterResponse,
};
use reader_protocol::{IssuerTrustEntry, Transport};

use crate::error::ClientError;

async fn call<Req: serde::Serialize, Resp: serde::de::DeserializeOwned>(
	transport: &dyn Transport,
	method: &str,
	request: &Req,
) -> Result<Resp, ClientError> {
	let body = serde_json::to_vec(request).map_err(|e| ClientError::Codec(e.to_string()))?;
	let (status, body) = transport.post(method, body).await?;
	if !(200..300).contains(&status) {
		if method == "certifyKeys" && status == 404 {
			return Err(ClientError::RegistrationLost);
		}
		let message = String::from_utf8_lossy(&body).into_owned();
		return Err(ClientError::Transport(format!("{method} returned status {status}: {message}")));
	}
	serde_json::from_slice(&body).map_err(|e| ClientError::Codec(e.to_string()))
}

pub async fn get_nonce(transport: &dyn Transport) -> Result<GetNonceResponse, ClientError> {
	call(transport, "getNonce", &GetNonceRequest::default()).await
}

pub async fn register(transport: &dyn Transport, request: RegisterRequest) -> Result<RegisterResponse, ClientError> {
	call(transport, "register", &request).await
}

pub async fn certify_keys(transport: &dyn Transport, request: CertifyKeysRequest) -> Result<CertifyKeysResponse, ClientError> {
	call(transport, "certifyKeys", &request).await
}

pub async fn get_issuer_list(
	transport: &dyn Transport,
	current_version: Option<i64>,
) -> Result<Option<(i64, Vec<IssuerTrustEntry>)>, ClientError> {
	let response: GetIssuerListResponse = call(transport, "getIssuerList", &GetIssuerListRequest { current_version }).await?;
	Ok(response.into_update())
}
