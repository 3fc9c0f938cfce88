//! A `reqwest`-based [`Transport`]: POST `<baseUrl>/<method>` with a JSON body, returning
//! the raw status code and body so callers can interpret protocol-specific signals like
//! `certifyKeys`'s 404.

use async_trait::async_trait;
use reader_protocol::{ProtocolError, Transport};

pub struct HttpTransport {
	client: reqwest::Client,
	base_url: String,
}

impl HttpTransport {
	pub fn new(base_url: impl Into<String>) -> Self {
		HttpTransport { client: reqwest::Client::new(), base_url: base_url.into() }
	}

	pub fn with_client(client: reqwest::Client, base_url: impl Into<String>) -> Self {
		HttpTransport { client, base_url: base_url.into() }
	}
}

#[async_trait]
impl Transport for HttpTransport {
	async fn post(&self, method: &str, body: Vec<u8>) -> Result<(u16, Vec<u8>), ProtocolError> {
		let url = format!("{}/{}", self.base_url.trim_end_matches('/'), method);
		let response = self
			.client
			.post(&url)
			.header("Content-Type", "application/json")
			.body(body)
			.send()
			.await
			.map_err(|e| ProtocolError::Transport(e.to_string()))?;
		let status = response.status().as_u16();
		let body = response.bytes().await.map_err(|e| ProtocolError::Transport(e.to_string()))?;
		Ok((status, body.to_vec()))
	}
}
