//! The four JSON request/response shapes exchanged between `reader-client` and
//! `reader-server`. Binary fields carry [`crate::b64::B64Bytes`] so they serialize as
//! unpadded URL-safe base64 text, matching the wire table.

use serde::{Deserialize, Serialize};

use crate::b64::B64Bytes;
use crate::model::IssuerTrustEntry;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GetNonceRequest {}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetNonceResponse {
	pub nonce: B64Bytes,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
	pub nonce: B64Bytes,
	pub device_attestation: B64Bytes,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterResponse {
	pub registration_id: String,
}

/// A submitted public key, carried as a JWK object. We treat the JWK as an opaque
/// `serde_json::Value` — the core's job is to move it, not to interpret its fields.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Jwk(pub serde_json::Value);

/// A certificate chain, leaf first, each entry DER-encoded and base64-url carried.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct X5c(pub Vec<B64Bytes>);

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CertifyKeysRequest {
	pub registration_id: String,
	pub nonce: B64Bytes,
	pub device_assertion: B64Bytes,
	pub keys: Vec<Jwk>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CertifyKeysResponse {
	pub reader_certifications: Vec<X5c>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetIssuerListRequest {
	#[serde(skip_serializing_if = "Option::is_none")]
	pub current_version: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", untagged)]
pub enum GetIssuerListResponse {
	UpToDate {
		up_to_date: True,
	},
	Update {
		version: i64,
		entries: Vec<IssuerTrustEntry>,
	},
}

/// A unit-like marker so `UpToDate { up_to_date: true }` serializes with a literal `true`
/// rather than needing a bare bool that `untagged` cannot discriminate on reliably.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct True;

impl Serialize for True {
	fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
		serializer.serialize_bool(true)
	}
}

impl<'de> Deserialize<'de> for True {
	fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
		let b = bool::deserialize(deserializer)?;
		if b {
			Ok(True)
		} else {
			Err(serde::de::Error::custom("expected `true`"))
		}
	}
}

impl GetIssuerListResponse {
	pub fn up_to_date() -> Self {
		GetIssuerListResponse::UpToDate { up_to_date: True }
	}

	pub fn update(version: i64, entries: Vec<IssuerTrustEntry>) -> Self {
		GetIssuerListResponse::Update { version, entries }
	}

	pub fn into_update(self) -> Option<(i64, Vec<IssuerTrustEntry>)> {
		match self {
			GetIssuerListResponse::Update { version, entries } => Some((version, entries)),
			GetIssuerListResponse::UpToDate { .. } => None,
		}
	}
}

#[cfg(test)]
mod test {
	use super::*;

	#[test]
	fn up_to_date_round_trips() {
		let resp = GetIssuerListResponse::up_to_date();
		let json = serde_json::to_string(&resp).unwrap();
		assert_eq!(json, r#"{"upToDate":true}"#);
		let back: GetIssuerListResponse = serde_json::from_str(&json).unwrap();
		assert!(back.into_update().is_none());
	}

	#[test]
	fn update_round_trips() {
		let resp = GetIssuerListResponse::update(42, vec![]);
		let json = serde_json::to_string(&resp).unwrap();
		let back: GetIssuerListResponse = serde_json::from_str(&json).unwrap();
		let (version, entries) = back.into_update().expect("should be an update");
		assert_eq!(version, 42);
		assert!(entries.is_empty());
	}

	#[test]
	fn certify_keys_request_field_names_are_camel_case() {
		let req = CertifyKeysRequest {
			registration_id: "r1".into(),
			nonce: B64Bytes(vec![1, 2, 3]),
			device_assertion: B64Bytes(vec![4, 5, 6]),
			keys: vec![],
		};
		let json = serde_json::to_string(&req).unwrap();
		assert!(json.contains("registrationId"));
		assert!(json.contains("deviceAssertion"));
	}
}
