//! Unpadded URL-safe base64, the wire encoding for every byte-string field.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

pub fn encode(bytes: &[u8]) -> String {
	URL_SAFE_NO_PAD.encode(bytes)
}

pub fn decode(s: &str) -> Result<Vec<u8>, base64::DecodeError> {
	URL_SAFE_NO_PAD.decode(s)
}

/// A `Vec<u8>` that (de)serializes as unpadded URL-safe base64 text instead of a byte array.
#[derive(Debug, Clone, PartialEq, Eq, Default, Hash)]
pub struct B64Bytes(pub Vec<u8>);

impl From<Vec<u8>> for B64Bytes {
	fn from(v: Vec<u8>) -> Self {
		B64Bytes(v)
	}
}

impl From<B64Bytes> for Vec<u8> {
	fn from(v: B64Bytes) -> Self {
		v.0
	}
}

impl AsRef<[u8]> for B64Bytes {
	fn as_ref(&self) -> &[u8] {
		&self.0
	}
}

impl Serialize for B64Bytes {
	fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
		serializer.serialize_str(&encode(&self.0))
	}
}

impl<'de> Deserialize<'de> for B64Bytes {
	fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
		let s = String::deserialize(deserializer)?;
		decode(&s).map(B64Bytes).map_err(serde::de::Error::custom)
	}
}

#[cfg(test)]
mod test {
	use super::*;

	#[test]
	fn round_trips_through_json() {
		let bytes = B64Bytes(vec![0, 1, 2, 253, 254, 255]);
		let json = serde_json::to_string(&bytes).unwrap();
		assert!(!json.contains('='), "unpadded encoding should have no padding");
		let back: B64Bytes = serde_json::from_str(&json).unwrap();
		assert_eq!(back, bytes);
	}
}
