//! Domain types shared by both sides of the protocol: the issuer trust list and its
//! entries. `IssuerTrustEntry` is a discriminated union, not a trait object — there are
//! exactly two kinds of trust evidence and no third is anticipated.

use serde::{Deserialize, Serialize};

use crate::b64::B64Bytes;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IssuerTrustEntryMetadata {
	pub display_name: String,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub icon: Option<B64Bytes>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub privacy_policy_url: Option<String>,
	#[serde(default)]
	pub test_only: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum IssuerTrustEntry {
	#[serde(rename_all = "camelCase")]
	Iaca {
		cert: B64Bytes,
		metadata: IssuerTrustEntryMetadata,
	},
	#[serde(rename_all = "camelCase")]
	Vical {
		signed_vical: B64Bytes,
		metadata: IssuerTrustEntryMetadata,
	},
}

impl IssuerTrustEntry {
	pub fn metadata(&self) -> &IssuerTrustEntryMetadata {
		match self {
			IssuerTrustEntry::Iaca { metadata, .. } => metadata,
			IssuerTrustEntry::Vical { metadata, .. } => metadata,
		}
	}
}

/// The full feed: a monotonic version plus the ordered entry list it replaces wholesale.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IssuerTrustList {
	pub version: i64,
	pub entries: Vec<IssuerTrustEntry>,
}

#[cfg(test)]
mod test {
	use super::*;

	#[test]
	fn tagged_union_round_trips_both_variants() {
		let meta = IssuerTrustEntryMetadata {
			display_name: "Example DMV".into(),
			icon: None,
			privacy_policy_url: Some("https://example.test/privacy".into()),
			test_only: true,
		};
		let iaca = IssuerTrustEntry::Iaca { cert: B64Bytes(vec![1, 2, 3]), metadata: meta.clone() };
		let json = serde_json::to_string(&iaca).unwrap();
		assert!(json.contains(r#""type":"iaca""#));
		let back: IssuerTrustEntry = serde_json::from_str(&json).unwrap();
		assert_eq!(back.metadata().display_name, "Example DMV");

		let vical = IssuerTrustEntry::Vical { signed_vical: B64Bytes(vec![9]), metadata: meta };
		let json = serde_json::to_string(&vical).unwrap();
		assert!(json.contains(r#""type":"vical""#));
	}
}
