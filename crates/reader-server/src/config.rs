//! Server configuration: a YAML file overlaid by environment variables. Each field is
//! resolved as `env override -> file value -> default`, the same precedence order the
//! rest of this codebase's config loading follows.

use std::env;
use std::str::FromStr;

use serde::Deserialize;

use crate::error::ServerError;

const DEFAULT_READER_CERT_VALIDITY_DAYS: i64 = 30;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RawConfig {
	pub reader_cert_validity_days: Option<i64>,
	pub ios_release_build: Option<bool>,
	pub ios_app_identifier: Option<String>,
	pub android_require_gms_attestation: Option<bool>,
	pub android_require_verified_boot_green: Option<bool>,
	pub android_app_signature_certificate_digests: Option<Vec<String>>,
	pub trusted_issuers: Option<TrustedIssuersRaw>,
	pub bind_addr: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TrustedIssuersRaw {
	pub version: i64,
	pub entries: Vec<reader_protocol::IssuerTrustEntry>,
}

#[derive(Debug, Clone)]
pub struct Config {
	pub reader_cert_validity_days: i64,
	pub ios_release_build: bool,
	pub ios_app_identifier: Option<String>,
	pub android_require_gms_attestation: bool,
	pub android_require_verified_boot_green: bool,
	pub android_app_signature_certificate_digests: Vec<Vec<u8>>,
	pub trusted_issuers_version: i64,
	pub trusted_issuers: Vec<reader_protocol::IssuerTrustEntry>,
	pub bind_addr: String,
}

/// Reads an environment variable and parses it, returning `Ok(None)` when unset and an
/// error only when present but unparseable.
fn parse<T: FromStr>(name: &str) -> Result<Option<T>, ServerError>
where
	T::Err: std::fmt::Display,
{
	match env::var(name) {
		Ok(v) => v.parse::<T>().map(Some).map_err(|e| ServerError::Config(format!("{name}: {e}"))),
		Err(env::VarError::NotPresent) => Ok(None),
		Err(env::VarError::NotUnicode(_)) => Err(ServerError::Config(format!("{name} is not valid unicode"))),
	}
}

fn parse_csv(name: &str) -> Result<Option<Vec<String>>, ServerError> {
	match env::var(name) {
		Ok(v) => Ok(Some(v.split(',').map(|s| s.trim().to_string()).filter(|s| !s.is_empty()).collect())),
		Err(env::VarError::NotPresent) => Ok(None),
		Err(env::VarError::NotUnicode(_)) => Err(ServerError::Config(format!("{name} is not valid unicode"))),
	}
}

pub fn parse_config(raw_yaml: Option<&str>) -> Result<Config, ServerError> {
	let raw: RawConfig = match raw_yaml {
		Some(text) => serde_yaml::from_str(text).map_err(|e| ServerError::Config(e.to_string()))?,
		None => RawConfig::default(),
	};

	let digests_b64 = parse_csv("READER_SERVER_ANDROID_SIGNATURE_DIGESTS")?
		.or(raw.android_app_signature_certificate_digests)
		.unwrap_or_default();
	let android_app_signature_certificate_digests = digests_b64
		.iter()
		.map(|s| reader_protocol::b64::decode(s))
		.collect::<Result<Vec<_>, _>>()
		.map_err(|e| ServerError::Config(format!("invalid signature digest: {e}")))?;

	let (trusted_issuers_version, trusted_issuers) = match raw.trusted_issuers {
		Some(t) => (t.version, t.entries),
		None => (0, Vec::new()),
	};

	Ok(Config {
		reader_cert_validity_days: parse::<i64>("READER_SERVER_CERT_VALIDITY_DAYS")?
			.or(raw.reader_cert_validity_days)
			.unwrap_or(DEFAULT_READER_CERT_VALIDITY_DAYS),
		ios_release_build: parse::<bool>("READER_SERVER_IOS_RELEASE_BUILD")?
			.or(raw.ios_release_build)
			.unwrap_or(false),
		ios_app_identifier: parse::<String>("READER_SERVER_IOS_APP_IDENTIFIER")?.or(raw.ios_app_identifier),
		android_require_gms_attestation: parse::<bool>("READER_SERVER_ANDROID_REQUIRE_GMS")?
			.or(raw.android_require_gms_attestation)
			.unwrap_or(false),
		android_require_verified_boot_green: parse::<bool>("READER_SERVER_ANDROID_REQUIRE_VERIFIED_BOOT_GREEN")?
			.or(raw.android_require_verified_boot_green)
			.unwrap_or(false),
		android_app_signature_certificate_digests,
		trusted_issuers_version,
		trusted_issuers,
		bind_addr: parse::<String>("READER_SERVER_BIND_ADDR")?.or(raw.bind_addr).unwrap_or_else(|| "0.0.0.0:8443".to_string()),
	})
}

#[cfg(test)]
mod test {
	use super::*;

	#[test]
	fn defaults_with_no_file_and_no_env() {
		let cfg = parse_config(None).unwrap();
		assert_eq!(cfg.reader_cert_validity_days, DEFAULT_READER_CERT_VALIDITY_DAYS);
		assert!(!cfg.ios_release_build);
		assert_eq!(cfg.trusted_issuers_version, 0);
	}

	#[test]
	fn file_values_are_honoured() {
		let yaml = r#"
readerCertValidityDays: 45
iosReleaseBuild: true
trustedIssuers:
  version: 7
  entries: []
"#;
		let cfg = parse_config(Some(yaml)).unwrap();
		assert_eq!(cfg.reader_cert_validity_days, 45);
		assert!(cfg.ios_release_build);
		assert_eq!(cfg.trusted_issuers_version, 7);
	}
}
