//! The reader root CA. Generated on first use over EC P-384 with a five-year validity,
//! the same CSR/certificate-params style `control::caclient` uses to mint its own leaf
//! certs, generalized here from "ask a remote CA" to "be the CA."
//!
//! Two roots are modeled: `trusted`, used for registrations that passed attestation
//! policy, and `untrusted_devices`, reserved for registrations explicitly tagged
//! untrusted at `register` time. A policy rejection itself is a hard error — it never
//! silently falls back to the untrusted root.

use std::time::{Duration as StdDuration, SystemTime};

use rand::RngCore;
use rcgen::{
	BasicConstraints, Certificate, CertificateParams, DistinguishedName, DnType, IsCa, KeyPair, SanType, SerialNumber,
	PKCS_ECDSA_P384_SHA384,
};
use time::OffsetDateTime;

use crate::error::ServerError;

pub const SLOT_TRUSTED: &str = "reader_root_identity";
pub const SLOT_UNTRUSTED: &str = "reader_root_identity_untrusted_devices";

const ROOT_VALIDITY: StdDuration = StdDuration::from_secs(5 * 365 * 24 * 60 * 60);
const JITTER_WINDOW: StdDuration = StdDuration::from_secs(12 * 60 * 60);

/// A loaded or freshly generated reader root: its private key and the self-signed
/// certificate chain for it (a single-entry chain — the root signs itself).
pub struct ReaderRootIdentity {
	key_pair: KeyPair,
	cert: Certificate,
}

impl ReaderRootIdentity {
	/// Generates a fresh, self-signed EC P-384 root with a five-year validity window.
	pub fn generate(common_name: &str) -> Result<Self, ServerError> {
		let key_pair = KeyPair::generate_for(&PKCS_ECDSA_P384_SHA384).map_err(|e| ServerError::ReaderRoot(e.to_string()))?;
		let mut params = CertificateParams::new(Vec::<String>::new()).map_err(|e| ServerError::ReaderRoot(e.to_string()))?;
		params.is_ca = IsCa::Ca(BasicConstraints::Unconstrained);
		params.distinguished_name = common_name_dn(common_name);
		let now = OffsetDateTime::now_utc();
		params.not_before = now;
		params.not_after = now + ROOT_VALIDITY;

		let cert = params.self_signed(&key_pair).map_err(|e| ServerError::ReaderRoot(e.to_string()))?;
		Ok(ReaderRootIdentity { key_pair, cert })
	}

	pub fn to_pem(&self) -> (String, String) {
		(self.key_pair.serialize_pem(), self.cert.pem())
	}

	pub fn from_pem(key_pem: &str, cert_pem: &str) -> Result<Self, ServerError> {
		let key_pair = KeyPair::from_pem(key_pem).map_err(|e| ServerError::ReaderRoot(e.to_string()))?;
		let params = CertificateParams::from_ca_cert_pem(cert_pem).map_err(|e| ServerError::ReaderRoot(e.to_string()))?;
		let cert = params.self_signed(&key_pair).map_err(|e| ServerError::ReaderRoot(e.to_string()))?;
		Ok(ReaderRootIdentity { key_pair, cert })
	}

	pub fn cert_der(&self) -> Vec<u8> {
		self.cert.der().to_vec()
	}

	/// Issues a leaf reader-authentication certificate for a caller-supplied public key.
	/// `valid_from`/`valid_until` are caller-computed (including the jitter) so the jitter
	/// logic itself lives in the caller, next to the rest of the `certifyKeys` policy.
	pub fn issue_leaf(
		&self,
		subject_public_key_der: &[u8],
		valid_from: OffsetDateTime,
		valid_until: OffsetDateTime,
	) -> Result<Vec<Vec<u8>>, ServerError> {
		let subject_key = KeyPair::from_public_key_der(&PKCS_ECDSA_P384_SHA384, subject_public_key_der)
			.map_err(|e| ServerError::ReaderRoot(format!("invalid subject public key: {e}")))?;

		let mut params = CertificateParams::new(Vec::<String>::new()).map_err(|e| ServerError::ReaderRoot(e.to_string()))?;
		params.is_ca = IsCa::NoCa;
		params.distinguished_name = common_name_dn("Multipaz Identity Verifier Single-Use Key");
		params.not_before = valid_from;
		params.not_after = valid_until;
		params.serial_number = Some(SerialNumber::from_slice(&random_serial()));
		params.subject_alt_names = vec![SanType::DnsName(
			"reader.invalid".try_into().map_err(|_| ServerError::ReaderRoot("bad SAN".into()))?,
		)];

		let leaf = params
			.signed_by(&subject_key, &self.cert, &self.key_pair)
			.map_err(|e| ServerError::ReaderRoot(e.to_string()))?;

		Ok(vec![leaf.der().to_vec(), self.cert_der()])
	}
}

fn common_name_dn(cn: &str) -> DistinguishedName {
	let mut dn = DistinguishedName::new();
	dn.push(DnType::CommonName, cn);
	dn
}

fn random_serial() -> [u8; 16] {
	let mut bytes = [0u8; 16];
	rand::rng().fill_bytes(&mut bytes);
	bytes
}

/// Derives the jittered validity window for a freshly certified key: `validFrom` up to
/// 12h in the past, `validUntil` at least `duration_days` out plus up to another 12h.
/// The jitter breaks correlation of simultaneously-issued certificates.
pub fn jittered_validity(now: SystemTime, duration_days: i64) -> (OffsetDateTime, OffsetDateTime) {
	let now = OffsetDateTime::from(now);
	let jitter_from = random_jitter();
	let jitter_until = random_jitter();
	let duration = time::Duration::days(duration_days);
	(now - jitter_from, now + duration + jitter_until)
}

fn random_jitter() -> time::Duration {
	let nanos = JITTER_WINDOW.as_nanos() as u64;
	let r = rand::rng().next_u64() % nanos.max(1);
	time::Duration::nanoseconds(r as i64)
}

#[cfg(test)]
mod test {
	use super::*;

	#[test]
	fn generated_root_round_trips_through_pem() {
		let root = ReaderRootIdentity::generate("Test Reader Root").unwrap();
		let (key_pem, cert_pem) = root.to_pem();
		let reloaded = ReaderRootIdentity::from_pem(&key_pem, &cert_pem).unwrap();
		assert_eq!(root.cert_der(), reloaded.cert_der());
	}

	#[test]
	fn issued_leaf_has_a_two_entry_chain() {
		let root = ReaderRootIdentity::generate("Test Reader Root").unwrap();
		let subject = KeyPair::generate_for(&PKCS_ECDSA_P384_SHA384).unwrap();
		let now = OffsetDateTime::now_utc();
		let chain = root.issue_leaf(&subject.public_key_der(), now, now + time::Duration::days(30)).unwrap();
		assert_eq!(chain.len(), 2);
	}

	#[test]
	fn jitter_stays_within_the_twelve_hour_window() {
		let now = SystemTime::now();
		let (from, until) = jittered_validity(now, 30);
		let now_odt = OffsetDateTime::from(now);
		assert!(from <= now_odt);
		assert!(now_odt - from <= time::Duration::hours(12));
		assert!(until >= now_odt + time::Duration::days(30));
		assert!(until <= now_odt + time::Duration::days(30) + time::Duration::hours(12));
	}
}
