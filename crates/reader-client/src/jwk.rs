//! Converts a secure-store `KeyInfo.publicKey` (SPKI DER) into the JWK shape `certifyKeys`
//! carries on the wire. Inverse of `reader_server::spki::wrap_ec_point_p384` — this crate
//! and the server crate don't share a dependency edge, so each owns its half of the
//! conversion rather than a shared codec library (out of scope per the purpose section).

use reader_protocol::b64;

use crate::error::ClientError;

/// Minimal DER reader for the one fixed SPKI shape the reference secure key store emits:
/// `SEQUENCE { SEQUENCE { OID, OID }, BIT STRING }`.
struct DerReader<'a> {
	bytes: &'a [u8],
	pos: usize,
}

impl<'a> DerReader<'a> {
	fn new(bytes: &'a [u8]) -> Self {
		DerReader { bytes, pos: 0 }
	}

	fn read_tag_len(&mut self, expected_tag: u8) -> Result<usize, ClientError> {
		let tag = *self.bytes.get(self.pos).ok_or_else(|| ClientError::KeyStore("truncated spki".into()))?;
		if tag != expected_tag {
			return Err(ClientError::KeyStore(format!("unexpected DER tag {tag:#x}, wanted {expected_tag:#x}")));
		}
		self.pos += 1;
		let first = *self.bytes.get(self.pos).ok_or_else(|| ClientError::KeyStore("truncated spki length".into()))?;
		self.pos += 1;
		if first & 0x80 == 0 {
			Ok(first as usize)
		} else {
			let n = (first & 0x7f) as usize;
			let end = self.pos + n;
			let len_bytes = self.bytes.get(self.pos..end).ok_or_else(|| ClientError::KeyStore("truncated spki length".into()))?;
			self.pos = end;
			let mut len = 0usize;
			for b in len_bytes {
				len = (len << 8) | (*b as usize);
			}
			Ok(len)
		}
	}

	fn skip(&mut self, len: usize) -> Result<(), ClientError> {
		if self.pos + len > self.bytes.len() {
			return Err(ClientError::KeyStore("truncated spki".into()));
		}
		self.pos += len;
		Ok(())
	}

	fn take(&mut self, len: usize) -> Result<&'a [u8], ClientError> {
		let slice = self.bytes.get(self.pos..self.pos + len).ok_or_else(|| ClientError::KeyStore("truncated spki".into()))?;
		self.pos += len;
		Ok(slice)
	}
}

/// Extracts the raw uncompressed point (`0x04 || x(48) || y(48)`) from a P-384 SPKI DER.
pub fn spki_der_to_ec_point_p384(der: &[u8]) -> Result<Vec<u8>, ClientError> {
	let mut r = DerReader::new(der);
	let outer_len = r.read_tag_len(0x30)?;
	let outer_end = r.pos + outer_len;

	let alg_len = r.read_tag_len(0x30)?;
	r.skip(alg_len)?;

	let bit_string_len = r.read_tag_len(0x03)?;
	let bit_string = r.take(bit_string_len)?;
	if r.pos != outer_end {
		return Err(ClientError::KeyStore("trailing data after spki bit string".into()));
	}
	let (unused_bits, point) = bit_string.split_first().ok_or_else(|| ClientError::KeyStore("empty spki bit string".into()))?;
	if *unused_bits != 0 {
		return Err(ClientError::KeyStore("unexpected unused bits in spki bit string".into()));
	}
	if point.len() != 97 || point[0] != 0x04 {
		return Err(ClientError::KeyStore(format!("expected a 97-byte uncompressed P-384 point, got {} bytes", point.len())));
	}
	Ok(point.to_vec())
}

/// Builds the JWK object `certifyKeys` expects for one submitted public key.
pub fn jwk_from_public_key_der(der: &[u8]) -> Result<serde_json::Value, ClientError> {
	let point = spki_der_to_ec_point_p384(der)?;
	let x = &point[1..49];
	let y = &point[49..97];
	Ok(serde_json::json!({
		"kty": "EC",
		"crv": "P-384",
		"x": b64::encode(x),
		"y": b64::encode(y),
	}))
}

#[cfg(test)]
mod test {
	use super::*;

	#[test]
	fn round_trips_through_server_spki_wrapper() {
		let mut point = vec![0x04u8];
		point.extend(std::iter::repeat(0x11).take(48));
		point.extend(std::iter::repeat(0x22).take(48));
		let der = reader_server_spki_stub(&point);
		let extracted = spki_der_to_ec_point_p384(&der).unwrap();
		assert_eq!(extracted, point);
	}

	// A local copy of the DER assembly the server wraps points with, so this test doesn't
	// need a dependency edge onto `reader-server` just to exercise the parser.
	fn reader_server_spki_stub(point: &[u8]) -> Vec<u8> {
		fn der_len(len: usize) -> Vec<u8> {
			if len < 0x80 {
				vec![len as u8]
			} else {
				let bytes = len.to_be_bytes();
				let first_nonzero = bytes.iter().position(|&b| b != 0).unwrap_or(bytes.len() - 1);
				let trimmed = &bytes[first_nonzero..];
				let mut out = vec![0x80 | trimmed.len() as u8];
				out.extend_from_slice(trimmed);
				out
			}
		}
		fn der_sequence(content: &[u8]) -> Vec<u8> {
			let mut out = vec![0x30];
			out.extend(der_len(content.len()));
			out.extend_from_slice(content);
			out
		}
		let oid_ec_public_key: [u8; 9] = [0x06, 0x07, 0x2a, 0x86, 0x48, 0xce, 0x3d, 0x02, 0x01];
		let oid_secp384r1: [u8; 7] = [0x06, 0x05, 0x2b, 0x81, 0x04, 0x00, 0x22];
		let mut alg_id_content = Vec::new();
		alg_id_content.extend_from_slice(&oid_ec_public_key);
		alg_id_content.extend_from_slice(&oid_secp384r1);
		let alg_id = der_sequence(&alg_id_content);
		let mut bit_string = vec![0x03];
		bit_string.extend(der_len(point.len() + 1));
		bit_string.push(0x00);
		bit_string.extend_from_slice(point);
		let mut spki_content = Vec::new();
		spki_content.extend_from_slice(&alg_id);
		spki_content.extend_from_slice(&bit_string);
		der_sequence(&spki_content)
	}

	#[test]
	fn jwk_has_expected_shape() {
		let mut point = vec![0x04u8];
		point.extend(std::iter::repeat(0xAA).take(48));
		point.extend(std::iter::repeat(0xBB).take(48));
		let der = reader_server_spki_stub(&point);
		let jwk = jwk_from_public_key_der(&der).unwrap();
		assert_eq!(jwk["kty"], "EC");
		assert_eq!(jwk["crv"], "P-384");
		assert!(jwk["x"].is_string());
		assert!(jwk["y"].is_string());
	}
}
