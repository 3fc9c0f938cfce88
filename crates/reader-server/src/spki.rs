//! Minimal hand-rolled DER assembly for wrapping a raw uncompressed EC point into a
//! `SubjectPublicKeyInfo`. `rcgen::KeyPair::from_public_key_der` needs a full SPKI, but
//! submitted JWKs carry only the bare `(x, y)` coordinates, so this bridges the gap
//! without pulling in a general-purpose ASN.1 encoder for one fixed-shape structure.

use std::fmt;

const OID_EC_PUBLIC_KEY: [u8; 9] = [0x06, 0x07, 0x2a, 0x86, 0x48, 0xce, 0x3d, 0x02, 0x01];
const OID_SECP384R1: [u8; 7] = [0x06, 0x05, 0x2b, 0x81, 0x04, 0x00, 0x22];

#[derive(Debug)]
pub struct SpkiError(String);

impl fmt::Display for SpkiError {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "spki encoding error: {}", self.0)
	}
}

impl std::error::Error for SpkiError {}

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

/// Wraps a 97-byte uncompressed P-384 point (`0x04 || x(48) || y(48)`) as a DER SPKI.
pub fn wrap_ec_point_p384(point: &[u8]) -> Result<Vec<u8>, SpkiError> {
	if point.len() != 97 || point[0] != 0x04 {
		return Err(SpkiError(format!("expected a 97-byte uncompressed P-384 point, got {} bytes", point.len())));
	}

	let mut alg_id_content = Vec::new();
	alg_id_content.extend_from_slice(&OID_EC_PUBLIC_KEY);
	alg_id_content.extend_from_slice(&OID_SECP384R1);
	let alg_id = der_sequence(&alg_id_content);

	let mut bit_string = vec![0x03];
	bit_string.extend(der_len(point.len() + 1));
	bit_string.push(0x00); // no unused bits
	bit_string.extend_from_slice(point);

	let mut spki_content = Vec::new();
	spki_content.extend_from_slice(&alg_id);
	spki_content.extend_from_slice(&bit_string);

	Ok(der_sequence(&spki_content))
}

#[cfg(test)]
mod test {
	use super::*;

	#[test]
	fn wraps_a_well_formed_point() {
		let mut point = vec![0x04u8];
		point.extend(std::iter::repeat(0xAB).take(48));
		point.extend(std::iter::repeat(0xCD).take(48));
		let der = wrap_ec_point_p384(&point).unwrap();
		assert_eq!(der[0], 0x30);
		assert!(der.len() > point.len());
	}

	#[test]
	fn rejects_wrong_length() {
		assert!(wrap_ec_point_p384(&[0x04, 0x01]).is_err());
	}
}
