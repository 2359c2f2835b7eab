use snip_domain::embedding::CANONICAL_DIM;

use crate::{Error, Result};

pub(crate) fn vector_to_pg(vec: &[f32]) -> String {
	let mut out = String::with_capacity(vec.len() * 8);
	out.push('[');

	for (i, value) in vec.iter().enumerate() {
		if i > 0 {
			out.push(',');
		}
		out.push_str(&value.to_string());
	}

	out.push(']');

	out
}

pub(crate) fn parse_pg_vector(text: &str) -> Result<Vec<f32>> {
	let trimmed = text.trim();
	let without_brackets = trimmed
		.strip_prefix('[')
		.and_then(|s| s.strip_suffix(']'))
		.ok_or_else(|| Error::InvalidArgument("Vector text is not bracketed.".to_string()))?;

	if without_brackets.trim().is_empty() {
		return Ok(Vec::new());
	}

	let mut vec = Vec::new();

	for part in without_brackets.split(',') {
		let value: f32 = part.trim().parse().map_err(|_| {
			Error::InvalidArgument("Vector text contains a non-numeric value.".to_string())
		})?;
		vec.push(value);
	}

	Ok(vec)
}

pub(crate) fn encode_blob(vec: &[f32]) -> Vec<u8> {
	vec.iter().flat_map(|value| value.to_le_bytes()).collect()
}

pub(crate) fn decode_blob(bytes: &[u8]) -> Result<Vec<f32>> {
	if bytes.len() != CANONICAL_DIM * 4 {
		return Err(Error::DimensionMismatch { expected: CANONICAL_DIM, actual: bytes.len() / 4 });
	}

	Ok(bytes
		.chunks_exact(4)
		.map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
		.collect())
}

/// Guards the invariant that only canonical vectors reach persistence or comparison.
pub(crate) fn ensure_canonical(vec: &[f32]) -> Result<()> {
	if vec.len() != CANONICAL_DIM {
		return Err(Error::DimensionMismatch { expected: CANONICAL_DIM, actual: vec.len() });
	}

	Ok(())
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn pg_vector_text_round_trips() {
		let vec = vec![0.5, -1.25, 3.0];

		assert_eq!(vector_to_pg(&vec), "[0.5,-1.25,3]");
		assert_eq!(parse_pg_vector(&vector_to_pg(&vec)).expect("parse failed"), vec);
	}

	#[test]
	fn rejects_unbracketed_vector_text() {
		assert!(parse_pg_vector("0.5,1.0").is_err());
	}

	#[test]
	fn blob_of_wrong_size_is_a_dimension_mismatch() {
		let err = decode_blob(&encode_blob(&[1.0; 768])).expect_err("short blob must fail");

		assert!(matches!(err, Error::DimensionMismatch { expected: CANONICAL_DIM, actual: 768 }));
	}

	#[test]
	fn canonical_blob_decodes() {
		let vec = snip_domain::embedding::normalize(vec![0.25, -4.0]);
		let decoded = decode_blob(&encode_blob(&vec)).expect("decode failed");

		assert_eq!(decoded, vec);
	}
}
