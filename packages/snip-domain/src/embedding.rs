//! Canonical embedding space shared by every backend.
//!
//! Providers emit vectors of different native lengths (384, 768, 1536, ...). Every vector that
//! is persisted or compared passes through [`normalize`] first, so all stored and query vectors
//! live in one space of length [`CANONICAL_DIM`].
//!
//! Short vectors are zero-padded on the right. Two short vectors therefore agree on every padded
//! component, which compresses cosine scores between them. This is a known approximation; stored
//! vectors depend on it, so it must not be replaced by re-projection or renormalization.

/// Length of every stored or compared embedding.
pub const CANONICAL_DIM: usize = 1_536;

/// Maps a vector of any length onto [`CANONICAL_DIM`] components.
///
/// Longer vectors keep their prefix. Shorter vectors are padded with zeros. Vectors that already
/// have the canonical length are returned unchanged.
pub fn normalize(mut vec: Vec<f32>) -> Vec<f32> {
	if vec.len() != CANONICAL_DIM {
		vec.resize(CANONICAL_DIM, 0.0);
	}

	vec
}

pub fn is_canonical(vec: &[f32]) -> bool {
	vec.len() == CANONICAL_DIM
}
