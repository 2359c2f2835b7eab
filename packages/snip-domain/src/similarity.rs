use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

/// Minimum cosine similarity a note must reach to be returned by a vector query.
pub const DEFAULT_SIMILARITY_THRESHOLD: f32 = 0.3;
/// Number of results a vector query returns when the caller does not say otherwise.
pub const DEFAULT_RESULT_LIMIT: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VectorQuery {
	pub limit: usize,
	pub threshold: f32,
}
impl VectorQuery {
	pub fn with_limit(limit: usize) -> Self {
		Self { limit, ..Default::default() }
	}
}
impl Default for VectorQuery {
	fn default() -> Self {
		Self { limit: DEFAULT_RESULT_LIMIT, threshold: DEFAULT_SIMILARITY_THRESHOLD }
	}
}

/// Cosine similarity of two equal-length vectors, clamped to `[-1, 1]`.
///
/// A zero vector has no direction; its similarity to anything is `0.0`.
pub fn cosine(a: &[f32], b: &[f32]) -> f32 {
	debug_assert_eq!(a.len(), b.len());

	let mut dot = 0.0_f64;
	let mut norm_a = 0.0_f64;
	let mut norm_b = 0.0_f64;

	for (&x, &y) in a.iter().zip(b) {
		let (x, y) = (f64::from(x), f64::from(y));

		dot += x * y;
		norm_a += x * x;
		norm_b += y * y;
	}

	let denom = norm_a.sqrt() * norm_b.sqrt();

	if denom == 0.0 || !denom.is_finite() {
		return 0.0;
	}

	(dot / denom).clamp(-1.0, 1.0) as f32
}

/// Keeps candidates scoring at least `query.threshold`, best first, at most `query.limit`.
pub fn rank<T>(candidates: impl IntoIterator<Item = (T, f32)>, query: VectorQuery) -> Vec<(T, f32)> {
	let mut kept = candidates
		.into_iter()
		.filter(|(_, score)| *score >= query.threshold)
		.collect::<Vec<_>>();

	kept.sort_by(|(_, a), (_, b)| b.partial_cmp(a).unwrap_or(Ordering::Equal));
	kept.truncate(query.limit);

	kept
}
