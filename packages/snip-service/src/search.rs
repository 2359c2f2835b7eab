use serde::{Deserialize, Serialize};

use snip_domain::{
	note::{self, Note, ScoredNote},
	similarity::VectorQuery,
};
use snip_storage::NoteBackend;

use crate::{Error, Result, SnipService};

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SemanticSearchRequest {
	pub query: String,
	pub limit: Option<usize>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct VectorSearchRequest {
	pub embedding: Vec<f32>,
	pub limit: Option<usize>,
	pub threshold: Option<f32>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SearchHit {
	pub note: Note,
	/// Absent for notes returned by the recency fallback.
	pub similarity: Option<f32>,
}
impl From<ScoredNote> for SearchHit {
	fn from(scored: ScoredNote) -> Self {
		Self { note: scored.note, similarity: Some(scored.similarity) }
	}
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SemanticSearchResponse {
	pub items: Vec<SearchHit>,
	/// True when nothing cleared the similarity threshold and recent notes were returned instead.
	pub fallback: bool,
}

impl SnipService {
	/// Searches by meaning. When nothing is similar enough, returns the most recent notes.
	pub async fn semantic_search(
		&self,
		req: SemanticSearchRequest,
	) -> Result<SemanticSearchResponse> {
		if note::is_blank(&req.query) {
			return Err(Error::InvalidRequest { message: "query must be non-empty.".to_string() });
		}

		let limit = self.resolve_limit(req.limit)?;
		let embedding = self.embed_one(req.query.trim()).await?;
		let backend = self.backend().await?;
		let query = VectorQuery { limit, threshold: self.cfg.search.similarity_threshold };
		let scored = backend.search_by_vector(&embedding, query).await?;

		if !scored.is_empty() {
			return Ok(SemanticSearchResponse {
				items: scored.into_iter().map(SearchHit::from).collect(),
				fallback: false,
			});
		}

		tracing::debug!(limit, "No note cleared the similarity threshold; returning recent notes.");

		let recent = backend.get_recent_notes(limit).await?;

		Ok(SemanticSearchResponse {
			items: recent.into_iter().map(|note| SearchHit { note, similarity: None }).collect(),
			fallback: true,
		})
	}

	/// Vector search with a caller-supplied embedding of any length.
	pub async fn vector_search(&self, req: VectorSearchRequest) -> Result<Vec<ScoredNote>> {
		if req.embedding.is_empty() {
			return Err(Error::InvalidRequest { message: "embedding must be non-empty.".to_string() });
		}

		let threshold = req.threshold.unwrap_or(self.cfg.search.similarity_threshold);

		if !threshold.is_finite() || !(-1.0..=1.0).contains(&threshold) {
			return Err(Error::InvalidRequest {
				message: "threshold must be between -1.0 and 1.0.".to_string(),
			});
		}

		let query = VectorQuery { limit: self.resolve_limit(req.limit)?, threshold };
		let backend = self.backend().await?;

		Ok(backend.search_by_vector(&req.embedding, query).await?)
	}

	pub(crate) fn resolve_limit(&self, limit: Option<usize>) -> Result<usize> {
		match limit {
			Some(0) =>
				Err(Error::InvalidRequest { message: "limit must be greater than zero.".to_string() }),
			Some(limit) => Ok(limit),
			None => Ok(self.cfg.search.default_limit),
		}
	}
}
