use serde::{Deserialize, Serialize};

use snip_domain::note::{self, NewNote, Note, NoteSource};
use snip_storage::NoteBackend;

use crate::{Error, Result, SnipService};

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CaptureRequest {
	pub content: String,
	pub source: NoteSource,
	/// Caller-chosen tags. When empty, tags are generated from the content.
	#[serde(default)]
	pub tags: Vec<String>,
}

impl SnipService {
	/// Embeds, tags and stores a captured fragment. Nothing is written if a provider fails.
	pub async fn capture(&self, req: CaptureRequest) -> Result<Note> {
		let CaptureRequest { content, source, tags } = req;

		if note::is_blank(&content) {
			return Err(Error::InvalidRequest { message: "content must be non-empty.".to_string() });
		}

		let (embedding, tags) = if tags.is_empty() {
			tokio::try_join!(self.embed_one(&content), self.suggest_tags(&content))?
		} else {
			(self.embed_one(&content).await?, tags)
		};
		let mut tags = note::normalize_tags(tags);

		tags.truncate(self.cfg.search.max_tags);

		let backend = self.backend().await?;
		let saved = backend.save_note(NewNote { content, embedding, tags, source }).await?;

		tracing::info!(note_id = %saved.id, tags = saved.tags.len(), "Captured note.");

		Ok(saved)
	}

	async fn suggest_tags(&self, content: &str) -> Result<Vec<String>> {
		let tags = self
			.providers
			.tags
			.generate_tags(&self.cfg.providers.llm, content, self.cfg.search.max_tags)
			.await?;

		Ok(tags)
	}
}
