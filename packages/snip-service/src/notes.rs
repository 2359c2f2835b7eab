use serde::{Deserialize, Serialize};

use snip_domain::note::{self, Note, NoteId, NoteUpdate};
use snip_storage::NoteBackend;

use crate::{Error, Result, SnipService};

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct UpdateRequest {
	pub content: Option<String>,
	pub tags: Option<Vec<String>>,
}

impl SnipService {
	pub async fn get_note(&self, id: NoteId) -> Result<Option<Note>> {
		Ok(self.backend().await?.get_note(id).await?)
	}

	pub async fn list_notes(&self) -> Result<Vec<Note>> {
		Ok(self.backend().await?.get_all_notes().await?)
	}

	pub async fn recent_notes(&self, limit: Option<usize>) -> Result<Vec<Note>> {
		let limit = self.resolve_limit(limit)?;

		Ok(self.backend().await?.get_recent_notes(limit).await?)
	}

	/// Applies an edit. New content is re-embedded so vector search keeps matching what the
	/// note says.
	pub async fn update_note(&self, id: NoteId, req: UpdateRequest) -> Result<Note> {
		let UpdateRequest { content, tags } = req;

		if content.is_none() && tags.is_none() {
			return Err(Error::InvalidRequest { message: "No updates provided.".to_string() });
		}
		if content.as_deref().is_some_and(note::is_blank) {
			return Err(Error::InvalidRequest { message: "content must be non-empty.".to_string() });
		}

		let embedding = match content.as_deref() {
			Some(content) => Some(self.embed_one(content).await?),
			None => None,
		};
		let backend = self.backend().await?;
		let updated = backend.update_note(id, NoteUpdate { content, embedding, tags }).await?;

		tracing::info!(note_id = %id, "Updated note.");

		Ok(updated)
	}

	pub async fn delete_note(&self, id: NoteId) -> Result<()> {
		self.backend().await?.delete_note(id).await?;

		tracing::info!(note_id = %id, "Deleted note.");

		Ok(())
	}

	pub async fn search_text(&self, query: &str) -> Result<Vec<Note>> {
		Ok(self.backend().await?.search_notes(query).await?)
	}

	pub async fn notes_by_tag(&self, tag: &str) -> Result<Vec<Note>> {
		let tag = tag.trim();

		if tag.is_empty() {
			return Err(Error::InvalidRequest { message: "tag must be non-empty.".to_string() });
		}

		Ok(self.backend().await?.search_by_tag(tag).await?)
	}

	pub async fn tags(&self) -> Result<Vec<String>> {
		Ok(self.backend().await?.get_tags().await?)
	}

	pub async fn clear_all(&self) -> Result<()> {
		self.backend().await?.clear_all().await?;

		tracing::warn!("Cleared every stored note.");

		Ok(())
	}
}
