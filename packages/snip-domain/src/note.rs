use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub type NoteId = Uuid;

/// Where a note was captured from. Set once at capture and never rewritten.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NoteSource {
	pub url: String,
	pub title: String,
	/// Epoch milliseconds.
	pub captured_at: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Note {
	pub id: NoteId,
	pub content: String,
	pub embedding: Vec<f32>,
	pub tags: Vec<String>,
	pub source: NoteSource,
	pub created_at: i64,
	pub updated_at: i64,
}

/// Fields supplied by the caller when saving a note. The backend assigns id and timestamps.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewNote {
	pub content: String,
	pub embedding: Vec<f32>,
	#[serde(default)]
	pub tags: Vec<String>,
	pub source: NoteSource,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NoteUpdate {
	pub content: Option<String>,
	pub embedding: Option<Vec<f32>>,
	pub tags: Option<Vec<String>>,
}
impl NoteUpdate {
	pub fn is_empty(&self) -> bool {
		self.content.is_none() && self.embedding.is_none() && self.tags.is_none()
	}
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredNote {
	pub note: Note,
	pub similarity: f32,
}

pub fn is_blank(content: &str) -> bool {
	content.trim().is_empty()
}

/// Trims tags, drops empty ones and removes case-sensitive duplicates, keeping first occurrence.
pub fn normalize_tags(tags: Vec<String>) -> Vec<String> {
	let mut out: Vec<String> = Vec::with_capacity(tags.len());

	for tag in tags {
		let trimmed = tag.trim();

		if trimmed.is_empty() || out.iter().any(|seen| seen == trimmed) {
			continue;
		}

		out.push(trimmed.to_string());
	}

	out
}
