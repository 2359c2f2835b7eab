use std::fmt::Write;

use serde::{Deserialize, Serialize};

use snip_domain::note::{self, NoteId};

use crate::{Error, Result, SemanticSearchRequest, SnipService, search::SearchHit};

const NO_NOTES_ANSWER: &str = "There are no saved notes to answer from yet.";

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AskRequest {
	pub question: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AskResponse {
	pub answer: String,
	/// Notes given to the model as context, in the order they were numbered.
	pub note_ids: Vec<NoteId>,
}

impl SnipService {
	pub async fn ask(&self, req: AskRequest) -> Result<AskResponse> {
		if note::is_blank(&req.question) {
			return Err(Error::InvalidRequest { message: "question must be non-empty.".to_string() });
		}

		let search = self
			.semantic_search(SemanticSearchRequest {
				query: req.question.clone(),
				limit: Some(self.cfg.search.answer_context_notes),
			})
			.await?;

		if search.items.is_empty() {
			return Ok(AskResponse { answer: NO_NOTES_ANSWER.to_string(), note_ids: Vec::new() });
		}

		let context = render_context(&search.items);
		let answer = self
			.providers
			.answer
			.answer(&self.cfg.providers.llm, req.question.trim(), &context)
			.await?;

		Ok(AskResponse { answer, note_ids: search.items.iter().map(|hit| hit.note.id).collect() })
	}
}

fn render_context(hits: &[SearchHit]) -> String {
	let mut out = String::new();

	for (i, hit) in hits.iter().enumerate() {
		let source = &hit.note.source;

		let _ = writeln!(out, "[{}] {} ({})", i + 1, source.title, source.url);
		let _ = writeln!(out, "{}", hit.note.content.trim());
		out.push('\n');
	}

	out.trim_end().to_string()
}

#[cfg(test)]
mod tests {
	use uuid::Uuid;

	use super::*;
	use snip_domain::note::{Note, NoteSource};

	fn hit(content: &str, title: &str) -> SearchHit {
		SearchHit {
			note: Note {
				id: Uuid::new_v4(),
				content: format!("  {content}\n"),
				embedding: Vec::new(),
				tags: Vec::new(),
				source: NoteSource {
					url: format!("https://example.com/{title}"),
					title: title.to_string(),
					captured_at: 0,
				},
				created_at: 0,
				updated_at: 0,
			},
			similarity: Some(0.5),
		}
	}

	#[test]
	fn context_is_numbered_in_rank_order() {
		let context = render_context(&[hit("first body", "one"), hit("second body", "two")]);

		assert_eq!(
			context,
			"[1] one (https://example.com/one)\nfirst body\n\n[2] two (https://example.com/two)\nsecond body"
		);
	}
}
