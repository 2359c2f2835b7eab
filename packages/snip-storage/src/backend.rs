use std::{future::Future, pin::Pin, sync::Arc};

use snip_config::{BackendConfig, BackendKind};
use snip_domain::{
	embedding,
	note::{self, NewNote, Note, NoteId, NoteSource, NoteUpdate, ScoredNote},
	similarity::VectorQuery,
};

use crate::{Error, Result, local::LocalBackend, remote::RemoteBackend};

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// The operation set every storage backend offers.
///
/// Callers depend on this trait only. Both implementations return the same error shapes:
/// a point lookup that misses is `Ok(None)`, while update and delete of a missing id fail with
/// [`Error::NotFound`]. Any call before [`NoteBackend::init`] fails with
/// [`Error::NotInitialized`].
pub trait NoteBackend
where
	Self: Send + Sync,
{
	fn kind(&self) -> BackendKind;

	/// Connects and creates the schema. Safe to call more than once.
	fn init(&self) -> BoxFuture<'_, Result<()>>;

	fn save_note(&self, note: NewNote) -> BoxFuture<'_, Result<Note>>;

	fn get_note(&self, id: NoteId) -> BoxFuture<'_, Result<Option<Note>>>;

	/// Every note, newest first.
	fn get_all_notes(&self) -> BoxFuture<'_, Result<Vec<Note>>>;

	fn update_note(&self, id: NoteId, update: NoteUpdate) -> BoxFuture<'_, Result<Note>>;

	fn delete_note(&self, id: NoteId) -> BoxFuture<'_, Result<()>>;

	fn search_notes<'a>(&'a self, query: &'a str) -> BoxFuture<'a, Result<Vec<Note>>>;

	/// Notes scoring at least `query.threshold` against `embedding`, best first. An empty result
	/// is not an error.
	fn search_by_vector<'a>(
		&'a self,
		embedding: &'a [f32],
		query: VectorQuery,
	) -> BoxFuture<'a, Result<Vec<ScoredNote>>>;

	fn search_by_tag<'a>(&'a self, tag: &'a str) -> BoxFuture<'a, Result<Vec<Note>>>;

	fn get_recent_notes(&self, limit: usize) -> BoxFuture<'_, Result<Vec<Note>>>;

	/// Distinct tags across all notes, sorted.
	fn get_tags(&self) -> BoxFuture<'_, Result<Vec<String>>>;

	fn clear_all(&self) -> BoxFuture<'_, Result<()>>;

	/// Releases connections. Later calls fail with [`Error::NotInitialized`] until the next
	/// [`NoteBackend::init`], which reconnects.
	fn close(&self) -> BoxFuture<'_, ()>;
}

pub fn build_backend(cfg: &BackendConfig) -> Arc<dyn NoteBackend> {
	match cfg {
		BackendConfig::Local(local) => Arc::new(LocalBackend::new(local.clone())),
		BackendConfig::Remote(remote) => Arc::new(RemoteBackend::new(remote.clone())),
	}
}

/// A new note after validation and normalization, ready to be written.
pub(crate) struct PreparedNote {
	pub(crate) content: String,
	pub(crate) embedding: Vec<f32>,
	pub(crate) tags: Vec<String>,
	pub(crate) source: NoteSource,
}

pub(crate) fn prepare_new(note: NewNote) -> Result<PreparedNote> {
	if note::is_blank(&note.content) {
		return Err(Error::InvalidArgument("Note content must be non-empty.".to_string()));
	}

	let embedding = embedding::normalize(note.embedding);

	crate::vector::ensure_canonical(&embedding)?;

	Ok(PreparedNote {
		content: note.content,
		embedding,
		tags: note::normalize_tags(note.tags),
		source: note.source,
	})
}

pub(crate) fn prepare_update(update: NoteUpdate) -> Result<NoteUpdate> {
	if update.is_empty() {
		return Err(Error::InvalidArgument("No updates provided.".to_string()));
	}
	if update.content.as_deref().is_some_and(note::is_blank) {
		return Err(Error::InvalidArgument("Note content must be non-empty.".to_string()));
	}

	let embedding = update.embedding.map(embedding::normalize);

	if let Some(vec) = embedding.as_deref() {
		crate::vector::ensure_canonical(vec)?;
	}

	Ok(NoteUpdate {
		content: update.content,
		embedding,
		tags: update.tags.map(note::normalize_tags),
	})
}

/// Sorted, distinct tags from any number of tag lists.
pub(crate) fn collect_tags<I, T>(lists: I) -> Vec<String>
where
	I: IntoIterator<Item = T>,
	T: IntoIterator<Item = String>,
{
	lists.into_iter().flatten().collect::<std::collections::BTreeSet<_>>().into_iter().collect()
}
