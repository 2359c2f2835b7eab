//! Device-local backend on an embedded SQLite database.
//!
//! There is no vector index here. Vector search scores every stored note with
//! [`snip_domain::similarity::cosine`], which is fine for the thousands of notes a single device
//! accumulates and is the scaling limit of this backend. Text and tag search are linear scans
//! as well.

use std::{path::Path, str::FromStr, time::Duration};

use sqlx::{
	SqlitePool,
	sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous},
	types::Json,
};
use tokio::sync::RwLock;
use uuid::Uuid;

use snip_config::{BackendKind, Local};
use snip_domain::{
	clock::MonotonicClock,
	embedding::{self, CANONICAL_DIM},
	note::{NewNote, Note, NoteId, NoteSource, NoteUpdate, ScoredNote},
	similarity::{self, VectorQuery},
};

use crate::{
	BoxFuture, Error, NoteBackend, Result,
	backend::{self, PreparedNote},
	schema, vector,
};

pub const IN_MEMORY_PATH: &str = ":memory:";

const NOTE_COLUMNS: &str = "id, content, embedding, tags, source, created_at, updated_at";

#[derive(sqlx::FromRow)]
struct NoteRow {
	id: Uuid,
	content: String,
	embedding: Vec<u8>,
	tags: Json<Vec<String>>,
	source: Json<NoteSource>,
	created_at: i64,
	updated_at: i64,
}
impl TryFrom<NoteRow> for Note {
	type Error = Error;

	fn try_from(row: NoteRow) -> Result<Self> {
		Ok(Self {
			id: row.id,
			content: row.content,
			embedding: vector::decode_blob(&row.embedding)?,
			tags: row.tags.0,
			source: row.source.0,
			created_at: row.created_at,
			updated_at: row.updated_at,
		})
	}
}

pub struct LocalBackend {
	cfg: Local,
	pool: RwLock<Option<SqlitePool>>,
	clock: MonotonicClock,
}
impl LocalBackend {
	pub fn new(cfg: Local) -> Self {
		Self { cfg, pool: RwLock::new(None), clock: MonotonicClock::new() }
	}

	/// A process-private store that lives as long as the backend.
	pub fn in_memory() -> Self {
		Self::new(Local { path: IN_MEMORY_PATH.to_string(), pool_max_conns: 1 })
	}

	/// The open pool. Pools are reference counted, so the clone shares connections.
	async fn pool(&self) -> Result<SqlitePool> {
		self.pool.read().await.clone().ok_or(Error::NotInitialized)
	}

	async fn initialize(&self) -> Result<()> {
		let mut pool = self.pool.write().await;

		if pool.is_none() {
			*pool = Some(connect(&self.cfg).await?);
		}

		Ok(())
	}

	async fn save(&self, note: NewNote) -> Result<Note> {
		let pool = self.pool().await?;
		let PreparedNote { content, embedding, tags, source } = backend::prepare_new(note)?;
		let id = Uuid::new_v4();
		let now = self.clock.tick();

		sqlx::query(
			"\
INSERT INTO notes (id, content, embedding, tags, source, created_at, updated_at)
VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)",
		)
		.bind(id)
		.bind(content.as_str())
		.bind(vector::encode_blob(&embedding))
		.bind(Json(&tags))
		.bind(Json(&source))
		.bind(now)
		.execute(&pool)
		.await
		.map_err(Error::write_rejected)?;

		tracing::debug!(note_id = %id, backend = "local", "Saved note.");

		Ok(Note { id, content, embedding, tags, source, created_at: now, updated_at: now })
	}

	async fn get(&self, id: NoteId) -> Result<Option<Note>> {
		let row: Option<NoteRow> =
			sqlx::query_as(&format!("SELECT {NOTE_COLUMNS} FROM notes WHERE id = ?1"))
				.bind(id)
				.fetch_optional(&self.pool().await?)
				.await?;

		row.map(Note::try_from).transpose()
	}

	async fn all(&self) -> Result<Vec<Note>> {
		let rows: Vec<NoteRow> = sqlx::query_as(&format!(
			"SELECT {NOTE_COLUMNS} FROM notes ORDER BY created_at DESC, rowid DESC"
		))
		.fetch_all(&self.pool().await?)
		.await?;

		rows.into_iter().map(Note::try_from).collect()
	}

	async fn update(&self, id: NoteId, update: NoteUpdate) -> Result<Note> {
		let pool = self.pool().await?;
		let NoteUpdate { content, embedding, tags } = backend::prepare_update(update)?;
		let row: Option<NoteRow> = sqlx::query_as(&format!(
			"\
UPDATE notes
SET
	content = COALESCE(?2, content),
	embedding = COALESCE(?3, embedding),
	tags = COALESCE(?4, tags),
	updated_at = MAX(?5, updated_at + 1)
WHERE id = ?1
RETURNING {NOTE_COLUMNS}"
		))
		.bind(id)
		.bind(content)
		.bind(embedding.as_deref().map(vector::encode_blob))
		.bind(tags.map(Json))
		.bind(self.clock.tick())
		.fetch_optional(&pool)
		.await
		.map_err(Error::write_rejected)?;
		let row = row.ok_or(Error::NotFound(id))?;

		tracing::debug!(note_id = %id, backend = "local", "Updated note.");

		Note::try_from(row)
	}

	async fn delete(&self, id: NoteId) -> Result<()> {
		let result = sqlx::query("DELETE FROM notes WHERE id = ?1")
			.bind(id)
			.execute(&self.pool().await?)
			.await
			.map_err(Error::write_rejected)?;

		if result.rows_affected() == 0 {
			return Err(Error::NotFound(id));
		}

		tracing::debug!(note_id = %id, backend = "local", "Deleted note.");

		Ok(())
	}

	async fn search_text(&self, query: &str) -> Result<Vec<Note>> {
		let pool = self.pool().await?;
		let query = query.trim();

		if query.is_empty() {
			return Ok(Vec::new());
		}

		// SQLite's `lower()` folds ASCII only, so matching happens here.
		let needle = query.to_lowercase();
		let rows: Vec<NoteRow> = sqlx::query_as(&format!(
			"SELECT {NOTE_COLUMNS} FROM notes ORDER BY created_at DESC, rowid DESC"
		))
		.fetch_all(&pool)
		.await?;
		let mut notes = Vec::new();

		for row in rows {
			if row.content.to_lowercase().contains(&needle) {
				notes.push(Note::try_from(row)?);
			}
		}

		Ok(notes)
	}

	async fn search_vector(&self, query_vec: &[f32], query: VectorQuery) -> Result<Vec<ScoredNote>> {
		self.pool().await?;

		if query.limit == 0 {
			return Ok(Vec::new());
		}

		let query_vec = embedding::normalize(query_vec.to_vec());
		let notes = self.all().await?;
		let scored = notes.into_iter().map(|note| {
			let score = similarity::cosine(&query_vec, &note.embedding);

			(note, score)
		});

		Ok(similarity::rank(scored, query)
			.into_iter()
			.map(|(note, similarity)| ScoredNote { note, similarity })
			.collect())
	}

	async fn search_tag(&self, tag: &str) -> Result<Vec<Note>> {
		let notes = self.all().await?;

		Ok(notes.into_iter().filter(|note| note.tags.iter().any(|t| t == tag)).collect())
	}

	async fn recent(&self, limit: usize) -> Result<Vec<Note>> {
		let limit = i64::try_from(limit).unwrap_or(i64::MAX);
		let rows: Vec<NoteRow> = sqlx::query_as(&format!(
			"SELECT {NOTE_COLUMNS} FROM notes ORDER BY created_at DESC, rowid DESC LIMIT ?1"
		))
		.bind(limit)
		.fetch_all(&self.pool().await?)
		.await?;

		rows.into_iter().map(Note::try_from).collect()
	}

	async fn tags(&self) -> Result<Vec<String>> {
		let lists: Vec<Json<Vec<String>>> =
			sqlx::query_scalar("SELECT tags FROM notes").fetch_all(&self.pool().await?).await?;

		Ok(backend::collect_tags(lists.into_iter().map(|list| list.0)))
	}

	async fn clear(&self) -> Result<()> {
		let result = sqlx::query("DELETE FROM notes")
			.execute(&self.pool().await?)
			.await
			.map_err(Error::write_rejected)?;

		tracing::info!(removed = result.rows_affected(), backend = "local", "Cleared all notes.");

		Ok(())
	}

	async fn shutdown(&self) {
		let pool = self.pool.write().await.take();

		if let Some(pool) = pool {
			pool.close().await;
		}
	}
}

impl NoteBackend for LocalBackend {
	fn kind(&self) -> BackendKind {
		BackendKind::Local
	}

	fn init(&self) -> BoxFuture<'_, Result<()>> {
		Box::pin(self.initialize())
	}

	fn save_note(&self, note: NewNote) -> BoxFuture<'_, Result<Note>> {
		Box::pin(self.save(note))
	}

	fn get_note(&self, id: NoteId) -> BoxFuture<'_, Result<Option<Note>>> {
		Box::pin(self.get(id))
	}

	fn get_all_notes(&self) -> BoxFuture<'_, Result<Vec<Note>>> {
		Box::pin(self.all())
	}

	fn update_note(&self, id: NoteId, update: NoteUpdate) -> BoxFuture<'_, Result<Note>> {
		Box::pin(self.update(id, update))
	}

	fn delete_note(&self, id: NoteId) -> BoxFuture<'_, Result<()>> {
		Box::pin(self.delete(id))
	}

	fn search_notes<'a>(&'a self, query: &'a str) -> BoxFuture<'a, Result<Vec<Note>>> {
		Box::pin(self.search_text(query))
	}

	fn search_by_vector<'a>(
		&'a self,
		embedding: &'a [f32],
		query: VectorQuery,
	) -> BoxFuture<'a, Result<Vec<ScoredNote>>> {
		Box::pin(self.search_vector(embedding, query))
	}

	fn search_by_tag<'a>(&'a self, tag: &'a str) -> BoxFuture<'a, Result<Vec<Note>>> {
		Box::pin(self.search_tag(tag))
	}

	fn get_recent_notes(&self, limit: usize) -> BoxFuture<'_, Result<Vec<Note>>> {
		Box::pin(self.recent(limit))
	}

	fn get_tags(&self) -> BoxFuture<'_, Result<Vec<String>>> {
		Box::pin(self.tags())
	}

	fn clear_all(&self) -> BoxFuture<'_, Result<()>> {
		Box::pin(self.clear())
	}

	fn close(&self) -> BoxFuture<'_, ()> {
		Box::pin(self.shutdown())
	}
}

async fn connect(cfg: &Local) -> Result<SqlitePool> {
	let in_memory = cfg.path == IN_MEMORY_PATH;
	let pool = if in_memory {
		// Every in-memory connection is its own database, so the pool must hold exactly one
		// connection for its whole life.
		SqlitePoolOptions::new()
			.max_connections(1)
			.min_connections(1)
			.idle_timeout(None)
			.max_lifetime(None)
			.connect_with(SqliteConnectOptions::from_str("sqlite::memory:")?)
			.await?
	} else {
		if let Some(parent) = Path::new(&cfg.path).parent()
			&& !parent.as_os_str().is_empty()
		{
			tokio::fs::create_dir_all(parent).await.map_err(sqlx::Error::Io)?;
		}

		let options = SqliteConnectOptions::new()
			.filename(&cfg.path)
			.create_if_missing(true)
			.journal_mode(SqliteJournalMode::Wal)
			.synchronous(SqliteSynchronous::Normal)
			.busy_timeout(Duration::from_secs(5));

		SqlitePoolOptions::new().max_connections(cfg.pool_max_conns).connect_with(options).await?
	};
	let sql = schema::render_local_schema(CANONICAL_DIM);

	for statement in schema::statements(&sql) {
		sqlx::query(statement).execute(&pool).await?;
	}

	tracing::info!(path = %cfg.path, "Local note store ready.");

	Ok(pool)
}
