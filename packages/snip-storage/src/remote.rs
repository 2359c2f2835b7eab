//! Hosted backend on Postgres with the pgvector extension.
//!
//! Vector search runs server-side through the `match_notes` function so only the matching rows
//! cross the wire.

use std::str::FromStr;

use sqlx::{
	PgPool,
	postgres::{PgConnectOptions, PgPoolOptions},
	types::Json,
};
use tokio::sync::RwLock;
use uuid::Uuid;

use snip_config::{BackendKind, Remote};
use snip_domain::{
	clock::MonotonicClock,
	embedding::{self, CANONICAL_DIM},
	note::{NewNote, Note, NoteId, NoteSource, NoteUpdate, ScoredNote},
	similarity::VectorQuery,
};

use crate::{
	BoxFuture, Error, NoteBackend, Result,
	backend::{self, PreparedNote},
	schema, vector,
};

const SCHEMA_LOCK_ID: i64 = 7_120_115;
const HNSW_EF_SEARCH_DEFAULT: usize = 40;
const HNSW_EF_SEARCH_MAX: usize = 1_000;
const NOTE_COLUMNS: &str =
	"id, content, embedding::text AS embedding, tags, source, created_at, updated_at";

#[derive(sqlx::FromRow)]
struct RemoteNoteRow {
	id: Uuid,
	content: String,
	embedding: String,
	tags: Vec<String>,
	source: Json<NoteSource>,
	created_at: i64,
	updated_at: i64,
}
impl TryFrom<RemoteNoteRow> for Note {
	type Error = Error;

	fn try_from(row: RemoteNoteRow) -> Result<Self> {
		let embedding = vector::parse_pg_vector(&row.embedding)?;

		vector::ensure_canonical(&embedding)?;

		Ok(Self {
			id: row.id,
			content: row.content,
			embedding,
			tags: row.tags,
			source: row.source.0,
			created_at: row.created_at,
			updated_at: row.updated_at,
		})
	}
}

#[derive(sqlx::FromRow)]
struct ScoredRow {
	#[sqlx(flatten)]
	note: RemoteNoteRow,
	similarity: f64,
}

pub struct RemoteBackend {
	cfg: Remote,
	pool: RwLock<Option<PgPool>>,
	clock: MonotonicClock,
}
impl RemoteBackend {
	pub fn new(cfg: Remote) -> Self {
		Self { cfg, pool: RwLock::new(None), clock: MonotonicClock::new() }
	}

	/// The open pool. Pools are reference counted, so the clone shares connections.
	async fn pool(&self) -> Result<PgPool> {
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
		let row: RemoteNoteRow = sqlx::query_as(&format!(
			"\
INSERT INTO notes (content, embedding, tags, source, created_at, updated_at)
VALUES ($1, $2::text::vector, $3, $4, $5, $5)
RETURNING {NOTE_COLUMNS}"
		))
		.bind(content)
		.bind(vector::vector_to_pg(&embedding))
		.bind(tags)
		.bind(Json(source))
		.bind(self.clock.tick())
		.fetch_one(&pool)
		.await
		.map_err(Error::write_rejected)?;

		tracing::debug!(note_id = %row.id, backend = "remote", "Saved note.");

		Note::try_from(row)
	}

	async fn get(&self, id: NoteId) -> Result<Option<Note>> {
		let row: Option<RemoteNoteRow> =
			sqlx::query_as(&format!("SELECT {NOTE_COLUMNS} FROM notes WHERE id = $1"))
				.bind(id)
				.fetch_optional(&self.pool().await?)
				.await?;

		row.map(Note::try_from).transpose()
	}

	async fn all(&self) -> Result<Vec<Note>> {
		let rows: Vec<RemoteNoteRow> = sqlx::query_as(&format!(
			"SELECT {NOTE_COLUMNS} FROM notes ORDER BY created_at DESC, id DESC"
		))
		.fetch_all(&self.pool().await?)
		.await?;

		rows.into_iter().map(Note::try_from).collect()
	}

	async fn update(&self, id: NoteId, update: NoteUpdate) -> Result<Note> {
		let pool = self.pool().await?;
		let NoteUpdate { content, embedding, tags } = backend::prepare_update(update)?;
		let row: Option<RemoteNoteRow> = sqlx::query_as(&format!(
			"\
UPDATE notes
SET
	content = COALESCE($2, content),
	embedding = COALESCE($3::text::vector, embedding),
	tags = COALESCE($4, tags),
	updated_at = GREATEST($5, updated_at + 1)
WHERE id = $1
RETURNING {NOTE_COLUMNS}"
		))
		.bind(id)
		.bind(content)
		.bind(embedding.as_deref().map(vector::vector_to_pg))
		.bind(tags)
		.bind(self.clock.tick())
		.fetch_optional(&pool)
		.await
		.map_err(Error::write_rejected)?;
		let row = row.ok_or(Error::NotFound(id))?;

		tracing::debug!(note_id = %id, backend = "remote", "Updated note.");

		Note::try_from(row)
	}

	async fn delete(&self, id: NoteId) -> Result<()> {
		let result = sqlx::query("DELETE FROM notes WHERE id = $1")
			.bind(id)
			.execute(&self.pool().await?)
			.await
			.map_err(Error::write_rejected)?;

		if result.rows_affected() == 0 {
			return Err(Error::NotFound(id));
		}

		tracing::debug!(note_id = %id, backend = "remote", "Deleted note.");

		Ok(())
	}

	async fn search_text(&self, query: &str) -> Result<Vec<Note>> {
		let query = query.trim();

		if query.is_empty() {
			return Ok(Vec::new());
		}

		let rows: Vec<RemoteNoteRow> = sqlx::query_as(&format!(
			"\
SELECT {NOTE_COLUMNS}
FROM notes
WHERE to_tsvector('english', content) @@ websearch_to_tsquery('english', $1)
ORDER BY
	ts_rank(to_tsvector('english', content), websearch_to_tsquery('english', $1)) DESC,
	created_at DESC"
		))
		.bind(query)
		.fetch_all(&self.pool().await?)
		.await?;

		rows.into_iter().map(Note::try_from).collect()
	}

	async fn search_vector(&self, query_vec: &[f32], query: VectorQuery) -> Result<Vec<ScoredNote>> {
		let pool = self.pool().await?;

		if query.limit == 0 {
			return Ok(Vec::new());
		}

		let query_vec = embedding::normalize(query_vec.to_vec());
		let mut tx = pool.begin().await?;

		// An HNSW scan yields at most `hnsw.ef_search` candidates before the threshold filter
		// runs, so widen it to the requested limit. Past its ceiling, fall back to an exact scan.
		if query.limit <= HNSW_EF_SEARCH_MAX {
			let ef_search = query.limit.max(HNSW_EF_SEARCH_DEFAULT);

			sqlx::query("SELECT set_config('hnsw.ef_search', $1, true)")
				.bind(ef_search.to_string())
				.execute(&mut *tx)
				.await?;
		} else {
			sqlx::query("SELECT set_config('enable_indexscan', 'off', true)")
				.execute(&mut *tx)
				.await?;
		}

		let rows: Vec<ScoredRow> = sqlx::query_as(
			"\
SELECT
	id,
	content,
	embedding::text AS embedding,
	tags,
	source,
	created_at,
	updated_at,
	similarity
FROM match_notes($1::text::vector, $2, $3)",
		)
		.bind(vector::vector_to_pg(&query_vec))
		.bind(f64::from(query.threshold))
		.bind(i32::try_from(query.limit).unwrap_or(i32::MAX))
		.fetch_all(&mut *tx)
		.await?;

		tx.commit().await?;

		let mut scored = Vec::with_capacity(rows.len());

		for row in rows {
			scored.push(ScoredNote {
				note: Note::try_from(row.note)?,
				similarity: (row.similarity as f32).clamp(-1.0, 1.0),
			});
		}

		Ok(scored)
	}

	async fn search_tag(&self, tag: &str) -> Result<Vec<Note>> {
		let rows: Vec<RemoteNoteRow> = sqlx::query_as(&format!(
			"\
SELECT {NOTE_COLUMNS}
FROM notes
WHERE tags @> ARRAY[$1]::text[]
ORDER BY created_at DESC, id DESC"
		))
		.bind(tag)
		.fetch_all(&self.pool().await?)
		.await?;

		rows.into_iter().map(Note::try_from).collect()
	}

	async fn recent(&self, limit: usize) -> Result<Vec<Note>> {
		let rows: Vec<RemoteNoteRow> = sqlx::query_as(&format!(
			"SELECT {NOTE_COLUMNS} FROM notes ORDER BY created_at DESC, id DESC LIMIT $1"
		))
		.bind(i64::try_from(limit).unwrap_or(i64::MAX))
		.fetch_all(&self.pool().await?)
		.await?;

		rows.into_iter().map(Note::try_from).collect()
	}

	async fn tags(&self) -> Result<Vec<String>> {
		let tags: Vec<String> = sqlx::query_scalar("SELECT DISTINCT unnest(tags) FROM notes")
			.fetch_all(&self.pool().await?)
			.await?;

		// Sorted client-side so the order does not depend on the database collation.
		Ok(backend::collect_tags([tags]))
	}

	async fn clear(&self) -> Result<()> {
		let result = sqlx::query("DELETE FROM notes")
			.execute(&self.pool().await?)
			.await
			.map_err(Error::write_rejected)?;

		tracing::info!(removed = result.rows_affected(), backend = "remote", "Cleared all notes.");

		Ok(())
	}

	async fn shutdown(&self) {
		let pool = self.pool.write().await.take();

		if let Some(pool) = pool {
			pool.close().await;
		}
	}
}

impl NoteBackend for RemoteBackend {
	fn kind(&self) -> BackendKind {
		BackendKind::Remote
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

async fn connect(cfg: &Remote) -> Result<PgPool> {
	let mut options = PgConnectOptions::from_str(&cfg.dsn)?;
	let password = cfg.password.as_deref().filter(|password| !password.is_empty());

	if let Some(password) = password {
		options = options.password(password);
	}

	let pool =
		PgPoolOptions::new().max_connections(cfg.pool_max_conns).connect_with(options).await?;

	ensure_schema(&pool).await?;

	tracing::info!(host = options_host(&cfg.dsn), "Remote note store ready.");

	Ok(pool)
}

async fn ensure_schema(pool: &PgPool) -> Result<()> {
	let sql = schema::render_remote_schema(CANONICAL_DIM);
	// Advisory locks are held per connection, so scope the lock to one transaction.
	let mut tx = pool.begin().await?;

	sqlx::query("SELECT pg_advisory_xact_lock($1)").bind(SCHEMA_LOCK_ID).execute(&mut *tx).await?;

	for statement in schema::statements(&sql) {
		sqlx::query(statement).execute(&mut *tx).await?;
	}

	tx.commit().await?;

	Ok(())
}

/// Host part of a DSN, for logs. Never includes credentials.
fn options_host(dsn: &str) -> &str {
	let rest = dsn.split_once("://").map_or(dsn, |(_, rest)| rest);
	let rest = rest.rsplit_once('@').map_or(rest, |(_, host)| host);

	rest.split(['/', '?']).next().unwrap_or(rest)
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn dsn_host_drops_credentials_and_database() {
		assert_eq!(options_host("postgres://user:pw@db.example.com:5432/notes"), "db.example.com:5432");
		assert_eq!(options_host("postgres://localhost/notes?sslmode=disable"), "localhost");
		assert_eq!(options_host("db.internal"), "db.internal");
	}
}
