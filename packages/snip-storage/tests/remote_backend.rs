use uuid::Uuid;

use snip_domain::{
	embedding::CANONICAL_DIM,
	note::{NewNote, NoteSource, NoteUpdate},
	similarity::VectorQuery,
};
use snip_storage::{Error, NoteBackend, remote::RemoteBackend};
use snip_testkit::TestDatabase;

fn new_note(content: &str, embedding: Vec<f32>, tags: &[&str]) -> NewNote {
	NewNote {
		content: content.to_string(),
		embedding,
		tags: tags.iter().map(|tag| tag.to_string()).collect(),
		source: NoteSource {
			url: "https://example.com/article".to_string(),
			title: "Article".to_string(),
			captured_at: 1_700_000_000_000,
		},
	}
}

fn blend(x: f32, y: f32, dim: usize) -> Vec<f32> {
	let mut vec = vec![0.0; dim];

	vec[0] = x;
	vec[1] = y;

	vec
}

/// A fresh database with pgvector, or `None` when the environment cannot provide one.
async fn test_database(test: &str) -> Option<TestDatabase> {
	let Some(test_db) =
		TestDatabase::from_env().await.expect("Failed to create test database.")
	else {
		eprintln!("Skipping {test}; set SNIP_PG_DSN to run.");

		return None;
	};

	if !test_db.has_pgvector().await.expect("Failed to inspect extensions.") {
		eprintln!("Skipping {test}; the server does not offer pgvector.");

		return None;
	}

	Some(test_db)
}

async fn open(test_db: &TestDatabase) -> RemoteBackend {
	let backend = RemoteBackend::new(test_db.remote_config(2));

	backend.init().await.expect("Failed to initialize remote backend.");

	backend
}

#[tokio::test]
#[ignore = "Requires external Postgres with pgvector. Set SNIP_PG_DSN to run."]
async fn remote_backend_round_trips_and_updates() {
	let Some(test_db) = test_database("remote_backend_round_trips_and_updates").await else {
		return;
	};
	let backend = open(&test_db).await;

	// A second init against the same database must be a no-op.
	backend.init().await.expect("Schema bootstrap must be idempotent.");

	let saved = backend
		.save_note(new_note("Postgres vectors", blend(1.0, 0.0, 768), &["db", "db", " pg "]))
		.await
		.expect("Failed to save note.");

	assert_eq!(saved.embedding.len(), CANONICAL_DIM);
	assert_eq!(saved.tags, vec!["db".to_string(), "pg".to_string()]);

	let fetched = backend
		.get_note(saved.id)
		.await
		.expect("Failed to fetch note.")
		.expect("Saved note must be found.");

	assert_eq!(fetched, saved);

	let update = NoteUpdate { tags: Some(vec!["pgvector".to_string()]), ..Default::default() };
	let updated = backend.update_note(saved.id, update).await.expect("Failed to update note.");

	assert_eq!(updated.content, saved.content);
	assert_eq!(updated.embedding, saved.embedding);
	assert_eq!(updated.created_at, saved.created_at);
	assert!(updated.updated_at > saved.updated_at);

	let missing = Uuid::new_v4();

	assert!(backend.get_note(missing).await.expect("Lookup must not fail.").is_none());
	assert!(matches!(backend.delete_note(missing).await, Err(Error::NotFound(id)) if id == missing));

	backend.delete_note(saved.id).await.expect("Failed to delete note.");

	assert!(backend.get_note(saved.id).await.expect("Lookup must not fail.").is_none());

	backend.close().await;
	test_db.cleanup().await.expect("Failed to cleanup test database.");
}

#[tokio::test]
#[ignore = "Requires external Postgres with pgvector. Set SNIP_PG_DSN to run."]
async fn remote_search_operations_match_local_semantics() {
	let Some(test_db) = test_database("remote_search_operations_match_local_semantics").await else {
		return;
	};
	let backend = open(&test_db).await;

	for (content, embedding, tags) in [
		("Tokio runtime internals", blend(1.0, 0.0, CANONICAL_DIM), &["rust", "async"][..]),
		("Borrow checker errors", blend(1.0, 1.0, CANONICAL_DIM), &["rust"][..]),
		("Sourdough hydration", blend(0.0, 1.0, CANONICAL_DIM), &["baking"][..]),
	] {
		backend.save_note(new_note(content, embedding, tags)).await.expect("Failed to save note.");
	}

	let hits = backend
		.search_by_vector(&blend(1.0, 0.0, 384), VectorQuery::default())
		.await
		.expect("Vector search failed.");
	let contents = hits.iter().map(|hit| hit.note.content.as_str()).collect::<Vec<_>>();

	assert_eq!(contents, vec!["Tokio runtime internals", "Borrow checker errors"]);
	assert!(hits.iter().all(|hit| hit.similarity >= 0.3));

	let tags = backend.get_tags().await.expect("Failed to list tags.");

	assert_eq!(tags, vec!["async", "baking", "rust"]);

	let rust = backend.search_by_tag("rust").await.expect("Tag search failed.");

	assert_eq!(rust.len(), 2);

	let text = backend.search_notes("hydration").await.expect("Text search failed.");

	assert_eq!(text.len(), 1);
	assert_eq!(text[0].content, "Sourdough hydration");

	let recent = backend.get_recent_notes(2).await.expect("Failed to list recent notes.");

	assert_eq!(recent.len(), 2);
	assert_eq!(recent[0].content, "Sourdough hydration");

	backend.clear_all().await.expect("Failed to clear notes.");

	assert!(backend.get_all_notes().await.expect("Failed to list notes.").is_empty());

	backend.close().await;
	test_db.cleanup().await.expect("Failed to cleanup test database.");
}

#[tokio::test]
#[ignore = "Requires external Postgres with pgvector. Set SNIP_PG_DSN to run."]
async fn remote_zero_vectors_score_zero() {
	let Some(test_db) = test_database("remote_zero_vectors_score_zero").await else {
		return;
	};
	let backend = open(&test_db).await;

	backend
		.save_note(new_note("Unembedded clipping", vec![0.0; 8], &[]))
		.await
		.expect("Failed to save note.");
	backend
		.save_note(new_note("Embedded clipping", blend(1.0, 0.0, CANONICAL_DIM), &[]))
		.await
		.expect("Failed to save note.");

	let from_zero = backend
		.search_by_vector(&[0.0, 0.0], VectorQuery::default())
		.await
		.expect("Vector search failed.");

	assert!(from_zero.is_empty());

	let hits = backend
		.search_by_vector(&blend(1.0, 0.0, 2), VectorQuery::default())
		.await
		.expect("Vector search failed.");

	assert_eq!(hits.len(), 1);
	assert_eq!(hits[0].note.content, "Embedded clipping");

	// With a permissive threshold the zero vector is kept, scored like the local backend does.
	let everything = backend
		.search_by_vector(&blend(1.0, 0.0, 2), VectorQuery { limit: 10, threshold: -1.0 })
		.await
		.expect("Vector search failed.");
	let zero = everything
		.iter()
		.find(|hit| hit.note.content == "Unembedded clipping")
		.expect("Zero vector must clear a -1 threshold.");

	assert_eq!(zero.similarity, 0.0);

	backend.close().await;
	test_db.cleanup().await.expect("Failed to cleanup test database.");
}

#[tokio::test]
#[ignore = "Requires external Postgres with pgvector. Set SNIP_PG_DSN to run."]
async fn remote_vector_search_honours_limits_past_the_index_default() {
	let Some(test_db) =
		test_database("remote_vector_search_honours_limits_past_the_index_default").await
	else {
		return;
	};
	let backend = open(&test_db).await;

	for i in 0..60 {
		let embedding = blend(1.0, i as f32 / 60.0, CANONICAL_DIM);

		backend
			.save_note(new_note(&format!("Clipping {i}"), embedding, &[]))
			.await
			.expect("Failed to save note.");
	}

	let query = blend(1.0, 0.0, CANONICAL_DIM);
	let hits = backend
		.search_by_vector(&query, VectorQuery::with_limit(100))
		.await
		.expect("Vector search failed.");

	assert_eq!(hits.len(), 60);
	assert!(hits.windows(2).all(|pair| pair[0].similarity >= pair[1].similarity));

	let bounded = backend
		.search_by_vector(&query, VectorQuery::with_limit(45))
		.await
		.expect("Vector search failed.");

	assert_eq!(bounded.len(), 45);

	backend.close().await;
	test_db.cleanup().await.expect("Failed to cleanup test database.");
}
