use std::sync::Arc;

use axum::{
	Router,
	body::{self, Body},
	http::{Request, StatusCode, header},
	response::IntoResponse,
};
use serde_json::{Value, json};
use tower::util::ServiceExt;

use snip_api::{
	routes::{self, ApiError},
	state::AppState,
};
use snip_config::{EmbeddingProviderConfig, LlmProviderConfig};
use snip_service::{
	AnswerProvider, BoxFuture, Diagnostics, EmbeddingProvider, Error as ServiceError, Providers,
	TagProvider,
};
use snip_storage::selector::BackendSelector;

const CONFIG: &str = r#"
[service]
http_bind = "127.0.0.1:0"
log_level = "info"

[storage]
backend = "local"

[storage.local]
path = ":memory:"
pool_max_conns = 1

[providers.embedding]
provider_id = "stub"
api_base = "http://127.0.0.1:1"
api_key = "test"
path = "/embeddings"
model = "stub"
timeout_ms = 1000

[providers.llm]
provider_id = "stub"
api_base = "http://127.0.0.1:1"
api_key = "test"
path = "/chat/completions"
model = "stub"
temperature = 0.0
timeout_ms = 1000
"#;

/// Texts mentioning "rust" point one way, everything else the other.
struct StubProviders;
impl EmbeddingProvider for StubProviders {
	fn embed<'a>(
		&'a self,
		_cfg: &'a EmbeddingProviderConfig,
		texts: &'a [String],
	) -> BoxFuture<'a, color_eyre::Result<Vec<Vec<f32>>>> {
		let vectors = texts
			.iter()
			.map(|text| {
				if text.to_lowercase().contains("rust") { vec![1.0, 0.0] } else { vec![0.0, 1.0] }
			})
			.collect();

		Box::pin(async move { Ok(vectors) })
	}
}
impl TagProvider for StubProviders {
	fn generate_tags<'a>(
		&'a self,
		_cfg: &'a LlmProviderConfig,
		_text: &'a str,
		_max_tags: usize,
	) -> BoxFuture<'a, color_eyre::Result<Vec<String>>> {
		Box::pin(async { Ok(vec!["web".to_string()]) })
	}
}
impl AnswerProvider for StubProviders {
	fn answer<'a>(
		&'a self,
		_cfg: &'a LlmProviderConfig,
		_question: &'a str,
		context: &'a str,
	) -> BoxFuture<'a, color_eyre::Result<String>> {
		let answer = format!("Based on {} note(s).", context.matches("\n[").count() + 1);

		Box::pin(async move { Ok(answer) })
	}
}

async fn app_state() -> AppState {
	let config = snip_config::from_toml_str(CONFIG).expect("Test config must be valid.");
	let provider = Arc::new(StubProviders);
	let providers = Providers::new(provider.clone(), provider.clone(), provider);

	AppState::with_providers(config, Arc::new(BackendSelector::new()), providers)
		.await
		.expect("Failed to initialize app state.")
}

async fn app() -> Router {
	routes::router(app_state().await)
}

async fn call(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
	let request = Request::builder().method(method).uri(uri);
	let request = match body {
		Some(body) => request
			.header(header::CONTENT_TYPE, "application/json")
			.body(Body::from(body.to_string())),
		None => request.body(Body::empty()),
	}
	.expect("Failed to build request.");
	let response = app.clone().oneshot(request).await.expect("Failed to call router.");
	let status = response.status();
	let bytes =
		body::to_bytes(response.into_body(), usize::MAX).await.expect("Failed to read body.");
	let value = if bytes.is_empty() {
		Value::Null
	} else {
		serde_json::from_slice(&bytes).expect("Response body must be JSON.")
	};

	(status, value)
}

fn capture_body(content: &str) -> Value {
	json!({
		"content": content,
		"source": { "url": "https://example.com", "title": "Example", "captured_at": 0 },
	})
}

#[tokio::test]
async fn health_ok() {
	let app = app().await;
	let (status, _) = call(&app, "GET", "/health", None).await;

	assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn capture_then_read_back() {
	let app = app().await;
	let (status, note) =
		call(&app, "POST", "/v1/notes", Some(capture_body("Rust pattern matching"))).await;

	assert_eq!(status, StatusCode::CREATED);
	assert_eq!(note["tags"], json!(["web"]));
	assert_eq!(note["embedding"].as_array().map(Vec::len), Some(1_536));

	let id = note["id"].as_str().expect("Note id must be a string.");
	let (status, fetched) = call(&app, "GET", &format!("/v1/notes/{id}"), None).await;

	assert_eq!(status, StatusCode::OK);
	assert_eq!(fetched, note);

	let (status, list) = call(&app, "GET", "/v1/notes", None).await;

	assert_eq!(status, StatusCode::OK);
	assert_eq!(list.as_array().map(Vec::len), Some(1));

	let (status, tags) = call(&app, "GET", "/v1/tags", None).await;

	assert_eq!(status, StatusCode::OK);
	assert_eq!(tags, json!(["web"]));

	let (status, tagged) = call(&app, "GET", "/v1/tags/web/notes", None).await;

	assert_eq!(status, StatusCode::OK);
	assert_eq!(tagged.as_array().map(Vec::len), Some(1));

	let (status, found) = call(&app, "GET", "/v1/search?q=pattern", None).await;

	assert_eq!(status, StatusCode::OK);
	assert_eq!(found.as_array().map(Vec::len), Some(1));
}

#[tokio::test]
async fn missing_note_is_404_and_blank_capture_is_400() {
	let app = app().await;
	let id = uuid::Uuid::new_v4();
	let (status, body) = call(&app, "GET", &format!("/v1/notes/{id}"), None).await;

	assert_eq!(status, StatusCode::NOT_FOUND);
	assert_eq!(body["error_code"], "not_found");

	let (status, body) = call(&app, "DELETE", &format!("/v1/notes/{id}"), None).await;

	assert_eq!(status, StatusCode::NOT_FOUND);
	assert_eq!(body["error_code"], "not_found");

	let (status, body) = call(&app, "POST", "/v1/notes", Some(capture_body("   "))).await;

	assert_eq!(status, StatusCode::BAD_REQUEST);
	assert_eq!(body["error_code"], "invalid_request");
}

#[tokio::test]
async fn update_and_delete_round_trip() {
	let app = app().await;
	let (_, note) = call(&app, "POST", "/v1/notes", Some(capture_body("Rust iterators"))).await;
	let id = note["id"].as_str().expect("Note id must be a string.").to_string();
	let (status, updated) =
		call(&app, "PATCH", &format!("/v1/notes/{id}"), Some(json!({ "tags": ["iter"] }))).await;

	assert_eq!(status, StatusCode::OK);
	assert_eq!(updated["tags"], json!(["iter"]));
	assert_eq!(updated["content"], note["content"]);
	assert!(updated["updated_at"].as_i64() > note["updated_at"].as_i64());

	let (status, _) = call(&app, "DELETE", &format!("/v1/notes/{id}"), None).await;

	assert_eq!(status, StatusCode::NO_CONTENT);

	let (status, _) = call(&app, "GET", &format!("/v1/notes/{id}"), None).await;

	assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn semantic_search_and_ask() {
	let app = app().await;

	call(&app, "POST", "/v1/notes", Some(capture_body("Rust async traits"))).await;
	call(&app, "POST", "/v1/notes", Some(capture_body("Banana bread"))).await;

	let (status, res) =
		call(&app, "POST", "/v1/search/semantic", Some(json!({ "query": "rust" }))).await;

	assert_eq!(status, StatusCode::OK);
	assert_eq!(res["fallback"], json!(false));
	assert_eq!(res["items"].as_array().map(Vec::len), Some(1));
	assert_eq!(res["items"][0]["note"]["content"], "Rust async traits");

	let (status, res) = call(
		&app,
		"POST",
		"/v1/search/vector",
		Some(json!({ "embedding": [0.0, 1.0], "threshold": 0.5 })),
	)
	.await;

	assert_eq!(status, StatusCode::OK);
	assert_eq!(res[0]["note"]["content"], "Banana bread");

	let (status, res) =
		call(&app, "POST", "/v1/ask", Some(json!({ "question": "What about Rust?" }))).await;

	assert_eq!(status, StatusCode::OK);
	assert_eq!(res["answer"], "Based on 1 note(s).");
	assert_eq!(res["note_ids"].as_array().map(Vec::len), Some(1));

	let (status, recent) = call(&app, "GET", "/v1/notes/recent?limit=1", None).await;

	assert_eq!(status, StatusCode::OK);
	assert_eq!(recent[0]["content"], "Banana bread");
}

#[tokio::test]
async fn switching_backend_leaves_old_data_behind() {
	let app = app().await;

	call(&app, "POST", "/v1/notes", Some(capture_body("Rust in the first store"))).await;

	let next = json!({ "kind": "local", "path": ":memory:", "pool_max_conns": 2 });
	let (status, res) = call(&app, "PUT", "/v1/admin/backend", Some(next)).await;

	assert_eq!(status, StatusCode::OK);
	assert_eq!(res["kind"], "local");

	let (status, list) = call(&app, "GET", "/v1/notes", None).await;

	assert_eq!(status, StatusCode::OK);
	assert_eq!(list, json!([]));

	let invalid = json!({ "kind": "remote", "dsn": " " });
	let (status, body) = call(&app, "PUT", "/v1/admin/backend", Some(invalid)).await;

	assert_eq!(status, StatusCode::BAD_REQUEST);
	assert_eq!(body["error_code"], "invalid_request");

	let (status, res) = call(&app, "GET", "/v1/admin/backend", None).await;

	assert_eq!(status, StatusCode::OK);
	assert_eq!(res["kind"], "local");
}

#[tokio::test]
async fn clear_all_empties_the_store() {
	let app = app().await;

	call(&app, "POST", "/v1/notes", Some(capture_body("Rust one"))).await;
	call(&app, "POST", "/v1/notes", Some(capture_body("Rust two"))).await;

	let (status, _) = call(&app, "DELETE", "/v1/notes", None).await;

	assert_eq!(status, StatusCode::NO_CONTENT);

	let (_, list) = call(&app, "GET", "/v1/notes", None).await;

	assert_eq!(list, json!([]));
}

#[tokio::test]
async fn concurrent_backend_switches_settle_on_the_last_published_config() {
	let state = app_state().await;
	let app = routes::router(state.clone());
	let mut tasks = Vec::new();

	for pool_max_conns in 2..8 {
		let app = app.clone();

		tasks.push(tokio::spawn(async move {
			let next = json!({
				"kind": "local",
				"path": ":memory:",
				"pool_max_conns": pool_max_conns,
			});

			call(&app, "PUT", "/v1/admin/backend", Some(next)).await.0
		}));
	}

	for task in tasks {
		assert_eq!(task.await.expect("Task panicked."), StatusCode::OK);
	}

	for _ in 0..50 {
		tokio::task::yield_now().await;
	}

	let published = state.backend_config.borrow().clone();

	assert_eq!(state.service.selector.current_config().await, Some(published));
}

#[tokio::test]
async fn storage_errors_carry_database_diagnostics() {
	let err = ServiceError::Storage {
		message: "Write rejected: new row violates check constraint".to_string(),
		diagnostics: Some(Diagnostics {
			code: Some("23514".to_string()),
			detail: None,
			hint: Some("check content".to_string()),
		}),
	};
	let response = ApiError::from(err).into_response();

	assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

	let bytes =
		body::to_bytes(response.into_body(), usize::MAX).await.expect("Failed to read body.");
	let body: Value = serde_json::from_slice(&bytes).expect("Response body must be JSON.");

	assert_eq!(body["error_code"], "storage_error");
	assert_eq!(body["diagnostics"], json!({ "code": "23514", "hint": "check content" }));
}
