use axum::{
	Json, Router,
	extract::{Path, Query, State},
	http::StatusCode,
	response::{IntoResponse, Response},
	routing::{get, post, put},
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use snip_config::{BackendConfig, BackendKind};
use snip_domain::note::{Note, ScoredNote};
use snip_service::{
	AskRequest, AskResponse, CaptureRequest, Diagnostics, Error as ServiceError,
	SemanticSearchRequest, SemanticSearchResponse, UpdateRequest, VectorSearchRequest,
};

use crate::state::AppState;

pub fn router(state: AppState) -> Router {
	Router::new()
		.route("/health", get(health))
		.route("/v1/notes", post(capture).get(list_notes).delete(clear_all))
		.route("/v1/notes/recent", get(recent_notes))
		.route("/v1/notes/{id}", get(get_note).patch(update_note).delete(delete_note))
		.route("/v1/search", get(search_text))
		.route("/v1/search/semantic", post(semantic_search))
		.route("/v1/search/vector", post(vector_search))
		.route("/v1/tags", get(tags))
		.route("/v1/tags/{tag}/notes", get(notes_by_tag))
		.route("/v1/ask", post(ask))
		.route("/v1/admin/backend", put(select_backend).get(current_backend))
		.with_state(state)
}

#[derive(Debug, Deserialize)]
struct RecentParams {
	limit: Option<usize>,
}

#[derive(Debug, Deserialize)]
struct TextSearchParams {
	q: String,
}

#[derive(Debug, Serialize)]
struct BackendStatus {
	kind: Option<BackendKind>,
}

async fn health() -> StatusCode {
	StatusCode::OK
}

async fn capture(
	State(state): State<AppState>,
	Json(payload): Json<CaptureRequest>,
) -> Result<(StatusCode, Json<Note>), ApiError> {
	let note = state.service.capture(payload).await?;

	Ok((StatusCode::CREATED, Json(note)))
}

async fn list_notes(State(state): State<AppState>) -> Result<Json<Vec<Note>>, ApiError> {
	Ok(Json(state.service.list_notes().await?))
}

async fn clear_all(State(state): State<AppState>) -> Result<StatusCode, ApiError> {
	state.service.clear_all().await?;

	Ok(StatusCode::NO_CONTENT)
}

async fn recent_notes(
	State(state): State<AppState>,
	Query(params): Query<RecentParams>,
) -> Result<Json<Vec<Note>>, ApiError> {
	Ok(Json(state.service.recent_notes(params.limit).await?))
}

async fn get_note(
	State(state): State<AppState>,
	Path(id): Path<Uuid>,
) -> Result<Json<Note>, ApiError> {
	let note = state.service.get_note(id).await?.ok_or_else(|| {
		json_error(StatusCode::NOT_FOUND, "not_found", format!("Note {id} was not found."), None)
	})?;

	Ok(Json(note))
}

async fn update_note(
	State(state): State<AppState>,
	Path(id): Path<Uuid>,
	Json(payload): Json<UpdateRequest>,
) -> Result<Json<Note>, ApiError> {
	Ok(Json(state.service.update_note(id, payload).await?))
}

async fn delete_note(
	State(state): State<AppState>,
	Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
	state.service.delete_note(id).await?;

	Ok(StatusCode::NO_CONTENT)
}

async fn search_text(
	State(state): State<AppState>,
	Query(params): Query<TextSearchParams>,
) -> Result<Json<Vec<Note>>, ApiError> {
	Ok(Json(state.service.search_text(&params.q).await?))
}

async fn semantic_search(
	State(state): State<AppState>,
	Json(payload): Json<SemanticSearchRequest>,
) -> Result<Json<SemanticSearchResponse>, ApiError> {
	Ok(Json(state.service.semantic_search(payload).await?))
}

async fn vector_search(
	State(state): State<AppState>,
	Json(payload): Json<VectorSearchRequest>,
) -> Result<Json<Vec<ScoredNote>>, ApiError> {
	Ok(Json(state.service.vector_search(payload).await?))
}

async fn tags(State(state): State<AppState>) -> Result<Json<Vec<String>>, ApiError> {
	Ok(Json(state.service.tags().await?))
}

async fn notes_by_tag(
	State(state): State<AppState>,
	Path(tag): Path<String>,
) -> Result<Json<Vec<Note>>, ApiError> {
	Ok(Json(state.service.notes_by_tag(&tag).await?))
}

async fn ask(
	State(state): State<AppState>,
	Json(payload): Json<AskRequest>,
) -> Result<Json<AskResponse>, ApiError> {
	Ok(Json(state.service.ask(payload).await?))
}

async fn select_backend(
	State(state): State<AppState>,
	Json(payload): Json<BackendConfig>,
) -> Result<Json<BackendStatus>, ApiError> {
	let kind = payload.kind();

	state
		.service
		.selector
		.publish(&state.backend_config, payload)
		.await
		.map_err(ServiceError::from)?;

	Ok(Json(BackendStatus { kind: Some(kind) }))
}

async fn current_backend(State(state): State<AppState>) -> Json<BackendStatus> {
	Json(BackendStatus { kind: state.service.selector.current_kind().await })
}

#[derive(Debug, Serialize)]
struct ErrorBody {
	error_code: String,
	message: String,
	fields: Option<Vec<String>>,
	#[serde(skip_serializing_if = "Option::is_none")]
	diagnostics: Option<Diagnostics>,
}

#[derive(Debug)]
pub struct ApiError {
	status: StatusCode,
	error_code: String,
	message: String,
	fields: Option<Vec<String>>,
	diagnostics: Option<Diagnostics>,
}
impl ApiError {
	fn new(
		status: StatusCode,
		error_code: impl Into<String>,
		message: impl Into<String>,
		fields: Option<Vec<String>>,
	) -> Self {
		Self {
			status,
			error_code: error_code.into(),
			message: message.into(),
			fields,
			diagnostics: None,
		}
	}

	fn with_diagnostics(mut self, diagnostics: Option<Diagnostics>) -> Self {
		self.diagnostics = diagnostics;

		self
	}
}
impl From<ServiceError> for ApiError {
	fn from(err: ServiceError) -> Self {
		let message = err.to_string();

		match err {
			ServiceError::InvalidRequest { .. } =>
				json_error(StatusCode::BAD_REQUEST, "invalid_request", message, None),
			ServiceError::NotFound { .. } =>
				json_error(StatusCode::NOT_FOUND, "not_found", message, None),
			ServiceError::Provider { .. } => {
				tracing::error!(error = %message, "Provider call failed.");

				json_error(StatusCode::BAD_GATEWAY, "provider_error", message, None)
			},
			ServiceError::Storage { diagnostics, .. } => {
				tracing::error!(error = %message, ?diagnostics, "Storage call failed.");

				json_error(StatusCode::INTERNAL_SERVER_ERROR, "storage_error", message, None)
					.with_diagnostics(diagnostics)
			},
			ServiceError::Unavailable { .. } =>
				json_error(StatusCode::SERVICE_UNAVAILABLE, "backend_unavailable", message, None),
			ServiceError::Reselected =>
				json_error(StatusCode::SERVICE_UNAVAILABLE, "backend_reselected", message, None),
		}
	}
}

impl IntoResponse for ApiError {
	fn into_response(self) -> Response {
		let body = ErrorBody {
			error_code: self.error_code,
			message: self.message,
			fields: self.fields,
			diagnostics: self.diagnostics,
		};

		(self.status, Json(body)).into_response()
	}
}

pub fn json_error(
	status: StatusCode,
	code: &str,
	message: impl Into<String>,
	fields: Option<Vec<String>>,
) -> ApiError {
	ApiError::new(status, code, message, fields)
}
