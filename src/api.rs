use axum::{
    extract::{Json, Path, Query, State},
    http::StatusCode,
    response::{Html, IntoResponse},
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tower_http::cors::{Any, CorsLayer};
use tracing::{info, warn};
use uuid::Uuid;

use crate::{
    aggregator,
    app_state::{AppState, Status},
    backend::SuggestionSource as _,
    error::SuggestError,
    models::{BackendKind, KeywordGroup, SuggestionRecord, Suggestions},
    session::Session,
};

/// Separador de términos del endpoint `/api/v1/resources/mesh`.
pub const TERM_SEPARATOR: char = '$';

pub const NOT_FOUND_BODY: &str = "<h1>404</h1><p>The Resource You Requested Is Not Found.</p>";

type ApiError = (StatusCode, Json<serde_json::Value>);

// --- Payloads y Respuestas de la API ---

#[derive(Deserialize)]
pub struct MeshParams {
    term: Option<String>,
    #[serde(rename = "type")]
    kind: Option<String>,
}

#[derive(Serialize)]
pub struct MeshResponse {
    #[serde(rename = "Splits")]
    splits: Vec<String>,
    #[serde(rename = "Data")]
    data: Vec<SuggestionRecord>,
}

#[derive(Deserialize)]
pub struct ParsePayload {
    query: String,
}

#[derive(Serialize)]
pub struct ParseResponse {
    groups: Vec<KeywordGroup>,
}

#[derive(Deserialize)]
pub struct SuggestPayload {
    #[serde(default = "default_method")]
    method: String,
}

fn default_method() -> String {
    BackendKind::Semantic.tag().to_string()
}

#[derive(Deserialize)]
pub struct AddPayload {
    #[serde(default)]
    selected: Vec<String>,
}

#[derive(Serialize, Deserialize)]
pub struct BuilderPayload {
    query: String,
}

// --- Router ---

/// Router completo: rutas, 404 fijo y CORS abierto.
pub fn create_router(app_state: AppState) -> Router {
    Router::new()
        .route("/api/v1/resources/mesh", get(mesh_handler))
        .route("/api/status", get(status_handler))
        .route("/api/sessions", post(create_session_handler))
        .route(
            "/api/sessions/:id",
            get(get_session_handler).delete(delete_session_handler),
        )
        .route("/api/sessions/:id/parse", post(parse_handler))
        .route("/api/sessions/:id/suggest", post(suggest_handler))
        .route("/api/sessions/:id/builder", get(get_builder_handler).put(set_builder_handler))
        .route("/api/sessions/:id/builder/add", post(add_to_builder_handler))
        .route("/api/sessions/:id/clear", post(clear_handler))
        .fallback(not_found_handler)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(app_state)
}

// --- Errores ---

fn error_body(kind: &str, message: impl Into<String>) -> Json<serde_json::Value> {
    Json(json!({ "error": { "kind": kind, "message": message.into() } }))
}

fn suggest_error(err: &SuggestError) -> ApiError {
    let status = match err {
        SuggestError::ModelUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        SuggestError::BackendCall(_) => StatusCode::BAD_GATEWAY,
        SuggestError::NotConfigured(_) => StatusCode::SERVICE_UNAVAILABLE,
        SuggestError::UnknownBackend(_) => StatusCode::BAD_REQUEST,
    };
    (status, error_body(err.kind(), err.to_string()))
}

fn session_not_found(id: &Uuid) -> ApiError {
    (
        StatusCode::NOT_FOUND,
        error_body("session_not_found", format!("No existe la sesión {id}")),
    )
}

fn parse_backend(raw: &str) -> Result<BackendKind, ApiError> {
    BackendKind::from_str(raw).map_err(|_| suggest_error(&SuggestError::UnknownBackend(raw.to_string())))
}

// --- Handlers ---

/// Endpoint original: la lista completa de términos va al backend en una
/// sola llamada, sin descomponer.
#[axum::debug_handler]
async fn mesh_handler(
    State(state): State<AppState>,
    Query(params): Query<MeshParams>,
) -> Result<Json<MeshResponse>, ApiError> {
    let term = params.term.unwrap_or_default();
    let splits: Vec<String> = term
        .split(TERM_SEPARATOR)
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect();
    if splits.is_empty() {
        return Err((
            StatusCode::BAD_REQUEST,
            error_body("empty_input", "El parámetro 'term' no contiene términos."),
        ));
    }

    let kind = parse_backend(params.kind.as_deref().unwrap_or(BackendKind::Semantic.tag()))?;
    let backend = state.backends.select(kind).map_err(|e| suggest_error(&e))?;

    let data = tokio::time::timeout(state.config.backend_timeout, backend.suggest(&splits))
        .await
        .map_err(|_| SuggestError::BackendCall("tiempo límite superado".to_string()))
        .and_then(|res| res.map_err(|e| SuggestError::BackendCall(format!("{e:#}"))))
        .map_err(|e| {
            warn!("Error en /api/v1/resources/mesh: {e}");
            suggest_error(&e)
        })?;

    Ok(Json(MeshResponse { splits, data }))
}

#[axum::debug_handler]
async fn status_handler(State(state): State<AppState>) -> Json<Status> {
    let model = state.backends.model_state();
    Json(Status {
        model_loaded: model.is_loaded(),
        model_error: model.error().map(str::to_string),
        backends: state.backends.available(),
        active_sessions: state.sessions.len(),
    })
}

#[axum::debug_handler]
async fn create_session_handler(State(state): State<AppState>) -> impl IntoResponse {
    let id = state.sessions.create();
    info!("Sesión creada: {id}");
    (StatusCode::CREATED, Json(json!({ "session_id": id })))
}

#[axum::debug_handler]
async fn get_session_handler(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Session>, ApiError> {
    state
        .sessions
        .get(&id)
        .map(Json)
        .ok_or_else(|| session_not_found(&id))
}

#[axum::debug_handler]
async fn delete_session_handler(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    if state.sessions.remove(&id) {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(session_not_found(&id))
    }
}

#[axum::debug_handler]
async fn parse_handler(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<ParsePayload>,
) -> Result<Json<ParseResponse>, ApiError> {
    let groups = state
        .sessions
        .update(&id, |session| session.parse(&payload.query).to_vec())
        .ok_or_else(|| session_not_found(&id))?;
    Ok(Json(ParseResponse { groups }))
}

/// Los grupos se copian fuera del candado; la llamada al backend se hace
/// sin bloquear la sesión.
#[axum::debug_handler]
async fn suggest_handler(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<SuggestPayload>,
) -> Result<Json<Suggestions>, ApiError> {
    let kind = parse_backend(&payload.method)?;
    let groups = state
        .sessions
        .get(&id)
        .map(|session| session.groups)
        .ok_or_else(|| session_not_found(&id))?;

    let result = aggregator::suggest(
        &groups,
        kind,
        &state.backends,
        state.config.backend_timeout,
    )
    .await;

    match result {
        Ok(suggestions) => {
            state
                .sessions
                .update(&id, |session| session.set_suggestions(suggestions.clone()))
                .ok_or_else(|| session_not_found(&id))?;
            Ok(Json(suggestions))
        }
        Err(err) => {
            warn!("Sugerencia fallida en la sesión {id}: {err}");
            state.sessions.update(&id, Session::discard_suggestions);
            Err(suggest_error(&err))
        }
    }
}

#[axum::debug_handler]
async fn get_builder_handler(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<BuilderPayload>, ApiError> {
    let query = state
        .sessions
        .get(&id)
        .map(|session| session.builder)
        .ok_or_else(|| session_not_found(&id))?;
    Ok(Json(BuilderPayload { query }))
}

#[axum::debug_handler]
async fn set_builder_handler(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<BuilderPayload>,
) -> Result<Json<BuilderPayload>, ApiError> {
    state
        .sessions
        .update(&id, |session| session.set_builder(&payload.query))
        .ok_or_else(|| session_not_found(&id))?;
    Ok(Json(payload))
}

#[axum::debug_handler]
async fn add_to_builder_handler(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<AddPayload>,
) -> Result<Json<BuilderPayload>, ApiError> {
    let query = state
        .sessions
        .update(&id, |session| session.add_selection(&payload.selected).to_string())
        .ok_or_else(|| session_not_found(&id))?;
    Ok(Json(BuilderPayload { query }))
}

#[axum::debug_handler]
async fn clear_handler(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Session>, ApiError> {
    state
        .sessions
        .update(&id, |session| {
            session.clear();
            session.clone()
        })
        .map(Json)
        .ok_or_else(|| session_not_found(&id))
}

async fn not_found_handler() -> impl IntoResponse {
    (StatusCode::NOT_FOUND, Html(NOT_FOUND_BODY))
}
