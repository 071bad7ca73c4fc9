//! REST API handlers for the host agent
//!
//! Thin translation between HTTP and the [`Orchestrator`] facade. Agent
//! failures come back as `200` with `"status": "failure"`; only orchestrator
//! errors map to error status codes.

use axum::{
    extract::{Multipart, Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;

use crate::adapters::metrics_handler::MetricsCollector;
use crate::domain::{AgentDescriptor, Attachment, DispatchResult};
use crate::error::OrchestratorError;
use crate::orchestration::Orchestrator;

/// Shared application state for API handlers
#[derive(Clone)]
pub struct ApiState {
    pub orchestrator: Arc<Orchestrator>,
    pub metrics: Arc<MetricsCollector>,
}

// ============================================================================
// Errors
// ============================================================================

/// Orchestrator error rendered as a JSON body with a matching status code
#[derive(Debug)]
pub struct ApiError(OrchestratorError);

impl From<OrchestratorError> for ApiError {
    fn from(error: OrchestratorError) -> Self {
        Self(error)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            OrchestratorError::Validation(_) | OrchestratorError::Attachment(_) => {
                StatusCode::BAD_REQUEST
            }
            OrchestratorError::SessionNotFound(_) => StatusCode::NOT_FOUND,
            OrchestratorError::Configuration(_) | OrchestratorError::Internal(_) => {
                tracing::error!("Request failed: {}", self.0);
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        let body = Json(json!({
            "status": "error",
            "error": self.0.to_string(),
            "timestamp": Utc::now(),
        }));
        (status, body).into_response()
    }
}

type ApiResult<T> = Result<T, ApiError>;

fn not_found(session_id: &str) -> ApiError {
    ApiError(OrchestratorError::SessionNotFound(session_id.to_string()))
}

// ============================================================================
// Request / Response Types
// ============================================================================

#[derive(Debug, Default, Deserialize)]
pub struct UserQuery {
    pub user_id: Option<String>,
}

#[derive(Serialize)]
pub struct AgentsStatusResponse {
    pub status: &'static str,
    pub agents: Vec<AgentDescriptor>,
    pub total: usize,
    pub timestamp: chrono::DateTime<Utc>,
}

/// Parsed `POST /chat` form
#[derive(Debug, Default)]
struct ChatForm {
    message: String,
    user_id: Option<String>,
    session_id: Option<String>,
    files: Vec<Attachment>,
}

fn bad_request(reason: impl std::fmt::Display) -> ApiError {
    ApiError(OrchestratorError::Validation(reason.to_string()))
}

impl ChatForm {
    async fn read(mut multipart: Multipart) -> ApiResult<Self> {
        let mut form = ChatForm::default();

        while let Some(field) = multipart.next_field().await.map_err(bad_request)? {
            let name = field.name().unwrap_or_default().to_string();
            match name.as_str() {
                "message" => form.message = field.text().await.map_err(bad_request)?,
                "user_id" => form.user_id = Some(field.text().await.map_err(bad_request)?),
                "session_id" => form.session_id = Some(field.text().await.map_err(bad_request)?),
                "files" => {
                    // Empty file inputs arrive without a filename
                    let Some(filename) = field.file_name().map(str::to_string) else {
                        continue;
                    };
                    if filename.trim().is_empty() {
                        continue;
                    }
                    let content_type = field.content_type().map(str::to_string);
                    let bytes = field.bytes().await.map_err(bad_request)?;
                    form.files.push(Attachment::from_upload(
                        &bytes,
                        Some(&filename),
                        content_type.as_deref(),
                    ).map_err(OrchestratorError::from)?);
                }
                other => tracing::debug!(field = %other, "Ignoring unknown form field"),
            }
        }

        Ok(form)
    }
}

// ============================================================================
// Endpoints
// ============================================================================

/// GET / - Service banner
pub async fn root() -> impl IntoResponse {
    Json(json!({
        "message": "Host Agent API",
        "version": env!("CARGO_PKG_VERSION"),
        "status": "running",
        "timestamp": Utc::now(),
    }))
}

/// POST /chat - Dispatch a message (multipart: message, user_id, session_id, files)
pub async fn chat(
    State(state): State<ApiState>,
    multipart: Multipart,
) -> ApiResult<Json<DispatchResult>> {
    let form = ChatForm::read(multipart).await?;
    tracing::info!(
        files = form.files.len(),
        session_id = ?form.session_id,
        "Received chat message"
    );

    let _in_flight = state.metrics.in_flight();
    let result = state
        .orchestrator
        .process_message_with_files(
            &form.message,
            form.user_id.as_deref(),
            form.session_id.as_deref(),
            form.files,
        )
        .await;

    Ok(Json(result?))
}

/// GET /agents/status - Probe every agent and report its state
pub async fn agents_status(State(state): State<ApiState>) -> impl IntoResponse {
    state.orchestrator.check_agents_health().await;
    let agents = state.orchestrator.get_all_agents_status().await;

    Json(AgentsStatusResponse {
        status: "success",
        total: agents.len(),
        agents,
        timestamp: Utc::now(),
    })
}

/// GET /sessions/:id/history - Last page of a session's messages
pub async fn get_history(
    State(state): State<ApiState>,
    Path(session_id): Path<String>,
    Query(query): Query<UserQuery>,
) -> ApiResult<impl IntoResponse> {
    let page = state
        .orchestrator
        .get_history_page(query.user_id.as_deref(), &session_id)
        .await?
        .ok_or_else(|| not_found(&session_id))?;

    Ok(Json(json!({
        "status": "success",
        "session_id": page.session_id,
        "user_id": page.user_id,
        "messages": page.messages,
        "created_at": page.created_at,
        "last_updated": page.last_updated,
        "total_messages": page.total_messages,
    })))
}

/// DELETE /sessions/:id/history - Clear a session's messages
pub async fn clear_history(
    State(state): State<ApiState>,
    Path(session_id): Path<String>,
    Query(query): Query<UserQuery>,
) -> ApiResult<impl IntoResponse> {
    if !state
        .orchestrator
        .clear_chat_history(query.user_id.as_deref(), &session_id)
        .await?
    {
        return Err(not_found(&session_id));
    }

    Ok(Json(json!({
        "status": "success",
        "message": format!("Chat history for session {} cleared", session_id),
        "timestamp": Utc::now(),
    })))
}

/// POST /sessions/create - Start a new session (optionally `?user_id=`)
pub async fn create_session(
    State(state): State<ApiState>,
    Query(query): Query<UserQuery>,
) -> ApiResult<impl IntoResponse> {
    let session_id = match query.user_id.as_deref().filter(|u| !u.trim().is_empty()) {
        Some(user_id) => state.orchestrator.create_user_session(user_id).await?,
        None => state.orchestrator.create_session().await?,
    };

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "status": "success",
            "session_id": session_id,
            "timestamp": Utc::now(),
        })),
    ))
}

/// GET /sessions - Summaries of every session
pub async fn list_sessions(State(state): State<ApiState>) -> ApiResult<impl IntoResponse> {
    let sessions = state.orchestrator.list_sessions().await?;

    Ok(Json(json!({
        "status": "success",
        "total": sessions.len(),
        "sessions": sessions,
        "timestamp": Utc::now(),
    })))
}

/// GET /users/:user_id/sessions - Summaries of one user's sessions
pub async fn user_sessions(
    State(state): State<ApiState>,
    Path(user_id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    let sessions = state.orchestrator.user_session_summaries(&user_id).await?;

    Ok(Json(json!({
        "status": "success",
        "user_id": user_id,
        "total": sessions.len(),
        "sessions": sessions,
        "timestamp": Utc::now(),
    })))
}

/// DELETE /sessions/:id - Forget a session entirely
pub async fn delete_session(
    State(state): State<ApiState>,
    Path(session_id): Path<String>,
    Query(query): Query<UserQuery>,
) -> ApiResult<impl IntoResponse> {
    if !state
        .orchestrator
        .delete_session(query.user_id.as_deref(), &session_id)
        .await?
    {
        return Err(not_found(&session_id));
    }

    Ok(Json(json!({
        "status": "success",
        "message": format!("Session {} deleted", session_id),
        "timestamp": Utc::now(),
    })))
}
