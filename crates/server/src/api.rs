//! JSON API routes for the drafting conversation.
//!
//! Endpoints:
//! - `POST /api/send-message`      — run the drafting pipeline, reply with
//!   normalized messages `[{message, timestamp}, ...]`
//! - `POST /api/generate-document` — annotate existing content with an
//!   instruction note (no agent invocation)

use std::sync::Arc;

use axum::{extract::State, http::StatusCode, routing::post, Json, Router};
use deedcraft_agent::AgentPipeline;
use deedcraft_core::normalize;
use deedcraft_core::session::{event_timestamp, InteractionEvent, SessionId, SessionStore};
use serde::{Deserialize, Serialize};
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, info};

#[derive(Clone)]
pub struct ApiState {
    pub store: SessionStore,
    pub session_id: SessionId,
    pub pipeline: Arc<dyn AgentPipeline>,
}

#[derive(Debug, Deserialize)]
pub struct SendMessageRequest {
    #[serde(default)]
    pub message: String,
}

#[derive(Debug, PartialEq, Eq, Serialize)]
pub struct ChatMessage {
    pub message: String,
    pub timestamp: String,
}

#[derive(Debug, Deserialize)]
pub struct GenerateDocumentRequest {
    #[serde(default)]
    pub instruction: String,
    #[serde(default)]
    pub content: String,
}

#[derive(Debug, PartialEq, Eq, Serialize)]
pub struct GenerateDocumentResponse {
    pub content: String,
}

#[derive(Debug, Serialize)]
pub struct ApiError {
    pub error: String,
}

pub fn router(state: ApiState) -> Router {
    let cors = CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any);

    Router::new()
        .route("/api/send-message", post(send_message))
        .route("/api/generate-document", post(generate_document))
        .layer(cors)
        .with_state(state)
}

pub async fn send_message(
    State(state): State<ApiState>,
    Json(request): Json<SendMessageRequest>,
) -> Result<Json<Vec<ChatMessage>>, (StatusCode, Json<ApiError>)> {
    state
        .store
        .append_event(
            &state.session_id,
            InteractionEvent::UserQuery {
                query: request.message.clone(),
                timestamp: event_timestamp(),
            },
        )
        .map_err(|err| internal_error(&state.session_id, &err.to_string()))?;

    let raw = state.pipeline.run(&state.session_id, &request.message).await.map_err(|err| {
        error!(
            event_name = "api.send_message.pipeline_failed",
            session_id = %state.session_id,
            error = %err,
            "drafting pipeline failed"
        );
        internal_error(&state.session_id, "agent pipeline failed")
    })?;

    let messages: Vec<ChatMessage> = normalize::split_responses(Some(&raw))
        .into_iter()
        .map(|message| ChatMessage { message, timestamp: String::new() })
        .collect();

    info!(
        event_name = "api.send_message.responded",
        session_id = %state.session_id,
        message_count = messages.len(),
        "returning normalized agent messages"
    );

    Ok(Json(messages))
}

pub async fn generate_document(
    Json(request): Json<GenerateDocumentRequest>,
) -> Json<GenerateDocumentResponse> {
    let content = format!("{}\n\n✍️ AI-generated note: {}", request.content, request.instruction);
    Json(GenerateDocumentResponse { content })
}

fn internal_error(session_id: &SessionId, message: &str) -> (StatusCode, Json<ApiError>) {
    error!(
        event_name = "api.internal_error",
        session_id = %session_id,
        error = message,
        "request failed"
    );
    (StatusCode::INTERNAL_SERVER_ERROR, Json(ApiError { error: message.to_string() }))
}
