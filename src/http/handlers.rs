use super::state::AppState;
use crate::router::RoutingResult;
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json},
};
use serde::{Deserialize, Serialize};
use tracing::{error, info};

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    /// Text to route
    pub content: String,
    /// Conversational space to search
    pub space: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ChatResponse {
    pub answer: String,
    pub action: String,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

impl From<RoutingResult> for ChatResponse {
    fn from(result: RoutingResult) -> Self {
        match result {
            RoutingResult::Answer(answer) => Self {
                answer,
                action: String::new(),
            },
            RoutingResult::Action(action) => Self {
                answer: String::new(),
                action,
            },
            RoutingResult::NoMatch { reply } => Self {
                answer: reply,
                action: String::new(),
            },
        }
    }
}

/// POST /chat
/// Route text to a cached answer/action pair
pub async fn chat(
    State(state): State<AppState>,
    Json(req): Json<ChatRequest>,
) -> impl IntoResponse {
    info!("Chat request in space '{}'", req.space);

    match state.router.route(&req.content, &req.space).await {
        Ok(result) => (StatusCode::OK, Json(ChatResponse::from(result))).into_response(),
        Err(e) => {
            // Internal detail stays in the logs, never in the response body
            error!("Routing failed: {:#}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse {
                    error: "routing service unavailable".to_string(),
                }),
            )
                .into_response()
        }
    }
}

/// GET /health
/// Health check endpoint
pub async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}
