//! HTTP handlers for the turn endpoints.
//!
//! These handlers connect Axum routes to the turn service. The engine
//! itself never surfaces raw errors, so the handlers only reject
//! malformed requests.

use std::sync::Arc;

use axum::extract::{Json, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;

use crate::application::TurnService;

use super::dto::{AdvanceRequest, ErrorResponse, StartRequest, TurnResponse};

/// Shared application state for turn handlers.
#[derive(Clone)]
pub struct TurnAppState {
    pub turns: Arc<TurnService>,
}

impl TurnAppState {
    /// Creates the handler state.
    pub fn new(turns: Arc<TurnService>) -> Self {
        Self { turns }
    }
}

/// POST /start_conversation - open a conversation and get the first prompt.
///
/// # Errors
/// - 400 Bad Request: empty `sessionId`
pub async fn start_conversation(
    State(state): State<TurnAppState>,
    Json(request): Json<StartRequest>,
) -> impl IntoResponse {
    if request.session_id.trim().is_empty() {
        return bad_request("sessionId is required");
    }

    let reply = state.turns.start(&request.session_id).await;
    (StatusCode::OK, Json(TurnResponse::from(reply))).into_response()
}

/// POST /conversation - advance a conversation with one utterance.
///
/// # Errors
/// - 400 Bad Request: empty `sessionId` or `userInput`
pub async fn advance_conversation(
    State(state): State<TurnAppState>,
    Json(request): Json<AdvanceRequest>,
) -> impl IntoResponse {
    if request.session_id.trim().is_empty() {
        return bad_request("sessionId is required");
    }
    if request.user_input.trim().is_empty() {
        return bad_request("userInput is required");
    }

    let reply = state
        .turns
        .advance(&request.session_id, &request.user_input)
        .await;
    (StatusCode::OK, Json(TurnResponse::from(reply))).into_response()
}

fn bad_request(message: &str) -> axum::response::Response {
    (
        StatusCode::BAD_REQUEST,
        Json(ErrorResponse {
            error: message.to_string(),
        }),
    )
        .into_response()
}
