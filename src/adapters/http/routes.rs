//! Axum routes for the turn API.

use axum::routing::post;
use axum::Router;

use super::handlers::{advance_conversation, start_conversation, TurnAppState};

/// Creates the turn API router.
///
/// Endpoints:
/// - POST /start_conversation - open a conversation, get the first prompt
/// - POST /conversation - advance with one user utterance
pub fn turn_router() -> Router<TurnAppState> {
    Router::new()
        .route("/start_conversation", post(start_conversation))
        .route("/conversation", post(advance_conversation))
}
