//! HTTP adapter - exposes conversation turns as JSON endpoints.

mod dto;
mod handlers;
mod routes;

pub use dto::{AdvanceRequest, ErrorResponse, StartRequest, TurnResponse};
pub use handlers::{advance_conversation, start_conversation, TurnAppState};
pub use routes::turn_router;
