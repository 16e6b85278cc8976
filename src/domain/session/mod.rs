//! Session state - the per-conversation persisted aggregate.

mod state;

pub use state::{SessionState, SessionStatus};
