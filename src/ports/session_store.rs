//! Session Store Port - persistence for per-conversation state.

use async_trait::async_trait;
use std::time::Duration;

use crate::domain::session::SessionState;

/// Errors that can occur during session store operations
#[derive(Debug, thiserror::Error)]
pub enum SessionStoreError {
    #[error("store connection failure: {0}")]
    Connection(String),

    #[error("failed to serialize session state: {0}")]
    Serialization(String),

    #[error("failed to deserialize session state: {0}")]
    Deserialization(String),
}

/// Port for loading and saving session state.
///
/// Entries expire from the store after the time-to-live passed to `save`;
/// an expired or never-written session loads as `None`.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Load the state for a session id.
    ///
    /// # Errors
    /// Returns `SessionStoreError` on connection or decode failure. An
    /// absent session is `Ok(None)`, not an error.
    async fn load(&self, session_id: &str) -> Result<Option<SessionState>, SessionStoreError>;

    /// Save the state for a session id with the given time-to-live.
    ///
    /// # Errors
    /// Returns `SessionStoreError` if the write fails.
    async fn save(
        &self,
        session_id: &str,
        state: &SessionState,
        ttl: Duration,
    ) -> Result<(), SessionStoreError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_messages_name_the_failure() {
        let err = SessionStoreError::Connection("refused".to_string());
        assert!(err.to_string().contains("refused"));

        let err = SessionStoreError::Deserialization("bad json".to_string());
        assert!(err.to_string().contains("deserialize"));
    }
}
