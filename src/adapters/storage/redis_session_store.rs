//! Redis Session Store Adapter
//!
//! Persists session state as JSON under a `conversation:` key prefix with
//! a per-save expiry, so abandoned conversations age out of the store on
//! their own.

use async_trait::async_trait;
use redis::AsyncCommands;
use std::time::Duration;

use crate::domain::session::SessionState;
use crate::ports::{SessionStore, SessionStoreError};

const KEY_PREFIX: &str = "conversation:";

/// Redis-backed session store
pub struct RedisSessionStore {
    client: redis::Client,
}

impl RedisSessionStore {
    /// Create a store for the given Redis URL.
    ///
    /// # Errors
    /// Returns `SessionStoreError::Connection` if the URL is malformed.
    pub fn new(url: &str) -> Result<Self, SessionStoreError> {
        let client = redis::Client::open(url)
            .map_err(|e| SessionStoreError::Connection(e.to_string()))?;
        Ok(Self { client })
    }

    fn key(session_id: &str) -> String {
        format!("{}{}", KEY_PREFIX, session_id)
    }

    async fn connection(&self) -> Result<redis::aio::MultiplexedConnection, SessionStoreError> {
        self.client
            .get_multiplexed_tokio_connection()
            .await
            .map_err(|e| SessionStoreError::Connection(e.to_string()))
    }
}

#[async_trait]
impl SessionStore for RedisSessionStore {
    async fn load(&self, session_id: &str) -> Result<Option<SessionState>, SessionStoreError> {
        let mut conn = self.connection().await?;
        let raw: Option<String> = conn
            .get(Self::key(session_id))
            .await
            .map_err(|e| SessionStoreError::Connection(e.to_string()))?;

        match raw {
            None => Ok(None),
            Some(json) => serde_json::from_str(&json)
                .map(Some)
                .map_err(|e| SessionStoreError::Deserialization(e.to_string())),
        }
    }

    async fn save(
        &self,
        session_id: &str,
        state: &SessionState,
        ttl: Duration,
    ) -> Result<(), SessionStoreError> {
        let json = serde_json::to_string(state)
            .map_err(|e| SessionStoreError::Serialization(e.to_string()))?;

        let mut conn = self.connection().await?;
        conn.set_ex(Self::key(session_id), json, ttl.as_secs())
            .await
            .map_err(|e| SessionStoreError::Connection(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_are_prefixed_per_conversation() {
        assert_eq!(RedisSessionStore::key("abc-123"), "conversation:abc-123");
    }

    #[test]
    fn malformed_url_is_a_connection_error() {
        let result = RedisSessionStore::new("not-a-redis-url");
        assert!(matches!(result, Err(SessionStoreError::Connection(_))));
    }

    #[test]
    fn valid_url_constructs_a_client() {
        assert!(RedisSessionStore::new("redis://localhost:6379").is_ok());
    }
}
