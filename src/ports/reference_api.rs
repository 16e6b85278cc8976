//! Reference API Port - interface to the reference-data backend.

use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::domain::catalog::ApiDescriptor;

/// Errors that can occur while calling a reference-data API
#[derive(Debug, thiserror::Error)]
pub enum ReferenceApiError {
    #[error("request to '{api}' failed: {message}")]
    Network { api: String, message: String },

    #[error("'{api}' returned status {status}")]
    Status { api: String, status: u16 },

    #[error("token exchange for '{api}' failed: {message}")]
    Auth { api: String, message: String },

    #[error("'{api}' returned an undecodable payload: {message}")]
    Decode { api: String, message: String },
}

/// Port for invoking declared reference-data endpoints.
///
/// Implementations honor the descriptor's method, endpoint, and static
/// headers, and perform the OAuth2 client-credentials exchange when the
/// descriptor carries an auth block.
#[async_trait]
pub trait ReferenceApi: Send + Sync {
    /// Invoke the endpoint described by `descriptor`.
    ///
    /// `query` values are appended as URL query parameters; `body` values
    /// are sent as the JSON request body.
    ///
    /// # Errors
    /// Any non-success response is `ReferenceApiError::Status`.
    async fn call(
        &self,
        descriptor: &ApiDescriptor,
        query: &Map<String, Value>,
        body: &Map<String, Value>,
    ) -> Result<Value, ReferenceApiError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_error_names_api_and_code() {
        let err = ReferenceApiError::Status {
            api: "branches".to_string(),
            status: 503,
        };
        let msg = err.to_string();
        assert!(msg.contains("branches"));
        assert!(msg.contains("503"));
    }
}
