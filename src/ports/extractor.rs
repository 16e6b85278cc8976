//! Extractor Port - interface to the natural-language extraction backend.

use async_trait::async_trait;
use serde_json::{Map, Value};
use std::time::Duration;

/// Errors that can occur while calling the extraction backend
#[derive(Debug, thiserror::Error)]
pub enum ExtractorError {
    #[error("extraction request failed: {0}")]
    Network(String),

    #[error("extraction timed out after {0:?}")]
    Timeout(Duration),

    #[error("extraction backend returned status {0}")]
    Status(u16),
}

/// Port for structured extraction over free-text utterances.
///
/// The backend receives a rendered prompt, the raw utterance, and the
/// current conversation context, and replies with a JSON object. The
/// pipeline interprets that object; implementations only transport it.
#[async_trait]
pub trait Extractor: Send + Sync {
    /// Run one extraction call.
    ///
    /// # Returns
    /// The parsed JSON payload, or `None` when the model response was
    /// unusable (callers treat `None` as an external-call failure).
    ///
    /// # Errors
    /// Returns `ExtractorError` on transport failures and timeouts.
    async fn extract(
        &self,
        prompt: &str,
        utterance: &str,
        context: &Map<String, Value>,
    ) -> Result<Option<Value>, ExtractorError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timeout_error_reports_duration() {
        let err = ExtractorError::Timeout(Duration::from_secs(30));
        assert!(err.to_string().contains("30"));
    }

    #[test]
    fn status_error_reports_code() {
        let err = ExtractorError::Status(429);
        assert!(err.to_string().contains("429"));
    }
}
