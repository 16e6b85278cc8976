//! Error types for the turn pipeline.
//!
//! Only hard failures are modeled as errors. Recoverable conversation
//! outcomes (a validation rule rejecting an answer, an extraction with no
//! catalog match, an unclassifiable intent) are ordinary return values of
//! the pipeline and never abort a turn.

use thiserror::Error;

/// Hard failures that abort the current turn without persisting state.
#[derive(Debug, Error)]
pub enum EngineError {
    /// A referenced catalog entity is missing. Fatal configuration error.
    #[error("{kind} '{name}' not found in catalog")]
    ConfigNotFound { kind: &'static str, name: String },

    /// A flow's parameter chain revisited a node within the traversal bound.
    /// Fatal configuration error.
    #[error("parameter chain of flow '{0}' does not terminate")]
    CyclicChain(String),

    /// A collaborator call failed: non-success API response, extraction
    /// backend error or timeout, or a derivation script timing out.
    #[error("external call failed: {0}")]
    ExternalCall(String),

    /// A catalog entity exists but is unusable (e.g. a malformed regex).
    /// Fatal configuration error.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// The session store could not be read or written.
    #[error("session store failure: {0}")]
    Store(String),
}

impl EngineError {
    /// Creates a missing-catalog-entry error.
    pub fn not_found(kind: &'static str, name: impl Into<String>) -> Self {
        EngineError::ConfigNotFound {
            kind,
            name: name.into(),
        }
    }

    /// Creates an external-call failure.
    pub fn external(message: impl Into<String>) -> Self {
        EngineError::ExternalCall(message.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_not_found_names_the_entity() {
        let err = EngineError::not_found("flow", "scheduling");
        assert_eq!(err.to_string(), "flow 'scheduling' not found in catalog");
    }

    #[test]
    fn external_call_carries_reason() {
        let err = EngineError::external("status 503");
        assert!(err.to_string().contains("503"));
    }
}
