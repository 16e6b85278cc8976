//! Script Engine Port - interface to the derivation evaluator.

use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::domain::catalog::ScriptDef;

/// Errors that can occur while evaluating a derivation
#[derive(Debug, thiserror::Error)]
pub enum ScriptError {
    #[error("script '{name}' failed: {message}")]
    Eval { name: String, message: String },

    #[error("script '{name}' exceeded its time budget")]
    Timeout { name: String },
}

/// Port for evaluating pre-declared derivation scripts.
///
/// Implementations must be capability-restricted: the script sees only the
/// context snapshot it is handed and runs under a hard time bound. It can
/// never reach the filesystem, the network, or other process state.
#[async_trait]
pub trait ScriptEngine: Send + Sync {
    /// Evaluate `script` against a snapshot of the conversation context.
    ///
    /// # Errors
    /// Evaluation errors and timeouts both abort the turn; callers treat
    /// them as external-call failures.
    async fn eval(
        &self,
        script: &ScriptDef,
        snapshot: &Map<String, Value>,
    ) -> Result<Value, ScriptError>;
}
