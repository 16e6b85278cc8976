//! Rhai Script Engine - capability-restricted derivation evaluator.
//!
//! Scripts run in a fresh [Rhai](https://rhai.rs) engine whose only input
//! is the `snapshot` constant holding a copy of the conversation context.
//! There is no filesystem, network, or process access to restrict: a
//! default Rhai engine exposes none. Runaway scripts are stopped two ways:
//! an operation cap inside the engine, and a wall-clock timeout around the
//! blocking task. The cap also bounds the worker thread itself after the
//! timeout has already failed the turn.

use async_trait::async_trait;
use serde_json::{Map, Value};
use std::time::Duration;

use crate::domain::catalog::ScriptDef;
use crate::ports::{ScriptEngine, ScriptError};

const MAX_OPERATIONS: u64 = 100_000;

/// Rhai-backed implementation of the script engine port.
pub struct RhaiScriptEngine {
    timeout: Duration,
}

impl RhaiScriptEngine {
    /// Creates an engine with the default one-second time budget.
    pub fn new() -> Self {
        Self {
            timeout: Duration::from_secs(1),
        }
    }

    /// Overrides the time budget.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

impl Default for RhaiScriptEngine {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ScriptEngine for RhaiScriptEngine {
    async fn eval(
        &self,
        script: &ScriptDef,
        snapshot: &Map<String, Value>,
    ) -> Result<Value, ScriptError> {
        let name = script.name.clone();
        let source = script.source.clone();
        let snapshot = snapshot.clone();

        let task_name = name.clone();
        let task = tokio::task::spawn_blocking(move || {
            let eval_err = |message: String| ScriptError::Eval {
                name: task_name.clone(),
                message,
            };

            let mut engine = rhai::Engine::new();
            engine.set_max_operations(MAX_OPERATIONS);

            let snapshot_dynamic = rhai::serde::to_dynamic(&snapshot)
                .map_err(|e| eval_err(e.to_string()))?;

            let mut scope = rhai::Scope::new();
            scope.push_constant("snapshot", snapshot_dynamic);

            let result = engine
                .eval_with_scope::<rhai::Dynamic>(&mut scope, &source)
                .map_err(|e| eval_err(e.to_string()))?;

            rhai::serde::from_dynamic::<Value>(&result).map_err(|e| eval_err(e.to_string()))
        });

        match tokio::time::timeout(self.timeout, task).await {
            Err(_) => Err(ScriptError::Timeout { name }),
            Ok(Err(join_err)) => Err(ScriptError::Eval {
                name,
                message: join_err.to_string(),
            }),
            Ok(Ok(result)) => result,
        }
    }
}
