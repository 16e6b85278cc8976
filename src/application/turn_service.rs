//! Turn service - serializes turns per session.
//!
//! Distinct sessions run concurrently, but two racing requests for the
//! same session id would read the same stored state and silently lose one
//! turn's mutations. The service holds a per-session advisory lock for the
//! duration of each turn, released on completion or abort.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

use crate::domain::dialogue::{TurnOrchestrator, TurnReply};

/// Entry point used by transport adapters: one call per user turn.
pub struct TurnService {
    orchestrator: TurnOrchestrator,
    // TODO: prune lock entries once their sessions expire from the store.
    locks: Mutex<HashMap<String, Arc<AsyncMutex<()>>>>,
}

impl TurnService {
    /// Wraps an orchestrator with per-session turn serialization.
    pub fn new(orchestrator: TurnOrchestrator) -> Self {
        Self {
            orchestrator,
            locks: Mutex::new(HashMap::new()),
        }
    }

    /// Begins (or resumes) a conversation.
    pub async fn start(&self, session_id: &str) -> TurnReply {
        let _turn_guard = self.session_lock(session_id).await;
        self.orchestrator.start(session_id).await
    }

    /// Feeds one utterance through the turn pipeline.
    pub async fn advance(&self, session_id: &str, user_input: &str) -> TurnReply {
        let _turn_guard = self.session_lock(session_id).await;
        self.orchestrator.advance(session_id, user_input).await
    }

    async fn session_lock(&self, session_id: &str) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock().expect("session lock map poisoned");
            Arc::clone(
                locks
                    .entry(session_id.to_string())
                    .or_insert_with(|| Arc::new(AsyncMutex::new(()))),
            )
        };
        lock.lock_owned().await
    }
}
