//! Session state aggregate.
//!
//! One `SessionState` exists per conversation. It is loaded at the start of
//! a turn, mutated in memory by exactly one in-flight turn, and persisted
//! only when the turn completes successfully or ends in a recoverable
//! validation failure.
//!
//! # Invariants
//!
//! - `current_parameter`, when set, names a parameter of `current_flow` and
//!   is not yet marked collected.
//! - `status` is `AwaitingIntent` until a flow is seeded, `Collecting`
//!   while parameters remain, `Done` once the resolver reports completion
//!   or a single-shot intent fires.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Conversation lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    /// No flow chosen yet; the next utterance is classified as an intent.
    AwaitingIntent,
    /// A flow is active and parameters are being collected.
    Collecting,
    /// The flow completed (or a single-shot intent fired).
    Done,
}

/// Per-conversation persisted state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionState {
    /// Markers for satisfied parameters, including derived `<name>_id` keys.
    #[serde(rename = "collected_params")]
    pub collected: BTreeMap<String, bool>,

    /// Raw answers, fetched reference payloads, and derived values.
    pub context: Map<String, Value>,

    /// Active flow name, once an intent is chosen.
    pub current_flow: Option<String>,

    /// Parameter currently being asked about.
    pub current_parameter: Option<String>,

    /// Lifecycle status.
    pub status: SessionStatus,
}

impl SessionState {
    /// Creates the state for a brand-new conversation.
    pub fn new() -> Self {
        Self {
            collected: BTreeMap::new(),
            context: Map::new(),
            current_flow: None,
            current_parameter: None,
            status: SessionStatus::AwaitingIntent,
        }
    }

    /// Returns true when `name` (or its `_id` variant) is marked collected.
    pub fn is_collected(&self, name: &str) -> bool {
        self.collected.contains_key(name) || self.collected.contains_key(&format!("{}_id", name))
    }

    /// Marks one key as collected.
    pub fn mark_collected(&mut self, name: impl Into<String>) {
        self.collected.insert(name.into(), true);
    }

    /// Removes a parameter's collected markers (plain and `_id` variant)
    /// and its corresponding context entries.
    pub fn clear_parameter(&mut self, name: &str) {
        let id_key = format!("{}_id", name);
        self.collected.remove(name);
        self.collected.remove(&id_key);
        self.context.remove(name);
        self.context.remove(&id_key);
    }

    /// Writes a context value.
    pub fn set_context(&mut self, key: impl Into<String>, value: Value) {
        self.context.insert(key.into(), value);
    }

    /// Seeds a freshly chosen flow: records the intent marker, points at the
    /// flow's first parameter, and enters `Collecting`.
    pub fn seed_flow(&mut self, flow_name: &str, initial_parameter: &str) {
        self.collected.insert("intent".to_string(), true);
        self.context
            .insert("intent".to_string(), Value::String(flow_name.to_string()));
        self.current_flow = Some(flow_name.to_string());
        self.current_parameter = Some(initial_parameter.to_string());
        self.status = SessionStatus::Collecting;
    }

    /// Discards all prior answers and reference data, keeping nothing.
    ///
    /// Used on a mid-conversation intent switch: identifiers scoped to the
    /// old flow would be meaningless under the new one.
    pub fn reset_for_switch(&mut self) {
        self.collected.clear();
        self.context.clear();
        self.current_flow = None;
        self.current_parameter = None;
        self.status = SessionStatus::AwaitingIntent;
    }

    /// Context entries whose keys are marked collected - the externally
    /// visible `collected_params` view.
    pub fn collected_view(&self) -> Map<String, Value> {
        self.collected
            .keys()
            .filter_map(|k| self.context.get(k).map(|v| (k.clone(), v.clone())))
            .collect()
    }
}

impl Default for SessionState {
    fn default() -> Self {
        Self::new()
    }
}
