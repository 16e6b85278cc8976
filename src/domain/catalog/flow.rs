//! Flow and parameter definitions.
//!
//! A flow is a named, singly linked chain of parameters representing one
//! conversational goal. Each parameter carries a question template plus the
//! ordered steps run before the question is asked and after it is answered.

use serde::Deserialize;
use std::collections::HashMap;

use super::step::Step;

/// A named conversational goal with its parameter chain.
#[derive(Debug, Clone, Deserialize)]
pub struct Flow {
    /// Flow name, unique within the catalog.
    pub name: String,

    /// Human description, shown to the intent classifier.
    pub description: String,

    /// First parameter of the chain. Absent for single-shot intents.
    #[serde(default)]
    pub initial_parameter: Option<String>,

    /// Parameter definitions keyed by name.
    #[serde(default)]
    pub parameters: HashMap<String, Parameter>,

    /// Message returned when the flow completes (or immediately, for
    /// single-shot intents). Supports `{placeholder}` substitution.
    #[serde(default)]
    pub final_message: Option<String>,

    /// Steps run once the resolver reports completion, before the final
    /// message is rendered. Typically the terminal business API call.
    #[serde(default)]
    pub final_action: Vec<Step>,
}

impl Flow {
    /// Returns true when the flow has no parameters to collect.
    pub fn is_single_shot(&self) -> bool {
        self.initial_parameter.is_none()
    }

    /// Looks up a parameter by name.
    pub fn parameter(&self, name: &str) -> Option<&Parameter> {
        self.parameters.get(name)
    }

    /// Number of parameters in the flow, used to bound chain traversal.
    pub fn parameter_count(&self) -> usize {
        self.parameters.len()
    }

    /// Parameter names in linked order, starting at `initial_parameter`.
    ///
    /// Traversal stops at the chain end or after `parameter_count()` hops,
    /// so a misconfigured cyclic chain yields a bounded prefix rather than
    /// looping forever.
    pub fn chain(&self) -> Vec<&str> {
        let mut order = Vec::new();
        let mut cursor = self.initial_parameter.as_deref();
        while let Some(name) = cursor {
            if order.len() >= self.parameter_count() {
                break;
            }
            order.push(name);
            cursor = self
                .parameters
                .get(name)
                .and_then(|p| p.next_parameter.as_deref());
        }
        order
    }
}

/// One piece of information to collect.
#[derive(Debug, Clone, Deserialize)]
pub struct Parameter {
    /// Parameter name, unique within its flow.
    pub name: String,

    /// Question template with `{placeholder}` substitution tokens.
    pub question: String,

    /// Next parameter in the chain, or none at the chain end.
    #[serde(default)]
    pub next_parameter: Option<String>,

    /// Steps run before the question is rendered.
    #[serde(default)]
    pub pre_ask_steps: Vec<Step>,

    /// Steps run after the user answers.
    #[serde(default)]
    pub post_ask_steps: Vec<Step>,
}
