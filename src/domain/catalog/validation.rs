//! Validation rulesets.
//!
//! Rules are evaluated in declared order against the most recent extraction;
//! the first failing rule short-circuits with its configured message.

use serde::Deserialize;

/// A named, ordered list of validation rules.
#[derive(Debug, Clone, Deserialize)]
pub struct ValidationRuleset {
    /// Ruleset name, referenced by validate steps.
    pub name: String,

    /// Rules in evaluation order.
    pub rules: Vec<ValidationRule>,
}

/// One validation rule.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ValidationRule {
    /// The extracted value must match the pattern.
    Regex {
        pattern: String,
        error_message: String,
    },

    /// The extracted value must appear in a reference list already fetched
    /// into the context. The candidate list is found by substring match of
    /// `source_key` against context keys. With `match_field` set the list is
    /// an array of objects and the named field is compared; without it the
    /// list is an array of scalars.
    Membership {
        source_key: String,
        #[serde(default)]
        match_field: Option<String>,
        error_message: String,
    },
}

impl ValidationRule {
    /// The message returned to the user when this rule fails.
    pub fn error_message(&self) -> &str {
        match self {
            ValidationRule::Regex { error_message, .. } => error_message,
            ValidationRule::Membership { error_message, .. } => error_message,
        }
    }
}
