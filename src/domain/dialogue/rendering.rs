//! Template rendering.
//!
//! Question templates, prompt templates, and final messages all use
//! `{placeholder}` substitution tokens resolved against the conversation
//! context. A placeholder with no bound value renders a visible missing
//! marker rather than aborting the turn.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Map, Value};

static PLACEHOLDER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\{([A-Za-z0-9_]+)\}").expect("placeholder pattern"));

/// Substitutes `{key}` tokens in `template` with context values.
///
/// Strings render verbatim, arrays join their items with ", ", and other
/// values render as compact JSON. Unbound keys render as `[missing key]`.
pub fn render(template: &str, context: &Map<String, Value>) -> String {
    PLACEHOLDER
        .replace_all(template, |caps: &regex::Captures<'_>| {
            let key = &caps[1];
            match context.get(key) {
                Some(value) => render_value(value),
                None => format!("[missing {}]", key),
            }
        })
        .into_owned()
}

/// Canonical text form of a context value, used for rule and decision
/// comparisons as well as placeholder substitution.
pub(crate) fn value_text(value: &Value) -> String {
    render_value(value)
}

fn render_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Array(items) => items
            .iter()
            .map(render_value)
            .collect::<Vec<_>>()
            .join(", "),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn context(entries: &[(&str, Value)]) -> Map<String, Value> {
        entries
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn substitutes_string_values() {
        let ctx = context(&[("city", json!("Quito"))]);
        assert_eq!(
            render("Which branch in {city}?", &ctx),
            "Which branch in Quito?"
        );
    }

    #[test]
    fn joins_array_values_with_commas() {
        let ctx = context(&[("times", json!(["10:00", "14:00"]))]);
        assert_eq!(
            render("Available: {times}", &ctx),
            "Available: 10:00, 14:00"
        );
    }

    #[test]
    fn renders_numbers_as_json() {
        let ctx = context(&[("city_id", json!(7))]);
        assert_eq!(render("id={city_id}", &ctx), "id=7");
    }

    #[test]
    fn unbound_placeholder_renders_missing_marker() {
        let ctx = Map::new();
        assert_eq!(
            render("Which branch in {city}?", &ctx),
            "Which branch in [missing city]?"
        );
    }

    #[test]
    fn leaves_text_without_placeholders_untouched() {
        let ctx = Map::new();
        assert_eq!(render("No tokens here.", &ctx), "No tokens here.");
    }

    #[test]
    fn substitutes_multiple_occurrences() {
        let ctx = context(&[("name", json!("Ana"))]);
        assert_eq!(render("{name}, hello {name}!", &ctx), "Ana, hello Ana!");
    }
}
