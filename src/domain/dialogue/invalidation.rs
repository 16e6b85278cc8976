//! Context invalidation on correction.
//!
//! When the user corrects an earlier answer, every parameter downstream of
//! it in the flow's linked order is invalidated: later parameters'
//! pre-question steps typically fetch reference data filtered by the
//! earlier answer (a list of branches filtered by city, say), so the fetch
//! results and the answers derived from them are no longer meaningful.

use crate::domain::catalog::Flow;
use crate::domain::session::SessionState;

/// Clears the collected markers and context entries of every parameter
/// strictly after `changed` in the flow's linked order.
///
/// Parameters before `changed` are untouched. Pre-fetched reference data
/// stored under a downstream parameter's step output keys is cleared too.
/// Returns the names of the invalidated parameters.
pub fn invalidate_downstream(
    flow: &Flow,
    state: &mut SessionState,
    changed: &str,
) -> Vec<String> {
    let chain = flow.chain();
    let Some(position) = chain.iter().position(|name| *name == changed) else {
        return Vec::new();
    };

    let downstream: Vec<String> = chain[position + 1..]
        .iter()
        .map(|name| name.to_string())
        .collect();

    for name in &downstream {
        state.clear_parameter(name);
        if let Some(param) = flow.parameter(name) {
            for key in step_output_keys(param) {
                state.context.remove(key);
            }
        }
    }
    downstream
}

fn step_output_keys(param: &crate::domain::catalog::Parameter) -> Vec<&str> {
    use crate::domain::catalog::Step;

    param
        .pre_ask_steps
        .iter()
        .chain(&param.post_ask_steps)
        .filter_map(|step| match step {
            Step::Api { output_key, .. } | Step::Script { output_key, .. } => {
                Some(output_key.as_str())
            }
            _ => None,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::catalog::{ApiInputMapping, Flow, Parameter, Step};
    use serde_json::json;
    use std::collections::HashMap;

    /// city -> branch -> time, where branch pre-fetches a reference list.
    fn scheduling_flow() -> Flow {
        let mut parameters = HashMap::new();
        parameters.insert(
            "city".to_string(),
            Parameter {
                name: "city".to_string(),
                question: "Which city?".to_string(),
                next_parameter: Some("branch".to_string()),
                pre_ask_steps: Vec::new(),
                post_ask_steps: Vec::new(),
            },
        );
        parameters.insert(
            "branch".to_string(),
            Parameter {
                name: "branch".to_string(),
                question: "Which branch?".to_string(),
                next_parameter: Some("time".to_string()),
                pre_ask_steps: vec![Step::Api {
                    name: "branches".to_string(),
                    input: ApiInputMapping::default(),
                    output_key: "branches".to_string(),
                }],
                post_ask_steps: Vec::new(),
            },
        );
        parameters.insert(
            "time".to_string(),
            Parameter {
                name: "time".to_string(),
                question: "When?".to_string(),
                next_parameter: None,
                pre_ask_steps: Vec::new(),
                post_ask_steps: Vec::new(),
            },
        );
        Flow {
            name: "scheduling".to_string(),
            description: "book".to_string(),
            initial_parameter: Some("city".to_string()),
            parameters,
            final_message: None,
            final_action: Vec::new(),
        }
    }

    fn collected_state() -> SessionState {
        let mut state = SessionState::new();
        state.mark_collected("city");
        state.set_context("city", json!("Guayaquil"));
        state.mark_collected("branch");
        state.mark_collected("branch_id");
        state.set_context("branch", json!("Kennedy"));
        state.set_context("branch_id", json!(101));
        state.set_context("branches", json!([{"branch_id": 101}]));
        state.mark_collected("time");
        state.set_context("time", json!("2025-07-15 10:00"));
        state
    }

    #[test]
    fn correction_clears_everything_after_the_changed_parameter() {
        let flow = scheduling_flow();
        let mut state = collected_state();

        let cleared = invalidate_downstream(&flow, &mut state, "city");

        assert_eq!(cleared, vec!["branch".to_string(), "time".to_string()]);
        assert!(!state.is_collected("branch"));
        assert!(!state.is_collected("time"));
        assert!(state.context.get("branch").is_none());
        assert!(state.context.get("branch_id").is_none());
        assert!(state.context.get("time").is_none());
    }

    #[test]
    fn correction_clears_downstream_reference_fetches() {
        let flow = scheduling_flow();
        let mut state = collected_state();

        invalidate_downstream(&flow, &mut state, "city");

        // The branches list was fetched for the old city.
        assert!(state.context.get("branches").is_none());
    }

    #[test]
    fn parameters_before_the_change_are_untouched() {
        let flow = scheduling_flow();
        let mut state = collected_state();

        invalidate_downstream(&flow, &mut state, "branch");

        assert!(state.is_collected("city"));
        assert_eq!(state.context.get("city"), Some(&json!("Guayaquil")));
        assert!(!state.is_collected("time"));
    }

    #[test]
    fn correcting_the_last_parameter_clears_nothing() {
        let flow = scheduling_flow();
        let mut state = collected_state();

        let cleared = invalidate_downstream(&flow, &mut state, "time");

        assert!(cleared.is_empty());
        assert!(state.is_collected("branch"));
    }

    #[test]
    fn unknown_parameter_clears_nothing() {
        let flow = scheduling_flow();
        let mut state = collected_state();

        let cleared = invalidate_downstream(&flow, &mut state, "speciality");

        assert!(cleared.is_empty());
        assert!(state.is_collected("city"));
        assert!(state.is_collected("time"));
    }
}
