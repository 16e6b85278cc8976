//! Step interpreter.
//!
//! Executes one declared step against the turn-local scope: the session
//! state (read/write), the raw utterance (read-only), and the most recent
//! extraction. Steps are run strictly in declared order; a hard failure
//! aborts the whole turn.

use chrono::Utc;
use serde_json::{Map, Value};
use std::sync::Arc;

use crate::domain::catalog::{
    ApiInputMapping, FlowCatalog, Step, ValidationRule,
};
use crate::domain::dialogue::outcome::{ExtractedValue, ExtractionOutcome};
use crate::domain::dialogue::rendering::{self, value_text};
use crate::domain::errors::EngineError;
use crate::domain::session::SessionState;
use crate::ports::{Extractor, ReferenceApi, ScriptEngine};

/// What one step produced.
#[derive(Debug, Clone, PartialEq)]
pub enum StepOutcome {
    /// The step ran (possibly writing context); continue with the next one.
    Continue,

    /// An ai step produced a parsed extraction result.
    Extracted(ExtractionOutcome),

    /// A validation rule rejected the latest extraction.
    ValidationFailed { message: String },

    /// A decision step moved the parameter pointer.
    Jump { parameter: String },
}

/// Mutable state of the turn currently being interpreted.
pub struct TurnScope<'a> {
    /// Buffered session state; persisted only if the turn succeeds.
    pub state: &'a mut SessionState,

    /// The raw user utterance (empty for pre-ask steps).
    pub utterance: &'a str,

    /// Active flow name.
    pub flow_name: &'a str,

    /// Parameter the steps belong to.
    pub parameter: &'a str,

    /// Most recent extraction, consumed by validate steps.
    pub last_extraction: Option<ExtractedValue>,
}

impl<'a> TurnScope<'a> {
    /// Creates a scope for one parameter's step sequence.
    pub fn new(
        state: &'a mut SessionState,
        utterance: &'a str,
        flow_name: &'a str,
        parameter: &'a str,
    ) -> Self {
        Self {
            state,
            utterance,
            flow_name,
            parameter,
            last_extraction: None,
        }
    }
}

/// Runs declared steps against a turn scope.
pub struct StepInterpreter {
    catalog: Arc<FlowCatalog>,
    reference_api: Arc<dyn ReferenceApi>,
    script_engine: Arc<dyn ScriptEngine>,
    extractor: Arc<dyn Extractor>,
}

impl StepInterpreter {
    /// Creates an interpreter over the catalog and collaborator ports.
    pub fn new(
        catalog: Arc<FlowCatalog>,
        reference_api: Arc<dyn ReferenceApi>,
        script_engine: Arc<dyn ScriptEngine>,
        extractor: Arc<dyn Extractor>,
    ) -> Self {
        Self {
            catalog,
            reference_api,
            script_engine,
            extractor,
        }
    }

    /// Executes one step.
    ///
    /// # Errors
    /// - `ConfigNotFound` when the step references a missing catalog entity
    /// - `ExternalCall` when a collaborator fails, times out, or replies
    ///   with something unusable
    pub async fn run_step(
        &self,
        step: &Step,
        scope: &mut TurnScope<'_>,
    ) -> Result<StepOutcome, EngineError> {
        match step {
            Step::Api {
                name,
                input,
                output_key,
            } => self.run_api(name, input, output_key, scope).await,
            Step::Script { name, output_key } => self.run_script(name, output_key, scope).await,
            Step::Ai {
                prompt_id,
                prompt_append,
            } => self.run_ai(prompt_id, prompt_append.as_deref(), scope).await,
            Step::Validate { ruleset } => self.run_validate(ruleset, scope),
            Step::Decision {
                on_key,
                cases,
                default,
            } => Ok(self.run_decision(on_key, cases, default.as_deref(), scope)),
        }
    }

    async fn run_api(
        &self,
        name: &str,
        input: &ApiInputMapping,
        output_key: &str,
        scope: &mut TurnScope<'_>,
    ) -> Result<StepOutcome, EngineError> {
        let descriptor = self.catalog.api(name)?;

        let query = pick(&scope.state.context, &input.query);
        let body = pick(&scope.state.context, &input.body);

        let payload = self
            .reference_api
            .call(descriptor, &query, &body)
            .await
            .map_err(|e| EngineError::external(e.to_string()))?;

        tracing::debug!(api = name, output_key, "reference call succeeded");
        scope.state.set_context(output_key.to_string(), payload);
        Ok(StepOutcome::Continue)
    }

    async fn run_script(
        &self,
        name: &str,
        output_key: &str,
        scope: &mut TurnScope<'_>,
    ) -> Result<StepOutcome, EngineError> {
        let script = self.catalog.script(name)?;
        let snapshot = scope.state.context.clone();

        let value = self
            .script_engine
            .eval(script, &snapshot)
            .await
            .map_err(|e| EngineError::external(e.to_string()))?;

        scope.state.set_context(output_key.to_string(), value);
        Ok(StepOutcome::Continue)
    }

    async fn run_ai(
        &self,
        prompt_id: &str,
        prompt_append: Option<&str>,
        scope: &mut TurnScope<'_>,
    ) -> Result<StepOutcome, EngineError> {
        let template = self.catalog.prompt(prompt_id)?;
        let mut prompt = rendering::render(template, &self.prompt_context(scope));
        if let Some(append) = prompt_append {
            prompt.push('\n');
            prompt.push_str(append);
        }

        let payload = self
            .extractor
            .extract(&prompt, scope.utterance, &scope.state.context)
            .await
            .map_err(|e| EngineError::external(e.to_string()))?
            .ok_or_else(|| EngineError::external("extraction backend returned an unusable response"))?;

        let outcome = ExtractionOutcome::from_payload(&payload, scope.parameter)
            .ok_or_else(|| EngineError::external("extraction payload matched no declared shape"))?;

        if let ExtractionOutcome::Extraction { value, .. }
        | ExtractionOutcome::Correction { value, .. } = &outcome
        {
            scope.last_extraction = Some(value.clone());
        }
        Ok(StepOutcome::Extracted(outcome))
    }

    fn run_validate(
        &self,
        ruleset_name: &str,
        scope: &mut TurnScope<'_>,
    ) -> Result<StepOutcome, EngineError> {
        let ruleset = self.catalog.ruleset(ruleset_name)?;

        // Nothing extracted yet, nothing to check.
        let Some(extracted) = scope.last_extraction.clone() else {
            return Ok(StepOutcome::Continue);
        };

        for rule in &ruleset.rules {
            if let Some(message) = check_rule(rule, &extracted, &scope.state.context)? {
                tracing::debug!(ruleset = ruleset_name, "validation rule rejected the answer");
                return Ok(StepOutcome::ValidationFailed { message });
            }
        }
        Ok(StepOutcome::Continue)
    }

    fn run_decision(
        &self,
        on_key: &str,
        cases: &[crate::domain::catalog::DecisionCase],
        default: Option<&str>,
        scope: &TurnScope<'_>,
    ) -> StepOutcome {
        let value = scope.state.context.get(on_key).map(value_text);

        let target = value
            .as_deref()
            .and_then(|v| cases.iter().find(|c| c.equals == v))
            .map(|c| c.then.clone())
            .or_else(|| default.map(str::to_string));

        match target {
            Some(parameter) => StepOutcome::Jump { parameter },
            None => StepOutcome::Continue,
        }
    }

    /// Placeholder bindings available to ai prompt templates: the full
    /// conversation context plus the turn's well-known values.
    fn prompt_context(&self, scope: &TurnScope<'_>) -> Map<String, Value> {
        let mut ctx = scope.state.context.clone();
        ctx.insert(
            "current_datetime".to_string(),
            Value::String(Utc::now().to_rfc3339()),
        );
        ctx.insert(
            "flow".to_string(),
            Value::String(scope.flow_name.to_string()),
        );
        ctx.insert(
            "parameter".to_string(),
            Value::String(scope.parameter.to_string()),
        );
        ctx.insert(
            "collected".to_string(),
            Value::Object(scope.state.collected_view()),
        );
        ctx.insert(
            "context".to_string(),
            Value::Object(scope.state.context.clone()),
        );
        ctx.insert(
            "input".to_string(),
            Value::String(scope.utterance.to_string()),
        );
        ctx
    }
}

/// Projects the named context keys into a parameter map, skipping keys with
/// no bound value.
fn pick(context: &Map<String, Value>, keys: &[String]) -> Map<String, Value> {
    keys.iter()
        .filter_map(|k| context.get(k).map(|v| (k.clone(), v.clone())))
        .collect()
}

/// Evaluates one rule; `Some(message)` means the rule failed.
fn check_rule(
    rule: &ValidationRule,
    extracted: &ExtractedValue,
    context: &Map<String, Value>,
) -> Result<Option<String>, EngineError> {
    let Some(needle) = extracted.label() else {
        // A no-match extraction never reaches validation.
        return Ok(None);
    };

    match rule {
        ValidationRule::Regex {
            pattern,
            error_message,
        } => {
            let re = regex::Regex::new(pattern).map_err(|e| {
                EngineError::InvalidConfig(format!("regex '{}': {}", pattern, e))
            })?;
            if re.is_match(&needle) {
                Ok(None)
            } else {
                Ok(Some(error_message.clone()))
            }
        }

        ValidationRule::Membership {
            source_key,
            match_field,
            error_message,
        } => {
            // The candidate list key is matched by substring, so a fetch
            // stored under e.g. "available_branches" satisfies "branches".
            let candidates = context
                .iter()
                .find(|(k, _)| k.contains(source_key.as_str()))
                .and_then(|(_, v)| v.as_array());

            let Some(candidates) = candidates else {
                return Ok(Some(error_message.clone()));
            };

            let hit = match match_field {
                None => candidates.iter().any(|item| value_text(item) == needle),
                Some(field) => {
                    let wanted = membership_needle(field, extracted, &needle);
                    candidates
                        .iter()
                        .any(|item| item.get(field).map(value_text).as_deref() == Some(&wanted))
                }
            };

            if hit {
                Ok(None)
            } else {
                Ok(Some(error_message.clone()))
            }
        }
    }
}

/// Field-keyed membership compares identifiers against `*_id` fields and
/// display labels against everything else.
fn membership_needle(field: &str, extracted: &ExtractedValue, label: &str) -> String {
    if field.ends_with("_id") {
        if let ExtractedValue::Match { id, .. } = extracted {
            return value_text(id);
        }
    }
    label.to_string()
}
