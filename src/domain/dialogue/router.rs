//! Intent router.
//!
//! Maps a free-text utterance onto one of the catalog's flows using the
//! extraction collaborator. Used while a session awaits its intent; the
//! orchestrator also consults it when an intent switch is detected
//! mid-conversation.

use serde_json::{Map, Value};
use std::sync::Arc;

use crate::domain::catalog::FlowCatalog;
use crate::domain::dialogue::rendering;
use crate::domain::errors::EngineError;
use crate::ports::Extractor;

/// Classifier prompt used when the catalog does not override it.
const DEFAULT_CLASSIFIER_PROMPT: &str = "You route a support conversation. \
Given the user's message, pick the single best matching intent from this \
list:\n{flows}\nReply with a JSON object of the form \
{\"intent\": \"<name>\"}. If none fits, reply {\"intent\": null}.";

/// Prompt template id the catalog may use to override the classifier text.
pub const CLASSIFIER_PROMPT_ID: &str = "intent_classifier";

/// Result of one classification attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IntentOutcome {
    /// The utterance maps to this flow.
    Matched(String),
    /// The classifier could not produce a usable flow name.
    Unknown,
}

/// Classifies utterances into flow names.
pub struct IntentRouter {
    catalog: Arc<FlowCatalog>,
    extractor: Arc<dyn Extractor>,
}

impl IntentRouter {
    /// Creates a router over the given catalog and extraction backend.
    pub fn new(catalog: Arc<FlowCatalog>, extractor: Arc<dyn Extractor>) -> Self {
        Self { catalog, extractor }
    }

    /// Classifies one utterance.
    ///
    /// An unknown or unparseable classification is `IntentOutcome::Unknown`
    /// (the caller reprompts); only transport failures abort the turn.
    ///
    /// # Errors
    /// Returns `EngineError::ExternalCall` when the extraction backend
    /// fails or times out.
    pub async fn classify(
        &self,
        utterance: &str,
        context: &Map<String, Value>,
    ) -> Result<IntentOutcome, EngineError> {
        let prompt = self.classifier_prompt();
        let payload = self
            .extractor
            .extract(&prompt, utterance, context)
            .await
            .map_err(|e| EngineError::external(e.to_string()))?;

        let Some(payload) = payload else {
            tracing::debug!("intent classification returned an unusable response");
            return Ok(IntentOutcome::Unknown);
        };

        let name = payload.get("intent").and_then(Value::as_str);
        Ok(self.resolve(name))
    }

    /// Validates a candidate flow name against the catalog.
    ///
    /// Shared with the orchestrator's mid-conversation switch handling,
    /// where the candidate comes from an `intent_switch` extraction.
    pub fn resolve(&self, candidate: Option<&str>) -> IntentOutcome {
        match candidate {
            Some(name) if self.catalog.flow(name).is_ok() => {
                IntentOutcome::Matched(name.to_string())
            }
            Some(name) => {
                tracing::warn!(intent = name, "classifier produced an unknown flow name");
                IntentOutcome::Unknown
            }
            None => IntentOutcome::Unknown,
        }
    }

    fn classifier_prompt(&self) -> String {
        let template = self
            .catalog
            .prompt(CLASSIFIER_PROMPT_ID)
            .unwrap_or(DEFAULT_CLASSIFIER_PROMPT);

        let mut listing = String::new();
        for flow in self.catalog.flows() {
            listing.push_str(&format!("- {}: {}\n", flow.name, flow.description));
        }

        let mut ctx = Map::new();
        ctx.insert("flows".to_string(), Value::String(listing));
        rendering::render(template, &ctx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::ai::MockExtractor;
    use crate::domain::catalog::{Flow, FlowCatalog, Parameter};
    use serde_json::json;
    use std::collections::HashMap;

    fn catalog() -> Arc<FlowCatalog> {
        let mut parameters = HashMap::new();
        parameters.insert(
            "city".to_string(),
            Parameter {
                name: "city".to_string(),
                question: "Which city?".to_string(),
                next_parameter: None,
                pre_ask_steps: Vec::new(),
                post_ask_steps: Vec::new(),
            },
        );
        let scheduling = Flow {
            name: "scheduling".to_string(),
            description: "Book an appointment".to_string(),
            initial_parameter: Some("city".to_string()),
            parameters,
            final_message: Some("Booked.".to_string()),
            final_action: Vec::new(),
        };
        let transfer = Flow {
            name: "transfer_to_human".to_string(),
            description: "Talk to a person".to_string(),
            initial_parameter: None,
            parameters: HashMap::new(),
            final_message: Some("Transferring you now.".to_string()),
            final_action: Vec::new(),
        };
        Arc::new(
            FlowCatalog::from_parts(
                vec![scheduling, transfer],
                Vec::new(),
                Vec::new(),
                Vec::new(),
                HashMap::new(),
            )
            .unwrap(),
        )
    }

    #[tokio::test]
    async fn known_intent_is_matched() {
        let router = IntentRouter::new(
            catalog(),
            Arc::new(MockExtractor::replying(vec![Some(
                json!({"intent": "scheduling"}),
            )])),
        );
        let outcome = router.classify("I'd like an appointment", &Map::new()).await.unwrap();
        assert_eq!(outcome, IntentOutcome::Matched("scheduling".to_string()));
    }

    #[tokio::test]
    async fn unknown_flow_name_is_not_matched() {
        let router = IntentRouter::new(
            catalog(),
            Arc::new(MockExtractor::replying(vec![Some(
                json!({"intent": "order_pizza"}),
            )])),
        );
        let outcome = router.classify("pizza please", &Map::new()).await.unwrap();
        assert_eq!(outcome, IntentOutcome::Unknown);
    }

    #[tokio::test]
    async fn null_intent_is_unknown() {
        let router = IntentRouter::new(
            catalog(),
            Arc::new(MockExtractor::replying(vec![Some(json!({"intent": null}))])),
        );
        let outcome = router.classify("ehh", &Map::new()).await.unwrap();
        assert_eq!(outcome, IntentOutcome::Unknown);
    }

    #[tokio::test]
    async fn unusable_response_is_unknown() {
        let router = IntentRouter::new(
            catalog(),
            Arc::new(MockExtractor::replying(vec![None])),
        );
        let outcome = router.classify("???", &Map::new()).await.unwrap();
        assert_eq!(outcome, IntentOutcome::Unknown);
    }

    #[tokio::test]
    async fn backend_failure_aborts() {
        let router = IntentRouter::new(catalog(), Arc::new(MockExtractor::failing()));
        let err = router.classify("hi", &Map::new()).await.unwrap_err();
        assert!(matches!(err, EngineError::ExternalCall(_)));
    }

    #[test]
    fn classifier_prompt_lists_flows() {
        let router = IntentRouter::new(
            catalog(),
            Arc::new(MockExtractor::replying(Vec::new())),
        );
        let prompt = router.classifier_prompt();
        assert!(prompt.contains("scheduling: Book an appointment"));
        assert!(prompt.contains("transfer_to_human"));
    }
}
