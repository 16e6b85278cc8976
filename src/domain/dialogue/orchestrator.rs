//! Turn orchestrator.
//!
//! Composes the resolver, interpreter, invalidation manager, and intent
//! router into the single per-turn algorithm. This is the externally
//! visible entry point of the engine: one call per user turn.
//!
//! # Atomicity
//!
//! Turn mutations are buffered on an in-memory copy of the session state
//! and written to the store only when the turn completes successfully or
//! ends in a recoverable validation failure. A hard failure (collaborator
//! error, missing configuration) aborts the turn, leaves the stored
//! session untouched, and surfaces a generic apology prompt - never a raw
//! error payload.

use serde_json::{Map, Value};
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

use crate::domain::catalog::{Flow, FlowCatalog, Parameter};
use crate::domain::dialogue::interpreter::{StepInterpreter, StepOutcome, TurnScope};
use crate::domain::dialogue::invalidation;
use crate::domain::dialogue::outcome::{ExtractedValue, ExtractionOutcome};
use crate::domain::dialogue::rendering;
use crate::domain::dialogue::resolver;
use crate::domain::dialogue::router::{IntentOutcome, IntentRouter};
use crate::domain::errors::EngineError;
use crate::domain::session::{SessionState, SessionStatus};
use crate::ports::{Extractor, ReferenceApi, ScriptEngine, SessionStore};

/// Prompt ids the orchestrator looks up in the catalog, with built-in
/// fallbacks when the catalog does not define them.
const GREETING_PROMPT_ID: &str = "greeting";
const RESTATE_PROMPT_ID: &str = "restate_intent";
const APOLOGY_PROMPT_ID: &str = "apology";
const UNMATCHED_PREFIX_ID: &str = "unmatched_prefix";

const DEFAULT_GREETING: &str = "Hello! How can I help you today?";
const DEFAULT_RESTATE: &str =
    "Sorry, I did not catch what you need. Could you say it another way?";
const DEFAULT_APOLOGY: &str =
    "Sorry, something went wrong on our side. Could we try that again?";
const DEFAULT_UNMATCHED_PREFIX: &str = "I could not find that in our records. ";
const DEFAULT_DONE: &str = "This conversation is already complete.";

/// What a turn says back to the user.
#[derive(Debug, Clone, PartialEq)]
pub enum TurnMessage {
    /// The next question; the conversation continues.
    Prompt(String),
    /// The terminal message; the conversation is over.
    Final(String),
}

/// The result of one turn: a message plus the collected parameter view.
#[derive(Debug, Clone, PartialEq)]
pub struct TurnReply {
    pub message: TurnMessage,
    pub collected: Map<String, Value>,
}

impl TurnReply {
    fn prompt(text: impl Into<String>, collected: Map<String, Value>) -> Self {
        Self {
            message: TurnMessage::Prompt(text.into()),
            collected,
        }
    }

    fn terminal(text: impl Into<String>, collected: Map<String, Value>) -> Self {
        Self {
            message: TurnMessage::Final(text.into()),
            collected,
        }
    }

    /// The message text regardless of kind.
    pub fn text(&self) -> &str {
        match &self.message {
            TurnMessage::Prompt(t) | TurnMessage::Final(t) => t,
        }
    }

    /// True when the reply ends the conversation.
    pub fn is_final(&self) -> bool {
        matches!(self.message, TurnMessage::Final(_))
    }
}

/// Result of running one parameter's post-answer step sequence.
enum StepsResult {
    /// Steps ran to the end (or were cut short by a no-match extraction).
    Completed {
        unmatched: bool,
        jump: Option<String>,
    },
    /// A rule rejected the answer; the same question is asked again.
    ValidationFailed(String),
    /// The user switched to this (validated) flow mid-conversation.
    Switched(String),
    /// An intent switch named a flow the catalog does not know.
    SwitchRejected,
}

/// Drives one conversation turn end to end.
pub struct TurnOrchestrator {
    catalog: Arc<FlowCatalog>,
    store: Arc<dyn SessionStore>,
    interpreter: StepInterpreter,
    router: IntentRouter,
    session_ttl: Duration,
}

impl TurnOrchestrator {
    /// Wires the orchestrator to its collaborators.
    pub fn new(
        catalog: Arc<FlowCatalog>,
        store: Arc<dyn SessionStore>,
        reference_api: Arc<dyn ReferenceApi>,
        script_engine: Arc<dyn ScriptEngine>,
        extractor: Arc<dyn Extractor>,
        session_ttl: Duration,
    ) -> Self {
        let interpreter = StepInterpreter::new(
            Arc::clone(&catalog),
            reference_api,
            script_engine,
            Arc::clone(&extractor),
        );
        let router = IntentRouter::new(Arc::clone(&catalog), extractor);
        Self {
            catalog,
            store,
            interpreter,
            router,
            session_ttl,
        }
    }

    /// Begins (or resumes) a conversation without consuming an utterance.
    ///
    /// Reads never mutate: calling `start` twice on the same fresh session
    /// yields the same prompt both times.
    pub async fn start(&self, session_id: &str) -> TurnReply {
        let turn = Uuid::new_v4();
        tracing::info!(%session_id, %turn, "starting conversation turn");

        match self.start_inner(session_id).await {
            Ok(reply) => reply,
            Err(err) => self.apologize(session_id, err),
        }
    }

    /// Feeds one user utterance through the turn pipeline.
    pub async fn advance(&self, session_id: &str, user_input: &str) -> TurnReply {
        let turn = Uuid::new_v4();
        tracing::info!(%session_id, %turn, "advancing conversation turn");

        let state = match self.load(session_id).await {
            Ok(state) => state,
            Err(err) => return self.apologize(session_id, err),
        };
        let before = state.collected_view();

        match self.advance_inner(session_id, state, user_input).await {
            Ok(reply) => reply,
            Err(err) => {
                tracing::error!(%session_id, error = %err, "turn aborted; session left untouched");
                TurnReply::prompt(self.system_text(APOLOGY_PROMPT_ID, DEFAULT_APOLOGY), before)
            }
        }
    }

    // ─────────────────────────────────────────────────────────────────────
    // Turn pipeline
    // ─────────────────────────────────────────────────────────────────────

    async fn start_inner(&self, session_id: &str) -> Result<TurnReply, EngineError> {
        let state = self.load(session_id).await?;

        match state.status {
            SessionStatus::AwaitingIntent => {
                self.persist(session_id, &state).await?;
                let greeting = self.system_text(GREETING_PROMPT_ID, DEFAULT_GREETING);
                Ok(TurnReply::prompt(greeting, state.collected_view()))
            }
            SessionStatus::Collecting => {
                let flow = self.active_flow(&state)?;
                let param = self.active_parameter(flow, &state)?;
                let question = rendering::render(&param.question, &state.context);
                Ok(TurnReply::prompt(question, state.collected_view()))
            }
            SessionStatus::Done => {
                let message = self.final_text(&state)?;
                Ok(TurnReply::terminal(message, state.collected_view()))
            }
        }
    }

    async fn advance_inner(
        &self,
        session_id: &str,
        state: SessionState,
        user_input: &str,
    ) -> Result<TurnReply, EngineError> {
        match state.status {
            SessionStatus::AwaitingIntent => self.route_intent(session_id, state, user_input).await,
            SessionStatus::Collecting => self.collect(session_id, state, user_input).await,
            SessionStatus::Done => {
                let message = self.final_text(&state)?;
                Ok(TurnReply::terminal(message, state.collected_view()))
            }
        }
    }

    /// Classifies the utterance into a flow while awaiting intent.
    async fn route_intent(
        &self,
        session_id: &str,
        state: SessionState,
        user_input: &str,
    ) -> Result<TurnReply, EngineError> {
        match self.router.classify(user_input, &state.context).await? {
            IntentOutcome::Unknown => {
                self.persist(session_id, &state).await?;
                let restate = self.system_text(RESTATE_PROMPT_ID, DEFAULT_RESTATE);
                Ok(TurnReply::prompt(restate, state.collected_view()))
            }
            IntentOutcome::Matched(flow_name) => {
                tracing::info!(%session_id, flow = %flow_name, "intent matched");
                self.enter_flow(session_id, state, &flow_name).await
            }
        }
    }

    /// Seeds a freshly chosen flow and asks its first question, or returns
    /// the terminal message of a single-shot intent.
    async fn enter_flow(
        &self,
        session_id: &str,
        mut state: SessionState,
        flow_name: &str,
    ) -> Result<TurnReply, EngineError> {
        let flow = self.catalog.flow(flow_name)?;

        let Some(initial) = flow.initial_parameter.clone() else {
            state.mark_collected("intent");
            state.set_context("intent", Value::String(flow.name.clone()));
            state.current_flow = Some(flow.name.clone());
            state.current_parameter = None;
            state.status = SessionStatus::Done;
            self.persist(session_id, &state).await?;

            let message = flow
                .final_message
                .as_deref()
                .map(|t| rendering::render(t, &state.context))
                .unwrap_or_else(|| DEFAULT_DONE.to_string());
            return Ok(TurnReply::terminal(message, state.collected_view()));
        };

        state.seed_flow(flow_name, &initial);
        self.ask_current(session_id, state).await
    }

    /// Runs the active parameter's post-answer steps, applies the result,
    /// and advances the pointer.
    async fn collect(
        &self,
        session_id: &str,
        mut state: SessionState,
        user_input: &str,
    ) -> Result<TurnReply, EngineError> {
        let flow = self.active_flow(&state)?.clone();

        let param_name = match &state.current_parameter {
            Some(name) => name.clone(),
            // Pointer lost (e.g. hand-edited store entry): recover via the resolver.
            None => match resolver::next_parameter(&flow, &state)? {
                Some(name) => name.to_string(),
                None => return self.finish_flow(session_id, state, &flow).await,
            },
        };
        let param = flow
            .parameter(&param_name)
            .ok_or_else(|| EngineError::not_found("parameter", &param_name))?;

        match self
            .run_post_steps(&flow, param, &mut state, user_input)
            .await?
        {
            StepsResult::ValidationFailed(message) => {
                // Recoverable: earlier side effects from this turn are kept,
                // but the parameter is not advanced.
                self.persist(session_id, &state).await?;
                Ok(TurnReply::prompt(message, state.collected_view()))
            }
            StepsResult::Switched(new_flow) => {
                tracing::info!(%session_id, flow = %new_flow, "mid-conversation intent switch");
                state.reset_for_switch();
                self.enter_flow(session_id, state, &new_flow).await
            }
            StepsResult::SwitchRejected => {
                let question = rendering::render(&param.question, &state.context);
                self.persist(session_id, &state).await?;
                Ok(TurnReply::prompt(question, state.collected_view()))
            }
            StepsResult::Completed { unmatched: true, .. } => {
                let prefix = self.system_text(UNMATCHED_PREFIX_ID, DEFAULT_UNMATCHED_PREFIX);
                let question = rendering::render(&param.question, &state.context);
                self.persist(session_id, &state).await?;
                Ok(TurnReply::prompt(
                    format!("{}{}", prefix, question),
                    state.collected_view(),
                ))
            }
            StepsResult::Completed {
                unmatched: false,
                jump,
            } => {
                if let Some(target) = jump {
                    state.current_parameter = Some(target);
                    return self.ask_current(session_id, state).await;
                }
                match resolver::next_parameter(&flow, &state)? {
                    None => self.finish_flow(session_id, state, &flow).await,
                    Some(next) => {
                        state.current_parameter = Some(next.to_string());
                        self.ask_current(session_id, state).await
                    }
                }
            }
        }
    }

    async fn run_post_steps(
        &self,
        flow: &Flow,
        param: &Parameter,
        state: &mut SessionState,
        user_input: &str,
    ) -> Result<StepsResult, EngineError> {
        let mut unmatched = false;
        let mut jump = None;

        let mut scope = TurnScope::new(state, user_input, &flow.name, &param.name);
        for step in &param.post_ask_steps {
            match self.interpreter.run_step(step, &mut scope).await? {
                StepOutcome::Continue => {}
                StepOutcome::Jump { parameter } => jump = Some(parameter),
                StepOutcome::ValidationFailed { message } => {
                    // Earlier side effects (reference fetches, derivations)
                    // stay committed, but the rejected answer itself must
                    // not survive the turn.
                    scope.state.clear_parameter(&param.name);
                    return Ok(StepsResult::ValidationFailed(message));
                }
                StepOutcome::Extracted(ExtractionOutcome::IntentSwitch { flow: target }) => {
                    // The rest of this turn's steps are discarded either way.
                    return Ok(match self.router.resolve(Some(&target)) {
                        IntentOutcome::Matched(name) => StepsResult::Switched(name),
                        IntentOutcome::Unknown => StepsResult::SwitchRejected,
                    });
                }
                StepOutcome::Extracted(ExtractionOutcome::Correction { parameter, value }) => {
                    let cleared = invalidation::invalidate_downstream(flow, scope.state, &parameter);
                    tracing::info!(
                        corrected = %parameter,
                        invalidated = cleared.len(),
                        "applied correction"
                    );
                    apply_extraction(scope.state, &parameter, &value);
                    // A correction replaces this turn's answer; skip the rest.
                    break;
                }
                StepOutcome::Extracted(ExtractionOutcome::Extraction { parameter, value }) => {
                    if value == ExtractedValue::NoMatch {
                        unmatched = true;
                        break;
                    }
                    apply_extraction(scope.state, &parameter, &value);
                }
            }
        }

        Ok(StepsResult::Completed { unmatched, jump })
    }

    /// Runs the new current parameter's pre-question steps, renders its
    /// question, and persists the turn.
    async fn ask_current(
        &self,
        session_id: &str,
        mut state: SessionState,
    ) -> Result<TurnReply, EngineError> {
        let flow = self.active_flow(&state)?.clone();
        let param = self.active_parameter(&flow, &state)?.clone();

        let mut scope = TurnScope::new(&mut state, "", &flow.name, &param.name);
        for step in &param.pre_ask_steps {
            let outcome = self.interpreter.run_step(step, &mut scope).await?;
            if outcome != StepOutcome::Continue {
                tracing::debug!(parameter = %param.name, "ignoring non-fetch outcome in pre-ask step");
            }
        }

        let question = rendering::render(&param.question, &state.context);
        self.persist(session_id, &state).await?;
        Ok(TurnReply::prompt(question, state.collected_view()))
    }

    /// Completes the flow: runs its final action, marks the session done,
    /// and renders the terminal message.
    async fn finish_flow(
        &self,
        session_id: &str,
        mut state: SessionState,
        flow: &Flow,
    ) -> Result<TurnReply, EngineError> {
        {
            let mut scope = TurnScope::new(&mut state, "", &flow.name, "final_action");
            for step in &flow.final_action {
                self.interpreter.run_step(step, &mut scope).await?;
            }
        }

        state.status = SessionStatus::Done;
        state.current_parameter = None;
        self.persist(session_id, &state).await?;

        let message = flow
            .final_message
            .as_deref()
            .map(|t| rendering::render(t, &state.context))
            .unwrap_or_else(|| DEFAULT_DONE.to_string());
        tracing::info!(%session_id, flow = %flow.name, "flow completed");
        Ok(TurnReply::terminal(message, state.collected_view()))
    }

    // ─────────────────────────────────────────────────────────────────────
    // Helpers
    // ─────────────────────────────────────────────────────────────────────

    async fn load(&self, session_id: &str) -> Result<SessionState, EngineError> {
        let loaded = self
            .store
            .load(session_id)
            .await
            .map_err(|e| EngineError::Store(e.to_string()))?;
        Ok(loaded.unwrap_or_default())
    }

    async fn persist(&self, session_id: &str, state: &SessionState) -> Result<(), EngineError> {
        self.store
            .save(session_id, state, self.session_ttl)
            .await
            .map_err(|e| EngineError::Store(e.to_string()))
    }

    fn active_flow(&self, state: &SessionState) -> Result<&Flow, EngineError> {
        let name = state
            .current_flow
            .as_deref()
            .ok_or_else(|| EngineError::not_found("flow", "<active>"))?;
        self.catalog.flow(name)
    }

    fn active_parameter<'a>(
        &self,
        flow: &'a Flow,
        state: &SessionState,
    ) -> Result<&'a Parameter, EngineError> {
        let name = state
            .current_parameter
            .as_deref()
            .ok_or_else(|| EngineError::not_found("parameter", "<current>"))?;
        flow.parameter(name)
            .ok_or_else(|| EngineError::not_found("parameter", name))
    }

    fn final_text(&self, state: &SessionState) -> Result<String, EngineError> {
        let message = match &state.current_flow {
            Some(name) => self
                .catalog
                .flow(name)?
                .final_message
                .as_deref()
                .map(|t| rendering::render(t, &state.context)),
            None => None,
        };
        Ok(message.unwrap_or_else(|| DEFAULT_DONE.to_string()))
    }

    fn system_text(&self, prompt_id: &str, fallback: &str) -> String {
        self.catalog
            .prompt(prompt_id)
            .map(str::to_string)
            .unwrap_or_else(|_| fallback.to_string())
    }

    fn apologize(&self, session_id: &str, err: EngineError) -> TurnReply {
        tracing::error!(%session_id, error = %err, "turn aborted; session left untouched");
        TurnReply::prompt(
            self.system_text(APOLOGY_PROMPT_ID, DEFAULT_APOLOGY),
            Map::new(),
        )
    }
}

/// Merges an extracted value into the session: scalars under the parameter
/// name, catalog matches under the name plus its `_id` variant.
fn apply_extraction(state: &mut SessionState, parameter: &str, value: &ExtractedValue) {
    match value {
        ExtractedValue::Scalar(v) => {
            state.mark_collected(parameter);
            state.set_context(parameter, v.clone());
        }
        ExtractedValue::Match { id, label } => {
            let id_key = format!("{}_id", parameter);
            state.mark_collected(parameter);
            state.mark_collected(id_key.clone());
            state.set_context(parameter, Value::String(label.clone()));
            state.set_context(id_key, id.clone());
        }
        ExtractedValue::NoMatch => {}
    }
}
