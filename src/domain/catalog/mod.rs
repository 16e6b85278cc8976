//! Flow Catalog - immutable, load-once conversation configuration.
//!
//! The catalog owns every configured entity: flows with their parameter
//! chains, reference-data API descriptors, validation rulesets, derivation
//! scripts, and prompt templates. It is built once at process start, held as
//! shared immutable state, and injected into the orchestrator.

mod api;
mod flow;
mod step;
mod validation;

pub use api::{ApiDescriptor, HttpMethod, OAuthClientCredentials};
pub use flow::{Flow, Parameter};
pub use step::{ApiInputMapping, DecisionCase, Step};
pub use validation::{ValidationRule, ValidationRuleset};

use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use std::path::Path;
use thiserror::Error;

use crate::domain::errors::EngineError;

/// A named derivation evaluated by the script engine.
#[derive(Debug, Clone, Deserialize)]
pub struct ScriptDef {
    /// Script name, referenced by script steps.
    pub name: String,

    /// Expression source. Runs against a context snapshot only.
    pub source: String,
}

/// Errors raised while loading or validating the catalog.
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("catalog defines no flows")]
    NoFlows,

    #[error("duplicate {kind} '{name}'")]
    Duplicate { kind: &'static str, name: String },

    #[error("flow '{flow}': {detail}")]
    InvalidFlow { flow: String, detail: String },
}

/// The loaded, immutable catalog.
#[derive(Debug, Clone)]
pub struct FlowCatalog {
    flows: HashMap<String, Flow>,
    apis: HashMap<String, ApiDescriptor>,
    rulesets: HashMap<String, ValidationRuleset>,
    scripts: HashMap<String, ScriptDef>,
    prompts: HashMap<String, String>,
}

impl FlowCatalog {
    /// Loads the catalog documents from a directory.
    ///
    /// Expected files: `flows.yaml` (required), `apis.yaml`,
    /// `rulesets.yaml`, `scripts.yaml`, `prompts.yaml` (each optional).
    /// Cross-references are checked eagerly so a broken catalog fails at
    /// startup, not mid-conversation.
    pub fn load(dir: &Path) -> Result<Self, CatalogError> {
        let flows: Vec<Flow> = read_doc(&dir.join("flows.yaml"), true)?;
        let apis: Vec<ApiDescriptor> = read_doc(&dir.join("apis.yaml"), false)?;
        let rulesets: Vec<ValidationRuleset> = read_doc(&dir.join("rulesets.yaml"), false)?;
        let scripts: Vec<ScriptDef> = read_doc(&dir.join("scripts.yaml"), false)?;
        let prompts: HashMap<String, String> = read_doc(&dir.join("prompts.yaml"), false)?;

        Self::from_parts(flows, apis, rulesets, scripts, prompts)
    }

    /// Builds a catalog from already-parsed documents and validates it.
    pub fn from_parts(
        flows: Vec<Flow>,
        apis: Vec<ApiDescriptor>,
        rulesets: Vec<ValidationRuleset>,
        scripts: Vec<ScriptDef>,
        prompts: HashMap<String, String>,
    ) -> Result<Self, CatalogError> {
        if flows.is_empty() {
            return Err(CatalogError::NoFlows);
        }

        let catalog = Self {
            flows: index_by("flow", flows, |f| f.name.clone())?,
            apis: index_by("api", apis, |a| a.name.clone())?,
            rulesets: index_by("ruleset", rulesets, |r| r.name.clone())?,
            scripts: index_by("script", scripts, |s| s.name.clone())?,
            prompts,
        };
        catalog.check_references()?;
        Ok(catalog)
    }

    // ─────────────────────────────────────────────────────────────────────
    // Accessors
    // ─────────────────────────────────────────────────────────────────────

    /// Looks up a flow by name.
    pub fn flow(&self, name: &str) -> Result<&Flow, EngineError> {
        self.flows
            .get(name)
            .ok_or_else(|| EngineError::not_found("flow", name))
    }

    /// Looks up an API descriptor by name.
    pub fn api(&self, name: &str) -> Result<&ApiDescriptor, EngineError> {
        self.apis
            .get(name)
            .ok_or_else(|| EngineError::not_found("api", name))
    }

    /// Looks up a validation ruleset by name.
    pub fn ruleset(&self, name: &str) -> Result<&ValidationRuleset, EngineError> {
        self.rulesets
            .get(name)
            .ok_or_else(|| EngineError::not_found("ruleset", name))
    }

    /// Looks up a derivation script by name.
    pub fn script(&self, name: &str) -> Result<&ScriptDef, EngineError> {
        self.scripts
            .get(name)
            .ok_or_else(|| EngineError::not_found("script", name))
    }

    /// Looks up a prompt template by id.
    pub fn prompt(&self, id: &str) -> Result<&str, EngineError> {
        self.prompts
            .get(id)
            .map(String::as_str)
            .ok_or_else(|| EngineError::not_found("prompt", id))
    }

    /// All flows, for intent classification.
    pub fn flows(&self) -> impl Iterator<Item = &Flow> {
        self.flows.values()
    }

    // ─────────────────────────────────────────────────────────────────────
    // Integrity
    // ─────────────────────────────────────────────────────────────────────

    fn check_references(&self) -> Result<(), CatalogError> {
        for flow in self.flows.values() {
            let invalid = |detail: String| CatalogError::InvalidFlow {
                flow: flow.name.clone(),
                detail,
            };

            if let Some(initial) = &flow.initial_parameter {
                if !flow.parameters.contains_key(initial) {
                    return Err(invalid(format!(
                        "initial parameter '{}' is not defined",
                        initial
                    )));
                }
            }

            for param in flow.parameters.values() {
                if let Some(next) = &param.next_parameter {
                    if !flow.parameters.contains_key(next) {
                        return Err(invalid(format!(
                            "parameter '{}' links to unknown '{}'",
                            param.name, next
                        )));
                    }
                }
                for step in param.pre_ask_steps.iter().chain(&param.post_ask_steps) {
                    self.check_step(flow, step).map_err(invalid)?;
                }
            }

            for step in &flow.final_action {
                self.check_step(flow, step).map_err(invalid)?;
            }
        }
        Ok(())
    }

    fn check_step(&self, flow: &Flow, step: &Step) -> Result<(), String> {
        match step {
            Step::Api { name, .. } if !self.apis.contains_key(name) => {
                Err(format!("step references unknown api '{}'", name))
            }
            Step::Script { name, .. } if !self.scripts.contains_key(name) => {
                Err(format!("step references unknown script '{}'", name))
            }
            Step::Ai { prompt_id, .. } if !self.prompts.contains_key(prompt_id) => {
                Err(format!("step references unknown prompt '{}'", prompt_id))
            }
            Step::Validate { ruleset } if !self.rulesets.contains_key(ruleset) => {
                Err(format!("step references unknown ruleset '{}'", ruleset))
            }
            Step::Decision { cases, default, .. } => {
                for target in cases
                    .iter()
                    .map(|c| c.then.as_str())
                    .chain(default.as_deref())
                {
                    if !flow.parameters.contains_key(target) {
                        return Err(format!(
                            "decision targets unknown parameter '{}'",
                            target
                        ));
                    }
                }
                Ok(())
            }
            _ => Ok(()),
        }
    }
}

fn index_by<T>(
    kind: &'static str,
    items: Vec<T>,
    key: impl Fn(&T) -> String,
) -> Result<HashMap<String, T>, CatalogError> {
    let mut map = HashMap::with_capacity(items.len());
    for item in items {
        let name = key(&item);
        if map.insert(name.clone(), item).is_some() {
            return Err(CatalogError::Duplicate { kind, name });
        }
    }
    Ok(map)
}

fn read_doc<T: DeserializeOwned + Default>(
    path: &Path,
    required: bool,
) -> Result<T, CatalogError> {
    if !path.exists() && !required {
        return Ok(T::default());
    }
    let text = std::fs::read_to_string(path).map_err(|source| CatalogError::Io {
        path: path.display().to_string(),
        source,
    })?;
    serde_yaml::from_str(&text).map_err(|source| CatalogError::Parse {
        path: path.display().to_string(),
        source,
    })
}
