//! Step definitions.
//!
//! A step is one declared unit of work run by the interpreter while
//! collecting a parameter. Steps are read-only configuration; the
//! interpreter never mutates them.

use serde::Deserialize;

/// One ordered unit of work in a parameter's pre-ask or post-ask sequence.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Step {
    /// Call a declared reference-data API and store the decoded payload.
    Api {
        /// Name of the API descriptor in the catalog.
        name: String,
        /// Context keys to forward, partitioned into query and body.
        #[serde(default)]
        input: ApiInputMapping,
        /// Context key the response payload is stored under.
        output_key: String,
    },

    /// Evaluate a declared derivation script against a context snapshot.
    Script {
        /// Name of the script definition in the catalog.
        name: String,
        /// Context key the result is stored under.
        output_key: String,
    },

    /// Run the extraction collaborator against the raw utterance.
    Ai {
        /// Prompt template id in the catalog.
        prompt_id: String,
        /// Extra instruction text appended to the rendered prompt.
        #[serde(default)]
        prompt_append: Option<String>,
    },

    /// Evaluate a named validation ruleset against the latest extraction.
    Validate {
        /// Ruleset name in the catalog.
        ruleset: String,
    },

    /// Jump the parameter pointer based on a context value.
    ///
    /// The only mechanism that can leave the flow's normal linked order.
    Decision {
        /// Context key whose value is matched against the cases.
        on_key: String,
        /// Literal cases in declaration order.
        cases: Vec<DecisionCase>,
        /// Target parameter when no case matches.
        #[serde(default)]
        default: Option<String>,
    },
}

/// Partition of an API step's inputs into URL-query and body parameters.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ApiInputMapping {
    /// Context keys sent as URL query parameters.
    #[serde(default)]
    pub query: Vec<String>,

    /// Context keys sent in the request body.
    #[serde(default)]
    pub body: Vec<String>,
}

impl ApiInputMapping {
    /// Returns true when the mapping forwards no context keys.
    pub fn is_empty(&self) -> bool {
        self.query.is_empty() && self.body.is_empty()
    }
}

/// A single literal case of a decision step.
#[derive(Debug, Clone, Deserialize)]
pub struct DecisionCase {
    /// Literal the context value is compared against.
    pub equals: String,
    /// Parameter the pointer jumps to on a match.
    pub then: String,
}
