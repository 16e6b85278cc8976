//! Gemini Extractor - Extractor implementation over the Generative
//! Language API.
//!
//! Sends the rendered prompt, the raw utterance, and the conversation
//! context to a Gemini model and parses the JSON object it replies with.
//! A reply that cannot be parsed as JSON is reported as `None` rather than
//! an error: the model produced *something*, it just was not usable.

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::Client;
use secrecy::{ExposeSecret, Secret};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::time::Duration;

use crate::ports::{Extractor, ExtractorError};

/// Replies often wrap the JSON object in a fenced code block.
static JSON_FENCE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)```(?:json)?\s*(.*?)\s*```").expect("fence pattern"));

/// Configuration for the Gemini extractor.
#[derive(Debug, Clone)]
pub struct GeminiConfig {
    /// API key for authentication.
    api_key: Secret<String>,
    /// Model to use (e.g. "gemini-1.5-flash").
    pub model: String,
    /// Base URL for the API.
    pub base_url: String,
    /// Request timeout.
    pub timeout: Duration,
    /// Maximum tokens the model may generate per reply.
    pub max_output_tokens: u32,
}

impl GeminiConfig {
    /// Creates a new configuration with the given API key.
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: Secret::new(api_key.into()),
            model: "gemini-1.5-flash".to_string(),
            base_url: "https://generativelanguage.googleapis.com".to_string(),
            timeout: Duration::from_secs(30),
            max_output_tokens: 256,
        }
    }

    /// Sets the model to use.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Sets the base URL.
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    /// Sets the request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Sets the output token cap.
    pub fn with_max_output_tokens(mut self, max: u32) -> Self {
        self.max_output_tokens = max;
        self
    }

    fn api_key(&self) -> &str {
        self.api_key.expose_secret()
    }
}

/// Gemini-backed extractor implementation.
pub struct GeminiExtractor {
    config: GeminiConfig,
    client: Client,
}

impl GeminiExtractor {
    /// Creates a new extractor with the given configuration.
    pub fn new(config: GeminiConfig) -> Self {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .expect("Failed to create HTTP client");
        Self { config, client }
    }

    fn generate_url(&self) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent?key={}",
            self.config.base_url,
            self.config.model,
            self.config.api_key()
        )
    }

    fn full_prompt(prompt: &str, utterance: &str, context: &Map<String, Value>) -> String {
        format!(
            "{prompt}\n\nText to analyze: \"{utterance}\"\n\nConversation context: {context}\n\nRespond with a single JSON object.",
            context = Value::Object(context.clone())
        )
    }
}

#[async_trait]
impl Extractor for GeminiExtractor {
    async fn extract(
        &self,
        prompt: &str,
        utterance: &str,
        context: &Map<String, Value>,
    ) -> Result<Option<Value>, ExtractorError> {
        let request = GenerateRequest {
            contents: vec![RequestContent {
                parts: vec![Part {
                    text: Self::full_prompt(prompt, utterance, context),
                }],
            }],
            generation_config: GenerationConfig {
                max_output_tokens: self.config.max_output_tokens,
                temperature: 0.2,
            },
        };

        let response = self
            .client
            .post(self.generate_url())
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ExtractorError::Timeout(self.config.timeout)
                } else {
                    ExtractorError::Network(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(ExtractorError::Status(status.as_u16()));
        }

        let reply: GenerateResponse = response
            .json()
            .await
            .map_err(|e| ExtractorError::Network(e.to_string()))?;

        Ok(reply.first_text().and_then(|text| parse_reply(&text)))
    }
}

/// Parses a model reply into JSON, stripping a code fence when present.
fn parse_reply(text: &str) -> Option<Value> {
    let body = JSON_FENCE
        .captures(text)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
        .unwrap_or(text)
        .trim();

    match serde_json::from_str(body) {
        Ok(value) => Some(value),
        Err(_) => {
            tracing::debug!("extraction reply was not valid JSON");
            None
        }
    }
}

// ── Wire types ───────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct GenerateRequest {
    contents: Vec<RequestContent>,
    #[serde(rename = "generationConfig")]
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
struct RequestContent {
    parts: Vec<Part>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Part {
    text: String,
}

#[derive(Debug, Serialize)]
struct GenerationConfig {
    #[serde(rename = "maxOutputTokens")]
    max_output_tokens: u32,
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<ResponseContent>,
}

#[derive(Debug, Deserialize)]
struct ResponseContent {
    #[serde(default)]
    parts: Vec<Part>,
}

impl GenerateResponse {
    fn first_text(&self) -> Option<String> {
        self.candidates
            .first()
            .and_then(|c| c.content.as_ref())
            .and_then(|c| c.parts.first())
            .map(|p| p.text.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_bare_json_reply() {
        let parsed = parse_reply(r#"{"value": "Quito"}"#).unwrap();
        assert_eq!(parsed, json!({"value": "Quito"}));
    }

    #[test]
    fn strips_json_code_fence() {
        let text = "```json\n{\"match\": {\"id\": 1, \"label\": \"Guayaquil\"}}\n```";
        let parsed = parse_reply(text).unwrap();
        assert_eq!(parsed["match"]["label"], json!("Guayaquil"));
    }

    #[test]
    fn strips_unlabeled_code_fence() {
        let text = "```\n{\"no_match\": true}\n```";
        assert_eq!(parse_reply(text).unwrap(), json!({"no_match": true}));
    }

    #[test]
    fn prose_reply_is_unusable() {
        assert!(parse_reply("I think the user means Quito.").is_none());
    }

    #[test]
    fn full_prompt_embeds_utterance_and_context() {
        let mut ctx = Map::new();
        ctx.insert("city".to_string(), json!("Quito"));

        let prompt = GeminiExtractor::full_prompt("Extract the branch.", "Kennedy", &ctx);
        assert!(prompt.contains("Extract the branch."));
        assert!(prompt.contains("\"Kennedy\""));
        assert!(prompt.contains("\"city\":\"Quito\""));
        assert!(prompt.ends_with("Respond with a single JSON object."));
    }

    #[test]
    fn response_first_text_handles_empty_candidates() {
        let reply: GenerateResponse = serde_json::from_value(json!({})).unwrap();
        assert!(reply.first_text().is_none());
    }

    #[test]
    fn config_builders_override_defaults() {
        let config = GeminiConfig::new("key")
            .with_model("gemini-2.0-flash")
            .with_base_url("http://localhost:9999")
            .with_timeout(Duration::from_secs(5))
            .with_max_output_tokens(64);
        assert_eq!(config.model, "gemini-2.0-flash");
        assert_eq!(config.base_url, "http://localhost:9999");
        assert_eq!(config.timeout, Duration::from_secs(5));
        assert_eq!(config.max_output_tokens, 64);
    }
}
