//! Request and response DTOs for the turn endpoints.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::domain::dialogue::{TurnMessage, TurnReply};

/// Body of `POST /start_conversation`.
#[derive(Debug, Deserialize)]
pub struct StartRequest {
    #[serde(rename = "sessionId")]
    pub session_id: String,
}

/// Body of `POST /conversation`.
#[derive(Debug, Deserialize)]
pub struct AdvanceRequest {
    #[serde(rename = "sessionId")]
    pub session_id: String,
    #[serde(rename = "userInput")]
    pub user_input: String,
}

/// A turn's reply: exactly one of `next_prompt` and `final_message` is set.
#[derive(Debug, Serialize)]
pub struct TurnResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_prompt: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub final_message: Option<String>,

    pub collected_params: Map<String, Value>,
}

impl From<TurnReply> for TurnResponse {
    fn from(reply: TurnReply) -> Self {
        let (next_prompt, final_message) = match reply.message {
            TurnMessage::Prompt(text) => (Some(text), None),
            TurnMessage::Final(text) => (None, Some(text)),
        };
        Self {
            next_prompt,
            final_message,
            collected_params: reply.collected,
        }
    }
}

/// Error body for rejected requests.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn start_request_uses_camel_case_field() {
        let req: StartRequest = serde_json::from_value(json!({"sessionId": "s1"})).unwrap();
        assert_eq!(req.session_id, "s1");
    }

    #[test]
    fn prompt_reply_serializes_next_prompt_only() {
        let reply = TurnReply {
            message: TurnMessage::Prompt("Which city?".to_string()),
            collected: Map::new(),
        };
        let body = serde_json::to_value(TurnResponse::from(reply)).unwrap();
        assert_eq!(body["next_prompt"], json!("Which city?"));
        assert!(body.get("final_message").is_none());
    }

    #[test]
    fn final_reply_serializes_final_message_only() {
        let mut collected = Map::new();
        collected.insert("city".to_string(), json!("Quito"));
        let reply = TurnReply {
            message: TurnMessage::Final("Booked.".to_string()),
            collected,
        };
        let body = serde_json::to_value(TurnResponse::from(reply)).unwrap();
        assert_eq!(body["final_message"], json!("Booked."));
        assert!(body.get("next_prompt").is_none());
        assert_eq!(body["collected_params"]["city"], json!("Quito"));
    }
}
