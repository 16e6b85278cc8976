//! Mock Extractor - scripted extraction replies for tests and local
//! development.

use async_trait::async_trait;
use serde_json::{Map, Value};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use crate::ports::{Extractor, ExtractorError};

/// One recorded extraction call.
#[derive(Debug, Clone)]
pub struct RecordedExtraction {
    pub prompt: String,
    pub utterance: String,
}

/// Extractor that replays a scripted sequence of replies.
///
/// Each call pops the next reply; an exhausted script replies `None`
/// (an unusable response). `failing()` builds a mock whose every call
/// errors, for exercising abort paths.
#[derive(Clone, Default)]
pub struct MockExtractor {
    replies: Arc<Mutex<VecDeque<Option<Value>>>>,
    fail: bool,
    calls: Arc<Mutex<Vec<RecordedExtraction>>>,
}

impl MockExtractor {
    /// Creates a mock that replays `replies` in order.
    pub fn replying(replies: Vec<Option<Value>>) -> Self {
        Self {
            replies: Arc::new(Mutex::new(replies.into())),
            fail: false,
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Creates a mock whose every call fails with a network error.
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::replying(Vec::new())
        }
    }

    /// All calls made so far.
    pub fn calls(&self) -> Vec<RecordedExtraction> {
        self.calls.lock().expect("call log poisoned").clone()
    }
}

#[async_trait]
impl Extractor for MockExtractor {
    async fn extract(
        &self,
        prompt: &str,
        utterance: &str,
        _context: &Map<String, Value>,
    ) -> Result<Option<Value>, ExtractorError> {
        self.calls
            .lock()
            .expect("call log poisoned")
            .push(RecordedExtraction {
                prompt: prompt.to_string(),
                utterance: utterance.to_string(),
            });

        if self.fail {
            return Err(ExtractorError::Network("mock extractor failure".to_string()));
        }

        let mut replies = self.replies.lock().expect("reply queue poisoned");
        Ok(replies.pop_front().flatten())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn replays_replies_in_order() {
        let mock = MockExtractor::replying(vec![
            Some(json!({"value": 1})),
            Some(json!({"value": 2})),
        ]);

        let first = mock.extract("p", "u", &Map::new()).await.unwrap();
        let second = mock.extract("p", "u", &Map::new()).await.unwrap();

        assert_eq!(first, Some(json!({"value": 1})));
        assert_eq!(second, Some(json!({"value": 2})));
    }

    #[tokio::test]
    async fn exhausted_script_replies_none() {
        let mock = MockExtractor::replying(Vec::new());
        assert_eq!(mock.extract("p", "u", &Map::new()).await.unwrap(), None);
    }

    #[tokio::test]
    async fn failing_mock_errors_on_every_call() {
        let mock = MockExtractor::failing();
        assert!(mock.extract("p", "u", &Map::new()).await.is_err());
    }

    #[tokio::test]
    async fn records_prompts_and_utterances() {
        let mock = MockExtractor::replying(vec![Some(json!({}))]);
        mock.extract("the prompt", "the answer", &Map::new())
            .await
            .unwrap();

        let calls = mock.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].prompt, "the prompt");
        assert_eq!(calls[0].utterance, "the answer");
    }
}
