//! Mock Reference API - canned responses keyed by API name, for tests.

use async_trait::async_trait;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::domain::catalog::ApiDescriptor;
use crate::ports::{ReferenceApi, ReferenceApiError};

/// One recorded reference call.
#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub api: String,
    pub query: Map<String, Value>,
    pub body: Map<String, Value>,
}

/// Reference client that serves canned payloads and records every call.
#[derive(Clone, Default)]
pub struct MockReferenceApi {
    responses: Arc<Mutex<HashMap<String, Value>>>,
    failure_status: Option<u16>,
    calls: Arc<Mutex<Vec<RecordedCall>>>,
}

impl MockReferenceApi {
    /// Creates a mock serving `response` for calls to `api`.
    pub fn with_response(api: impl Into<String>, response: Value) -> Self {
        Self::default().and_response(api, response)
    }

    /// Adds a canned response for another API.
    pub fn and_response(self, api: impl Into<String>, response: Value) -> Self {
        self.responses
            .lock()
            .expect("response map poisoned")
            .insert(api.into(), response);
        self
    }

    /// Creates a mock whose every call fails with the given status.
    pub fn failing_with_status(status: u16) -> Self {
        Self {
            failure_status: Some(status),
            ..Self::default()
        }
    }

    /// All calls made so far.
    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().expect("call log poisoned").clone()
    }
}

#[async_trait]
impl ReferenceApi for MockReferenceApi {
    async fn call(
        &self,
        descriptor: &ApiDescriptor,
        query: &Map<String, Value>,
        body: &Map<String, Value>,
    ) -> Result<Value, ReferenceApiError> {
        self.calls.lock().expect("call log poisoned").push(RecordedCall {
            api: descriptor.name.clone(),
            query: query.clone(),
            body: body.clone(),
        });

        if let Some(status) = self.failure_status {
            return Err(ReferenceApiError::Status {
                api: descriptor.name.clone(),
                status,
            });
        }

        self.responses
            .lock()
            .expect("response map poisoned")
            .get(&descriptor.name)
            .cloned()
            .ok_or_else(|| ReferenceApiError::Status {
                api: descriptor.name.clone(),
                status: 404,
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::HashMap as StdHashMap;

    fn descriptor(name: &str) -> ApiDescriptor {
        ApiDescriptor {
            name: name.to_string(),
            endpoint: format!("https://api.example.com/{}", name),
            method: Default::default(),
            headers: StdHashMap::new(),
            auth: None,
        }
    }

    #[tokio::test]
    async fn serves_canned_response_and_records_call() {
        let mock = MockReferenceApi::with_response("cities", json!([{"city_id": 1}]));

        let mut query = Map::new();
        query.insert("page".to_string(), json!(1));
        let payload = mock
            .call(&descriptor("cities"), &query, &Map::new())
            .await
            .unwrap();

        assert_eq!(payload, json!([{"city_id": 1}]));
        let calls = mock.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].api, "cities");
        assert_eq!(calls[0].query.get("page"), Some(&json!(1)));
    }

    #[tokio::test]
    async fn unknown_api_is_a_404() {
        let mock = MockReferenceApi::with_response("cities", json!([]));
        let err = mock
            .call(&descriptor("branches"), &Map::new(), &Map::new())
            .await
            .unwrap_err();
        assert!(matches!(err, ReferenceApiError::Status { status: 404, .. }));
    }

    #[tokio::test]
    async fn failing_mock_returns_configured_status() {
        let mock = MockReferenceApi::failing_with_status(503);
        let err = mock
            .call(&descriptor("cities"), &Map::new(), &Map::new())
            .await
            .unwrap_err();
        assert!(matches!(err, ReferenceApiError::Status { status: 503, .. }));
    }

    #[tokio::test]
    async fn clones_share_the_call_log() {
        let mock = MockReferenceApi::with_response("cities", json!([]));
        let clone = mock.clone();
        clone
            .call(&descriptor("cities"), &Map::new(), &Map::new())
            .await
            .unwrap();
        assert_eq!(mock.calls().len(), 1);
    }
}
