//! HTTP Reference Client - drives declared API descriptors over reqwest.
//!
//! Handles the query/body partition of step inputs, static headers, and
//! the optional OAuth2 client-credentials exchange. Tokens are cached
//! per API name for the process lifetime, independent of any session.

use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use reqwest::Client;
use secrecy::ExposeSecret;
use serde::Deserialize;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::RwLock;

use crate::domain::catalog::{ApiDescriptor, HttpMethod, OAuthClientCredentials};
use crate::ports::{ReferenceApi, ReferenceApiError};

/// Tokens are refreshed this many seconds before their reported expiry.
const EXPIRY_LEEWAY_SECS: i64 = 30;

#[derive(Debug, Clone)]
struct CachedToken {
    access_token: String,
    expires_at: DateTime<Utc>,
}

impl CachedToken {
    fn is_fresh(&self, now: DateTime<Utc>) -> bool {
        self.expires_at - ChronoDuration::seconds(EXPIRY_LEEWAY_SECS) > now
    }
}

/// Reqwest-backed reference-data client with a per-API token cache.
pub struct HttpReferenceClient {
    client: Client,
    tokens: RwLock<HashMap<String, CachedToken>>,
}

impl HttpReferenceClient {
    /// Creates a client with the given request timeout.
    pub fn new(timeout: Duration) -> Self {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .expect("Failed to create HTTP client");
        Self {
            client,
            tokens: RwLock::new(HashMap::new()),
        }
    }

    /// Returns a bearer token for the API, reusing the cached one while it
    /// is still fresh.
    async fn bearer_token(
        &self,
        api_name: &str,
        auth: &OAuthClientCredentials,
    ) -> Result<String, ReferenceApiError> {
        let now = Utc::now();
        {
            let tokens = self.tokens.read().await;
            if let Some(token) = tokens.get(api_name) {
                if token.is_fresh(now) {
                    return Ok(token.access_token.clone());
                }
            }
        }

        let token = self.exchange(api_name, auth).await?;
        let access_token = token.access_token.clone();
        self.tokens
            .write()
            .await
            .insert(api_name.to_string(), token);
        tracing::debug!(api = api_name, "cached fresh bearer token");
        Ok(access_token)
    }

    /// Performs the OAuth2 client-credentials exchange.
    async fn exchange(
        &self,
        api_name: &str,
        auth: &OAuthClientCredentials,
    ) -> Result<CachedToken, ReferenceApiError> {
        let auth_err = |message: String| ReferenceApiError::Auth {
            api: api_name.to_string(),
            message,
        };

        let mut form = vec![
            ("grant_type", "client_credentials".to_string()),
            ("client_id", auth.client_id.clone()),
            ("client_secret", auth.client_secret.expose_secret().clone()),
        ];
        if let Some(scope) = &auth.scope {
            form.push(("scope", scope.clone()));
        }

        let response = self
            .client
            .post(&auth.token_url)
            .form(&form)
            .send()
            .await
            .map_err(|e| auth_err(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(auth_err(format!("token endpoint returned {}", status)));
        }

        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| auth_err(e.to_string()))?;

        Ok(CachedToken {
            access_token: token.access_token,
            expires_at: Utc::now() + ChronoDuration::seconds(token.expires_in as i64),
        })
    }
}

#[async_trait]
impl ReferenceApi for HttpReferenceClient {
    async fn call(
        &self,
        descriptor: &ApiDescriptor,
        query: &Map<String, Value>,
        body: &Map<String, Value>,
    ) -> Result<Value, ReferenceApiError> {
        let api = descriptor.name.as_str();

        let mut request = match descriptor.method {
            HttpMethod::Get => self.client.get(&descriptor.endpoint),
            HttpMethod::Post => self.client.post(&descriptor.endpoint),
        };

        for (name, value) in &descriptor.headers {
            request = request.header(name, value);
        }
        if !query.is_empty() {
            request = request.query(&query_pairs(query));
        }
        if descriptor.method == HttpMethod::Post {
            request = request.json(&Value::Object(body.clone()));
        }
        if let Some(auth) = &descriptor.auth {
            let token = self.bearer_token(api, auth).await?;
            request = request.bearer_auth(token);
        }

        tracing::debug!(api, method = descriptor.method.as_str(), "calling reference API");
        let response = request.send().await.map_err(|e| ReferenceApiError::Network {
            api: api.to_string(),
            message: e.to_string(),
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(ReferenceApiError::Status {
                api: api.to_string(),
                status: status.as_u16(),
            });
        }

        response.json().await.map_err(|e| ReferenceApiError::Decode {
            api: api.to_string(),
            message: e.to_string(),
        })
    }
}

/// Query values are sent as plain text: strings verbatim, everything else
/// as compact JSON.
fn query_pairs(query: &Map<String, Value>) -> Vec<(String, String)> {
    query
        .iter()
        .map(|(k, v)| {
            let text = match v {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            (k.clone(), text)
        })
        .collect()
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default = "default_expires_in")]
    expires_in: u64,
}

fn default_expires_in() -> u64 {
    3600
}
