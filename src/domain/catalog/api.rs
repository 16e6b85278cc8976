//! Reference-data API descriptors.

use secrecy::Secret;
use serde::Deserialize;
use std::collections::HashMap;

/// Declares how to reach one reference-data endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiDescriptor {
    /// API name, referenced by api steps. Also keys the token cache.
    pub name: String,

    /// Endpoint URL.
    pub endpoint: String,

    /// HTTP method.
    #[serde(default)]
    pub method: HttpMethod,

    /// Static headers sent with every request.
    #[serde(default)]
    pub headers: HashMap<String, String>,

    /// Optional OAuth2 client-credentials descriptor. When present, a bearer
    /// token is obtained (or reused from the cache) before each call.
    #[serde(default)]
    pub auth: Option<OAuthClientCredentials>,
}

/// HTTP method of an API descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    #[default]
    Get,
    Post,
}

impl HttpMethod {
    /// Uppercase wire name.
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
        }
    }
}

/// OAuth2 client-credentials grant settings for one API.
#[derive(Debug, Clone, Deserialize)]
pub struct OAuthClientCredentials {
    /// Token endpoint URL.
    pub token_url: String,

    /// Client identifier.
    pub client_id: String,

    /// Client secret. Never logged or serialized back out.
    pub client_secret: Secret<String>,

    /// Optional scope requested with the token.
    #[serde(default)]
    pub scope: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;

    #[test]
    fn descriptor_defaults_to_get_with_no_auth() {
        let yaml = r#"
name: cities
endpoint: "https://api.example.com/v1/cities"
"#;
        let api: ApiDescriptor = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(api.method, HttpMethod::Get);
        assert!(api.auth.is_none());
        assert!(api.headers.is_empty());
    }

    #[test]
    fn descriptor_parses_auth_block() {
        let yaml = r#"
name: appointments
endpoint: "https://api.example.com/v1/appointments"
method: POST
headers:
  Content-Type: application/json
auth:
  token_url: "https://auth.example.com/oauth/token"
  client_id: convoflow
  client_secret: s3cret
  scope: appointments.write
"#;
        let api: ApiDescriptor = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(api.method, HttpMethod::Post);
        let auth = api.auth.expect("auth block");
        assert_eq!(auth.client_id, "convoflow");
        assert_eq!(auth.client_secret.expose_secret(), "s3cret");
        assert_eq!(auth.scope.as_deref(), Some("appointments.write"));
    }

    #[test]
    fn method_wire_names() {
        assert_eq!(HttpMethod::Get.as_str(), "GET");
        assert_eq!(HttpMethod::Post.as_str(), "POST");
    }
}
