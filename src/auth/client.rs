//! Client for the remote token-validation service.

use std::fmt;
use std::time::Duration;

use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use crate::auth::payload::{ApiTokenPayload, AuthPayload, UserPayload};

/// Request timeout for auth service calls.
const REQUEST_TIMEOUT_SECONDS: u64 = 10;

const CHECK_TOKEN_QUERY: &str = r"
query CheckToken($token: String!) {
  checkToken(token: $token) {
    isValid
    payload {
      ... on UserPayload {
        user { id email }
        roles { shortCode }
        currentRole { shortCode }
      }
      ... on ApiTokenPayload {
        accessTokenId
      }
    }
  }
}
";

/// Outcome of a token check.
///
/// `is_valid == false` with no payload is a normal result (bad or expired
/// token), distinct from the transport failures in [`AuthServiceError`].
#[derive(Debug, Clone, PartialEq)]
pub struct TokenCheck {
    pub is_valid: bool,
    pub payload: Option<AuthPayload>,
}

/// Errors talking to the auth service.
#[derive(Debug, Clone)]
pub enum AuthServiceError {
    /// Network/transport failure reaching the auth endpoint.
    Transport(String),
    /// Non-success HTTP status from the auth endpoint.
    Status(u16),
    /// Response body did not match the expected shape.
    InvalidResponse(String),
}

impl fmt::Display for AuthServiceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Transport(msg) => write!(f, "Auth service unreachable: {}", msg),
            Self::Status(code) => write!(f, "Auth service returned HTTP {}", code),
            Self::InvalidResponse(msg) => write!(f, "Malformed auth service response: {}", msg),
        }
    }
}

impl std::error::Error for AuthServiceError {}

/// Wire shape of the polymorphic payload. The remote discriminates by which
/// fields it reports; this is the only place that shape is inspected.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum WirePayload {
    User(UserPayload),
    ApiToken(ApiTokenPayload),
}

impl From<WirePayload> for AuthPayload {
    fn from(wire: WirePayload) -> Self {
        match wire {
            WirePayload::User(p) => AuthPayload::User(p),
            WirePayload::ApiToken(p) => AuthPayload::ApiToken(p),
        }
    }
}

#[derive(Debug, Deserialize)]
struct CheckTokenResult {
    #[serde(rename = "isValid")]
    is_valid: bool,
    payload: Option<WirePayload>,
}

#[derive(Debug, Deserialize)]
struct CheckTokenData {
    #[serde(rename = "checkToken")]
    check_token: CheckTokenResult,
}

#[derive(Debug, Deserialize)]
struct CheckTokenResponse {
    data: Option<CheckTokenData>,
    #[serde(default)]
    errors: Vec<serde_json::Value>,
}

/// Client for the configured auth endpoint.
pub struct AuthClient {
    endpoint: String,
    client: reqwest::Client,
}

impl AuthClient {
    /// Create a client for the given auth endpoint URL.
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            client: reqwest::Client::builder()
                .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECONDS))
                .build()
                .expect("Failed to create HTTP client"),
        }
    }

    /// Ask the auth service whether `token` is valid.
    ///
    /// No retry happens at this layer: startup-phase failures are retried by
    /// the bootstrap supervisor and in-request failures surface to the
    /// context builder.
    pub async fn check_token(&self, token: &str) -> Result<TokenCheck, AuthServiceError> {
        let body = json!({
            "query": CHECK_TOKEN_QUERY,
            "variables": { "token": token },
        });

        let response = self
            .client
            .post(&self.endpoint)
            .json(&body)
            .send()
            .await
            .map_err(|e| AuthServiceError::Transport(e.to_string()))?;

        if !response.status().is_success() {
            return Err(AuthServiceError::Status(response.status().as_u16()));
        }

        let parsed: CheckTokenResponse = response
            .json()
            .await
            .map_err(|e| AuthServiceError::InvalidResponse(e.to_string()))?;

        if !parsed.errors.is_empty() {
            return Err(AuthServiceError::InvalidResponse(format!(
                "checkToken errors: {}",
                serde_json::Value::Array(parsed.errors)
            )));
        }

        let result = parsed
            .data
            .ok_or_else(|| AuthServiceError::InvalidResponse("missing data".to_string()))?
            .check_token;

        debug!(is_valid = result.is_valid, "token check completed");

        Ok(TokenCheck {
            is_valid: result.is_valid,
            payload: result.payload.map(AuthPayload::from),
        })
    }
}
