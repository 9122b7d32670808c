//! Per-request authentication context.

use crate::auth::client::{AuthClient, AuthServiceError};
use crate::auth::payload::AuthPayload;
use crate::auth::token::extract_bearer;

/// Immutable bundle of auth facts for one inbound request.
///
/// Built exactly once per request, before any subgraph call is dispatched,
/// and read-only afterwards. Invariant: without a token, `is_valid_token` is
/// false and the payload is absent; the payload is only populated for a token
/// the auth service reported valid.
#[derive(Debug, Clone)]
pub struct RequestContext {
    auth_token: Option<String>,
    is_valid_token: bool,
    auth_jwt_payload: Option<AuthPayload>,
}

impl RequestContext {
    /// Context for a request that carried no usable credential.
    pub fn anonymous() -> Self {
        Self {
            auth_token: None,
            is_valid_token: false,
            auth_jwt_payload: None,
        }
    }

    /// Build the context from the raw `Authorization` header value.
    ///
    /// A missing or malformed header yields an anonymous context without
    /// touching the network. A transport failure talking to the auth service
    /// propagates and fails the whole inbound request (fail closed).
    pub async fn build(
        auth: &AuthClient,
        authorization: Option<&str>,
    ) -> Result<Self, AuthServiceError> {
        let Some(token) = extract_bearer(authorization) else {
            return Ok(Self::anonymous());
        };

        let check = auth.check_token(token).await?;

        Ok(Self {
            auth_token: Some(token.to_string()),
            is_valid_token: check.is_valid,
            // Never trust a payload reported alongside an invalid verdict.
            auth_jwt_payload: if check.is_valid { check.payload } else { None },
        })
    }

    /// The raw bearer token, when one was presented.
    pub fn auth_token(&self) -> Option<&str> {
        self.auth_token.as_deref()
    }

    /// Whether the auth service reported the token valid.
    pub fn is_valid_token(&self) -> bool {
        self.is_valid_token
    }

    /// The validated identity payload, when one exists.
    pub fn auth_jwt_payload(&self) -> Option<&AuthPayload> {
        self.auth_jwt_payload.as_ref()
    }
}
