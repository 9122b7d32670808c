//! Credential policy for outbound subgraph calls.
//!
//! Evaluated once per (request, subgraph) pair, after the request context is
//! frozen and before the leg is dispatched. Mutates outbound headers only;
//! never performs I/O.

use std::fmt;

use base64::Engine;
use http::header::AUTHORIZATION;
use http::{HeaderMap, HeaderValue};

use crate::auth::RequestContext;
use crate::config::SubgraphDescriptor;

/// Header carrying the already-validated identity payload, base64-encoded
/// JSON, so a subgraph can trust it without re-validating the token itself.
pub const AUTH_JWT_PAYLOAD_HEADER: &str = "x-auth-jwt-payload";

/// A subgraph leg that must not or cannot be dispatched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PolicyError {
    /// The subgraph requires auth and the request has no valid token.
    Unauthorized { subgraph: String },
    /// The context could not be encoded into header values.
    Encoding { subgraph: String, message: String },
}

impl fmt::Display for PolicyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unauthorized { subgraph } => {
                write!(f, "Subgraph `{}` requires a valid token", subgraph)
            }
            Self::Encoding { subgraph, message } => {
                write!(f, "Failed to encode headers for `{}`: {}", subgraph, message)
            }
        }
    }
}

impl std::error::Error for PolicyError {}

/// Decide which auth material accompanies one outbound subgraph call.
///
/// - a subgraph with `requires_auth` rejects the leg outright when the
///   context holds no valid token; the call must not be sent
/// - a subgraph with `include_auth_jwt` receives the serialized payload
///   (possibly `null`) in [`AUTH_JWT_PAYLOAD_HEADER`]
/// - a raw token, when present, is always re-presented as a standard bearer
///   header, so a subgraph that proxies onward can reuse the credential
pub fn decorate_headers(
    headers: &mut HeaderMap,
    context: &RequestContext,
    subgraph: &SubgraphDescriptor,
) -> Result<(), PolicyError> {
    if subgraph.requires_auth && !context.is_valid_token() {
        return Err(PolicyError::Unauthorized {
            subgraph: subgraph.name.clone(),
        });
    }

    let encoding_error = |message: String| PolicyError::Encoding {
        subgraph: subgraph.name.clone(),
        message,
    };

    if subgraph.include_auth_jwt {
        let json = serde_json::to_vec(&context.auth_jwt_payload())
            .map_err(|e| encoding_error(e.to_string()))?;
        let encoded = base64::engine::general_purpose::STANDARD.encode(json);
        let value =
            HeaderValue::from_str(&encoded).map_err(|e| encoding_error(e.to_string()))?;
        headers.insert(AUTH_JWT_PAYLOAD_HEADER, value);
    }

    if let Some(token) = context.auth_token() {
        let value = HeaderValue::from_str(&format!("Bearer {}", token))
            .map_err(|e| encoding_error(e.to_string()))?;
        headers.insert(AUTHORIZATION, value);
    }

    Ok(())
}
