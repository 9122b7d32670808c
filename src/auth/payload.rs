//! Validated identity payloads reported by the auth service.

use serde::{Deserialize, Serialize};

/// A role attached to a user, identified by its short code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Role {
    #[serde(rename = "shortCode")]
    pub short_code: String,
}

/// Core identity of a human user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub email: String,
}

/// Identity facts for a validated human user token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserPayload {
    pub user: User,
    pub roles: Vec<Role>,
    #[serde(rename = "currentRole")]
    pub current_role: Role,
}

/// Identity facts for a validated machine/service token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiTokenPayload {
    #[serde(rename = "accessTokenId")]
    pub access_token_id: String,
}

/// Decoded JWT payload for a validated token.
///
/// At most one variant is populated per request context. The discriminant is
/// fixed by the auth client when it parses the remote response; consumers
/// match on the variant and never inspect field shapes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum AuthPayload {
    User(UserPayload),
    ApiToken(ApiTokenPayload),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user_payload() -> AuthPayload {
        AuthPayload::User(UserPayload {
            user: User {
                id: "u1".to_string(),
                email: "a@b.com".to_string(),
            },
            roles: vec![Role {
                short_code: "officer".to_string(),
            }],
            current_role: Role {
                short_code: "user".to_string(),
            },
        })
    }

    #[test]
    fn test_user_payload_carries_discriminant() {
        let json = serde_json::to_value(user_payload()).unwrap();
        assert_eq!(json["kind"], "user");
        assert_eq!(json["user"]["id"], "u1");
        assert_eq!(json["currentRole"]["shortCode"], "user");
    }

    #[test]
    fn test_api_token_payload_carries_discriminant() {
        let payload = AuthPayload::ApiToken(ApiTokenPayload {
            access_token_id: "at-42".to_string(),
        });
        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(json["kind"], "apiToken");
        assert_eq!(json["accessTokenId"], "at-42");
    }

    #[test]
    fn test_round_trip() {
        let payload = user_payload();
        let json = serde_json::to_string(&payload).unwrap();
        let back: AuthPayload = serde_json::from_str(&json).unwrap();
        assert_eq!(back, payload);
    }
}
