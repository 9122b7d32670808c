//! Authentication for the gateway front door.
//!
//! Inbound requests carry an optional `Authorization: <scheme> <token>`
//! header. The token is validated against a remote auth service exactly once
//! per request, and the result is frozen into a [`RequestContext`] consulted
//! by every outbound subgraph call for that request.
//!
//! Three distinct non-error outcomes exist at this layer:
//!
//! - no header, or a malformed one: anonymous context
//! - a token the auth service rejects: unauthenticated context
//! - a valid token: context carrying the decoded identity payload
//!
//! Only a transport-level failure talking to the auth service is an error,
//! and it fails the whole inbound request.

mod client;
mod context;
mod payload;
mod token;

pub use client::{AuthClient, AuthServiceError, TokenCheck};
pub use context::RequestContext;
pub use payload::{ApiTokenPayload, AuthPayload, Role, User, UserPayload};
pub use token::extract_bearer;
