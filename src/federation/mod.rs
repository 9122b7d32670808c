//! Federation engine boundary and the per-subgraph credential policy.

mod engine;
pub mod policy;

pub use engine::{ComposedSchema, FederationEngine};
pub use policy::{AUTH_JWT_PAYLOAD_HEADER, PolicyError, decorate_headers};
