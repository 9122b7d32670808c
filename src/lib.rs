// Core modules
pub mod auth;
pub mod bootstrap;
pub mod config;
pub mod federation;
pub mod server;

// Re-export key types and functions
pub use auth::{AuthClient, AuthPayload, AuthServiceError, RequestContext, extract_bearer};
pub use bootstrap::{BootstrapOutcome, BootstrapSupervisor};
pub use config::{Environment, GatewayConfig, SubgraphDescriptor, load_subgraphs};
pub use federation::{ComposedSchema, FederationEngine};
pub use server::{RunningGateway, start_gateway};
