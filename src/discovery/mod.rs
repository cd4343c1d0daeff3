//! Discovery of GenAI model endpoints from platform service bindings.

pub mod catalog;
pub mod endpoint_config;
pub mod filter;
pub mod locator;
pub mod service;

pub use catalog::{CatalogError, ServiceBinding, read_bindings, read_bindings_from_env};
pub use endpoint_config::{AdvertisedModel, EndpointConfig, EndpointConfigError};
pub use filter::is_ai_service;
pub use locator::{ModelEndpoint, ModelRole, SkipReason, locate_endpoints, to_endpoint};
pub use service::{DiscoverySource, DiscoverySummary, ModelDiscovery, ModelDiscoveryService};
