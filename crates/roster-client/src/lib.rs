//! # Roster Client
//!
//! The service side of the registry contract:
//! - [`RegistryClient`] registers and deregisters a service
//! - [`Providers`] keeps the service's view of the dependencies it declared
//! - [`service_router`] serves the patch and heartbeat endpoints the registry calls
//! - [`ServiceHost`] ties them together for one running service

pub mod client;
pub mod endpoints;
pub mod host;
pub mod providers;

pub use client::{RegistryClient, DEFAULT_REGISTRY_URL};
pub use endpoints::service_router;
pub use host::ServiceHost;
pub use providers::Providers;
