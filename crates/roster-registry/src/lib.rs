//! # Roster Registry
//!
//! Service registry for a distributed application.
//!
//! This crate provides:
//! - The registration store, keyed by service URL
//! - Dependency-scoped patch fanout to dependents
//! - Heartbeat monitoring that evicts and restores services
//! - The HTTP control surface and a standalone server executable

pub mod api;
pub mod config;
pub mod heartbeat;
pub mod notifier;
pub mod server;
pub mod storage;
pub mod types;

// Re-export commonly used items
pub use config::RegistryConfig;
pub use heartbeat::{HeartbeatMonitor, HeartbeatWorker, ProbeOutcome, StatusMap, TickReport};
pub use notifier::{HttpPatchSender, PatchNotifier, PatchSender};
pub use roster_common::{Patch, PatchEntry, Registration, ServiceName};
pub use server::RegistryServer;
pub use storage::Registry;
