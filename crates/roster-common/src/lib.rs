//! # Roster Common
//!
//! Types and errors shared by every roster crate:
//! - [`ServiceName`], the symbolic identity services register and depend on
//! - [`Registration`], [`PatchEntry`] and [`Patch`], the registry wire model
//! - [`Error`] and the [`Result`] alias used across the workspace

pub mod errors;
pub mod types;

pub use errors::{Error, Result, ResultExt};
pub use types::{Patch, PatchEntry, Registration, ServiceName};
