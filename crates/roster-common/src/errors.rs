//! Error types shared across the roster workspace.
//!
//! Each variant maps to one class of failure the registry distinguishes:
//! requests it rejects, lookups that miss, and outbound calls that fail.

use thiserror::Error;

/// Result type alias for roster operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for roster operations.
#[derive(Debug, Error)]
pub enum Error {
    /// No active registration exists at the given URL.
    #[error("Service at url {url} not found")]
    ServiceNotFound { url: String },

    /// No provider is known for a required service name.
    #[error("No provider available for service {name}")]
    ProviderNotFound { name: String },

    /// Malformed or invalid input.
    #[error("Validation error: {message}")]
    Validation { message: String },

    /// A patch could not be delivered to a dependent.
    #[error("Delivery to {url} failed: {reason}")]
    Delivery { url: String, reason: String },

    /// The registry rejected or failed a client call.
    #[error("Registry error: {0}")]
    Registry(String),

    /// HTTP-level failure (bad URI, connection refused, unreadable body).
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// I/O error (wraps std::io::Error).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic error with context.
    #[error("{message}: {source}")]
    WithContext {
        message: String,
        source: Box<Error>,
    },
}

impl Error {
    pub fn service_not_found(url: impl Into<String>) -> Self {
        Self::ServiceNotFound { url: url.into() }
    }

    pub fn provider_not_found(name: impl Into<String>) -> Self {
        Self::ProviderNotFound { name: name.into() }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    pub fn delivery(url: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Delivery {
            url: url.into(),
            reason: reason.into(),
        }
    }

    /// Adds context to an error.
    ///
    /// # Example
    /// ```
    /// use roster_common::{Error, Result};
    ///
    /// fn inner() -> Result<()> {
    ///     Err(Error::service_not_found("http://localhost:4000"))
    /// }
    ///
    /// fn outer() -> Result<()> {
    ///     inner().map_err(|e| e.context("Deregistration failed"))
    /// }
    /// ```
    pub fn context(self, message: impl Into<String>) -> Self {
        Self::WithContext {
            message: message.into(),
            source: Box::new(self),
        }
    }

    /// Returns true if this error (or the error it wraps) is a not-found.
    pub fn is_not_found(&self) -> bool {
        match self {
            Self::ServiceNotFound { .. } | Self::ProviderNotFound { .. } => true,
            Self::WithContext { source, .. } => source.is_not_found(),
            _ => false,
        }
    }
}

pub trait ResultExt<T> {
    /// Adds context to an error result.
    fn context(self, message: impl Into<String>) -> Result<T>;
}

impl<T> ResultExt<T> for Result<T> {
    fn context(self, message: impl Into<String>) -> Result<T> {
        self.map_err(|e| e.context(message))
    }
}
