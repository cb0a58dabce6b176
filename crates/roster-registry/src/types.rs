//! Data types for the registry control surface.
//!
//! The registration and patch model lives in `roster_common`; this module
//! adds what only the HTTP surface needs.

use axum::http::Uri;
use roster_common::{Error, Registration, Result};
use serde::{Deserialize, Serialize};

pub use roster_common::{Patch, PatchEntry, ServiceName};

/// Error response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// Checks a registration received over HTTP before it reaches the store.
///
/// The name must be non-empty and every address must be an absolute
/// `http` URI, since the registry calls back into all of them.
pub fn validate_registration(registration: &Registration) -> Result<()> {
    if registration.name.is_empty() {
        return Err(Error::validation("ServiceName must not be empty"));
    }

    validate_http_uri("ServiceUrl", &registration.url)?;
    validate_http_uri("ServiceUpdateURL", &registration.update_url)?;
    validate_http_uri("HeartBeatURL", &registration.heartbeat_url)?;

    if registration.required_services.iter().any(ServiceName::is_empty) {
        return Err(Error::validation("RequiredService entries must not be empty"));
    }

    Ok(())
}

fn validate_http_uri(field: &str, value: &str) -> Result<()> {
    let uri: Uri = value
        .parse()
        .map_err(|e| Error::validation(format!("{} is not a valid URI ({}): {}", field, value, e)))?;

    if uri.scheme_str() != Some("http") || uri.authority().is_none() {
        return Err(Error::validation(format!(
            "{} must be an absolute http URI: {}",
            field, value
        )));
    }

    Ok(())
}
