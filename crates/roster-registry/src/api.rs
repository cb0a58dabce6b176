//! HTTP API handlers using axum.
//!
//! The contract callers depend on:
//! - `POST /services` with a JSON registration
//! - `DELETE /services` with the raw service URL as the body
//!
//! Every rejection on those two routes is a 400; an unknown URL is not
//! distinguished from a malformed one at the transport level. The read-only
//! `GET /services`, `GET /services/status` and `GET /health` routes expose
//! the registry's own view.

use axum::{
    body::Bytes,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use roster_common::{Error, Registration};
use roster_monitoring::HealthStatus;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{error, info};

use crate::{
    heartbeat::StatusMap,
    storage::Registry,
    types::{validate_registration, ErrorResponse},
};

/// Shared state behind every handler.
#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<Registry>,
    pub statuses: StatusMap,
}

/// Creates the API router.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route(
            "/services",
            get(list_handler)
                .post(register_handler)
                .delete(deregister_handler),
        )
        .route("/services/status", get(status_handler))
        .route("/health", get(health_handler))
        .with_state(state)
}

/// Registers a service.
///
/// The body is decoded by hand so a malformed payload is a 400 like every
/// other rejection.
async fn register_handler(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<StatusCode, ApiError> {
    let registration: Registration = serde_json::from_slice(&body)
        .map_err(|e| ApiError::BadRequest(format!("Malformed registration: {}", e)))?;

    validate_registration(&registration).map_err(|e| ApiError::BadRequest(e.to_string()))?;

    info!(
        "Add service: {} with {}",
        registration.name, registration.url
    );

    state.registry.add(registration).await.map_err(ApiError::from)?;

    Ok(StatusCode::OK)
}

/// Deregisters the service whose URL is the request body.
async fn deregister_handler(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<StatusCode, ApiError> {
    let url = std::str::from_utf8(&body)
        .map_err(|e| ApiError::BadRequest(format!("Body is not UTF-8: {}", e)))?
        .trim();

    if url.is_empty() {
        return Err(ApiError::BadRequest("Missing service url".to_string()));
    }

    info!("Removing service at url: {}", url);

    state.registry.remove(url).map_err(ApiError::from)?;

    Ok(StatusCode::OK)
}

/// Lists active registrations, oldest first.
async fn list_handler(State(state): State<AppState>) -> Json<Vec<Registration>> {
    Json(state.registry.snapshot())
}

/// Heartbeat status per registration URL.
async fn status_handler(State(state): State<AppState>) -> Json<BTreeMap<String, HealthStatus>> {
    let statuses = state
        .statuses
        .iter()
        .map(|entry| (entry.key().clone(), entry.value().clone()))
        .collect();
    Json(statuses)
}

/// The registry's own liveness endpoint.
async fn health_handler() -> &'static str {
    "OK"
}

/// API error type.
#[derive(Debug)]
pub enum ApiError {
    NotFound(String),
    BadRequest(String),
    Internal(String),
}

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        match err {
            e if e.is_not_found() => ApiError::NotFound(e.to_string()),
            e @ Error::Validation { .. } => ApiError::BadRequest(e.to_string()),
            e => ApiError::Internal(e.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        // Callers only distinguish success from 400.
        let message = match self {
            ApiError::NotFound(msg) | ApiError::BadRequest(msg) | ApiError::Internal(msg) => msg,
        };

        error!("API error: {}", message);

        let body = Json(ErrorResponse { error: message });
        (StatusCode::BAD_REQUEST, body).into_response()
    }
}
