//! Endpoints every registered service exposes to the registry.

use crate::providers::Providers;
use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use roster_common::Patch;
use std::sync::Arc;
use tracing::info;

/// Routes for `POST /services` (patch delivery) and `GET /heartbeat`.
pub fn service_router(providers: Arc<Providers>) -> Router {
    Router::new()
        .route("/services", post(apply_patch))
        .route("/heartbeat", get(heartbeat))
        .with_state(providers)
}

async fn apply_patch(
    State(providers): State<Arc<Providers>>,
    Json(patch): Json<Patch>,
) -> StatusCode {
    info!(
        additions = patch.additions.len(),
        removals = patch.removals.len(),
        "Received patch from registry"
    );
    providers.apply(&patch);
    StatusCode::OK
}

async fn heartbeat() -> StatusCode {
    StatusCode::OK
}
