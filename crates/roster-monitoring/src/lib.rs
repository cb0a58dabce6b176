//! # Roster Monitoring
//!
//! Liveness probing for registered services.
//!
//! This crate provides:
//! - The [`Probe`] abstraction the heartbeat monitor drives
//! - [`HttpProbe`], a `GET <heartbeatURL>` probe with a bounded timeout
//! - [`HealthStatus`], the per-registration heartbeat state machine

pub mod http;
pub mod probe;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Health check error types.
///
/// Timeouts and refused connections are not errors: they are reported as
/// unhealthy [`HealthCheckData`]. Only an endpoint that cannot be probed at
/// all fails the check.
#[derive(Error, Debug)]
pub enum HealthCheckError {
    #[error("Health check invalid endpoint: {endpoint} - {reason}")]
    InvalidEndpoint { endpoint: String, reason: String },
}

/// Result type for health check operations.
pub type HealthCheckResult<T> = Result<T, HealthCheckError>;

/// Outcome of a single probe.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthCheckData {
    pub is_healthy: bool,
    pub checked_at: DateTime<Utc>,
    pub response_time_ms: Option<u64>,
    pub error_message: Option<String>,
}

impl HealthCheckData {
    pub fn healthy(response_time_ms: u64) -> Self {
        Self {
            is_healthy: true,
            checked_at: Utc::now(),
            response_time_ms: Some(response_time_ms),
            error_message: None,
        }
    }

    pub fn unhealthy(reason: impl Into<String>, response_time_ms: Option<u64>) -> Self {
        Self {
            is_healthy: false,
            checked_at: Utc::now(),
            response_time_ms,
            error_message: Some(reason.into()),
        }
    }
}

/// Where a registration stands in the heartbeat cycle.
///
/// `Healthy -> Suspect` on the first failed probe of a tick (the registration
/// is pulled from the store at that point), `Suspect -> Healthy` if a later
/// probe in the same tick succeeds, `Suspect -> Removed` once the attempts
/// run out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthState {
    Healthy,
    Suspect,
    Removed,
}

/// Heartbeat status tracked for one registration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthStatus {
    pub state: HealthState,
    pub last_check: Option<DateTime<Utc>>,
    pub last_success: Option<DateTime<Utc>>,
    pub consecutive_failures: u32,
    pub consecutive_successes: u32,
    pub failure_reason: Option<String>,
}

impl HealthStatus {
    pub fn new() -> Self {
        Self {
            state: HealthState::Healthy,
            last_check: None,
            last_success: None,
            consecutive_failures: 0,
            consecutive_successes: 0,
            failure_reason: None,
        }
    }

    pub fn is_healthy(&self) -> bool {
        self.state == HealthState::Healthy
    }

    pub fn record_success(&mut self) {
        let now = Utc::now();
        self.state = HealthState::Healthy;
        self.last_check = Some(now);
        self.last_success = Some(now);
        self.consecutive_successes += 1;
        self.consecutive_failures = 0;
        self.failure_reason = None;
    }

    pub fn record_failure(&mut self, reason: String) {
        self.state = HealthState::Suspect;
        self.last_check = Some(Utc::now());
        self.consecutive_failures += 1;
        self.consecutive_successes = 0;
        self.failure_reason = Some(reason);
    }

    /// Marks the registration as evicted after its attempts ran out.
    pub fn mark_removed(&mut self) {
        self.state = HealthState::Removed;
    }

    /// Whether the last probe happened more than `max_age` ago.
    /// A status that was never probed is stale.
    pub fn is_stale(&self, max_age: Duration) -> bool {
        match self.last_check {
            None => true,
            Some(at) => Utc::now()
                .signed_duration_since(at)
                .to_std()
                .map(|age| age > max_age)
                .unwrap_or(false),
        }
    }
}

impl Default for HealthStatus {
    fn default() -> Self {
        Self::new()
    }
}

pub use http::{check_http_health, HttpProbeConfig};
pub use probe::{HttpProbe, Probe};
