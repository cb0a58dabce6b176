//! Heartbeat Monitor - periodic liveness probing with self-healing
//!
//! Every tick takes a snapshot of the store and runs a probe sequence for
//! each registration:
//! - up to `attempts` probes against its heartbeat URL, `retry_delay` apart
//! - the first failed probe pulls the registration from the store, which
//!   announces the removal to its dependents
//! - a later success in the same sequence puts it back, which announces
//!   its return, unless the URL was registered again in the meantime
//! - a sequence with no success leaves it out of the store
//!
//! Registrations are probed concurrently within a tick when
//! `HeartbeatConfig::parallel` is set; the tick ends once every sequence
//! has finished. The loop runs until its cancellation token fires.

use crate::config::HeartbeatConfig;
use crate::storage::Registry;
use dashmap::DashMap;
use roster_common::Registration;
use roster_monitoring::{HealthStatus, Probe};
use std::collections::HashSet;
use std::sync::Arc;
use tokio::task::{JoinHandle, JoinSet};
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Heartbeat status per registration URL, shared with the control surface.
pub type StatusMap = Arc<DashMap<String, HealthStatus>>;

/// How one registration's probe sequence ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeOutcome {
    /// First probe succeeded.
    Healthy,
    /// Failed, was removed, then answered again and was re-added.
    Restored,
    /// Never answered; left out of the store.
    Evicted,
}

/// Summary of one tick.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TickReport {
    pub probed: usize,
    pub healthy: usize,
    pub restored: usize,
    pub evicted: usize,
}

impl TickReport {
    fn record(&mut self, outcome: ProbeOutcome) {
        self.probed += 1;
        match outcome {
            ProbeOutcome::Healthy => self.healthy += 1,
            ProbeOutcome::Restored => self.restored += 1,
            ProbeOutcome::Evicted => self.evicted += 1,
        }
    }
}

/// Probes registrations and applies the outcome to the store.
#[derive(Clone)]
pub struct HeartbeatWorker {
    registry: Arc<Registry>,
    probe: Arc<dyn Probe>,
    config: HeartbeatConfig,
    statuses: StatusMap,
}

impl HeartbeatWorker {
    pub fn new(
        registry: Arc<Registry>,
        probe: Arc<dyn Probe>,
        config: HeartbeatConfig,
        statuses: StatusMap,
    ) -> Self {
        Self {
            registry,
            probe,
            config,
            statuses,
        }
    }

    /// Runs one pass over the current snapshot.
    pub async fn tick(&self) -> TickReport {
        let snapshot = self.registry.snapshot();
        let mut report = TickReport::default();

        debug!("Heartbeat tick over {} registrations", snapshot.len());

        if self.config.parallel {
            let mut sequences = JoinSet::new();
            for registration in snapshot.iter().cloned() {
                let worker = self.clone();
                sequences.spawn(async move { worker.probe_sequence(registration).await });
            }
            while let Some(joined) = sequences.join_next().await {
                match joined {
                    Ok(outcome) => report.record(outcome),
                    Err(e) => error!("Heartbeat probe task failed: {}", e),
                }
            }
        } else {
            for registration in snapshot.iter().cloned() {
                report.record(self.probe_sequence(registration).await);
            }
        }

        // Evicted entries stay visible for a while, then age out.
        let probed: HashSet<&str> = snapshot.iter().map(|r| r.url.as_str()).collect();
        let retention = self.config.status_retention;
        self.statuses.retain(|url, status| {
            probed.contains(url.as_str())
                || (!status.is_healthy() && !status.is_stale(retention))
        });

        report
    }

    /// Probes one registration until it answers or the attempts run out.
    pub async fn probe_sequence(&self, registration: Registration) -> ProbeOutcome {
        let attempts = self.config.attempts.max(1);
        let mut failed = false;
        let mut removed_here = false;

        for attempt in 1..=attempts {
            let data = self.probe.probe(&registration.heartbeat_url).await;

            if data.is_healthy {
                self.update_status(&registration.url, HealthStatus::record_success);
                debug!("Heartbeat check passed for {}", registration.name);

                if !failed {
                    return ProbeOutcome::Healthy;
                }
                if !removed_here {
                    // Someone else removed it while we were probing.
                    return ProbeOutcome::Healthy;
                }

                info!(
                    "Service {} at {} recovered on attempt {}/{}",
                    registration.name, registration.url, attempt, attempts
                );
                return match self.registry.restore(registration.clone()).await {
                    Ok(true) => ProbeOutcome::Restored,
                    Ok(false) => {
                        debug!(
                            "{} was registered again while probing; keeping the newer entry",
                            registration.url
                        );
                        ProbeOutcome::Healthy
                    }
                    Err(e) => {
                        error!("Failed to restore {}: {}", registration.url, e);
                        ProbeOutcome::Evicted
                    }
                };
            }

            let reason = data
                .error_message
                .unwrap_or_else(|| "Unknown failure".to_string());
            warn!(
                "Heartbeat check failed for {} ({}/{}): {}",
                registration.name, attempt, attempts, reason
            );
            self.update_status(&registration.url, |status| status.record_failure(reason));

            if !failed {
                failed = true;
                match self.registry.remove(&registration.url) {
                    Ok(_) => removed_here = true,
                    Err(e) => debug!("Skipping removal of {}: {}", registration.url, e),
                }
            }

            if attempt < attempts {
                sleep(self.config.retry_delay).await;
            }
        }

        warn!(
            "Service {} at {} evicted after {} failed heartbeats",
            registration.name, registration.url, attempts
        );
        self.update_status(&registration.url, HealthStatus::mark_removed);
        ProbeOutcome::Evicted
    }

    // The entry guard is dropped before returning; never hold it across an await.
    fn update_status(&self, url: &str, update: impl FnOnce(&mut HealthStatus)) {
        let mut status = self.statuses.entry(url.to_string()).or_default();
        update(status.value_mut());
    }
}

/// Heartbeat monitor - runs the worker on a background task
pub struct HeartbeatMonitor {
    worker: HeartbeatWorker,
    cancel_token: CancellationToken,
    task_handle: Option<JoinHandle<()>>,
}

impl HeartbeatMonitor {
    pub fn new(
        registry: Arc<Registry>,
        probe: Arc<dyn Probe>,
        config: HeartbeatConfig,
        statuses: StatusMap,
    ) -> Self {
        Self {
            worker: HeartbeatWorker::new(registry, probe, config, statuses),
            cancel_token: CancellationToken::new(),
            task_handle: None,
        }
    }

    pub fn worker(&self) -> &HeartbeatWorker {
        &self.worker
    }

    /// Start the heartbeat loop background task
    pub fn start(&mut self) {
        if self.task_handle.is_some() {
            warn!("Heartbeat monitor already started");
            return;
        }

        let worker = self.worker.clone();
        let cancel_token = self.cancel_token.clone();
        self.task_handle = Some(tokio::spawn(async move {
            Self::run_heartbeat_loop(worker, cancel_token).await;
        }));

        info!(
            "Heartbeat monitor started (interval: {:?}, attempts: {}, retry delay: {:?})",
            self.worker.config.interval, self.worker.config.attempts, self.worker.config.retry_delay
        );
    }

    /// Signal the loop to stop without waiting for it
    pub fn stop(&self) {
        self.cancel_token.cancel();
    }

    /// Stop the loop and wait for the background task to finish
    pub async fn shutdown(&mut self) {
        self.cancel_token.cancel();
        if let Some(task) = self.task_handle.take() {
            if let Err(e) = task.await {
                error!("Heartbeat task ended abnormally: {}", e);
            }
            info!("Heartbeat monitor stopped");
        }
    }

    pub fn is_running(&self) -> bool {
        self.task_handle
            .as_ref()
            .map(|task| !task.is_finished())
            .unwrap_or(false)
    }

    async fn run_heartbeat_loop(worker: HeartbeatWorker, cancel_token: CancellationToken) {
        loop {
            tokio::select! {
                _ = cancel_token.cancelled() => break,
                report = worker.tick() => {
                    if report.restored > 0 || report.evicted > 0 {
                        info!(
                            "Heartbeat tick: {} probed, {} restored, {} evicted",
                            report.probed, report.restored, report.evicted
                        );
                    }
                }
            }

            tokio::select! {
                _ = cancel_token.cancelled() => break,
                _ = sleep(worker.config.interval) => {}
            }
        }
        debug!("Heartbeat loop exited");
    }
}

impl Drop for HeartbeatMonitor {
    fn drop(&mut self) {
        self.cancel_token.cancel();
    }
}
