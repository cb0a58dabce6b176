//! Shared harness: a registry on an ephemeral port and dependents that
//! record the patches they receive.

#![allow(dead_code)]

use axum::{extract::State, http::StatusCode, routing::{get, post}, Json, Router};
use roster_client::RegistryClient;
use roster_common::{Patch, Registration, ServiceName};
use roster_registry::{heartbeat::StatusMap, Registry, RegistryConfig, RegistryServer};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

pub const WAIT: Duration = Duration::from_secs(5);

/// A registry served on 127.0.0.1:0.
pub struct TestRegistry {
    pub services_url: String,
    pub registry: Arc<Registry>,
    pub statuses: StatusMap,
    shutdown: Option<oneshot::Sender<()>>,
    handle: JoinHandle<anyhow::Result<()>>,
}

impl TestRegistry {
    pub async fn start(config: RegistryConfig) -> Self {
        let server = RegistryServer::new(config);
        let registry = Arc::clone(server.registry());
        let statuses = Arc::clone(server.statuses());

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (tx, rx) = oneshot::channel::<()>();
        let handle = tokio::spawn(server.serve(listener, async move {
            let _ = rx.await;
        }));

        Self {
            services_url: format!("http://{}/services", addr),
            registry,
            statuses,
            shutdown: Some(tx),
            handle,
        }
    }

    pub fn client(&self) -> RegistryClient {
        RegistryClient::new(self.services_url.clone()).with_timeout(WAIT)
    }

    pub async fn stop(mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        tokio::time::timeout(WAIT, self.handle)
            .await
            .expect("registry did not stop")
            .unwrap()
            .unwrap();
    }
}

/// Registry config with heartbeat off.
pub fn quiet_config() -> RegistryConfig {
    let mut config = RegistryConfig::default();
    config.heartbeat.enabled = false;
    config.notifier.delivery_timeout = Duration::from_secs(2);
    config
}

/// Registry config with a fast heartbeat.
pub fn heartbeat_config(retry_delay: Duration) -> RegistryConfig {
    let mut config = RegistryConfig::default();
    config.heartbeat.interval = Duration::from_millis(100);
    config.heartbeat.retry_delay = retry_delay;
    config.heartbeat.probe_timeout = Duration::from_millis(500);
    config.notifier.delivery_timeout = Duration::from_secs(2);
    config
}

#[derive(Clone)]
struct DependentState {
    patches: mpsc::UnboundedSender<Patch>,
    healthy: Arc<AtomicBool>,
}

/// A service that records every patch and answers heartbeats on demand.
pub struct Dependent {
    pub registration: Registration,
    patches: mpsc::UnboundedReceiver<Patch>,
    healthy: Arc<AtomicBool>,
}

impl Dependent {
    pub async fn serve(name: &str, required: &[&str]) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let healthy = Arc::new(AtomicBool::new(true));
        let state = DependentState {
            patches: tx,
            healthy: Arc::clone(&healthy),
        };

        let router = Router::new()
            .route("/services", post(record_patch))
            .route("/heartbeat", get(heartbeat))
            .with_state(state);

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("http://{}", listener.local_addr().unwrap());
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });

        let required = required.iter().map(|n| ServiceName::from(*n)).collect();
        Self {
            registration: Registration::new(name, url, required),
            patches: rx,
            healthy,
        }
    }

    pub fn url(&self) -> &str {
        &self.registration.url
    }

    pub fn set_healthy(&self, healthy: bool) {
        self.healthy.store(healthy, Ordering::SeqCst);
    }

    pub async fn next_patch(&mut self) -> Patch {
        tokio::time::timeout(WAIT, self.patches.recv())
            .await
            .expect("no patch delivered in time")
            .expect("patch channel closed")
    }

    pub async fn assert_no_patch(&mut self, within: Duration) {
        if let Ok(Some(patch)) = tokio::time::timeout(within, self.patches.recv()).await {
            panic!("unexpected patch: {:?}", patch);
        }
    }
}

async fn record_patch(State(state): State<DependentState>, Json(patch): Json<Patch>) -> StatusCode {
    let _ = state.patches.send(patch);
    StatusCode::OK
}

async fn heartbeat(State(state): State<DependentState>) -> StatusCode {
    if state.healthy.load(Ordering::SeqCst) {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    }
}

/// Polls `check` until it holds or `WAIT` elapses.
pub async fn eventually(mut check: impl FnMut() -> bool) -> bool {
    let deadline = tokio::time::Instant::now() + WAIT;
    while tokio::time::Instant::now() < deadline {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    check()
}
