//! Service registry server implementation.
//!
//! Wires the store, notifier and heartbeat monitor together behind the
//! axum router, serves until the shutdown future resolves, then stops the
//! heartbeat loop.

use crate::{
    api::{create_router, AppState},
    config::RegistryConfig,
    heartbeat::{HeartbeatMonitor, StatusMap},
    notifier::PatchNotifier,
    storage::Registry,
};
use anyhow::{Context, Result};
use axum::Router;
use roster_monitoring::{HttpProbe, HttpProbeConfig, Probe};
use std::future::Future;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{error, info};

/// Service registry server.
pub struct RegistryServer {
    config: RegistryConfig,
    registry: Arc<Registry>,
    statuses: StatusMap,
    monitor: HeartbeatMonitor,
    router: Router,
}

impl RegistryServer {
    /// Creates a server that delivers patches and probes heartbeats over HTTP.
    pub fn new(config: RegistryConfig) -> Self {
        let notifier = PatchNotifier::http(config.notifier.delivery_timeout);
        let probe = HttpProbe::new(
            HttpProbeConfig::default().with_timeout(config.heartbeat.probe_timeout),
        );
        Self::with_components(config, notifier, Arc::new(probe))
    }

    /// Creates a server around a caller-supplied notifier and probe.
    pub fn with_components(
        config: RegistryConfig,
        notifier: PatchNotifier,
        probe: Arc<dyn Probe>,
    ) -> Self {
        let registry = Arc::new(Registry::new(notifier));
        let statuses = StatusMap::default();
        let monitor = HeartbeatMonitor::new(
            Arc::clone(&registry),
            probe,
            config.heartbeat.clone(),
            Arc::clone(&statuses),
        );
        let router = create_router(AppState {
            registry: Arc::clone(&registry),
            statuses: Arc::clone(&statuses),
        });

        Self {
            config,
            registry,
            statuses,
            monitor,
            router,
        }
    }

    /// Returns a reference to the registry.
    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    pub fn statuses(&self) -> &StatusMap {
        &self.statuses
    }

    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    /// Binds the configured address and serves until `shutdown` resolves.
    pub async fn run<F>(self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let addr = self.config.server.address();
        info!("Binding to TCP: {}", addr);

        let listener = TcpListener::bind(&addr)
            .await
            .with_context(|| format!("Failed to bind {}", addr))?;

        self.serve(listener, shutdown).await
    }

    /// Serves on an already bound listener until `shutdown` resolves.
    pub async fn serve<F>(mut self, listener: TcpListener, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        if self.config.heartbeat.enabled {
            self.monitor.start();
        } else {
            info!("Heartbeat monitoring disabled");
        }

        let local_addr = listener.local_addr()?;
        info!("Registry listening on {}", local_addr);

        let served = axum::serve(listener, self.router.clone())
            .with_graceful_shutdown(shutdown)
            .await;

        self.monitor.shutdown().await;

        if let Err(ref e) = served {
            error!("Registry server failed: {}", e);
        }
        served.context("Registry server failed")?;

        info!("Registry stopped");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::sync::oneshot;

    #[test]
    fn test_server_creation() {
        let server = RegistryServer::new(RegistryConfig::default());
        assert_eq!(server.registry().count(), 0);
        assert!(server.statuses().is_empty());
        assert_eq!(server.config().server.port, 3000);
    }

    #[tokio::test]
    async fn test_serve_until_shutdown() {
        let server = RegistryServer::new(RegistryConfig::default());
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let (tx, rx) = oneshot::channel::<()>();

        let handle = tokio::spawn(server.serve(listener, async move {
            let _ = rx.await;
        }));

        tokio::time::sleep(Duration::from_millis(50)).await;
        tx.send(()).unwrap();

        let result = tokio::time::timeout(Duration::from_secs(2), handle)
            .await
            .expect("server did not shut down")
            .unwrap();
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_run_reports_bind_failure() {
        let occupied = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let mut config = RegistryConfig::default();
        config.server.port = occupied.local_addr().unwrap().port();

        let result = RegistryServer::new(config).run(async {}).await;

        assert!(result.unwrap_err().to_string().contains("Failed to bind"));
    }
}
