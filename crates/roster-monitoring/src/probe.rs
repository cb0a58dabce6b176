//! The probe seam between the heartbeat monitor and the network.

use crate::http::{check_http_health, HttpProbeConfig, ProbeClient};
use crate::HealthCheckData;
use async_trait::async_trait;
use hyper_util::client::legacy::Client;
use hyper_util::rt::TokioExecutor;

/// A single liveness check against a heartbeat endpoint.
///
/// Implementations never fail: anything that prevents a positive answer is
/// reported as unhealthy data.
#[async_trait]
pub trait Probe: Send + Sync {
    async fn probe(&self, endpoint: &str) -> HealthCheckData;
}

/// Probes heartbeat endpoints over HTTP with a pooled client.
#[derive(Clone)]
pub struct HttpProbe {
    client: ProbeClient,
    config: HttpProbeConfig,
}

impl HttpProbe {
    pub fn new(config: HttpProbeConfig) -> Self {
        Self {
            client: Client::builder(TokioExecutor::new()).build_http(),
            config,
        }
    }

    pub fn config(&self) -> &HttpProbeConfig {
        &self.config
    }
}

impl Default for HttpProbe {
    fn default() -> Self {
        Self::new(HttpProbeConfig::default())
    }
}

#[async_trait]
impl Probe for HttpProbe {
    async fn probe(&self, endpoint: &str) -> HealthCheckData {
        match check_http_health(&self.client, endpoint, &self.config).await {
            Ok(data) => data,
            Err(e) => HealthCheckData::unhealthy(e.to_string(), None),
        }
    }
}
