//! Registry client implementation.

use http_body_util::Full;
use hyper::body::Bytes;
use hyper::{Method, Request, Uri};
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::client::legacy::Client;
use hyper_util::rt::TokioExecutor;
use roster_common::{Error, Registration, Result};
use std::time::Duration;
use tokio::time::timeout;
use tracing::{debug, info};

/// Where a registry listens when nothing else is configured.
pub const DEFAULT_REGISTRY_URL: &str = "http://localhost:3000/services";

/// Registry client.
#[derive(Clone)]
pub struct RegistryClient {
    /// Registry services endpoint (e.g., "http://localhost:3000/services").
    registry_url: String,

    /// Reusable HTTP client with pooled connections.
    client: Client<HttpConnector, Full<Bytes>>,

    timeout: Duration,
}

impl RegistryClient {
    pub fn new(registry_url: impl Into<String>) -> Self {
        Self {
            registry_url: registry_url.into(),
            client: Client::builder(TokioExecutor::new()).build_http(),
            timeout: Duration::from_secs(10),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn registry_url(&self) -> &str {
        &self.registry_url
    }

    /// Registers a service.
    ///
    /// The registry answers only after pushing the current providers of the
    /// service's dependencies to its update URL, so that endpoint has to be
    /// up before this is called.
    pub async fn register(&self, registration: &Registration) -> Result<()> {
        let body = serde_json::to_vec(registration)
            .map_err(|e| Error::Protocol(format!("Failed to serialize registration: {}", e)))?;

        debug!("Registering {} at {}", registration.name, registration.url);
        self.send(Method::POST, "application/json", body).await?;
        info!("Registered service {} at {}", registration.name, registration.url);

        Ok(())
    }

    /// Removes the service registered at `service_url`.
    pub async fn deregister(&self, service_url: &str) -> Result<()> {
        debug!("Deregistering {}", service_url);
        self.send(Method::DELETE, "text/plain", service_url.as_bytes().to_vec())
            .await?;
        info!("Deregistered service at {}", service_url);

        Ok(())
    }

    async fn send(&self, method: Method, content_type: &str, body: Vec<u8>) -> Result<()> {
        let uri: Uri = self
            .registry_url
            .parse()
            .map_err(|e| Error::Protocol(format!("Invalid URI: {}", e)))?;

        let req = Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", content_type)
            .body(Full::new(Bytes::from(body)))
            .map_err(|e| Error::Protocol(format!("Failed to build request: {}", e)))?;

        let resp = timeout(self.timeout, self.client.request(req))
            .await
            .map_err(|_| Error::Protocol(format!("Registry call timed out after {:?}", self.timeout)))?
            .map_err(|e| Error::Protocol(format!("HTTP request failed: {}", e)))?;

        if !resp.status().is_success() {
            return Err(Error::Registry(format!(
                "Registry returned status: {}",
                resp.status()
            )));
        }

        Ok(())
    }
}

impl Default for RegistryClient {
    fn default() -> Self {
        Self::new(DEFAULT_REGISTRY_URL)
    }
}
