//! Dependency-scoped patch fanout.
//!
//! Every registration subscribes implicitly to the names in its
//! `required_services`. When membership changes, the notifier filters the
//! full patch down to what each registration asked for and POSTs the
//! remainder to its update URL, one independent task per delivery.
//!
//! Delivery is best-effort: failures are logged and dropped. Nothing here
//! feeds back into the store.

use async_trait::async_trait;
use http_body_util::Full;
use hyper::body::Bytes;
use hyper::{Method, Request, Uri};
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::client::legacy::Client;
use hyper_util::rt::TokioExecutor;
use roster_common::{Error, Patch, Registration, Result};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{debug, warn};

/// Outbound transport for patches.
#[async_trait]
pub trait PatchSender: Send + Sync {
    /// Delivers `patch` to a dependent's update endpoint.
    async fn send(&self, update_url: &str, patch: &Patch) -> Result<()>;
}

/// POSTs patches as JSON.
#[derive(Clone)]
pub struct HttpPatchSender {
    client: Client<HttpConnector, Full<Bytes>>,
}

impl HttpPatchSender {
    pub fn new() -> Self {
        Self {
            client: Client::builder(TokioExecutor::new()).build_http(),
        }
    }
}

impl Default for HttpPatchSender {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PatchSender for HttpPatchSender {
    async fn send(&self, update_url: &str, patch: &Patch) -> Result<()> {
        let body = serde_json::to_vec(patch)
            .map_err(|e| Error::delivery(update_url, format!("Failed to serialize patch: {}", e)))?;

        let uri: Uri = update_url
            .parse()
            .map_err(|e| Error::delivery(update_url, format!("Invalid URI: {}", e)))?;

        let req = Request::builder()
            .method(Method::POST)
            .uri(uri)
            .header("content-type", "application/json")
            .body(Full::new(Bytes::from(body)))
            .map_err(|e| Error::delivery(update_url, format!("Failed to build request: {}", e)))?;

        let resp = self
            .client
            .request(req)
            .await
            .map_err(|e| Error::delivery(update_url, format!("HTTP request failed: {}", e)))?;

        if !resp.status().is_success() {
            return Err(Error::delivery(
                update_url,
                format!("Dependent returned status: {}", resp.status()),
            ));
        }

        Ok(())
    }
}

/// Computes per-dependent patches and delivers them.
#[derive(Clone)]
pub struct PatchNotifier {
    sender: Arc<dyn PatchSender>,
    delivery_timeout: Duration,
}

impl PatchNotifier {
    pub fn new(sender: Arc<dyn PatchSender>, delivery_timeout: Duration) -> Self {
        Self {
            sender,
            delivery_timeout,
        }
    }

    /// Notifier backed by [`HttpPatchSender`].
    pub fn http(delivery_timeout: Duration) -> Self {
        Self::new(Arc::new(HttpPatchSender::new()), delivery_timeout)
    }

    /// Fans `patch` out to every registration in `recipients` that depends
    /// on at least one of its entries, skipping `changed_url`.
    ///
    /// Returns immediately with the number of deliveries started.
    pub fn fanout(&self, recipients: &[Registration], patch: &Patch, changed_url: &str) -> usize {
        let mut started = 0;

        for recipient in recipients.iter().filter(|r| r.url != changed_url) {
            let filtered = patch.filtered_for(&recipient.required_services);
            if filtered.is_empty() {
                continue;
            }

            let notifier = self.clone();
            let update_url = recipient.update_url.clone();
            tokio::spawn(async move {
                if let Err(e) = notifier.deliver(&update_url, &filtered).await {
                    warn!("Patch delivery failed: {}", e);
                }
            });
            started += 1;
        }

        debug!(
            "Fanned out patch (+{} -{}) to {} dependents",
            patch.additions.len(),
            patch.removals.len(),
            started
        );
        started
    }

    /// Pushes the current state of a new registrant's dependencies to it
    /// and waits for the delivery to finish.
    pub async fn sync(&self, registrant: &Registration, patch: &Patch) -> Result<()> {
        self.deliver(&registrant.update_url, patch).await
    }

    async fn deliver(&self, update_url: &str, patch: &Patch) -> Result<()> {
        match timeout(self.delivery_timeout, self.sender.send(update_url, patch)).await {
            Ok(result) => result,
            Err(_) => Err(Error::delivery(
                update_url,
                format!("timed out after {:?}", self.delivery_timeout),
            )),
        }
    }
}
