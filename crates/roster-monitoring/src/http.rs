// HTTP heartbeat probe implementation

use crate::{HealthCheckData, HealthCheckError, HealthCheckResult};
use http_body_util::Empty;
use hyper::body::Bytes;
use hyper::{Method, Request, Uri};
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::client::legacy::Client;
use std::time::{Duration, Instant};
use tokio::time::timeout;
use tracing::{debug, warn};

/// Client type shared by every probe issued from one [`crate::HttpProbe`].
pub type ProbeClient = Client<HttpConnector, Empty<Bytes>>;

/// HTTP probe configuration
#[derive(Debug, Clone)]
pub struct HttpProbeConfig {
    /// Deadline for one probe, connect through response headers.
    pub timeout: Duration,
    pub user_agent: String,
}

impl Default for HttpProbeConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(2),
            user_agent: concat!("roster/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

impl HttpProbeConfig {
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Issues one `GET` against `endpoint`.
///
/// Connection failures, timeouts and non-2xx statuses come back as
/// unhealthy data; only an endpoint that cannot be turned into a request
/// is an error.
pub async fn check_http_health(
    client: &ProbeClient,
    endpoint: &str,
    config: &HttpProbeConfig,
) -> HealthCheckResult<HealthCheckData> {
    let start_time = Instant::now();

    debug!("Starting HTTP heartbeat probe: {}", endpoint);

    let uri: Uri = endpoint.parse().map_err(|e| HealthCheckError::InvalidEndpoint {
        endpoint: endpoint.to_string(),
        reason: format!("Invalid URI: {}", e),
    })?;

    if uri.scheme().is_none() || uri.authority().is_none() {
        return Err(HealthCheckError::InvalidEndpoint {
            endpoint: endpoint.to_string(),
            reason: "URI must be absolute".to_string(),
        });
    }

    let request = Request::builder()
        .method(Method::GET)
        .uri(uri)
        .header("User-Agent", config.user_agent.as_str())
        .body(Empty::<Bytes>::new())
        .map_err(|e| HealthCheckError::InvalidEndpoint {
            endpoint: endpoint.to_string(),
            reason: format!("Failed to build request: {}", e),
        })?;

    let response = match timeout(config.timeout, client.request(request)).await {
        Ok(Ok(resp)) => resp,
        Ok(Err(e)) => {
            warn!("Heartbeat connection failed: {} - {}", endpoint, e);
            let elapsed = start_time.elapsed().as_millis() as u64;
            return Ok(HealthCheckData::unhealthy(
                format!("Connection failed: {}", e),
                Some(elapsed),
            ));
        }
        Err(_) => {
            warn!("Heartbeat timeout: {}", endpoint);
            return Ok(HealthCheckData::unhealthy(
                "Timeout",
                Some(config.timeout.as_millis() as u64),
            ));
        }
    };

    let status = response.status();
    let elapsed = start_time.elapsed().as_millis() as u64;

    debug!(
        "Heartbeat probe complete: {} - status={} time={}ms",
        endpoint, status, elapsed
    );

    if status.is_success() {
        Ok(HealthCheckData::healthy(elapsed))
    } else {
        Ok(HealthCheckData::unhealthy(
            format!("Unexpected status code: {}", status),
            Some(elapsed),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{http::StatusCode, routing::get, Router};
    use hyper_util::rt::TokioExecutor;
    use tokio::net::TcpListener;

    fn client() -> ProbeClient {
        Client::builder(TokioExecutor::new()).build_http()
    }

    async fn serve(router: Router) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{}", addr)
    }

    #[test]
    fn test_probe_config_builder() {
        let config = HttpProbeConfig::default().with_timeout(Duration::from_millis(250));
        assert_eq!(config.timeout, Duration::from_millis(250));
        assert!(config.user_agent.starts_with("roster/"));
    }

    #[tokio::test]
    async fn test_invalid_endpoint_is_error() {
        let result = check_http_health(&client(), "not a url", &HttpProbeConfig::default()).await;
        assert!(matches!(result, Err(HealthCheckError::InvalidEndpoint { .. })));

        let result = check_http_health(&client(), "/heartbeat", &HttpProbeConfig::default()).await;
        assert!(matches!(result, Err(HealthCheckError::InvalidEndpoint { .. })));
    }

    #[tokio::test]
    async fn test_success_status_is_healthy() {
        let base = serve(Router::new().route("/heartbeat", get(|| async { "OK" }))).await;

        let data = check_http_health(
            &client(),
            &format!("{}/heartbeat", base),
            &HttpProbeConfig::default(),
        )
        .await
        .unwrap();

        assert!(data.is_healthy);
        assert!(data.error_message.is_none());
    }

    #[tokio::test]
    async fn test_error_status_is_unhealthy() {
        let base = serve(Router::new().route(
            "/heartbeat",
            get(|| async { StatusCode::SERVICE_UNAVAILABLE }),
        ))
        .await;

        let data = check_http_health(
            &client(),
            &format!("{}/heartbeat", base),
            &HttpProbeConfig::default(),
        )
        .await
        .unwrap();

        assert!(!data.is_healthy);
        assert!(data.error_message.unwrap().contains("503"));
    }

    #[tokio::test]
    async fn test_refused_connection_is_unhealthy() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let data = check_http_health(
            &client(),
            &format!("http://{}/heartbeat", addr),
            &HttpProbeConfig::default(),
        )
        .await
        .unwrap();

        assert!(!data.is_healthy);
    }

    #[tokio::test]
    async fn test_slow_endpoint_times_out() {
        let base = serve(Router::new().route(
            "/heartbeat",
            get(|| async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                "OK"
            }),
        ))
        .await;

        let config = HttpProbeConfig::default().with_timeout(Duration::from_millis(100));
        let data = check_http_health(&client(), &format!("{}/heartbeat", base), &config)
            .await
            .unwrap();

        assert!(!data.is_healthy);
        assert_eq!(data.error_message.as_deref(), Some("Timeout"));
    }
}
