//! Health monitor
//!
//! Answers "is this pool healthy right now". Transient failures (timeouts,
//! refused connections) are reported separately so the release controller
//! can retry them before treating the pool as unhealthy.

use async_trait::async_trait;
use reqwest::Client;
use std::sync::Arc;
use std::time::Duration;
use tandem_core::domain::pool::{HealthStatus, PoolLabel};
use thiserror::Error;

use crate::repository::TopologyRegistry;

#[derive(Debug, Error)]
pub enum HealthCheckError {
    /// Retryable failure such as a timeout or a refused connection
    #[error("transient health check error: {0}")]
    Transient(String),

    /// The check itself could not be performed
    #[error("health check failed: {0}")]
    Failed(String),
}

/// Integration trait for pool health checks
#[async_trait]
pub trait HealthMonitor: Send + Sync {
    /// Checks the current health of `pool`
    async fn check(&self, pool: PoolLabel) -> Result<HealthStatus, HealthCheckError>;
}

/// Health monitor backed by the signals pushed into the registry
///
/// Used when an external monitor reports health through the API instead of
/// the orchestrator probing the pools itself.
pub struct RegistryHealthMonitor {
    registry: Arc<TopologyRegistry>,
}

impl RegistryHealthMonitor {
    pub fn new(registry: Arc<TopologyRegistry>) -> Self {
        Self { registry }
    }
}

#[async_trait]
impl HealthMonitor for RegistryHealthMonitor {
    async fn check(&self, pool: PoolLabel) -> Result<HealthStatus, HealthCheckError> {
        Ok(self.registry.pool(pool).health)
    }
}

/// Health monitor that probes each pool's HTTP health endpoint
///
/// A 2xx response is healthy, any other status is unhealthy. Timeouts and
/// connection failures are transient.
pub struct HttpHealthMonitor {
    client: Client,
    blue_url: String,
    green_url: String,
}

impl HttpHealthMonitor {
    /// Creates a new HTTP health monitor
    ///
    /// # Arguments
    /// * `blue_url` - Health endpoint of the blue target group
    /// * `green_url` - Health endpoint of the green target group
    /// * `timeout` - Per-request timeout
    pub fn new(blue_url: String, green_url: String, timeout: Duration) -> anyhow::Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            blue_url,
            green_url,
        })
    }

    fn url(&self, pool: PoolLabel) -> &str {
        match pool {
            PoolLabel::Blue => &self.blue_url,
            PoolLabel::Green => &self.green_url,
        }
    }
}

#[async_trait]
impl HealthMonitor for HttpHealthMonitor {
    async fn check(&self, pool: PoolLabel) -> Result<HealthStatus, HealthCheckError> {
        let url = self.url(pool);
        let response = self.client.get(url).send().await.map_err(|e| {
            if e.is_timeout() || e.is_connect() {
                HealthCheckError::Transient(format!("{} pool ({}): {}", pool, url, e))
            } else {
                HealthCheckError::Failed(format!("{} pool ({}): {}", pool, url, e))
            }
        })?;

        let status = response.status();
        if status.is_success() {
            Ok(HealthStatus::Healthy)
        } else {
            tracing::debug!("{} pool health endpoint returned {}", pool, status);
            Ok(HealthStatus::Unhealthy)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tandem_core::domain::pool::PoolLabel;

    #[tokio::test]
    async fn test_registry_monitor_reads_pushed_health() {
        let registry = Arc::new(TopologyRegistry::new(
            PoolLabel::Blue,
            "a-b-blueTG".to_string(),
            "a-b-greenTG".to_string(),
        ));
        let monitor = RegistryHealthMonitor::new(Arc::clone(&registry));

        assert_eq!(
            monitor.check(PoolLabel::Green).await.unwrap(),
            HealthStatus::Unknown
        );

        registry.mark_health(PoolLabel::Green, HealthStatus::Unhealthy);
        assert_eq!(
            monitor.check(PoolLabel::Green).await.unwrap(),
            HealthStatus::Unhealthy
        );
    }

    async fn serve(status: axum::http::StatusCode) -> String {
        let app = axum::Router::new().route("/", axum::routing::get(move || async move { status }));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{}/", addr)
    }

    #[tokio::test]
    async fn test_http_monitor_maps_status_codes() {
        let healthy = serve(axum::http::StatusCode::OK).await;
        let failing = serve(axum::http::StatusCode::SERVICE_UNAVAILABLE).await;
        let monitor = HttpHealthMonitor::new(healthy, failing, Duration::from_secs(2)).unwrap();

        assert_eq!(
            monitor.check(PoolLabel::Blue).await.unwrap(),
            HealthStatus::Healthy
        );
        assert_eq!(
            monitor.check(PoolLabel::Green).await.unwrap(),
            HealthStatus::Unhealthy
        );
    }

    #[tokio::test]
    async fn test_http_monitor_refused_connection_is_transient() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("http://{}/", listener.local_addr().unwrap());
        drop(listener);

        let monitor =
            HttpHealthMonitor::new(url.clone(), url, Duration::from_millis(500)).unwrap();

        let result = monitor.check(PoolLabel::Blue).await;
        assert!(matches!(result, Err(HealthCheckError::Transient(_))));
    }
}
