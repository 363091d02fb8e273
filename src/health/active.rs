//! Active health checking.
//!
//! # Responsibilities
//! - Periodically probe backends over HTTP
//! - Update each backend's health flag based on results
//!
//! The gateway core only consumes the resulting boolean flag; this
//! monitor is the external collaborator that maintains it.

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::Request;
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::TokioExecutor,
};
use tokio::sync::broadcast;
use tokio::time;

use crate::config::HealthCheckConfig;
use crate::load_balancer::registry::BackendRegistry;
use crate::observability::metrics;

/// Periodic prober that flips backend health flags.
pub struct HealthMonitor {
    registry: Arc<BackendRegistry>,
    config: HealthCheckConfig,
    client: Client<HttpConnector, Body>,
}

impl HealthMonitor {
    pub fn new(registry: Arc<BackendRegistry>, config: HealthCheckConfig) -> Self {
        let client = Client::builder(TokioExecutor::new()).build(HttpConnector::new());
        Self {
            registry,
            config,
            client,
        }
    }

    /// Probe loop; exits on the shutdown signal.
    pub async fn run(self, mut shutdown: broadcast::Receiver<()>) {
        tracing::info!(
            interval = self.config.interval_secs,
            path = %self.config.path,
            "Health monitor starting"
        );

        let mut ticker = time::interval(Duration::from_secs(self.config.interval_secs));
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.check_all().await;
                }
                _ = shutdown.recv() => {
                    tracing::info!("Health monitor received shutdown signal, exiting loop");
                    break;
                }
            }
        }
    }

    async fn check_all(&self) {
        for backend in self.registry.all() {
            let uri = format!("http://{}{}", backend.addr, self.config.path);
            let request = match Request::builder()
                .method("GET")
                .uri(uri)
                .header("user-agent", "api-gateway-health-check")
                .body(Body::empty())
            {
                Ok(req) => req,
                Err(e) => {
                    tracing::error!(error = %e, "Failed to build health check request");
                    continue;
                }
            };

            let timeout = Duration::from_secs(self.config.timeout_secs);
            let healthy = match time::timeout(timeout, self.client.request(request)).await {
                Ok(Ok(response)) => {
                    let success = response.status().is_success();
                    if !success {
                        tracing::warn!(backend = %backend.id, status = %response.status(), "Health check failed: non-success status");
                    }
                    success
                }
                Ok(Err(e)) => {
                    tracing::warn!(backend = %backend.id, error = %e, "Health check failed: connection error");
                    false
                }
                Err(_) => {
                    tracing::warn!(backend = %backend.id, "Health check failed: timeout");
                    false
                }
            };

            if healthy {
                backend.mark_success(self.config.healthy_threshold as usize);
            } else {
                backend.mark_failure(self.config.unhealthy_threshold as usize);
            }

            metrics::record_backend_health(&backend.id, backend.is_healthy());
        }
    }
}
