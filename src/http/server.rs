//! HTTP server and gateway dispatcher.
//!
//! # Responsibilities
//! - Create the axum Router with the catch-all gateway handler
//! - Wire up middleware (request id, tracing, timeout)
//! - Orchestrate per request: admission → selection → forward
//! - Keep connection-count bookkeeping consistent on every exit path
//! - Feed passive health signals back to the backends

use std::str::FromStr;
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};

use axum::{
    body::Body,
    extract::State,
    http::{header::HeaderMap, StatusCode, Uri},
    response::{IntoResponse, Response},
    routing::any,
    Router,
};
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::TokioExecutor,
};
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

use crate::config::{GatewayConfig, HealthCheckConfig, RoutingStrategyKind};
use crate::error::GatewayError;
use crate::hash_ring::{hashing::PolynomialHashing, HashRing};
use crate::health::HealthMonitor;
use crate::http::request::{propagate_request_id_layer, set_request_id_layer};
use crate::lifecycle::Shutdown;
use crate::load_balancer::{
    backend::Backend, registry::BackendRegistry, strategy_for, RoutingStrategy,
};
use crate::observability::metrics;
use crate::rate_limit::{epoch_secs, limiter_for, RateLimiter};

/// Client identifier used when the `Client-Id` header is absent. All
/// unlabeled traffic shares this one budget.
pub const DEFAULT_CLIENT_ID: &str = "default-client";

/// How often idle budget records are swept.
const PRUNE_INTERVAL_SECS: u64 = 60;

/// Application state injected into the handler.
#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<BackendRegistry>,
    pub strategy: Arc<dyn RoutingStrategy>,
    pub limiter: Arc<dyn RateLimiter>,
    /// Present only for the consistent-hash strategy. Topology
    /// mutations take the write lock; request-path lookups share the
    /// read lock.
    pub ring: Option<Arc<RwLock<HashRing>>>,
    pub client: Client<HttpConnector, Body>,
    pub health_config: HealthCheckConfig,
    pub hash_seed: i64,
}

/// HTTP server for the gateway.
pub struct HttpServer {
    router: Router,
    config: GatewayConfig,
    registry: Arc<BackendRegistry>,
    limiter: Arc<dyn RateLimiter>,
}

impl HttpServer {
    /// Create a new HTTP server with the given configuration.
    pub fn new(config: GatewayConfig) -> Self {
        let registry = Arc::new(BackendRegistry::new(&config.backends));
        let strategy = strategy_for(config.routing.strategy);
        let limiter = limiter_for(&config.rate_limit);

        let ring = (config.routing.strategy == RoutingStrategyKind::ConsistentHash).then(|| {
            let mut ring = HashRing::new(Box::new(PolynomialHashing::new()));
            // Only backends that made it into the registry go on the
            // ring; a skipped address must not attract lookups no
            // backend can serve.
            for backend in &config.backends {
                if registry.by_id(&backend.id).is_some() {
                    ring.add_server(&backend.id, backend.ring_seed);
                }
            }
            Arc::new(RwLock::new(ring))
        });

        let client = Client::builder(TokioExecutor::new()).build(HttpConnector::new());

        let state = AppState {
            registry: registry.clone(),
            strategy,
            limiter: limiter.clone(),
            ring,
            client,
            health_config: config.health_check.clone(),
            hash_seed: config.routing.hash_seed,
        };

        let router = Self::build_router(&config, state);
        Self {
            router,
            config,
            registry,
            limiter,
        }
    }

    /// Build the axum router with all middleware layers.
    fn build_router(config: &GatewayConfig, state: AppState) -> Router {
        Router::new()
            .route("/{*path}", any(gateway_handler))
            .route("/", any(gateway_handler))
            .with_state(state)
            .layer(
                ServiceBuilder::new()
                    .layer(set_request_id_layer())
                    .layer(TraceLayer::new_for_http())
                    .layer(TimeoutLayer::with_status_code(
                        StatusCode::REQUEST_TIMEOUT,
                        Duration::from_secs(config.timeouts.request_secs),
                    ))
                    .layer(propagate_request_id_layer()),
            )
    }

    /// Run the server, accepting connections on the given listener.
    ///
    /// Spawns the health monitor and the budget pruner; all tasks exit
    /// on the shutdown signal.
    pub async fn run(self, listener: TcpListener, shutdown: &Shutdown) -> std::io::Result<()> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, backends = self.registry.len(), "HTTP server starting");

        if self.config.health_check.enabled {
            let monitor =
                HealthMonitor::new(self.registry.clone(), self.config.health_check.clone());
            let rx = shutdown.subscribe();
            tokio::spawn(async move {
                monitor.run(rx).await;
            });
        }

        let limiter = self.limiter.clone();
        let mut prune_rx = shutdown.subscribe();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(Duration::from_secs(PRUNE_INTERVAL_SECS));
            loop {
                tokio::select! {
                    _ = ticker.tick() => limiter.prune(epoch_secs()),
                    _ = prune_rx.recv() => break,
                }
            }
        });

        let mut server_rx = shutdown.subscribe();
        axum::serve(listener, self.router)
            .with_graceful_shutdown(async move {
                let _ = server_rx.recv().await;
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

/// Main gateway handler.
///
/// Admission strictly precedes selection; the connection guard is
/// acquired after selection and dropped on every exit path of the
/// forward.
async fn gateway_handler(
    State(state): State<AppState>,
    request: axum::http::Request<Body>,
) -> Response {
    let start = Instant::now();
    let method = request.method().to_string();
    let path = request.uri().path().to_string();
    let client_id = extract_client_id(request.headers());
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("unknown")
        .to_string();

    tracing::debug!(
        request_id = %request_id,
        method = %method,
        path = %path,
        client = %client_id,
        "Dispatching request"
    );

    // 1. Admission
    if !state.limiter.is_allowed(&client_id) {
        tracing::warn!(request_id = %request_id, client = %client_id, "Rate limit exceeded");
        metrics::record_rate_limited(&client_id);
        metrics::record_request(&method, 429, "none", start);
        let denial = GatewayError::RateLimitExceeded(client_id);
        return (StatusCode::TOO_MANY_REQUESTS, denial.to_string()).into_response();
    }

    // 2. Selection
    let backend = match select_backend(&state, &client_id) {
        Ok(backend) => backend,
        Err(e) => {
            tracing::warn!(request_id = %request_id, client = %client_id, error = %e, "No backend available");
            metrics::record_request(&method, 503, "none", start);
            return (StatusCode::SERVICE_UNAVAILABLE, e.to_string()).into_response();
        }
    };

    // 3. Forward, with the guard holding the connection slot
    let guard = backend.acquire();

    let (mut parts, body) = request.into_parts();
    let path_and_query = parts
        .uri
        .path_and_query()
        .map(|pq| pq.as_str())
        .unwrap_or("/");
    // base_url carries a trailing slash, path_and_query a leading one.
    let target = format!("{}{}", guard.base_url, path_and_query.trim_start_matches('/'));
    parts.uri = match Uri::from_str(&target) {
        Ok(uri) => uri,
        Err(e) => {
            tracing::error!(request_id = %request_id, target = %target, error = %e, "Failed to build upstream URI");
            metrics::record_request(&method, 500, &guard.id, start);
            return (StatusCode::INTERNAL_SERVER_ERROR, "Invalid upstream URI").into_response();
        }
    };
    let upstream_request = axum::http::Request::from_parts(parts, body);

    match state.client.request(upstream_request).await {
        Ok(response) => {
            let status = response.status();
            metrics::record_request(&method, status.as_u16(), &guard.id, start);

            // Passive health: gateway-class errors count against the
            // backend, everything else counts for it.
            match status {
                StatusCode::BAD_GATEWAY | StatusCode::SERVICE_UNAVAILABLE | StatusCode::GATEWAY_TIMEOUT => {
                    guard.mark_failure(state.health_config.unhealthy_threshold as usize);
                }
                _ => {
                    guard.mark_success(state.health_config.healthy_threshold as usize);
                }
            }

            let (parts, body) = response.into_parts();
            Response::from_parts(parts, Body::new(body)).into_response()
        }
        Err(e) => {
            tracing::error!(request_id = %request_id, backend = %guard.id, error = %e, "Upstream error");
            metrics::record_request(&method, 502, &guard.id, start);
            guard.mark_failure(state.health_config.unhealthy_threshold as usize);
            (StatusCode::BAD_GATEWAY, "Upstream request failed").into_response()
        }
    }
}

/// Derive the client identifier from the `Client-Id` header.
pub fn extract_client_id(headers: &HeaderMap) -> String {
    headers
        .get("Client-Id")
        .and_then(|v| v.to_str().ok())
        .unwrap_or(DEFAULT_CLIENT_ID)
        .to_string()
}

/// Pick the target backend for this request.
///
/// Consistent-hash routing resolves the client id through the ring;
/// otherwise the configured load-adaptive strategy runs over the full
/// backend set.
fn select_backend(state: &AppState, client_id: &str) -> Result<Arc<Backend>, GatewayError> {
    match &state.ring {
        Some(ring) => {
            let ring = ring.read().expect("hash ring lock poisoned");
            let server_id = ring.server_for(client_id, state.hash_seed)?;
            state
                .registry
                .by_id(&server_id)
                .ok_or(GatewayError::UnknownServer(server_id))
        }
        None => state.strategy.select(state.registry.all()),
    }
}
