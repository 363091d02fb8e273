//! End-to-end tests for the gateway: admission, routing, and
//! forwarding through a live server.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use api_gateway::config::{
    BackendConfig, GatewayConfig, RateLimitPolicy, RoutingStrategyKind,
};
use api_gateway::http::HttpServer;
use api_gateway::lifecycle::Shutdown;
use reqwest::StatusCode;
use tokio::net::TcpListener;

mod common;

fn backend_config(id: &str, addr: SocketAddr) -> BackendConfig {
    BackendConfig {
        id: id.to_string(),
        address: addr.to_string(),
        ring_seed: 31,
    }
}

fn base_config(backends: Vec<BackendConfig>) -> GatewayConfig {
    let mut config = GatewayConfig::default();
    config.backends = backends;
    config.health_check.enabled = false;
    config
}

/// Boot the gateway on an ephemeral port.
async fn start_gateway(config: GatewayConfig) -> (SocketAddr, Arc<Shutdown>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let shutdown = Arc::new(Shutdown::new());
    let server = HttpServer::new(config);

    let sd = shutdown.clone();
    tokio::spawn(async move {
        let _ = server.run(listener, &sd).await;
    });
    tokio::time::sleep(Duration::from_millis(100)).await;

    (addr, shutdown)
}

#[tokio::test]
async fn forwards_requests_round_robin() {
    let alpha = common::start_mock_backend("alpha").await;
    let beta = common::start_mock_backend("beta").await;

    let config = base_config(vec![
        backend_config("alpha", alpha),
        backend_config("beta", beta),
    ]);
    let (addr, shutdown) = start_gateway(config).await;

    let client = reqwest::Client::new();
    let mut bodies = Vec::new();
    for _ in 0..4 {
        let res = client
            .get(format!("http://{addr}/api/users"))
            .send()
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        bodies.push(res.text().await.unwrap());
    }

    // Two healthy backends, four calls: strict alternation.
    assert_eq!(bodies, vec!["alpha", "beta", "alpha", "beta"]);
    shutdown.trigger();
}

#[tokio::test]
async fn enforces_token_budget_per_client() {
    let backend = common::start_mock_backend("ok").await;

    let mut config = base_config(vec![backend_config("b1", backend)]);
    config.rate_limit.max_tokens = 3;
    config.rate_limit.refill_rate = 3;
    config.rate_limit.window_secs = 60;
    let (addr, shutdown) = start_gateway(config).await;

    let client = reqwest::Client::new();
    let url = format!("http://{addr}/");

    for _ in 0..3 {
        let res = client
            .get(&url)
            .header("Client-Id", "alice")
            .send()
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);
    }

    let denied = client
        .get(&url)
        .header("Client-Id", "alice")
        .send()
        .await
        .unwrap();
    assert_eq!(denied.status(), StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(
        denied.text().await.unwrap(),
        "Rate limit exceeded for client: alice"
    );

    // Unlabeled traffic draws from the default-client budget, which
    // alice has not touched.
    let anonymous = client.get(&url).send().await.unwrap();
    assert_eq!(anonymous.status(), StatusCode::OK);

    shutdown.trigger();
}

#[tokio::test]
async fn fixed_window_policy_also_denies_over_budget() {
    let backend = common::start_mock_backend("ok").await;

    let mut config = base_config(vec![backend_config("b1", backend)]);
    config.rate_limit.policy = RateLimitPolicy::FixedWindow;
    config.rate_limit.max_tokens = 2;
    config.rate_limit.window_secs = 3600;
    let (addr, shutdown) = start_gateway(config).await;

    let client = reqwest::Client::new();
    let url = format!("http://{addr}/");

    for _ in 0..2 {
        let res = client
            .get(&url)
            .header("Client-Id", "bob")
            .send()
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);
    }
    let denied = client
        .get(&url)
        .header("Client-Id", "bob")
        .send()
        .await
        .unwrap();
    assert_eq!(denied.status(), StatusCode::TOO_MANY_REQUESTS);

    shutdown.trigger();
}

#[tokio::test]
async fn consistent_hash_routing_is_sticky() {
    let alpha = common::start_mock_backend("alpha").await;
    let beta = common::start_mock_backend("beta").await;

    let mut config = base_config(vec![
        BackendConfig {
            id: "alpha".into(),
            address: alpha.to_string(),
            ring_seed: 431,
        },
        BackendConfig {
            id: "beta".into(),
            address: beta.to_string(),
            ring_seed: 197,
        },
    ]);
    config.routing.strategy = RoutingStrategyKind::ConsistentHash;
    let (addr, shutdown) = start_gateway(config).await;

    let client = reqwest::Client::new();
    let url = format!("http://{addr}/");

    let body_for = |client_id: &'static str| {
        let client = client.clone();
        let url = url.clone();
        async move {
            let res = client
                .get(&url)
                .header("Client-Id", client_id)
                .send()
                .await
                .unwrap();
            assert_eq!(res.status(), StatusCode::OK);
            res.text().await.unwrap()
        }
    };

    // Same key always lands on the same backend.
    let first = body_for("VLVL").await;
    for _ in 0..5 {
        assert_eq!(body_for("VLVL").await, first);
    }

    // A different key is equally deterministic.
    let other = body_for("OXXV").await;
    for _ in 0..5 {
        assert_eq!(body_for("OXXV").await, other);
    }

    shutdown.trigger();
}

#[tokio::test]
async fn ring_skips_backends_with_unparseable_addresses() {
    let good = common::start_mock_backend("good").await;

    let mut config = base_config(vec![
        BackendConfig {
            id: "broken".into(),
            address: "not-an-address".into(),
            ring_seed: 431,
        },
        BackendConfig {
            id: "good".into(),
            address: good.to_string(),
            ring_seed: 197,
        },
    ]);
    config.routing.strategy = RoutingStrategyKind::ConsistentHash;
    let (addr, shutdown) = start_gateway(config).await;

    // The broken backend never joins the ring, so every key resolves
    // to the one that did instead of a server nothing can reach.
    let client = reqwest::Client::new();
    for client_id in ["VLVL", "OXXV", "HHGN"] {
        let res = client
            .get(format!("http://{addr}/"))
            .header("Client-Id", client_id)
            .send()
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(res.text().await.unwrap(), "good");
    }

    shutdown.trigger();
}

#[tokio::test]
async fn dead_backend_yields_bad_gateway() {
    let dead = common::unused_port().await;

    let config = base_config(vec![backend_config("dead", dead)]);
    let (addr, shutdown) = start_gateway(config).await;

    let res = reqwest::Client::new()
        .get(format!("http://{addr}/"))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_GATEWAY);
    assert_eq!(res.text().await.unwrap(), "Upstream request failed");

    shutdown.trigger();
}

#[tokio::test]
async fn unhealthy_backends_drain_to_service_unavailable() {
    let dead = common::unused_port().await;

    let mut config = base_config(vec![backend_config("dead", dead)]);
    config.health_check.enabled = true;
    config.health_check.interval_secs = 1;
    config.health_check.timeout_secs = 1;
    config.health_check.unhealthy_threshold = 1;
    let (addr, shutdown) = start_gateway(config).await;

    let client = reqwest::Client::new();
    let url = format!("http://{addr}/");

    // The monitor needs at least one probe round to pull the backend.
    let mut last_status = StatusCode::OK;
    for _ in 0..20 {
        last_status = client.get(&url).send().await.unwrap().status();
        if last_status == StatusCode::SERVICE_UNAVAILABLE {
            break;
        }
        tokio::time::sleep(Duration::from_millis(500)).await;
    }
    assert_eq!(last_status, StatusCode::SERVICE_UNAVAILABLE);

    shutdown.trigger();
}

#[tokio::test]
async fn responses_carry_a_request_id() {
    let backend = common::start_mock_backend("ok").await;

    let config = base_config(vec![backend_config("b1", backend)]);
    let (addr, shutdown) = start_gateway(config).await;

    let res = reqwest::Client::new()
        .get(format!("http://{addr}/"))
        .send()
        .await
        .unwrap();
    assert!(res.headers().contains_key("x-request-id"));

    shutdown.trigger();
}
