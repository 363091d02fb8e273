//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the
//! gateway. All types derive Serde traits for deserialization from
//! config files, and every section has defaults so a minimal config
//! still boots.

use serde::{Deserialize, Serialize};

/// Root configuration for the API gateway.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct GatewayConfig {
    /// Listener configuration (bind address).
    pub listener: ListenerConfig,

    /// Backend server definitions.
    pub backends: Vec<BackendConfig>,

    /// Backend selection policy.
    pub routing: RoutingConfig,

    /// Admission control settings.
    pub rate_limit: RateLimitConfig,

    /// Health check settings.
    pub health_check: HealthCheckConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
        }
    }
}

/// Backend server configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BackendConfig {
    /// Unique backend identifier.
    pub id: String,

    /// Backend address (e.g., "127.0.0.1:8081").
    pub address: String,

    /// Seed for the backend's consistent-hash ring position.
    #[serde(default = "default_ring_seed")]
    pub ring_seed: i64,
}

fn default_ring_seed() -> i64 {
    31
}

/// Which backend-selection policy the dispatcher uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum RoutingStrategyKind {
    #[default]
    RoundRobin,
    LeastConnections,
    /// Sticky key-to-backend assignment via the hash ring.
    ConsistentHash,
}

/// Routing configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RoutingConfig {
    /// Selection policy.
    pub strategy: RoutingStrategyKind,

    /// Seed used when hashing request keys onto the ring
    /// (consistent-hash strategy only).
    pub hash_seed: i64,
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self {
            strategy: RoutingStrategyKind::RoundRobin,
            hash_seed: 31,
        }
    }
}

/// Which admission policy the gateway applies per client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum RateLimitPolicy {
    #[default]
    TokenBucket,
    FixedWindow,
}

/// Admission control configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Admission policy.
    pub policy: RateLimitPolicy,

    /// Maximum tokens in a bucket; also the fixed-window request cap.
    pub max_tokens: i64,

    /// Tokens restored per window (token bucket only).
    pub refill_rate: i64,

    /// Window size in seconds.
    pub window_secs: i64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            policy: RateLimitPolicy::TokenBucket,
            max_tokens: 100,
            refill_rate: 100,
            window_secs: 60,
        }
    }
}

/// Health check configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct HealthCheckConfig {
    /// Whether active probing runs at all.
    pub enabled: bool,

    /// Path probed on each backend.
    pub path: String,

    /// Seconds between probe rounds.
    pub interval_secs: u64,

    /// Per-probe timeout in seconds.
    pub timeout_secs: u64,

    /// Consecutive successes before an unhealthy backend recovers.
    pub healthy_threshold: u32,

    /// Consecutive failures before a healthy backend is pulled.
    pub unhealthy_threshold: u32,
}

impl Default for HealthCheckConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            path: "/health".to_string(),
            interval_secs: 10,
            timeout_secs: 2,
            healthy_threshold: 2,
            unhealthy_threshold: 3,
        }
    }
}

/// Timeout configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// End-to-end request timeout in seconds.
    pub request_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self { request_secs: 30 }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Whether to expose a Prometheus scrape endpoint.
    pub metrics_enabled: bool,

    /// Address the metrics exporter binds to.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            metrics_enabled: false,
            metrics_address: "127.0.0.1:9090".to_string(),
        }
    }
}
