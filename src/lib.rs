//! Minimal API gateway library.
//!
//! Admits or rejects inbound requests under a per-client rate budget,
//! then routes admitted requests to one of several backends via a
//! pluggable strategy (round-robin, least-connections) or a consistent
//! hash ring for sticky assignment.

pub mod config;
pub mod error;
pub mod hash_ring;
pub mod health;
pub mod http;
pub mod lifecycle;
pub mod load_balancer;
pub mod observability;
pub mod rate_limit;

pub use config::GatewayConfig;
pub use error::GatewayError;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
