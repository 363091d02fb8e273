//! Gateway error taxonomy.
//!
//! Every variant is a local, synchronous outcome returned to the
//! immediate caller; none of them triggers a retry or cascades across
//! components.

use thiserror::Error;

/// Errors produced by the gateway's decision-making subsystems.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum GatewayError {
    /// Admission denied for the named client. Surfaced as HTTP 429.
    #[error("Rate limit exceeded for client: {0}")]
    RateLimitExceeded(String),

    /// Routing found no eligible backend. Surfaced as HTTP 503.
    #[error("no healthy servers available")]
    NoHealthyServers,

    /// Consistent-hash lookup on a ring with zero servers.
    #[error("no servers available in the ring")]
    EmptyRing,

    /// The consistent-hash ring named a server the registry does not know.
    #[error("server {0} is not registered")]
    UnknownServer(String),
}
