//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Request admitted by rate limiter
//!     → registry.rs (full backend set)
//!     → Apply routing strategy:
//!         - round_robin.rs (rotate through healthy backends)
//!         - least_conn.rs (pick healthy backend with fewest connections)
//!     → backend.rs (acquire connection guard)
//!     → Forward, guard drop decrements the count
//! ```
//!
//! # Design Decisions
//! - Strategies are read-only over the backend set; the dispatcher owns
//!   connection bookkeeping via the RAII guard
//! - Unhealthy backends are filtered out before selection, and an empty
//!   healthy set is an explicit error rather than a silent default
//! - Consistent-hash routing lives in `hash_ring` and bypasses these
//!   load-adaptive strategies entirely

pub mod backend;
pub mod least_conn;
pub mod registry;
pub mod round_robin;

use std::sync::Arc;

use crate::config::RoutingStrategyKind;
use crate::error::GatewayError;
use backend::Backend;

/// A pluggable backend-selection policy.
///
/// Given the full backend set, return exactly one backend to use next,
/// considering only backends whose health flag is true.
pub trait RoutingStrategy: Send + Sync + std::fmt::Debug {
    fn select(&self, backends: &[Arc<Backend>]) -> Result<Arc<Backend>, GatewayError>;
}

/// Instantiate the strategy named in the configuration.
///
/// `ConsistentHash` has no load-adaptive strategy; the dispatcher routes
/// through the hash ring instead, so this falls back to round-robin for
/// callers that still want one.
pub fn strategy_for(kind: RoutingStrategyKind) -> Arc<dyn RoutingStrategy> {
    match kind {
        RoutingStrategyKind::LeastConnections => Arc::new(least_conn::LeastConnections::new()),
        RoutingStrategyKind::RoundRobin | RoutingStrategyKind::ConsistentHash => {
            Arc::new(round_robin::RoundRobin::new())
        }
    }
}
