//! Round-robin routing strategy.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::error::GatewayError;
use crate::load_balancer::{backend::Backend, RoutingStrategy};

/// Round-robin selector.
///
/// A single counter is shared by all concurrent callers and advances
/// exactly once per call, whatever the outcome. The index is taken over
/// the momentarily-healthy subset, so the cycle is strict only while the
/// health set is stable.
#[derive(Debug, Default)]
pub struct RoundRobin {
    counter: AtomicUsize,
}

impl RoundRobin {
    pub fn new() -> Self {
        Self::default()
    }
}

impl RoutingStrategy for RoundRobin {
    fn select(&self, backends: &[Arc<Backend>]) -> Result<Arc<Backend>, GatewayError> {
        let turn = self.counter.fetch_add(1, Ordering::Relaxed);

        let healthy: Vec<&Arc<Backend>> = backends.iter().filter(|b| b.is_healthy()).collect();
        if healthy.is_empty() {
            return Err(GatewayError::NoHealthyServers);
        }

        Ok(healthy[turn % healthy.len()].clone())
    }
}
