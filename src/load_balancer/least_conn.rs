//! Least Connections routing strategy.

use std::sync::Arc;

use crate::error::GatewayError;
use crate::load_balancer::{backend::Backend, RoutingStrategy};

/// Least connections selector.
///
/// Picks the healthy backend with the minimum number of active
/// connections. Ties go to the first minimum in iteration order. The
/// count is a snapshot and may be stale by the time the forward runs;
/// that approximation is accepted.
#[derive(Debug, Default)]
pub struct LeastConnections;

impl LeastConnections {
    pub fn new() -> Self {
        Self::default()
    }
}

impl RoutingStrategy for LeastConnections {
    fn select(&self, backends: &[Arc<Backend>]) -> Result<Arc<Backend>, GatewayError> {
        backends
            .iter()
            .filter(|b| b.is_healthy())
            .min_by_key(|b| b.active_connections())
            .cloned()
            .ok_or(GatewayError::NoHealthyServers)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn backend(id: &str, port: u16, connections: usize) -> Arc<Backend> {
        let b = Arc::new(Backend::new(id, format!("127.0.0.1:{port}").parse().unwrap()));
        for _ in 0..connections {
            std::mem::forget(b.acquire());
        }
        b
    }

    #[test]
    fn picks_minimum_connection_count() {
        let lb = LeastConnections::new();
        let backends = vec![
            backend("a", 8080, 3),
            backend("b", 8081, 1),
            backend("c", 8082, 5),
        ];

        assert_eq!(lb.select(&backends).unwrap().id, "b");

        // Push b past a; selection moves to a.
        let _g1 = backends[1].acquire();
        let _g2 = backends[1].acquire();
        let _g3 = backends[1].acquire();
        assert_eq!(lb.select(&backends).unwrap().id, "a");
    }

    #[test]
    fn tie_breaks_to_first_in_order() {
        let lb = LeastConnections::new();
        let backends = vec![backend("a", 8080, 2), backend("b", 8081, 2)];
        assert_eq!(lb.select(&backends).unwrap().id, "a");
    }

    #[test]
    fn ignores_unhealthy_backends() {
        let lb = LeastConnections::new();
        let backends = vec![backend("a", 8080, 0), backend("b", 8081, 4)];
        backends[0].set_healthy(false);

        assert_eq!(lb.select(&backends).unwrap().id, "b");
    }

    #[test]
    fn errors_when_all_unhealthy() {
        let lb = LeastConnections::new();
        let backends = vec![backend("a", 8080, 0)];
        backends[0].set_healthy(false);

        assert!(matches!(
            lb.select(&backends),
            Err(GatewayError::NoHealthyServers)
        ));
    }
}
