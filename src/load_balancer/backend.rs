//! Backend abstraction.
//!
//! # Responsibilities
//! - Represent a single backend server
//! - Track active connections (for Least Connections routing)
//! - Track health state (flag flipped by the health monitor)

use std::net::SocketAddr;
use std::ops::Deref;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use url::Url;

/// A single backend server.
///
/// Health and connection counters are atomics so the registry can hand
/// out shared references to many in-flight requests without locking.
#[derive(Debug)]
pub struct Backend {
    /// Opaque identifier, unique within the registry.
    pub id: String,
    /// The address of the backend.
    pub addr: SocketAddr,
    /// Pre-calculated base URL the dispatcher forwards to.
    pub base_url: Url,

    healthy: AtomicBool,
    active_connections: AtomicUsize,
    /// Consecutive failure count, used by the health monitor.
    consecutive_failures: AtomicUsize,
    /// Consecutive success count, used by the health monitor.
    consecutive_successes: AtomicUsize,
}

impl Backend {
    /// Create a new backend. Starts healthy; the health monitor takes
    /// over the flag once probing begins.
    pub fn new(id: impl Into<String>, addr: SocketAddr) -> Self {
        let base_url =
            Url::parse(&format!("http://{addr}")).expect("socket addr forms a valid URL");
        Self {
            id: id.into(),
            addr,
            base_url,
            healthy: AtomicBool::new(true),
            active_connections: AtomicUsize::new(0),
            consecutive_failures: AtomicUsize::new(0),
            consecutive_successes: AtomicUsize::new(0),
        }
    }

    /// Get the current number of active connections.
    pub fn active_connections(&self) -> usize {
        self.active_connections.load(Ordering::Relaxed)
    }

    /// Return true if the backend is eligible for traffic.
    pub fn is_healthy(&self) -> bool {
        self.healthy.load(Ordering::Relaxed)
    }

    /// Set the health flag directly (external health signals, tests).
    pub fn set_healthy(&self, healthy: bool) {
        self.healthy.store(healthy, Ordering::Relaxed);
    }

    /// Acquire a connection slot. The returned guard decrements the
    /// counter on drop, so the count stays consistent on every exit
    /// path of the forward, including failures.
    pub fn acquire(self: &Arc<Self>) -> ConnectionGuard {
        self.active_connections.fetch_add(1, Ordering::Relaxed);
        ConnectionGuard {
            backend: self.clone(),
        }
    }

    /// Report a successful probe or forward.
    ///
    /// An unhealthy backend transitions back to healthy after
    /// `healthy_threshold` consecutive successes.
    pub fn mark_success(&self, healthy_threshold: usize) {
        self.consecutive_failures.store(0, Ordering::Relaxed);

        if self.healthy.load(Ordering::Relaxed) {
            return;
        }

        let successes = self.consecutive_successes.fetch_add(1, Ordering::Relaxed) + 1;
        if successes >= healthy_threshold {
            self.healthy.store(true, Ordering::Relaxed);
            tracing::info!(backend = %self.id, addr = %self.addr, "Backend transitioned to healthy");
        }
    }

    /// Report a failed probe or forward.
    ///
    /// A healthy backend transitions to unhealthy after
    /// `unhealthy_threshold` consecutive failures.
    pub fn mark_failure(&self, unhealthy_threshold: usize) {
        self.consecutive_successes.store(0, Ordering::Relaxed);

        if !self.healthy.load(Ordering::Relaxed) {
            return;
        }

        let failures = self.consecutive_failures.fetch_add(1, Ordering::Relaxed) + 1;
        if failures >= unhealthy_threshold {
            self.healthy.store(false, Ordering::Relaxed);
            tracing::warn!(backend = %self.id, addr = %self.addr, "Backend transitioned to unhealthy");
        }
    }
}

/// A RAII guard that manages the active connection count.
#[derive(Debug)]
pub struct ConnectionGuard {
    backend: Arc<Backend>,
}

impl Deref for ConnectionGuard {
    type Target = Arc<Backend>;
    fn deref(&self) -> &Self::Target {
        &self.backend
    }
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        self.backend
            .active_connections
            .fetch_sub(1, Ordering::Relaxed);
    }
}
