//! Backend registry.
//!
//! # Responsibilities
//! - Hold the set of known backends built from configuration
//! - Provide lookup by id (consistent-hash routing) and the full set
//!   (strategy routing, health checking)
//!
//! The registry itself is passive; connection counts and health flags
//! live on the backends and are mutated by the dispatcher and the
//! health monitor.

use std::collections::HashMap;
use std::sync::Arc;

use crate::config::BackendConfig;
use crate::load_balancer::backend::Backend;

/// Passive holder of the configured backend set.
#[derive(Debug, Default)]
pub struct BackendRegistry {
    backends: Vec<Arc<Backend>>,
    by_id: HashMap<String, Arc<Backend>>,
}

impl BackendRegistry {
    /// Build the registry from configuration. Entries with an
    /// unparseable address are skipped with a warning, matching the
    /// validation pass that already flagged them.
    pub fn new(configs: &[BackendConfig]) -> Self {
        let mut backends = Vec::with_capacity(configs.len());
        let mut by_id = HashMap::with_capacity(configs.len());

        for config in configs {
            match config.address.parse() {
                Ok(addr) => {
                    let backend = Arc::new(Backend::new(config.id.clone(), addr));
                    by_id.insert(config.id.clone(), backend.clone());
                    backends.push(backend);
                }
                Err(_) => {
                    tracing::warn!(backend = %config.id, address = %config.address, "Invalid backend address, skipping");
                }
            }
        }

        Self { backends, by_id }
    }

    /// The full backend set, in configuration order.
    pub fn all(&self) -> &[Arc<Backend>] {
        &self.backends
    }

    /// Look up a backend by its id.
    pub fn by_id(&self, id: &str) -> Option<Arc<Backend>> {
        self.by_id.get(id).cloned()
    }

    pub fn len(&self) -> usize {
        self.backends.len()
    }

    pub fn is_empty(&self) -> bool {
        self.backends.is_empty()
    }
}
