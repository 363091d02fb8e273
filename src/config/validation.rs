//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Check backend set integrity (unique ids, parseable addresses)
//! - Validate value ranges (windows and budgets must be positive)
//!
//! # Design Decisions
//! - Returns all validation errors, not just the first
//! - Validation is a pure function over the config
//! - Runs before the config is accepted into the system

use std::collections::HashSet;

use thiserror::Error;

use crate::config::schema::GatewayConfig;

/// A single semantic problem found in the configuration.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("at least one backend must be configured")]
    NoBackends,

    #[error("duplicate backend id: {0}")]
    DuplicateBackendId(String),

    #[error("backend {id} has invalid address: {address}")]
    InvalidBackendAddress { id: String, address: String },

    #[error("listener bind address is invalid: {0}")]
    InvalidBindAddress(String),

    #[error("rate_limit.{field} must be positive, got {value}")]
    NonPositiveRateLimit { field: &'static str, value: i64 },

    #[error("health_check.interval_secs must be positive")]
    ZeroHealthInterval,
}

/// Validate a configuration, collecting every problem found.
pub fn validate_config(config: &GatewayConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.backends.is_empty() {
        errors.push(ValidationError::NoBackends);
    }

    let mut seen = HashSet::new();
    for backend in &config.backends {
        if !seen.insert(backend.id.as_str()) {
            errors.push(ValidationError::DuplicateBackendId(backend.id.clone()));
        }
        if backend.address.parse::<std::net::SocketAddr>().is_err() {
            errors.push(ValidationError::InvalidBackendAddress {
                id: backend.id.clone(),
                address: backend.address.clone(),
            });
        }
    }

    if config
        .listener
        .bind_address
        .parse::<std::net::SocketAddr>()
        .is_err()
    {
        errors.push(ValidationError::InvalidBindAddress(
            config.listener.bind_address.clone(),
        ));
    }

    for (field, value) in [
        ("max_tokens", config.rate_limit.max_tokens),
        ("refill_rate", config.rate_limit.refill_rate),
        ("window_secs", config.rate_limit.window_secs),
    ] {
        if value <= 0 {
            errors.push(ValidationError::NonPositiveRateLimit { field, value });
        }
    }

    if config.health_check.enabled && config.health_check.interval_secs == 0 {
        errors.push(ValidationError::ZeroHealthInterval);
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
