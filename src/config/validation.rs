//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (rates > 0, durations > 0, addresses parse)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: GatekeeperConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;

use thiserror::Error;

use crate::config::schema::GatekeeperConfig;

/// A single semantic problem found in a configuration.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("listener.bind_address `{0}` is not a valid socket address")]
    BindAddress(String),

    #[error("observability.metrics_address `{0}` is not a valid socket address")]
    MetricsAddress(String),

    #[error("rate_limit.requests_per_second must be a positive number, got {0}")]
    RequestsPerSecond(f64),

    #[error("rate_limit.burst_size must be at least 1")]
    BurstSize,

    #[error("{0} must be greater than zero")]
    ZeroDuration(&'static str),
}

/// Check a configuration for semantic errors.
pub fn validate_config(config: &GatekeeperConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::BindAddress(
            config.listener.bind_address.clone(),
        ));
    }

    if config.observability.metrics_enabled
        && config
            .observability
            .metrics_address
            .parse::<SocketAddr>()
            .is_err()
    {
        errors.push(ValidationError::MetricsAddress(
            config.observability.metrics_address.clone(),
        ));
    }

    let rps = config.rate_limit.requests_per_second;
    if !rps.is_finite() || rps <= 0.0 {
        errors.push(ValidationError::RequestsPerSecond(rps));
    }

    if config.rate_limit.burst_size < 1 {
        errors.push(ValidationError::BurstSize);
    }

    let durations = [
        ("lifecycle.grace_period_secs", config.lifecycle.grace_period_secs),
        ("lifecycle.sweep_interval_secs", config.lifecycle.sweep_interval_secs),
        ("lifecycle.idle_threshold_secs", config.lifecycle.idle_threshold_secs),
        ("timeouts.request_secs", config.timeouts.request_secs),
    ];
    for (name, secs) in durations {
        if secs == 0 {
            errors.push(ValidationError::ZeroDuration(name));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
