//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (thresholds > 0, timeouts > 0, addresses parse)
//! - Check memory thresholds are ordered
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ServiceConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;

use crate::config::schema::{BreakerSettings, ServiceConfig};

/// A single semantic problem in the configuration.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ValidationError {
    #[error("{field}: invalid socket address '{value}'")]
    InvalidAddress { field: &'static str, value: String },

    #[error("{field}: must be greater than zero")]
    Zero { field: String },

    #[error(
        "health: memory_degraded_percent ({degraded}) must be below \
         memory_unhealthy_percent ({unhealthy}) and within 0..=100"
    )]
    MemoryThresholds { degraded: f64, unhealthy: f64 },

    #[error("health.domain_services: duplicate service '{0}'")]
    DuplicateDomainService(String),
}

/// Validate a parsed configuration, collecting every problem found.
pub fn validate_config(config: &ServiceConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    check_address(&mut errors, "listener.bind_address", &config.listener.bind_address);
    check_address(&mut errors, "database.address", &config.database.address);
    if config.observability.metrics_enabled {
        check_address(
            &mut errors,
            "observability.metrics_address",
            &config.observability.metrics_address,
        );
    }

    if config.listener.request_timeout_secs == 0 {
        errors.push(ValidationError::Zero { field: "listener.request_timeout_secs".into() });
    }
    if config.database.connect_timeout_ms == 0 {
        errors.push(ValidationError::Zero { field: "database.connect_timeout_ms".into() });
    }

    let health = &config.health;
    if health.interval_secs == 0 {
        errors.push(ValidationError::Zero { field: "health.interval_secs".into() });
    }
    if health.probe_timeout_ms == 0 {
        errors.push(ValidationError::Zero { field: "health.probe_timeout_ms".into() });
    }
    if health.memory_limit_mb == Some(0) {
        errors.push(ValidationError::Zero { field: "health.memory_limit_mb".into() });
    }
    let (degraded, unhealthy) = (health.memory_degraded_percent, health.memory_unhealthy_percent);
    let in_range = |p: f64| (0.0..=100.0).contains(&p);
    if !in_range(degraded) || !in_range(unhealthy) || degraded >= unhealthy {
        errors.push(ValidationError::MemoryThresholds { degraded, unhealthy });
    }
    let mut seen = std::collections::HashSet::new();
    for name in &health.domain_services {
        if !seen.insert(name.as_str()) {
            errors.push(ValidationError::DuplicateDomainService(name.clone()));
        }
    }

    check_breaker(&mut errors, "breaker_defaults", &config.breaker_defaults);
    for name in config.breakers.keys() {
        check_breaker(&mut errors, &format!("breakers.{}", name), &config.breaker_settings(name));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn check_address(errors: &mut Vec<ValidationError>, field: &'static str, value: &str) {
    if value.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::InvalidAddress {
            field,
            value: value.to_string(),
        });
    }
}

fn check_breaker(errors: &mut Vec<ValidationError>, prefix: &str, settings: &BreakerSettings) {
    let mut zero = |field: &str| {
        errors.push(ValidationError::Zero {
            field: format!("{}.{}", prefix, field),
        })
    };
    if settings.failure_threshold == 0 {
        zero("failure_threshold");
    }
    if settings.reset_timeout_ms == 0 {
        zero("reset_timeout_ms");
    }
    if settings.half_open_success_threshold == 0 {
        zero("half_open_success_threshold");
    }
    if settings.timeout_ms == Some(0) {
        zero("timeout_ms");
    }
    if settings.monitor_interval_ms == Some(0) {
        zero("monitor_interval_ms");
    }
}
