//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the service.
//! All types derive Serde traits for deserialization from config files.

use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Root configuration for the health service.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ServiceConfig {
    /// Listener configuration (bind address).
    pub listener: ListenerConfig,

    /// Database connectivity target probed by the monitor.
    pub database: DatabaseConfig,

    /// Health monitor settings.
    pub health: HealthConfig,

    /// Circuit breaker settings applied to every dependency.
    pub breaker_defaults: BreakerSettings,

    /// Per-dependency overrides, keyed by service name.
    pub breakers: BTreeMap<String, BreakerOverrides>,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

impl ServiceConfig {
    /// Effective breaker settings for a named dependency.
    pub fn breaker_settings(&self, service: &str) -> BreakerSettings {
        match self.breakers.get(service) {
            Some(overrides) => overrides.apply(&self.breaker_defaults),
            None => self.breaker_defaults.clone(),
        }
    }
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,

    /// Request timeout in seconds.
    pub request_timeout_secs: u64,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
            request_timeout_secs: 30,
        }
    }
}

/// Database connectivity configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Address of the database server (e.g., "127.0.0.1:5432").
    pub address: String,

    /// Connect timeout for the connectivity check in milliseconds.
    pub connect_timeout_ms: u64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            address: "127.0.0.1:5432".to_string(),
            connect_timeout_ms: 2000,
        }
    }
}

/// Health monitor configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct HealthConfig {
    /// Enable the periodic monitoring loop.
    pub enabled: bool,

    /// Interval between monitoring passes in seconds.
    pub interval_secs: u64,

    /// Delay before the first pass after startup in milliseconds.
    pub initial_delay_ms: u64,

    /// Deadline for a single probe in milliseconds.
    pub probe_timeout_ms: u64,

    /// Process memory, as a percentage of its limit, above which memory is degraded.
    pub memory_degraded_percent: f64,

    /// Process memory, as a percentage of its limit, above which memory is unhealthy.
    pub memory_unhealthy_percent: f64,

    /// Memory budget for this process in MiB. Unset: the cgroup limit when
    /// one applies, otherwise total system memory.
    pub memory_limit_mb: Option<u64>,

    /// Domain integrations tracked by the domain-services probe.
    pub domain_services: Vec<String>,
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_secs: 30,
            initial_delay_ms: 1000,
            probe_timeout_ms: 5000,
            memory_degraded_percent: 80.0,
            memory_unhealthy_percent: 90.0,
            memory_limit_mb: None,
            domain_services: vec![
                "bookings".to_string(),
                "events".to_string(),
                "locations".to_string(),
            ],
        }
    }
}

impl HealthConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    pub fn initial_delay(&self) -> Duration {
        Duration::from_millis(self.initial_delay_ms)
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.probe_timeout_ms)
    }

    pub fn memory_limit_bytes(&self) -> Option<u64> {
        self.memory_limit_mb.map(|mb| mb.saturating_mul(1024 * 1024))
    }
}

/// Circuit breaker thresholds and timings.
///
/// Immutable once a breaker has been built from it.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct BreakerSettings {
    /// Counted failures while closed before the circuit opens.
    pub failure_threshold: u32,

    /// Time the circuit stays open before probing recovery, in milliseconds.
    pub reset_timeout_ms: u64,

    /// Successes required in half-open before the circuit closes.
    pub half_open_success_threshold: u32,

    /// Optional per-call deadline in milliseconds.
    pub timeout_ms: Option<u64>,

    /// Optional interval of the proactive recovery check in milliseconds.
    pub monitor_interval_ms: Option<u64>,
}

impl Default for BreakerSettings {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            reset_timeout_ms: 60_000,
            half_open_success_threshold: 2,
            timeout_ms: None,
            monitor_interval_ms: None,
        }
    }
}

impl BreakerSettings {
    pub fn reset_timeout(&self) -> Duration {
        Duration::from_millis(self.reset_timeout_ms)
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_ms.map(Duration::from_millis)
    }

    pub fn monitor_interval(&self) -> Option<Duration> {
        self.monitor_interval_ms.map(Duration::from_millis)
    }
}

/// Partial breaker settings for a single dependency.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct BreakerOverrides {
    pub failure_threshold: Option<u32>,
    pub reset_timeout_ms: Option<u64>,
    pub half_open_success_threshold: Option<u32>,
    pub timeout_ms: Option<u64>,
    pub monitor_interval_ms: Option<u64>,
}

impl BreakerOverrides {
    fn apply(&self, base: &BreakerSettings) -> BreakerSettings {
        BreakerSettings {
            failure_threshold: self.failure_threshold.unwrap_or(base.failure_threshold),
            reset_timeout_ms: self.reset_timeout_ms.unwrap_or(base.reset_timeout_ms),
            half_open_success_threshold: self
                .half_open_success_threshold
                .unwrap_or(base.half_open_success_threshold),
            timeout_ms: self.timeout_ms.or(base.timeout_ms),
            monitor_interval_ms: self.monitor_interval_ms.or(base.monitor_interval_ms),
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Log output format.
    pub log_format: LogFormat,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            metrics_enabled: true,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}
