//! Health check records and the system-wide fold.
//!
//! # Status Ordering
//! ```text
//! Healthy < Degraded < Unhealthy
//! overall = worst check (Healthy when there are no checks)
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Status of one check, or of the whole system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Unhealthy,
}

impl HealthStatus {
    /// Worst status among `statuses`.
    pub fn worst<I>(statuses: I) -> HealthStatus
    where
        I: IntoIterator<Item = HealthStatus>,
    {
        statuses.into_iter().max().unwrap_or(HealthStatus::Healthy)
    }
}

impl std::fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            HealthStatus::Healthy => "healthy",
            HealthStatus::Degraded => "degraded",
            HealthStatus::Unhealthy => "unhealthy",
        })
    }
}

/// One observation of one subsystem. Replaced whole on every pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthCheck {
    pub name: String,
    pub status: HealthStatus,
    pub last_check: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_time_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl HealthCheck {
    /// Placeholder for a well-known check that has not completed yet.
    pub fn not_yet_run(name: &str, now: DateTime<Utc>) -> Self {
        Self {
            name: name.to_string(),
            status: HealthStatus::Unhealthy,
            last_check: now,
            response_time_ms: None,
            details: None,
            error: Some("check has not run yet".to_string()),
        }
    }
}

pub const DATABASE: &str = "database";
pub const EVENT_BUS: &str = "event_bus";
pub const CIRCUIT_BREAKERS: &str = "circuit_breakers";
pub const MEMORY: &str = "memory";
pub const DOMAIN_SERVICES: &str = "domain_services";

/// The well-known check names, in reporting order.
pub const WELL_KNOWN: [&str; 5] = [DATABASE, EVENT_BUS, CIRCUIT_BREAKERS, MEMORY, DOMAIN_SERVICES];

/// Named references to the five well-known checks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dependencies {
    pub database: HealthCheck,
    pub event_bus: HealthCheck,
    pub circuit_breakers: HealthCheck,
    pub memory: HealthCheck,
    pub domain_services: HealthCheck,
}

/// Aggregate health snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemHealth {
    pub status: HealthStatus,
    pub version: String,
    pub uptime_secs: u64,
    pub timestamp: DateTime<Utc>,
    pub checks: Vec<HealthCheck>,
    pub dependencies: Dependencies,
}

impl SystemHealth {
    /// Fold `checks` into a snapshot. Missing well-known checks are filled in
    /// as "not yet run" and count toward the overall status.
    pub fn from_checks(
        mut checks: Vec<HealthCheck>,
        uptime_secs: u64,
        timestamp: DateTime<Utc>,
    ) -> Self {
        for name in WELL_KNOWN {
            if !checks.iter().any(|c| c.name == name) {
                checks.push(HealthCheck::not_yet_run(name, timestamp));
            }
        }
        checks.sort_by_key(|c| {
            let rank = WELL_KNOWN.iter().position(|n| *n == c.name).unwrap_or(WELL_KNOWN.len());
            (rank, c.name.clone())
        });

        let find = |name: &str| {
            checks
                .iter()
                .find(|c| c.name == name)
                .cloned()
                .unwrap_or_else(|| HealthCheck::not_yet_run(name, timestamp))
        };
        let dependencies = Dependencies {
            database: find(DATABASE),
            event_bus: find(EVENT_BUS),
            circuit_breakers: find(CIRCUIT_BREAKERS),
            memory: find(MEMORY),
            domain_services: find(DOMAIN_SERVICES),
        };

        Self {
            status: HealthStatus::worst(checks.iter().map(|c| c.status)),
            version: env!("CARGO_PKG_VERSION").to_string(),
            uptime_secs,
            timestamp,
            checks,
            dependencies,
        }
    }
}
