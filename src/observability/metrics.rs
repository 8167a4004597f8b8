//! Metrics collection and exposition.
//!
//! # Responsibilities
//! - Define breaker and health metrics
//! - Expose Prometheus-compatible metrics endpoint
//!
//! # Metrics
//! - `breaker_calls_total` (counter): calls by service, outcome
//! - `breaker_state` (gauge): 0=closed, 1=open, 2=half-open
//! - `health_check_status` (gauge): 0=healthy, 1=degraded, 2=unhealthy
//! - `health_check_duration_seconds` (histogram): probe latency
//!
//! # Design Decisions
//! - Recording goes through the `metrics` facade; without an installed
//!   recorder every call is a no-op, so library users pay nothing
//! - Labels are dependency / check names, never per-request values

use std::net::SocketAddr;
use std::time::Duration;

use metrics_exporter_prometheus::PrometheusBuilder;

use crate::health::HealthStatus;
use crate::resilience::CircuitState;

/// Install the Prometheus recorder and its HTTP listener.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => {
            tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter")
        }
    }
}

/// Outcome label of a breaker-protected call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallOutcome {
    Success,
    Failure,
    Timeout,
    Rejected,
}

impl CallOutcome {
    fn as_str(self) -> &'static str {
        match self {
            CallOutcome::Success => "success",
            CallOutcome::Failure => "failure",
            CallOutcome::Timeout => "timeout",
            CallOutcome::Rejected => "rejected",
        }
    }
}

pub fn record_breaker_call(service: &str, outcome: CallOutcome) {
    metrics::counter!(
        "breaker_calls_total",
        "service" => service.to_string(),
        "outcome" => outcome.as_str()
    )
    .increment(1);
}

pub fn record_breaker_state(service: &str, state: CircuitState) {
    metrics::gauge!("breaker_state", "service" => service.to_string()).set(f64::from(state as u8));
}

pub fn record_health_check(check: &str, status: HealthStatus, duration: Duration) {
    let value = match status {
        HealthStatus::Healthy => 0.0,
        HealthStatus::Degraded => 1.0,
        HealthStatus::Unhealthy => 2.0,
    };
    metrics::gauge!("health_check_status", "check" => check.to_string()).set(value);
    metrics::histogram!("health_check_duration_seconds", "check" => check.to_string())
        .record(duration.as_secs_f64());
}
