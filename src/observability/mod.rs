//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Breakers and the health monitor produce:
//!     → logging.rs (structured log events)
//!     → metrics.rs (counters, gauges, histograms)
//!
//! Consumers:
//!     → Log aggregation (stdout)
//!     → Metrics endpoint (Prometheus scrape)
//! ```
//!
//! # Design Decisions
//! - Structured logging (JSON) for machine parsing
//! - Every breaker log line carries the dependency name
//! - Metrics are cheap (atomic increments)

pub mod logging;
pub mod metrics;
