//! Health monitoring subsystem.
//!
//! # Data Flow
//! ```text
//! Periodic timer (monitor.rs), or an on-demand HTTP request
//!     → Run every probe concurrently (probes/), each under a timeout
//!     → Error or timeout becomes an Unhealthy check
//!     → Store latest check per name
//!     → Fold into SystemHealth (types.rs): worst status wins
//! ```
//!
//! # Design Decisions
//! - Probes only observe; they never repair what they find
//! - Degraded keeps the service ready; only Unhealthy fails readiness
//! - Liveness never depends on probes
//! - Last pass to finish wins when passes overlap

pub mod monitor;
pub mod probes;
pub mod types;

pub use monitor::{HealthMonitor, WellKnownProbes};
pub use types::{HealthCheck, HealthStatus, SystemHealth};
