//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Call to a dependency:
//!     → circuit_breaker.rs (admit or reject, fallback on rejection)
//!     → timeouts.rs (race the call against its deadline)
//!     → state.rs (count the outcome, decide transitions)
//!     → scheduler.rs (reset timer while open)
//!
//! Health monitor:
//!     → registry.rs (summary of every breaker)
//! ```
//!
//! # Design Decisions
//! - One breaker per dependency; no cross-breaker locking
//! - The state machine is pure; time only enters through the scheduler
//! - Timeouts are distinct from protected-call errors

pub mod circuit_breaker;
pub mod registry;
pub mod scheduler;
pub mod state;
pub mod timeouts;

pub use circuit_breaker::{BreakerError, BreakerHandle, BreakerStats, CircuitBreaker, ErrorFilter};
pub use registry::{CircuitBreakerRegistry, RegistrySummary};
pub use scheduler::{ManualScheduler, Scheduler, TokioScheduler};
pub use state::CircuitState;
