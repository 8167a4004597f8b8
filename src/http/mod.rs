//! HTTP health surface.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, tracing and timeout layers)
//!     → handlers.rs
//!         /health           → HealthMonitor::get_system_health (fresh pass)
//!         /health/ready     → HealthMonitor::current_health (cached within interval)
//!         /health/live      → HealthMonitor::is_alive
//!         /health/breakers  → CircuitBreakerRegistry summary + stats
//!     → JSON response
//! ```
//!
//! # Design Decisions
//! - Unhealthy maps to 503 so load balancers can act on the status code alone
//! - Liveness never touches probes

pub mod handlers;
pub mod server;

pub use server::{AppState, HttpServer};
