//! Circuit breakers and health monitoring for a service's dependencies.

pub mod config;
pub mod events;
pub mod health;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod resilience;

pub use config::ServiceConfig;
pub use health::HealthMonitor;
pub use http::HttpServer;
pub use lifecycle::{Application, Shutdown};
pub use resilience::{CircuitBreaker, CircuitBreakerRegistry};
