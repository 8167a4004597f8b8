//! Event subsystem.
//!
//! # Data Flow
//! ```text
//! Breaker state changes, domain code
//!     → bus.rs (store + broadcast)
//!     → subscribers
//!
//! Health monitor
//!     → EventBusStatus::health()
//! ```

pub mod bus;

pub use bus::{DomainEvent, EventBusError, EventBusHealth, EventBusStatus, LocalEventBus};
