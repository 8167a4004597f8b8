//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → ServiceConfig (validated, immutable)
//!     → handed to lifecycle::startup to build breakers and the monitor
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; breakers never observe changes
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, ConfigError};
pub use schema::BreakerSettings;
pub use schema::HealthConfig;
pub use schema::ServiceConfig;
