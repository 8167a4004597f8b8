//! Health probes.
//!
//! Each probe inspects one subsystem and reports a status. Probes must be
//! idempotent and free of side effects: the monitor may run overlapping
//! passes. Errors are returned, never panicked; the monitor turns them into
//! unhealthy checks.

use async_trait::async_trait;

use crate::health::types::HealthStatus;

pub mod breakers;
pub mod database;
pub mod domain;
pub mod event_bus;
pub mod memory;

pub use breakers::CircuitBreakerProbe;
pub use database::{Connectivity, DatabaseProbe, TcpConnectivity};
pub use domain::{DomainServiceFlags, DomainServicesProbe};
pub use event_bus::EventBusProbe;
pub use memory::{LimitSource, MemoryProbe, MemorySource, MemoryUsage, SystemMemorySource};

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Debug, thiserror::Error)]
pub enum ProbeError {
    #[error("{0}")]
    Failed(String),

    #[error("probe timed out after {0}ms")]
    Timeout(u64),

    #[error("{0} is not supported on this platform")]
    Unsupported(&'static str),
}

impl From<BoxError> for ProbeError {
    fn from(error: BoxError) -> Self {
        ProbeError::Failed(error.to_string())
    }
}

/// What a probe observed.
#[derive(Debug, Clone, PartialEq)]
pub struct ProbeReport {
    pub status: HealthStatus,
    pub details: Option<serde_json::Value>,
}

impl ProbeReport {
    pub fn new(status: HealthStatus) -> Self {
        Self { status, details: None }
    }

    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }
}

#[async_trait]
pub trait HealthProbe: Send + Sync {
    async fn check(&self) -> Result<ProbeReport, ProbeError>;
}
