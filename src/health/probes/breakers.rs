//! Circuit breaker registry probe.
//!
//! An open breaker is a symptom of a failing dependency, not an outage of
//! this service, so this probe reports at worst `Degraded`.

use std::sync::Arc;

use async_trait::async_trait;

use super::{HealthProbe, ProbeError, ProbeReport};
use crate::health::types::HealthStatus;
use crate::resilience::CircuitBreakerRegistry;

pub struct CircuitBreakerProbe {
    registry: Arc<CircuitBreakerRegistry>,
}

impl CircuitBreakerProbe {
    pub fn new(registry: Arc<CircuitBreakerRegistry>) -> Self {
        Self { registry }
    }
}

#[async_trait]
impl HealthProbe for CircuitBreakerProbe {
    async fn check(&self) -> Result<ProbeReport, ProbeError> {
        let summary = self.registry.summary();
        let status = if summary.open > 0 {
            HealthStatus::Degraded
        } else {
            HealthStatus::Healthy
        };
        let details =
            serde_json::to_value(&summary).map_err(|e| ProbeError::Failed(e.to_string()))?;
        Ok(ProbeReport::new(status).with_details(details))
    }
}
