//! Event bus probe.

use std::sync::Arc;

use async_trait::async_trait;

use super::{HealthProbe, ProbeError, ProbeReport};
use crate::events::EventBusStatus;
use crate::health::types::HealthStatus;

pub struct EventBusProbe {
    bus: Arc<dyn EventBusStatus>,
}

impl EventBusProbe {
    pub fn new(bus: Arc<dyn EventBusStatus>) -> Self {
        Self { bus }
    }
}

#[async_trait]
impl HealthProbe for EventBusProbe {
    async fn check(&self) -> Result<ProbeReport, ProbeError> {
        let health = self.bus.health();
        let status = if health.shutting_down {
            HealthStatus::Degraded
        } else {
            HealthStatus::Healthy
        };
        let details = serde_json::to_value(health).map_err(|e| ProbeError::Failed(e.to_string()))?;
        Ok(ProbeReport::new(status).with_details(details))
    }
}
