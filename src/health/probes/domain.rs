//! Domain integration flags.
//!
//! A fixed set of named integrations (bookings, events, locations, ...) each
//! flagged operative or not by the code that owns it.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;

use super::{HealthProbe, ProbeError, ProbeReport};
use crate::health::types::HealthStatus;

#[derive(Debug, Clone, Default)]
pub struct DomainServiceFlags {
    flags: Arc<DashMap<String, bool>>,
}

impl DomainServiceFlags {
    /// Track `names`, all initially operative.
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let flags = DashMap::new();
        for name in names {
            flags.insert(name.into(), true);
        }
        Self { flags: Arc::new(flags) }
    }

    /// Update a tracked flag. Unknown names are ignored so the set stays fixed.
    pub fn set_operative(&self, name: &str, operative: bool) -> bool {
        match self.flags.get_mut(name) {
            Some(mut flag) => {
                if *flag != operative {
                    tracing::info!(service = %name, operative, "Domain service flag changed");
                }
                *flag = operative;
                true
            }
            None => {
                tracing::warn!(service = %name, "Unknown domain service flag");
                false
            }
        }
    }

    pub fn snapshot(&self) -> BTreeMap<String, bool> {
        self.flags
            .iter()
            .map(|entry| (entry.key().clone(), *entry.value()))
            .collect()
    }
}

pub struct DomainServicesProbe {
    flags: DomainServiceFlags,
}

impl DomainServicesProbe {
    pub fn new(flags: DomainServiceFlags) -> Self {
        Self { flags }
    }
}

#[async_trait]
impl HealthProbe for DomainServicesProbe {
    async fn check(&self) -> Result<ProbeReport, ProbeError> {
        let snapshot = self.flags.snapshot();
        let status = if snapshot.values().all(|operative| *operative) {
            HealthStatus::Healthy
        } else {
            HealthStatus::Degraded
        };
        let details =
            serde_json::to_value(&snapshot).map_err(|e| ProbeError::Failed(e.to_string()))?;
        Ok(ProbeReport::new(status).with_details(details))
    }
}
