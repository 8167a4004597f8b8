//! Process memory probe.
//!
//! # Thresholds
//! ```text
//! rss / limit > unhealthy_percent (90)  → Unhealthy
//! rss / limit > degraded_percent  (80)  → Degraded
//! otherwise                             → Healthy
//! ```
//!
//! `rss` is this process's resident memory. `limit` is, in order of
//! preference, the configured `memory_limit_mb`, the cgroup memory limit,
//! or total system memory. Other processes on the host never move the
//! percentage.

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::Serialize;
use serde_json::json;
use sysinfo::{Pid, ProcessesToUpdate, System};

use super::{HealthProbe, ProbeError, ProbeReport};
use crate::health::types::HealthStatus;

/// Where the memory limit came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LimitSource {
    Configured,
    Cgroup,
    System,
}

/// Memory figures for this process, in bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MemoryUsage {
    pub rss: u64,
    pub virtual_memory: u64,
    pub limit: u64,
    pub limit_source: LimitSource,
}

impl MemoryUsage {
    pub fn used_percent(&self) -> f64 {
        if self.limit == 0 {
            return 0.0;
        }
        self.rss as f64 / self.limit as f64 * 100.0
    }
}

/// Pick the limit the process is measured against. A cgroup limit at or
/// above system memory is treated as unlimited.
pub fn resolve_limit(
    configured: Option<u64>,
    cgroup: Option<u64>,
    system_total: u64,
) -> Option<(u64, LimitSource)> {
    if let Some(limit) = configured.filter(|l| *l > 0) {
        return Some((limit, LimitSource::Configured));
    }
    match cgroup {
        Some(limit) if limit > 0 && (system_total == 0 || limit < system_total) => {
            Some((limit, LimitSource::Cgroup))
        }
        _ if system_total > 0 => Some((system_total, LimitSource::System)),
        _ => None,
    }
}

pub trait MemorySource: Send + Sync {
    fn sample(&self) -> Result<MemoryUsage, ProbeError>;
}

/// Samples the current process through `sysinfo`. Keeps one `System` so
/// refreshes stay incremental.
pub struct SystemMemorySource {
    system: Mutex<System>,
    pid: Option<Pid>,
    configured_limit: Option<u64>,
}

impl SystemMemorySource {
    /// `configured_limit` in bytes overrides cgroup and system limits.
    pub fn new(configured_limit: Option<u64>) -> Self {
        Self {
            system: Mutex::new(System::new()),
            pid: sysinfo::get_current_pid().ok(),
            configured_limit,
        }
    }
}

impl MemorySource for SystemMemorySource {
    fn sample(&self) -> Result<MemoryUsage, ProbeError> {
        if !sysinfo::IS_SUPPORTED_SYSTEM {
            return Err(ProbeError::Unsupported("memory sampling"));
        }
        let pid = self.pid.ok_or(ProbeError::Unsupported("process memory sampling"))?;

        let mut system = self.system.lock();
        system.refresh_memory();
        system.refresh_processes(ProcessesToUpdate::Some(&[pid]), true);

        let process = system
            .process(pid)
            .ok_or_else(|| ProbeError::Failed(format!("process {} not found", pid)))?;
        let cgroup = system.cgroup_limits().map(|limits| limits.total_memory);
        let (limit, limit_source) =
            resolve_limit(self.configured_limit, cgroup, system.total_memory())
                .ok_or_else(|| ProbeError::Failed("memory limit unknown".to_string()))?;

        Ok(MemoryUsage {
            rss: process.memory(),
            virtual_memory: process.virtual_memory(),
            limit,
            limit_source,
        })
    }
}

pub struct MemoryProbe {
    source: Arc<dyn MemorySource>,
    degraded_percent: f64,
    unhealthy_percent: f64,
}

impl MemoryProbe {
    pub fn new(
        source: Arc<dyn MemorySource>,
        degraded_percent: f64,
        unhealthy_percent: f64,
    ) -> Self {
        Self {
            source,
            degraded_percent,
            unhealthy_percent,
        }
    }

    pub fn classify(&self, usage: &MemoryUsage) -> HealthStatus {
        let percent = usage.used_percent();
        if percent > self.unhealthy_percent {
            HealthStatus::Unhealthy
        } else if percent > self.degraded_percent {
            HealthStatus::Degraded
        } else {
            HealthStatus::Healthy
        }
    }
}

#[async_trait]
impl HealthProbe for MemoryProbe {
    async fn check(&self) -> Result<ProbeReport, ProbeError> {
        let usage = self.source.sample()?;
        let percent = (usage.used_percent() * 100.0).round() / 100.0;
        Ok(ProbeReport::new(self.classify(&usage)).with_details(json!({
            "rss": usage.rss,
            "virtual_memory": usage.virtual_memory,
            "limit": usage.limit,
            "limit_source": usage.limit_source,
            "used_percent": percent,
        })))
    }
}
