//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::net::TcpListener;

use service_health::config::BreakerSettings;
use service_health::health::probes::{
    HealthProbe, LimitSource, MemorySource, MemoryUsage, ProbeError, ProbeReport,
};
use service_health::health::HealthStatus;
use service_health::resilience::CircuitState;

pub fn settings(failure_threshold: u32, reset_timeout_ms: u64, half_open: u32) -> BreakerSettings {
    BreakerSettings {
        failure_threshold,
        reset_timeout_ms,
        half_open_success_threshold: half_open,
        timeout_ms: None,
        monitor_interval_ms: None,
    }
}

/// Start a mock database that accepts and immediately drops connections.
pub async fn start_mock_database() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap().to_string();

    tokio::spawn(async move {
        while let Ok((socket, _)) = listener.accept().await {
            drop(socket);
        }
    });

    addr
}

/// An address nothing is listening on.
pub async fn closed_address() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap().to_string()
}

/// Memory source reporting a resident size of `rss` against `limit` bytes.
pub struct FixedMemory(pub MemoryUsage);

impl FixedMemory {
    pub fn new(rss: u64, limit: u64) -> Arc<Self> {
        Arc::new(Self(MemoryUsage {
            rss,
            virtual_memory: rss,
            limit,
            limit_source: LimitSource::Configured,
        }))
    }
}

impl MemorySource for FixedMemory {
    fn sample(&self) -> Result<MemoryUsage, ProbeError> {
        Ok(self.0)
    }
}

/// Probe that reports whatever status it was last set to.
pub struct SwitchProbe(Mutex<HealthStatus>);

impl SwitchProbe {
    pub fn new(status: HealthStatus) -> Arc<Self> {
        Arc::new(Self(Mutex::new(status)))
    }

    pub fn set(&self, status: HealthStatus) {
        *self.0.lock() = status;
    }
}

#[async_trait]
impl HealthProbe for SwitchProbe {
    async fn check(&self) -> Result<ProbeReport, ProbeError> {
        Ok(ProbeReport::new(*self.0.lock()))
    }
}

/// Counts invocations; the first `failures` calls fail.
#[derive(Clone, Default)]
pub struct Flaky {
    pub calls: Arc<AtomicU32>,
    failures: u32,
}

impl Flaky {
    pub fn failing_first(failures: u32) -> Self {
        Self {
            calls: Arc::new(AtomicU32::new(0)),
            failures,
        }
    }

    pub async fn call(&self) -> Result<u32, String> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst);
        if n < self.failures {
            Err(format!("attempt {} failed", n + 1))
        } else {
            Ok(n + 1)
        }
    }

    pub fn count(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

/// Records every (from, to) transition a breaker reports.
#[derive(Clone, Default)]
pub struct TransitionLog(Arc<Mutex<Vec<(CircuitState, CircuitState)>>>);

impl TransitionLog {
    pub fn listener(&self) -> impl Fn(CircuitState, CircuitState) + Send + Sync + 'static {
        let log = self.0.clone();
        move |from, to| log.lock().push((from, to))
    }

    pub fn entries(&self) -> Vec<(CircuitState, CircuitState)> {
        self.0.lock().clone()
    }
}
