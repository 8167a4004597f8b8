//! Health monitor.
//!
//! # Responsibilities
//! - Periodically run every probe
//! - Convert probe errors and timeouts into unhealthy checks
//! - Fold the latest checks into a `SystemHealth` snapshot
//! - Answer readiness and liveness queries
//!
//! # Freshness
//! `get_system_health` always runs a pass. Readiness reuses the last
//! snapshot while it is younger than `interval` and runs a pass otherwise.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use arc_swap::ArcSwap;
use chrono::Utc;
use dashmap::DashMap;
use futures_util::future::join_all;
use parking_lot::Mutex;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time;

use crate::config::HealthConfig;
use crate::health::probes::{HealthProbe, ProbeError};
use crate::health::types::{self, HealthCheck, HealthStatus, SystemHealth};
use crate::observability::metrics;

/// The five probes every monitor runs.
pub struct WellKnownProbes {
    pub database: Arc<dyn HealthProbe>,
    pub event_bus: Arc<dyn HealthProbe>,
    pub circuit_breakers: Arc<dyn HealthProbe>,
    pub memory: Arc<dyn HealthProbe>,
    pub domain_services: Arc<dyn HealthProbe>,
}

pub struct HealthMonitor {
    config: HealthConfig,
    probes: Vec<(String, Arc<dyn HealthProbe>)>,
    checks: DashMap<String, HealthCheck>,
    latest: ArcSwap<SystemHealth>,
    last_pass: Mutex<Option<time::Instant>>,
    started: Instant,
    stopped: AtomicBool,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl HealthMonitor {
    pub fn new(config: HealthConfig, probes: WellKnownProbes) -> Self {
        let probes: Vec<(String, Arc<dyn HealthProbe>)> = vec![
            (types::DATABASE.to_string(), probes.database),
            (types::EVENT_BUS.to_string(), probes.event_bus),
            (types::CIRCUIT_BREAKERS.to_string(), probes.circuit_breakers),
            (types::MEMORY.to_string(), probes.memory),
            (types::DOMAIN_SERVICES.to_string(), probes.domain_services),
        ];

        Self {
            config,
            probes,
            checks: DashMap::new(),
            latest: ArcSwap::from_pointee(SystemHealth::from_checks(Vec::new(), 0, Utc::now())),
            last_pass: Mutex::new(None),
            started: Instant::now(),
            stopped: AtomicBool::new(false),
            task: Mutex::new(None),
        }
    }

    /// Add a named probe beyond the well-known five. A probe reusing an
    /// existing name replaces it.
    pub fn with_probe(mut self, name: impl Into<String>, probe: Arc<dyn HealthProbe>) -> Self {
        let name = name.into();
        match self.probes.iter_mut().find(|(existing, _)| *existing == name) {
            Some(slot) => slot.1 = probe,
            None => self.probes.push((name, probe)),
        }
        self
    }

    /// Spawn the monitoring loop: one pass after `initial_delay`, then one
    /// every `interval`, until shutdown or [`HealthMonitor::stop_monitoring`].
    pub fn start(self: &Arc<Self>, mut shutdown: broadcast::Receiver<()>) {
        if !self.config.enabled {
            tracing::info!("Health monitoring disabled");
            return;
        }

        let mut task = self.task.lock();
        if task.is_some() {
            tracing::warn!("Health monitor already running");
            return;
        }
        self.stopped.store(false, Ordering::SeqCst);

        tracing::info!(
            interval_secs = self.config.interval_secs,
            probes = self.probes.len(),
            "Health monitor starting"
        );

        let monitor = Arc::clone(self);
        *task = Some(tokio::spawn(async move {
            let first = time::Instant::now() + monitor.config.initial_delay();
            let mut ticker = time::interval_at(first, monitor.config.interval());
            ticker.set_missed_tick_behavior(time::MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        if monitor.stopped.load(Ordering::SeqCst) {
                            break;
                        }
                        monitor.refresh().await;
                    }
                    _ = shutdown.recv() => {
                        tracing::info!("Health monitor received shutdown signal, exiting loop");
                        break;
                    }
                }
            }
        }));
    }

    /// Cancel the monitoring loop. Safe to call repeatedly or mid-pass.
    pub fn stop_monitoring(&self) {
        self.stopped.store(true, Ordering::SeqCst);
        if let Some(task) = self.task.lock().take() {
            task.abort();
            tracing::info!("Health monitor stopped");
        }
    }

    /// Run a fresh pass over every probe and return the folded snapshot.
    pub async fn get_system_health(&self) -> SystemHealth {
        self.refresh().await;
        SystemHealth::clone(&self.latest.load())
    }

    /// Snapshot of the most recently completed pass, without probing.
    pub fn latest(&self) -> Arc<SystemHealth> {
        self.latest.load_full()
    }

    /// The latest snapshot if a pass finished within `interval`, otherwise
    /// a fresh one.
    pub async fn current_health(&self) -> Arc<SystemHealth> {
        let fresh = self
            .last_pass
            .lock()
            .is_some_and(|at| at.elapsed() < self.config.interval());
        if !fresh {
            self.refresh().await;
        }
        self.latest()
    }

    /// Ready unless something is unhealthy; degraded still takes traffic.
    pub async fn is_ready(&self) -> bool {
        self.current_health().await.status != HealthStatus::Unhealthy
    }

    pub fn is_alive(&self) -> bool {
        true
    }

    pub fn uptime(&self) -> Duration {
        self.started.elapsed()
    }

    async fn refresh(&self) {
        let results = join_all(
            self.probes
                .iter()
                .map(|(name, probe)| self.run_probe(name, probe.as_ref())),
        )
        .await;

        for check in results {
            self.checks.insert(check.name.clone(), check);
        }

        let snapshot = self.fold();
        if snapshot.status != HealthStatus::Healthy {
            let failing: HashMap<&str, HealthStatus> = snapshot
                .checks
                .iter()
                .filter(|c| c.status != HealthStatus::Healthy)
                .map(|c| (c.name.as_str(), c.status))
                .collect();
            tracing::warn!(status = %snapshot.status, failing = ?failing, "System health degraded");
        } else {
            tracing::debug!("System health check passed");
        }
        self.latest.store(Arc::new(snapshot));
        *self.last_pass.lock() = Some(time::Instant::now());
    }

    fn fold(&self) -> SystemHealth {
        let checks = self.checks.iter().map(|entry| entry.value().clone()).collect();
        SystemHealth::from_checks(checks, self.uptime().as_secs(), Utc::now())
    }

    async fn run_probe(&self, name: &str, probe: &dyn HealthProbe) -> HealthCheck {
        let started = Instant::now();
        let deadline = self.config.probe_timeout();
        let outcome = match time::timeout(deadline, probe.check()).await {
            Ok(result) => result,
            Err(_) => Err(ProbeError::Timeout(deadline.as_millis() as u64)),
        };
        let elapsed = started.elapsed();

        let check = match outcome {
            Ok(report) => HealthCheck {
                name: name.to_string(),
                status: report.status,
                last_check: Utc::now(),
                response_time_ms: Some(elapsed.as_millis() as u64),
                details: report.details,
                error: None,
            },
            Err(e) => {
                tracing::warn!(check = %name, error = %e, "Health probe failed");
                HealthCheck {
                    name: name.to_string(),
                    status: HealthStatus::Unhealthy,
                    last_check: Utc::now(),
                    response_time_ms: Some(elapsed.as_millis() as u64),
                    details: None,
                    error: Some(e.to_string()),
                }
            }
        };

        metrics::record_health_check(name, check.status, elapsed);
        check
    }
}

impl Drop for HealthMonitor {
    fn drop(&mut self) {
        if let Some(task) = self.task.get_mut().take() {
            task.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::health::probes::ProbeReport;
    use async_trait::async_trait;
    use std::sync::atomic::AtomicUsize;

    struct Fixed(HealthStatus);

    #[async_trait]
    impl HealthProbe for Fixed {
        async fn check(&self) -> Result<ProbeReport, ProbeError> {
            Ok(ProbeReport::new(self.0))
        }
    }

    struct Failing;

    #[async_trait]
    impl HealthProbe for Failing {
        async fn check(&self) -> Result<ProbeReport, ProbeError> {
            Err(ProbeError::Failed("connection refused".into()))
        }
    }

    struct Hanging;

    #[async_trait]
    impl HealthProbe for Hanging {
        async fn check(&self) -> Result<ProbeReport, ProbeError> {
            time::sleep(Duration::from_secs(3600)).await;
            Ok(ProbeReport::new(HealthStatus::Healthy))
        }
    }

    #[derive(Default)]
    struct Counting(AtomicUsize);

    #[async_trait]
    impl HealthProbe for Counting {
        async fn check(&self) -> Result<ProbeReport, ProbeError> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok(ProbeReport::new(HealthStatus::Healthy))
        }
    }

    fn healthy() -> Arc<dyn HealthProbe> {
        Arc::new(Fixed(HealthStatus::Healthy))
    }

    fn probes_with_memory(memory: Arc<dyn HealthProbe>) -> WellKnownProbes {
        WellKnownProbes {
            database: healthy(),
            event_bus: healthy(),
            circuit_breakers: healthy(),
            memory,
            domain_services: healthy(),
        }
    }

    #[tokio::test]
    async fn test_fresh_pass_on_every_call() {
        let counting = Arc::new(Counting::default());
        let monitor =
            HealthMonitor::new(HealthConfig::default(), probes_with_memory(counting.clone()));

        let health = monitor.get_system_health().await;
        assert_eq!(health.status, HealthStatus::Healthy);
        monitor.get_system_health().await;
        assert_eq!(counting.0.load(Ordering::SeqCst), 2);
        assert!(monitor.is_ready().await);
        assert!(monitor.is_alive());
    }

    #[tokio::test(start_paused = true)]
    async fn test_readiness_reuses_recent_snapshot() {
        let counting = Arc::new(Counting::default());
        let config = HealthConfig {
            interval_secs: 30,
            ..HealthConfig::default()
        };
        let monitor = HealthMonitor::new(config, probes_with_memory(counting.clone()));

        assert!(monitor.is_ready().await);
        assert!(monitor.is_ready().await);
        assert_eq!(counting.0.load(Ordering::SeqCst), 1);

        time::advance(Duration::from_secs(29)).await;
        assert!(monitor.is_ready().await);
        assert_eq!(counting.0.load(Ordering::SeqCst), 1);

        time::advance(Duration::from_secs(2)).await;
        assert!(monitor.is_ready().await);
        assert_eq!(counting.0.load(Ordering::SeqCst), 2);

        monitor.get_system_health().await;
        assert_eq!(counting.0.load(Ordering::SeqCst), 3);
        assert_eq!(monitor.current_health().await.status, HealthStatus::Healthy);
        assert_eq!(counting.0.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_probe_error_becomes_unhealthy_check() {
        let monitor =
            HealthMonitor::new(HealthConfig::default(), probes_with_memory(Arc::new(Failing)));

        let health = monitor.get_system_health().await;
        assert_eq!(health.status, HealthStatus::Unhealthy);
        assert_eq!(health.dependencies.memory.status, HealthStatus::Unhealthy);
        assert_eq!(health.dependencies.memory.error.as_deref(), Some("connection refused"));
        assert!(!monitor.is_ready().await);
        assert!(monitor.is_alive());
    }

    #[tokio::test]
    async fn test_degraded_is_still_ready() {
        let monitor = HealthMonitor::new(
            HealthConfig::default(),
            probes_with_memory(Arc::new(Fixed(HealthStatus::Degraded))),
        );
        assert_eq!(monitor.get_system_health().await.status, HealthStatus::Degraded);
        assert!(monitor.is_ready().await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_hanging_probe_times_out() {
        let config = HealthConfig {
            probe_timeout_ms: 100,
            ..HealthConfig::default()
        };
        let monitor = HealthMonitor::new(config, probes_with_memory(Arc::new(Hanging)));

        let health = monitor.get_system_health().await;
        assert_eq!(health.dependencies.memory.status, HealthStatus::Unhealthy);
        assert_eq!(
            health.dependencies.memory.error.as_deref(),
            Some("probe timed out after 100ms")
        );
        assert_eq!(health.dependencies.database.status, HealthStatus::Healthy);
    }

    #[tokio::test]
    async fn test_latest_before_first_pass() {
        let monitor = HealthMonitor::new(HealthConfig::default(), probes_with_memory(healthy()));
        let latest = monitor.latest();
        assert_eq!(latest.status, HealthStatus::Unhealthy);
        assert!(latest.checks.iter().all(|c| c.error.as_deref() == Some("check has not run yet")));
    }

    #[tokio::test]
    async fn test_extra_probe_included() {
        let monitor = HealthMonitor::new(HealthConfig::default(), probes_with_memory(healthy()))
            .with_probe("search", Arc::new(Fixed(HealthStatus::Degraded)));

        let health = monitor.get_system_health().await;
        assert_eq!(health.checks.len(), 6);
        assert_eq!(health.status, HealthStatus::Degraded);
    }

    #[tokio::test(start_paused = true)]
    async fn test_periodic_loop_and_stop() {
        let counting = Arc::new(Counting::default());
        let config = HealthConfig {
            interval_secs: 30,
            initial_delay_ms: 1000,
            ..HealthConfig::default()
        };
        let monitor = Arc::new(HealthMonitor::new(config, probes_with_memory(counting.clone())));
        let (_tx, rx) = broadcast::channel(1);
        monitor.start(rx);

        time::sleep(Duration::from_millis(1500)).await;
        assert_eq!(counting.0.load(Ordering::SeqCst), 1);
        assert_eq!(monitor.latest().status, HealthStatus::Healthy);

        time::sleep(Duration::from_secs(30)).await;
        assert_eq!(counting.0.load(Ordering::SeqCst), 2);

        monitor.stop_monitoring();
        monitor.stop_monitoring();
        time::sleep(Duration::from_secs(120)).await;
        assert_eq!(counting.0.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_signal_ends_loop() {
        let counting = Arc::new(Counting::default());
        let monitor = Arc::new(HealthMonitor::new(
            HealthConfig::default(),
            probes_with_memory(counting.clone()),
        ));
        let (tx, rx) = broadcast::channel(1);
        monitor.start(rx);

        tx.send(()).unwrap();
        time::sleep(Duration::from_secs(120)).await;
        assert_eq!(counting.0.load(Ordering::SeqCst), 0);
    }
}
