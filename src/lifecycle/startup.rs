//! Startup orchestration.
//!
//! # Responsibilities
//! - Build every subsystem from configuration in dependency order
//! - Start background tasks (health monitor, signal listener)
//! - Serve HTTP until shutdown, then tear everything down
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal
//! - Listener is bound by the caller and served last

use std::io;
use std::sync::Arc;

use serde_json::json;
use tokio::net::TcpListener;

use crate::config::ServiceConfig;
use crate::events::LocalEventBus;
use crate::health::probes::{
    CircuitBreakerProbe, DatabaseProbe, DomainServiceFlags, DomainServicesProbe, EventBusProbe,
    MemoryProbe, MemorySource, SystemMemorySource, TcpConnectivity,
};
use crate::health::{HealthMonitor, WellKnownProbes};
use crate::http::{AppState, HttpServer};
use crate::lifecycle::{signals, Shutdown};
use crate::resilience::{CircuitBreaker, CircuitBreakerRegistry};

/// Name the database breaker is registered under.
pub const DATABASE_BREAKER: &str = "database";

/// Bounded size of the in-process event store.
const EVENT_STORE_CAPACITY: usize = 1024;

/// All long-lived components of a running service.
pub struct Application {
    config: ServiceConfig,
    registry: Arc<CircuitBreakerRegistry>,
    database: CircuitBreaker<(), (), io::Error>,
    bus: Arc<LocalEventBus>,
    domain_flags: DomainServiceFlags,
    monitor: Arc<HealthMonitor>,
    shutdown: Shutdown,
}

impl Application {
    pub fn build(config: ServiceConfig) -> Self {
        let memory = Arc::new(SystemMemorySource::new(config.health.memory_limit_bytes()));
        Self::build_with_memory(config, memory)
    }

    /// Build with a specific memory source instead of sampling this process.
    pub fn build_with_memory(config: ServiceConfig, memory: Arc<dyn MemorySource>) -> Self {
        let registry = Arc::new(CircuitBreakerRegistry::new());
        let bus = Arc::new(LocalEventBus::new(EVENT_STORE_CAPACITY));

        let tcp = TcpConnectivity::new(
            config.database.address.clone(),
            std::time::Duration::from_millis(config.database.connect_timeout_ms),
        );
        let connectivity = Arc::new(tcp.clone());
        let events = Arc::clone(&bus);
        let database: CircuitBreaker<(), (), io::Error> =
            CircuitBreaker::builder(DATABASE_BREAKER, config.breaker_settings(DATABASE_BREAKER))
                .on_state_change(move |from, to| {
                    let payload = json!({ "service": DATABASE_BREAKER, "from": from, "to": to });
                    if let Err(e) = events.publish("circuit_breaker.state_changed", payload) {
                        tracing::debug!(error = %e, "State change event dropped");
                    }
                })
                .build(move |()| {
                    let tcp = tcp.clone();
                    async move { tcp.connect().await }
                });
        registry.register(database.handle());

        let domain_flags = DomainServiceFlags::new(config.health.domain_services.iter().cloned());

        let probes = WellKnownProbes {
            database: Arc::new(DatabaseProbe::new(connectivity)),
            event_bus: Arc::new(EventBusProbe::new(bus.clone())),
            circuit_breakers: Arc::new(CircuitBreakerProbe::new(registry.clone())),
            memory: Arc::new(MemoryProbe::new(
                memory,
                config.health.memory_degraded_percent,
                config.health.memory_unhealthy_percent,
            )),
            domain_services: Arc::new(DomainServicesProbe::new(domain_flags.clone())),
        };
        let monitor = Arc::new(HealthMonitor::new(config.health.clone(), probes));

        tracing::info!(
            breakers = registry.len(),
            domain_services = config.health.domain_services.len(),
            "Application built"
        );

        Self {
            config,
            registry,
            database,
            bus,
            domain_flags,
            monitor,
            shutdown: Shutdown::new(),
        }
    }

    pub fn app_state(&self) -> AppState {
        AppState {
            monitor: self.monitor.clone(),
            registry: self.registry.clone(),
        }
    }

    pub fn registry(&self) -> &Arc<CircuitBreakerRegistry> {
        &self.registry
    }

    pub fn database(&self) -> &CircuitBreaker<(), (), io::Error> {
        &self.database
    }

    pub fn event_bus(&self) -> &Arc<LocalEventBus> {
        &self.bus
    }

    pub fn domain_flags(&self) -> &DomainServiceFlags {
        &self.domain_flags
    }

    pub fn monitor(&self) -> &Arc<HealthMonitor> {
        &self.monitor
    }

    /// Handle for triggering shutdown from outside the signal listener.
    pub fn shutdown_handle(&self) -> Shutdown {
        self.shutdown.clone()
    }

    /// Start monitoring, serve until SIGINT/SIGTERM or a triggered
    /// shutdown, then tear down.
    pub async fn run(self, listener: TcpListener) -> io::Result<()> {
        self.monitor.start(self.shutdown.subscribe());

        let signal_shutdown = self.shutdown.clone();
        tokio::spawn(async move {
            signals::shutdown_signal().await;
            signal_shutdown.trigger();
        });

        let server = HttpServer::new(&self.config.listener, self.app_state());
        let result = server.run(listener, self.shutdown.subscribe()).await;

        self.teardown();
        result
    }

    /// Stop the monitor, flag the bus and dispose every breaker.
    pub fn teardown(&self) {
        self.shutdown.trigger();
        self.monitor.stop_monitoring();
        self.bus.shutdown();
        self.registry.dispose_all();
        tracing::info!("Shutdown complete");
    }
}
