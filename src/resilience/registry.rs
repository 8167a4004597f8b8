//! Registry of every circuit breaker in the process.
//!
//! # Responsibilities
//! - Keep a handle to each breaker by dependency name
//! - Summarize them for the health monitor
//! - Dispose all of them on shutdown

use dashmap::DashMap;
use serde::Serialize;

use crate::resilience::circuit_breaker::{BreakerHandle, BreakerStats};
use crate::resilience::state::CircuitState;

/// Aggregate view over all registered breakers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RegistrySummary {
    pub total: usize,
    pub open: usize,
    pub half_open: usize,
    /// Names of the services whose breaker is open, sorted.
    pub open_services: Vec<String>,
}

#[derive(Debug, Default)]
pub struct CircuitBreakerRegistry {
    breakers: DashMap<String, BreakerHandle>,
}

impl CircuitBreakerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a breaker under its own name. A previous breaker with the
    /// same name is disposed and replaced.
    pub fn register(&self, breaker: BreakerHandle) {
        let name = breaker.name().to_string();
        if let Some(previous) = self.breakers.insert(name.clone(), breaker) {
            tracing::warn!(service = %name, "Replacing registered circuit breaker");
            previous.dispose();
        }
    }

    pub fn get(&self, name: &str) -> Option<BreakerHandle> {
        self.breakers.get(name).map(|entry| entry.value().clone())
    }

    pub fn len(&self) -> usize {
        self.breakers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.breakers.is_empty()
    }

    pub fn summary(&self) -> RegistrySummary {
        let mut summary = RegistrySummary {
            total: 0,
            open: 0,
            half_open: 0,
            open_services: Vec::new(),
        };
        for entry in self.breakers.iter() {
            summary.total += 1;
            match entry.value().state() {
                CircuitState::Open => {
                    summary.open += 1;
                    summary.open_services.push(entry.key().clone());
                }
                CircuitState::HalfOpen => summary.half_open += 1,
                CircuitState::Closed => {}
            }
        }
        summary.open_services.sort();
        summary
    }

    /// Stats of every breaker, sorted by name.
    pub fn all_stats(&self) -> Vec<BreakerStats> {
        let mut stats: Vec<_> = self.breakers.iter().map(|entry| entry.value().stats()).collect();
        stats.sort_by(|a, b| a.name.cmp(&b.name));
        stats
    }

    pub fn dispose_all(&self) {
        for entry in self.breakers.iter() {
            entry.value().dispose();
        }
        tracing::info!(count = self.breakers.len(), "Circuit breakers disposed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BreakerSettings;
    use crate::resilience::scheduler::ManualScheduler;
    use crate::resilience::CircuitBreaker;
    use std::sync::Arc;

    fn breaker(name: &str, scheduler: &ManualScheduler) -> CircuitBreaker<(), (), String> {
        CircuitBreaker::builder(name, BreakerSettings::default())
            .scheduler(Arc::new(scheduler.clone()))
            .build(|_| async { Ok::<(), String>(()) })
    }

    #[test]
    fn test_summary_counts_open_breakers() {
        let scheduler = ManualScheduler::new();
        let registry = CircuitBreakerRegistry::new();
        let db = breaker("database", &scheduler);
        let bus = breaker("event-bus", &scheduler);
        let api = breaker("maps-api", &scheduler);
        registry.register(db.handle());
        registry.register(bus.handle());
        registry.register(api.handle());

        api.force_state(CircuitState::Open);
        db.force_state(CircuitState::Open);
        bus.force_state(CircuitState::HalfOpen);

        assert_eq!(
            registry.summary(),
            RegistrySummary {
                total: 3,
                open: 2,
                half_open: 1,
                open_services: vec!["database".into(), "maps-api".into()],
            }
        );
        let names: Vec<_> = registry.all_stats().into_iter().map(|s| s.name).collect();
        assert_eq!(names, vec!["database", "event-bus", "maps-api"]);

        registry.dispose_all();
        assert_eq!(scheduler.pending(), 0);
    }

    #[test]
    fn test_register_replaces_and_disposes_previous() {
        let scheduler = ManualScheduler::new();
        let registry = CircuitBreakerRegistry::new();
        let first = breaker("database", &scheduler);
        let second = breaker("database", &scheduler);

        registry.register(first.handle());
        registry.register(second.handle());

        assert_eq!(registry.len(), 1);
        assert!(first.handle().is_disposed());
        assert!(!registry.get("database").unwrap().is_disposed());
    }
}
