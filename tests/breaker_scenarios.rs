//! End-to-end circuit breaker scenarios driven by a virtual clock.

use std::sync::Arc;
use std::time::Duration;

use futures_util::future::join_all;
use service_health::health::probes::CircuitBreakerProbe;
use service_health::health::probes::HealthProbe;
use service_health::health::HealthStatus;
use service_health::resilience::{
    BreakerError, CircuitBreaker, CircuitBreakerRegistry, CircuitState, ManualScheduler,
};

mod common;

use common::{settings, Flaky, TransitionLog};
use CircuitState::{Closed, HalfOpen, Open};

fn flaky_breaker(
    scheduler: &ManualScheduler,
    flaky: &Flaky,
    log: &TransitionLog,
) -> CircuitBreaker<(), u32, String> {
    let flaky = flaky.clone();
    CircuitBreaker::builder("bookings", settings(3, 1000, 2))
        .scheduler(Arc::new(scheduler.clone()))
        .on_state_change(log.listener())
        .build(move |()| {
            let flaky = flaky.clone();
            async move { flaky.call().await }
        })
}

#[tokio::test]
async fn test_full_recovery_cycle() {
    let scheduler = ManualScheduler::new();
    let flaky = Flaky::failing_first(3);
    let log = TransitionLog::default();
    let breaker = flaky_breaker(&scheduler, &flaky, &log);

    for attempt in 1..=3 {
        let err = breaker.execute(()).await.unwrap_err();
        assert_eq!(err.to_string(), format!("attempt {} failed", attempt));
    }
    assert_eq!(breaker.state(), Open);
    assert_eq!(log.entries(), vec![(Closed, Open)]);

    // Rejected without touching the dependency.
    assert!(breaker.execute(()).await.unwrap_err().is_open());
    assert_eq!(flaky.count(), 3);

    scheduler.advance(Duration::from_millis(1000));
    assert_eq!(breaker.state(), HalfOpen);

    assert_eq!(breaker.execute(()).await.unwrap(), 4);
    assert_eq!(breaker.state(), HalfOpen);
    assert_eq!(breaker.execute(()).await.unwrap(), 5);
    assert_eq!(breaker.state(), Closed);
    assert_eq!(log.entries(), vec![(Closed, Open), (Open, HalfOpen), (HalfOpen, Closed)]);

    let stats = breaker.stats();
    assert_eq!(stats.total_calls, 6);
    assert_eq!(stats.successful_calls, 2);
    assert_eq!(stats.failed_calls, 3);
    assert_eq!(stats.rejected_calls, 1);
    assert_eq!(stats.failures, 0);
    assert_eq!(stats.successes, 0);
    assert_eq!(stats.last_failure.as_deref(), Some("attempt 3 failed"));
    assert_eq!(stats.uptime_ms, 1000);
}

#[tokio::test]
async fn test_half_open_failure_reopens_with_fresh_timer() {
    let scheduler = ManualScheduler::new();
    let flaky = Flaky::failing_first(4);
    let log = TransitionLog::default();
    let breaker = flaky_breaker(&scheduler, &flaky, &log);

    for _ in 0..3 {
        let _ = breaker.execute(()).await;
    }
    scheduler.advance(Duration::from_millis(1000));
    assert_eq!(breaker.state(), HalfOpen);
    assert_eq!(scheduler.pending(), 0);

    let _ = breaker.execute(()).await;
    assert_eq!(breaker.state(), Open);
    assert_eq!(scheduler.pending(), 1);

    scheduler.advance(Duration::from_millis(999));
    assert_eq!(breaker.state(), Open);
    scheduler.advance(Duration::from_millis(1));
    assert_eq!(breaker.state(), HalfOpen);
    assert_eq!(
        log.entries(),
        vec![(Closed, Open), (Open, HalfOpen), (HalfOpen, Open), (Open, HalfOpen)]
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_failures_schedule_one_timer() {
    let scheduler = ManualScheduler::new();
    let log = TransitionLog::default();
    let breaker: CircuitBreaker<u32, (), String> =
        CircuitBreaker::builder("locations", settings(5, 1000, 1))
            .scheduler(Arc::new(scheduler.clone()))
            .on_state_change(log.listener())
            .build(|n: u32| async move { Err::<(), String>(format!("call {} failed", n)) });

    let calls = (0..64).map(|n| {
        let breaker = breaker.clone();
        tokio::spawn(async move { breaker.execute(n).await })
    });
    let results = join_all(calls).await;

    let rejected = results
        .into_iter()
        .map(|r| r.unwrap().unwrap_err())
        .filter(|e| e.is_open())
        .count() as u64;

    let stats = breaker.stats();
    assert_eq!(stats.state, Open);
    assert_eq!(stats.total_calls, 64);
    assert_eq!(stats.rejected_calls, rejected);
    assert_eq!(stats.failed_calls + stats.rejected_calls, 64);
    assert_eq!(scheduler.pending(), 1);
    assert_eq!(log.entries(), vec![(Closed, Open)]);
}

#[tokio::test]
async fn test_fallback_receives_original_arguments() {
    let scheduler = ManualScheduler::new();
    let breaker: CircuitBreaker<(String, u32), String, String> =
        CircuitBreaker::builder("events", settings(1, 1000, 1))
            .scheduler(Arc::new(scheduler.clone()))
            .fallback(|error: BreakerError<String>, (city, limit): (String, u32)| async move {
                let cached = format!("cached {} x{} ({})", city, limit, error.is_open());
                Ok::<String, BreakerError<String>>(cached)
            })
            .build(|(_city, _limit): (String, u32)| async move {
                Err::<String, String>("upstream 500".to_string())
            });

    let first = breaker.execute(("lisbon".to_string(), 10)).await.unwrap();
    assert_eq!(first, "cached lisbon x10 (false)");
    assert_eq!(breaker.state(), Open);

    let second = breaker.execute(("porto".to_string(), 5)).await.unwrap();
    assert_eq!(second, "cached porto x5 (true)");

    let stats = breaker.stats();
    assert_eq!(stats.failed_calls, 1);
    assert_eq!(stats.rejected_calls, 1);
}

#[tokio::test(start_paused = true)]
async fn test_timeouts_count_even_when_errors_are_ignored() {
    let breaker: CircuitBreaker<u64, (), String> = CircuitBreaker::builder(
        "search",
        service_health::config::BreakerSettings {
            timeout_ms: Some(100),
            ..settings(2, 60_000, 1)
        },
    )
    .ignore_errors(|_: &String| true)
    .build(|delay_ms: u64| async move {
        tokio::time::sleep(Duration::from_millis(delay_ms)).await;
        Err::<(), String>("not found".to_string())
    });

    // Fast errors are ignored by the filter.
    for _ in 0..5 {
        let err = breaker.execute(0).await.unwrap_err();
        assert_eq!(err.into_inner().as_deref(), Some("not found"));
    }
    assert_eq!(breaker.state(), Closed);
    assert_eq!(breaker.stats().failures, 0);
    assert_eq!(breaker.stats().failed_calls, 5);

    // Slow calls hit the deadline, which is always counted.
    let err = breaker.execute(10_000).await.unwrap_err();
    assert!(err.is_timeout());
    assert_eq!(err.to_string(), "Service search timed out after 100ms");
    let _ = breaker.execute(10_000).await;
    assert_eq!(breaker.state(), Open);

    breaker.dispose();
}

#[tokio::test]
async fn test_registry_feeds_breaker_probe() {
    let scheduler = ManualScheduler::new();
    let registry = Arc::new(CircuitBreakerRegistry::new());
    let flaky = Flaky::failing_first(3);
    let log = TransitionLog::default();
    let breaker = flaky_breaker(&scheduler, &flaky, &log);
    registry.register(breaker.handle());
    let probe = CircuitBreakerProbe::new(registry.clone());

    for _ in 0..3 {
        let _ = breaker.execute(()).await;
    }
    let report = probe.check().await.unwrap();
    assert_eq!(report.status, HealthStatus::Degraded);
    assert_eq!(registry.summary().open_services, vec!["bookings".to_string()]);

    scheduler.advance(Duration::from_millis(1000));
    let summary = registry.summary();
    assert_eq!(summary.open, 0);
    assert_eq!(summary.half_open, 1);
    assert_eq!(probe.check().await.unwrap().status, HealthStatus::Healthy);

    registry.dispose_all();
    assert!(registry.get("bookings").unwrap().is_disposed());
}

#[tokio::test]
async fn test_recovery_check_half_opens_after_reset_timeout() {
    let scheduler = ManualScheduler::new();
    let log = TransitionLog::default();
    let breaker: CircuitBreaker<(), (), String> = CircuitBreaker::builder(
        "inventory",
        service_health::config::BreakerSettings {
            monitor_interval_ms: Some(250),
            ..settings(1, 1000, 1)
        },
    )
    .scheduler(Arc::new(scheduler.clone()))
    .on_state_change(log.listener())
    .build(|()| async { Err::<(), String>("down".to_string()) });

    let _ = breaker.execute(()).await;
    assert_eq!(breaker.state(), Open);

    scheduler.advance(Duration::from_millis(750));
    assert_eq!(breaker.state(), Open);
    scheduler.advance(Duration::from_millis(250));
    assert_eq!(breaker.state(), HalfOpen);
    assert_eq!(log.entries(), vec![(Closed, Open), (Open, HalfOpen)]);

    breaker.dispose();
    assert_eq!(scheduler.pending(), 0);
}
