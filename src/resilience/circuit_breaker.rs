//! Circuit breaker for dependency protection.
//!
//! # Responsibilities
//! - Wrap one protected async operation per dependency
//! - Reject calls while open; optionally answer them with a fallback
//! - Schedule the open → half-open reset, and the optional recovery check
//! - Expose counters through [`BreakerStats`]
//!
//! # Design Decisions
//! - Per-dependency circuit breaker (not global)
//! - Fail fast in Open state (no waiting for timeout)
//! - State, counters and the reset timer share one mutex, so concurrent
//!   failures cannot schedule two resets
//! - Timer callbacks hold a `Weak` reference and check the disposed flag and
//!   timer generation before touching state
//! - `on_state_change` runs after the lock is released

use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use chrono::{DateTime, Utc};
use futures_util::future::BoxFuture;
use parking_lot::Mutex;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::BreakerSettings;
use crate::observability::metrics::{self, CallOutcome};
use crate::resilience::scheduler::{Scheduler, TimerHandle, TokioScheduler};
use crate::resilience::state::{BreakerCore, CircuitState, Thresholds, Transition};
use crate::resilience::timeouts::with_deadline;

/// Errors surfaced by [`CircuitBreaker::execute`].
#[derive(Debug, thiserror::Error)]
pub enum BreakerError<E> {
    /// The circuit is open and no fallback answered the call.
    #[error("Service {service} is unavailable: circuit breaker is open")]
    Open { service: String },

    /// The protected call exceeded its deadline.
    #[error("Service {service} timed out after {timeout_ms}ms")]
    Timeout { service: String, timeout_ms: u64 },

    /// The protected call itself failed.
    #[error("{0}")]
    Failed(E),
}

impl<E> BreakerError<E> {
    pub fn is_open(&self) -> bool {
        matches!(self, BreakerError::Open { .. })
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, BreakerError::Timeout { .. })
    }

    /// The protected call's own error, if that is what this is.
    pub fn into_inner(self) -> Option<E> {
        match self {
            BreakerError::Failed(e) => Some(e),
            _ => None,
        }
    }
}

/// Decides which protected-call errors do not count toward opening the circuit.
///
/// Implementations must be total and side-effect free.
pub trait ErrorFilter<E>: Send + Sync {
    fn is_ignored(&self, error: &E) -> bool;
}

impl<E, F> ErrorFilter<E> for F
where
    F: Fn(&E) -> bool + Send + Sync,
{
    fn is_ignored(&self, error: &E) -> bool {
        self(error)
    }
}

pub type StateChangeListener = Arc<dyn Fn(CircuitState, CircuitState) + Send + Sync>;

type Operation<A, T, E> = Arc<dyn Fn(A) -> BoxFuture<'static, Result<T, E>> + Send + Sync>;
type Fallback<A, T, E> =
    Arc<dyn Fn(BreakerError<E>, A) -> BoxFuture<'static, Result<T, BreakerError<E>>> + Send + Sync>;

/// Read-only snapshot of a breaker's counters.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BreakerStats {
    pub name: String,
    pub state: CircuitState,
    pub failures: u64,
    pub successes: u64,
    pub half_open_successes: u64,
    pub total_calls: u64,
    pub successful_calls: u64,
    pub failed_calls: u64,
    pub rejected_calls: u64,
    pub last_failure: Option<String>,
    pub last_failure_time: Option<DateTime<Utc>>,
    pub last_success_time: Option<DateTime<Utc>>,
    pub opened_at: Option<DateTime<Utc>>,
    pub start_time: DateTime<Utc>,
    pub uptime_ms: u64,
}

struct Guarded {
    core: BreakerCore,
    reset_timer: Option<TimerHandle>,
    generation: u64,
}

struct BreakerInner {
    name: String,
    settings: BreakerSettings,
    guarded: Mutex<Guarded>,
    monitor_timer: Mutex<Option<TimerHandle>>,
    disposed: AtomicBool,
    scheduler: Arc<dyn Scheduler>,
    on_state_change: Option<StateChangeListener>,
    start_time: DateTime<Utc>,
}

/// Type-erased view of a breaker, used by the registry and admin surfaces.
#[derive(Clone)]
pub struct BreakerHandle {
    inner: Arc<BreakerInner>,
}

impl fmt::Debug for BreakerHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BreakerHandle")
            .field("name", &self.inner.name)
            .field("state", &self.state())
            .finish()
    }
}

impl BreakerHandle {
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn settings(&self) -> &BreakerSettings {
        &self.inner.settings
    }

    pub fn state(&self) -> CircuitState {
        self.inner.guarded.lock().core.state
    }

    pub fn stats(&self) -> BreakerStats {
        self.inner.stats()
    }

    /// Manual override for operators and tests.
    pub fn force_state(&self, to: CircuitState) {
        warn!(service = %self.inner.name, to = %to, "Circuit breaker state forced");
        let now = self.inner.scheduler.now();
        self.inner.update(|core| core.force(to, now));
    }

    /// Return to closed and zero every counter.
    pub fn reset(&self) {
        info!(service = %self.inner.name, "Circuit breaker reset");
        self.inner.update(|core| core.reset());
    }

    /// Cancel every pending timer. Idempotent.
    pub fn dispose(&self) {
        self.inner.dispose();
    }

    pub fn is_disposed(&self) -> bool {
        self.inner.disposed.load(Ordering::SeqCst)
    }
}

impl BreakerInner {
    fn stats(&self) -> BreakerStats {
        let guarded = self.guarded.lock();
        let core = &guarded.core;
        let now = self.scheduler.now();
        BreakerStats {
            name: self.name.clone(),
            state: core.state,
            failures: core.failures,
            successes: core.successes,
            half_open_successes: core.half_open_successes,
            total_calls: core.total_calls,
            successful_calls: core.successful_calls,
            failed_calls: core.failed_calls,
            rejected_calls: core.rejected_calls,
            last_failure: core.last_failure.clone(),
            last_failure_time: core.last_failure_time,
            last_success_time: core.last_success_time,
            opened_at: core.opened_at,
            start_time: self.start_time,
            uptime_ms: (now - self.start_time).num_milliseconds().max(0) as u64,
        }
    }

    /// Apply `step` to the core and its timer side effects atomically,
    /// then notify outside the lock.
    fn update<F>(self: &Arc<Self>, step: F) -> Option<Transition>
    where
        F: FnOnce(&mut BreakerCore) -> Option<Transition>,
    {
        let transition = {
            let mut guarded = self.guarded.lock();
            let transition = step(&mut guarded.core);
            if let Some(t) = transition {
                self.apply_timers(&mut guarded, t);
            }
            transition
        };
        if let Some(t) = transition {
            self.notify(t);
        }
        transition
    }

    fn apply_timers(self: &Arc<Self>, guarded: &mut Guarded, transition: Transition) {
        guarded.generation += 1;
        if let Some(previous) = guarded.reset_timer.take() {
            previous.cancel();
        }
        if transition.to != CircuitState::Open || self.disposed.load(Ordering::SeqCst) {
            return;
        }

        let weak: Weak<Self> = Arc::downgrade(self);
        let generation = guarded.generation;
        let handle = self.scheduler.schedule_once(
            self.settings.reset_timeout(),
            Box::new(move || {
                if let Some(inner) = weak.upgrade() {
                    inner.on_reset_timer(generation);
                }
            }),
        );
        guarded.reset_timer = Some(handle);
    }

    fn on_reset_timer(self: &Arc<Self>, generation: u64) {
        if self.disposed.load(Ordering::SeqCst) {
            return;
        }
        let now = self.scheduler.now();
        let transition = {
            let mut guarded = self.guarded.lock();
            // A timer replaced or cancelled after it started firing must not act.
            if guarded.generation != generation {
                return;
            }
            let transition = guarded.core.on_reset_elapsed(now);
            if let Some(t) = transition {
                self.apply_timers(&mut guarded, t);
            }
            transition
        };
        if let Some(t) = transition {
            self.notify(t);
        }
    }

    fn on_recovery_check(self: &Arc<Self>) {
        if self.disposed.load(Ordering::SeqCst) {
            return;
        }
        let now = self.scheduler.now();
        let reset_timeout = chrono::Duration::from_std(self.settings.reset_timeout())
            .unwrap_or_else(|_| chrono::Duration::zero());
        let transition = self.update(|core| match core.opened_at {
            Some(opened_at)
                if core.state == CircuitState::Open && now - opened_at >= reset_timeout =>
            {
                core.on_reset_elapsed(now)
            }
            _ => None,
        });
        if transition.is_none() {
            let guarded = self.guarded.lock();
            debug!(
                service = %self.name,
                state = %guarded.core.state,
                failures = guarded.core.failures,
                total_calls = guarded.core.total_calls,
                "Circuit breaker recovery check"
            );
        }
    }

    fn notify(&self, transition: Transition) {
        let Transition { from, to } = transition;
        match to {
            CircuitState::Open => {
                warn!(service = %self.name, from = %from, to = %to, "Circuit breaker opened")
            }
            CircuitState::HalfOpen => {
                info!(service = %self.name, from = %from, to = %to, "Circuit breaker half-open")
            }
            CircuitState::Closed => {
                info!(service = %self.name, from = %from, to = %to, "Circuit breaker closed")
            }
        }
        metrics::record_breaker_state(&self.name, to);
        if let Some(listener) = &self.on_state_change {
            listener(from, to);
        }
    }

    fn dispose(&self) {
        if self.disposed.swap(true, Ordering::SeqCst) {
            return;
        }
        {
            let mut guarded = self.guarded.lock();
            guarded.generation += 1;
            guarded.reset_timer.take();
        }
        self.monitor_timer.lock().take();
        debug!(service = %self.name, "Circuit breaker disposed");
    }
}

/// Circuit breaker around one protected async operation.
///
/// `A` is the argument (a single value or a tuple), handed to the operation
/// and, on failure or rejection, to the fallback.
pub struct CircuitBreaker<A, T, E> {
    handle: BreakerHandle,
    operation: Operation<A, T, E>,
    fallback: Option<Fallback<A, T, E>>,
    ignore_errors: Option<Arc<dyn ErrorFilter<E>>>,
}

impl<A, T, E> Clone for CircuitBreaker<A, T, E> {
    fn clone(&self) -> Self {
        Self {
            handle: self.handle.clone(),
            operation: self.operation.clone(),
            fallback: self.fallback.clone(),
            ignore_errors: self.ignore_errors.clone(),
        }
    }
}

impl<A, T, E> fmt::Debug for CircuitBreaker<A, T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CircuitBreaker")
            .field("name", &self.handle.name())
            .field("state", &self.handle.state())
            .field("has_fallback", &self.fallback.is_some())
            .finish()
    }
}

impl<A, T, E> CircuitBreaker<A, T, E>
where
    A: Clone + Send + 'static,
    T: Send + 'static,
    E: fmt::Display + Send + 'static,
{
    pub fn builder(
        name: impl Into<String>,
        settings: BreakerSettings,
    ) -> CircuitBreakerBuilder<A, T, E> {
        CircuitBreakerBuilder {
            name: name.into(),
            settings,
            scheduler: Arc::new(TokioScheduler),
            fallback: None,
            ignore_errors: None,
            on_state_change: None,
        }
    }

    /// Run the protected operation under breaker control.
    pub async fn execute(&self, args: A) -> Result<T, BreakerError<E>> {
        let inner = &self.handle.inner;

        let admitted = inner.guarded.lock().core.admit();
        if !admitted {
            metrics::record_breaker_call(&inner.name, CallOutcome::Rejected);
            debug!(service = %inner.name, "Call rejected: circuit open");
            let error = BreakerError::Open {
                service: inner.name.clone(),
            };
            return match &self.fallback {
                Some(fallback) => fallback(error, args).await,
                None => Err(error),
            };
        }

        let fallback_args = self.fallback.as_ref().map(|_| args.clone());
        let call = (self.operation)(args);
        let result = with_deadline(&inner.name, inner.settings.timeout(), call).await;

        match result {
            Ok(value) => {
                metrics::record_breaker_call(&inner.name, CallOutcome::Success);
                let now = inner.scheduler.now();
                inner.update(|core| core.on_success(now));
                Ok(value)
            }
            Err(error) => {
                let counted = match &error {
                    BreakerError::Failed(e) => !self
                        .ignore_errors
                        .as_ref()
                        .is_some_and(|filter| filter.is_ignored(e)),
                    _ => true,
                };
                let outcome = if error.is_timeout() {
                    CallOutcome::Timeout
                } else {
                    CallOutcome::Failure
                };
                metrics::record_breaker_call(&inner.name, outcome);
                debug!(service = %inner.name, error = %error, counted, "Protected call failed");

                let message = error.to_string();
                let now = inner.scheduler.now();
                inner.update(|core| core.on_failure(message, counted, now));

                match (&self.fallback, fallback_args) {
                    (Some(fallback), Some(args)) => fallback(error, args).await,
                    _ => Err(error),
                }
            }
        }
    }
}

impl<A, T, E> CircuitBreaker<A, T, E> {
    pub fn name(&self) -> &str {
        self.handle.name()
    }

    pub fn state(&self) -> CircuitState {
        self.handle.state()
    }

    pub fn stats(&self) -> BreakerStats {
        self.handle.stats()
    }

    pub fn force_state(&self, to: CircuitState) {
        self.handle.force_state(to);
    }

    pub fn reset(&self) {
        self.handle.reset();
    }

    pub fn dispose(&self) {
        self.handle.dispose();
    }

    /// Type-erased handle for registration and monitoring.
    pub fn handle(&self) -> BreakerHandle {
        self.handle.clone()
    }
}

/// Builder for [`CircuitBreaker`].
pub struct CircuitBreakerBuilder<A, T, E> {
    name: String,
    settings: BreakerSettings,
    scheduler: Arc<dyn Scheduler>,
    fallback: Option<Fallback<A, T, E>>,
    ignore_errors: Option<Arc<dyn ErrorFilter<E>>>,
    on_state_change: Option<StateChangeListener>,
}

impl<A, T, E> CircuitBreakerBuilder<A, T, E>
where
    A: Clone + Send + 'static,
    T: Send + 'static,
    E: fmt::Display + Send + 'static,
{
    /// Use a specific clock/timer source instead of the Tokio runtime.
    pub fn scheduler(mut self, scheduler: Arc<dyn Scheduler>) -> Self {
        self.scheduler = scheduler;
        self
    }

    /// Answer rejected and failed calls with `fallback` instead of an error.
    pub fn fallback<F, Fut>(mut self, fallback: F) -> Self
    where
        F: Fn(BreakerError<E>, A) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, BreakerError<E>>> + Send + 'static,
    {
        self.fallback = Some(Arc::new(move |error, args| Box::pin(fallback(error, args))));
        self
    }

    pub fn ignore_errors<F>(mut self, filter: F) -> Self
    where
        F: ErrorFilter<E> + 'static,
    {
        self.ignore_errors = Some(Arc::new(filter));
        self
    }

    pub fn on_state_change<F>(mut self, listener: F) -> Self
    where
        F: Fn(CircuitState, CircuitState) + Send + Sync + 'static,
    {
        self.on_state_change = Some(Arc::new(listener));
        self
    }

    /// Finish with the protected operation. Starts the recovery check when
    /// `monitor_interval_ms` is configured.
    pub fn build<F, Fut>(self, operation: F) -> CircuitBreaker<A, T, E>
    where
        F: Fn(A) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
    {
        let thresholds = Thresholds {
            failure_threshold: self.settings.failure_threshold,
            half_open_success_threshold: self.settings.half_open_success_threshold,
        };
        let start_time = self.scheduler.now();
        let inner = Arc::new(BreakerInner {
            name: self.name,
            settings: self.settings,
            guarded: Mutex::new(Guarded {
                core: BreakerCore::new(thresholds),
                reset_timer: None,
                generation: 0,
            }),
            monitor_timer: Mutex::new(None),
            disposed: AtomicBool::new(false),
            scheduler: self.scheduler,
            on_state_change: self.on_state_change,
            start_time,
        });

        if let Some(interval) = inner.settings.monitor_interval() {
            let weak = Arc::downgrade(&inner);
            let handle = inner.scheduler.schedule_every(
                interval,
                Arc::new(move || {
                    if let Some(inner) = weak.upgrade() {
                        inner.on_recovery_check();
                    }
                }),
            );
            *inner.monitor_timer.lock() = Some(handle);
        }

        info!(
            service = %inner.name,
            failure_threshold = inner.settings.failure_threshold,
            reset_timeout_ms = inner.settings.reset_timeout_ms,
            half_open_success_threshold = inner.settings.half_open_success_threshold,
            timeout_ms = ?inner.settings.timeout_ms,
            "Circuit breaker initialized"
        );
        metrics::record_breaker_state(&inner.name, CircuitState::Closed);

        CircuitBreaker {
            handle: BreakerHandle { inner },
            operation: Arc::new(move |args| Box::pin(operation(args))),
            fallback: self.fallback,
            ignore_errors: self.ignore_errors,
        }
    }
}
