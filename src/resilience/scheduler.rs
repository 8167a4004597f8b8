//! Clock and timer scheduling for breaker resets and recovery checks.
//!
//! # Responsibilities
//! - Tell the current time
//! - Run a callback once after a delay, or repeatedly on a period
//! - Hand back a cancellable [`TimerHandle`] that the owner stores
//!
//! # Design Decisions
//! - Dropping a handle cancels its timer, so timers never outlive their owner
//! - `TokioScheduler` spawns onto the ambient Tokio runtime; without one it
//!   logs and hands back an inert handle instead of panicking
//! - `ManualScheduler` keeps virtual time, advanced explicitly by tests

use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use tokio::task::AbortHandle;

pub type OnceTask = Box<dyn FnOnce() + Send + 'static>;
pub type RepeatingTask = Arc<dyn Fn() + Send + Sync + 'static>;

/// Clock plus source of cancellable timers.
pub trait Scheduler: Send + Sync + fmt::Debug {
    /// Current wall-clock time as seen by this scheduler.
    fn now(&self) -> DateTime<Utc>;

    /// Run `task` once after `delay`.
    fn schedule_once(&self, delay: Duration, task: OnceTask) -> TimerHandle;

    /// Run `task` every `period`, first after one full period.
    fn schedule_every(&self, period: Duration, task: RepeatingTask) -> TimerHandle;
}

/// Cancellation handle for a scheduled timer. Cancels on drop.
#[derive(Debug)]
pub struct TimerHandle {
    inner: HandleInner,
}

#[derive(Debug)]
enum HandleInner {
    Task(AbortHandle),
    Flag(Arc<AtomicBool>),
}

impl TimerHandle {
    /// Handle for a timer that was never scheduled.
    fn inert() -> Self {
        Self {
            inner: HandleInner::Flag(Arc::new(AtomicBool::new(true))),
        }
    }

    pub fn cancel(&self) {
        match &self.inner {
            HandleInner::Task(handle) => handle.abort(),
            HandleInner::Flag(cancelled) => cancelled.store(true, Ordering::SeqCst),
        }
    }
}

impl Drop for TimerHandle {
    fn drop(&mut self) {
        self.cancel();
    }
}

/// Scheduler backed by `tokio::time`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TokioScheduler;

impl Scheduler for TokioScheduler {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }

    fn schedule_once(&self, delay: Duration, task: OnceTask) -> TimerHandle {
        spawn_timer(async move {
            tokio::time::sleep(delay).await;
            task();
        })
    }

    fn schedule_every(&self, period: Duration, task: RepeatingTask) -> TimerHandle {
        spawn_timer(async move {
            let start = tokio::time::Instant::now() + period;
            let mut ticker = tokio::time::interval_at(start, period);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                task();
            }
        })
    }
}

fn spawn_timer<F>(timer: F) -> TimerHandle
where
    F: Future<Output = ()> + Send + 'static,
{
    match tokio::runtime::Handle::try_current() {
        Ok(runtime) => TimerHandle {
            inner: HandleInner::Task(runtime.spawn(timer).abort_handle()),
        },
        Err(e) => {
            tracing::warn!(error = %e, "No Tokio runtime, timer not scheduled");
            TimerHandle::inert()
        }
    }
}

/// Deterministic scheduler driven by [`ManualScheduler::advance`].
#[derive(Debug, Clone)]
pub struct ManualScheduler {
    state: Arc<Mutex<ManualState>>,
}

struct ManualState {
    epoch: DateTime<Utc>,
    now: Duration,
    next_id: u64,
    timers: Vec<ManualTimer>,
}

impl fmt::Debug for ManualState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ManualState")
            .field("now", &self.now)
            .field("timers", &self.timers.len())
            .finish()
    }
}

struct ManualTimer {
    id: u64,
    due: Duration,
    period: Option<Duration>,
    cancelled: Arc<AtomicBool>,
    task: ManualTask,
}

enum ManualTask {
    Once(OnceTask),
    Every(RepeatingTask),
}

impl Default for ManualScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl ManualScheduler {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(ManualState {
                epoch: Utc::now(),
                now: Duration::ZERO,
                next_id: 0,
                timers: Vec::new(),
            })),
        }
    }

    /// Virtual time elapsed since creation.
    pub fn elapsed(&self) -> Duration {
        self.state.lock().now
    }

    /// Number of live (not cancelled, not yet fired) timers.
    pub fn pending(&self) -> usize {
        self.state
            .lock()
            .timers
            .iter()
            .filter(|t| !t.cancelled.load(Ordering::SeqCst))
            .count()
    }

    /// Move virtual time forward, firing every timer that comes due in order.
    pub fn advance(&self, by: Duration) {
        let target = self.state.lock().now + by;
        loop {
            let fired = {
                let mut state = self.state.lock();
                state.timers.retain(|t| !t.cancelled.load(Ordering::SeqCst));
                let next = state
                    .timers
                    .iter()
                    .enumerate()
                    .filter(|(_, t)| t.due <= target)
                    .min_by_key(|(_, t)| (t.due, t.id))
                    .map(|(idx, _)| idx);
                match next {
                    Some(idx) => {
                        let timer = state.timers.remove(idx);
                        state.now = timer.due;
                        Some(timer)
                    }
                    None => None,
                }
            };

            let Some(timer) = fired else { break };
            match timer.task {
                ManualTask::Once(task) => task(),
                ManualTask::Every(task) => {
                    task();
                    if let Some(period) = timer.period {
                        let mut state = self.state.lock();
                        if !timer.cancelled.load(Ordering::SeqCst) {
                            state.timers.push(ManualTimer {
                                id: timer.id,
                                due: timer.due + period,
                                period: Some(period),
                                cancelled: timer.cancelled,
                                task: ManualTask::Every(task),
                            });
                        }
                    }
                }
            }
        }
        self.state.lock().now = target;
    }

    fn push(&self, delay: Duration, period: Option<Duration>, task: ManualTask) -> TimerHandle {
        let cancelled = Arc::new(AtomicBool::new(false));
        let mut state = self.state.lock();
        let id = state.next_id;
        state.next_id += 1;
        let due = state.now + delay;
        state.timers.push(ManualTimer {
            id,
            due,
            period,
            cancelled: cancelled.clone(),
            task,
        });
        TimerHandle {
            inner: HandleInner::Flag(cancelled),
        }
    }
}

impl Scheduler for ManualScheduler {
    fn now(&self) -> DateTime<Utc> {
        let state = self.state.lock();
        let elapsed = chrono::Duration::from_std(state.now).unwrap_or(chrono::Duration::zero());
        state.epoch + elapsed
    }

    fn schedule_once(&self, delay: Duration, task: OnceTask) -> TimerHandle {
        self.push(delay, None, ManualTask::Once(task))
    }

    fn schedule_every(&self, period: Duration, task: RepeatingTask) -> TimerHandle {
        self.push(period, Some(period), ManualTask::Every(task))
    }
}
