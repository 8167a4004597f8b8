//! Circuit breaker state machine.
//!
//! # States
//! - Closed: normal operation, calls pass through
//! - Open: dependency assumed down, calls are rejected
//! - Half-Open: trial calls decide whether to resume
//!
//! # State Transitions
//! ```text
//! Closed → Open: failures >= failure_threshold
//! Open → Half-Open: reset timer fires (or recovery check after reset_timeout)
//! Half-Open → Closed: half_open_successes >= half_open_success_threshold
//! Half-Open → Open: any counted failure
//! ```
//!
//! `BreakerCore` is pure bookkeeping: it never touches timers or clocks.
//! Callers pass timestamps in and act on the returned [`Transition`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Circuit breaker states representing the current operational mode.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CircuitState {
    Closed = 0,
    Open = 1,
    HalfOpen = 2,
}

impl std::fmt::Display for CircuitState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            CircuitState::Closed => "CLOSED",
            CircuitState::Open => "OPEN",
            CircuitState::HalfOpen => "HALF_OPEN",
        };
        f.write_str(label)
    }
}

/// A state change produced by the core.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub from: CircuitState,
    pub to: CircuitState,
}

/// Thresholds the core needs to decide transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Thresholds {
    pub failure_threshold: u32,
    pub half_open_success_threshold: u32,
}

/// Counters and state of one breaker.
#[derive(Debug, Clone, PartialEq)]
pub struct BreakerCore {
    thresholds: Thresholds,
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
}

impl BreakerCore {
    pub fn new(thresholds: Thresholds) -> Self {
        Self {
            thresholds,
            state: CircuitState::Closed,
            failures: 0,
            successes: 0,
            half_open_successes: 0,
            total_calls: 0,
            successful_calls: 0,
            failed_calls: 0,
            rejected_calls: 0,
            last_failure: None,
            last_failure_time: None,
            last_success_time: None,
            opened_at: None,
        }
    }

    pub fn thresholds(&self) -> Thresholds {
        self.thresholds
    }

    /// Register an incoming call. Returns false when the call must be rejected.
    pub fn admit(&mut self) -> bool {
        self.total_calls += 1;
        if self.state == CircuitState::Open {
            self.rejected_calls += 1;
            return false;
        }
        true
    }

    pub fn on_success(&mut self, now: DateTime<Utc>) -> Option<Transition> {
        self.successful_calls += 1;
        self.successes += 1;
        self.last_success_time = Some(now);

        if self.state == CircuitState::HalfOpen {
            self.half_open_successes += 1;
            if self.half_open_successes >= u64::from(self.thresholds.half_open_success_threshold) {
                return self.enter(CircuitState::Closed, now);
            }
        }
        None
    }

    /// Record a failed call. `counted` is false when the error is ignored.
    pub fn on_failure(
        &mut self,
        message: String,
        counted: bool,
        now: DateTime<Utc>,
    ) -> Option<Transition> {
        self.failed_calls += 1;
        self.last_failure = Some(message);
        self.last_failure_time = Some(now);

        if !counted {
            return None;
        }

        self.failures += 1;
        match self.state {
            CircuitState::Closed
                if self.failures >= u64::from(self.thresholds.failure_threshold) =>
            {
                self.enter(CircuitState::Open, now)
            }
            CircuitState::HalfOpen => self.enter(CircuitState::Open, now),
            _ => None,
        }
    }

    /// Reset timer expiry. Only meaningful while open.
    pub fn on_reset_elapsed(&mut self, now: DateTime<Utc>) -> Option<Transition> {
        if self.state == CircuitState::Open {
            self.enter(CircuitState::HalfOpen, now)
        } else {
            None
        }
    }

    /// Manual override. Entering a state applies that state's resets.
    pub fn force(&mut self, to: CircuitState, now: DateTime<Utc>) -> Option<Transition> {
        self.enter(to, now)
    }

    /// Back to closed with every counter zeroed.
    pub fn reset(&mut self) -> Option<Transition> {
        let from = self.state;
        *self = Self::new(self.thresholds);
        (from != CircuitState::Closed).then_some(Transition {
            from,
            to: CircuitState::Closed,
        })
    }

    fn enter(&mut self, to: CircuitState, now: DateTime<Utc>) -> Option<Transition> {
        let from = self.state;
        if from == to {
            return None;
        }
        self.state = to;
        match to {
            CircuitState::Closed => {
                self.failures = 0;
                self.successes = 0;
                self.opened_at = None;
            }
            CircuitState::Open => {
                self.opened_at = Some(now);
            }
            CircuitState::HalfOpen => {
                self.half_open_successes = 0;
            }
        }
        Some(Transition { from, to })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn core(failure_threshold: u32, half_open_success_threshold: u32) -> BreakerCore {
        BreakerCore::new(Thresholds {
            failure_threshold,
            half_open_success_threshold,
        })
    }

    fn fail(core: &mut BreakerCore) -> Option<Transition> {
        core.on_failure("boom".into(), true, Utc::now())
    }

    #[test]
    fn test_opens_at_threshold() {
        let mut c = core(3, 2);
        assert_eq!(fail(&mut c), None);
        assert_eq!(fail(&mut c), None);
        assert_eq!(
            fail(&mut c),
            Some(Transition { from: CircuitState::Closed, to: CircuitState::Open })
        );
        assert!(c.opened_at.is_some());
        assert!(!c.admit());
        assert_eq!(c.rejected_calls, 1);
        assert_eq!(c.total_calls, 1);
    }

    #[test]
    fn test_successes_do_not_clear_failures_while_closed() {
        let mut c = core(2, 1);
        fail(&mut c);
        c.on_success(Utc::now());
        assert_eq!(c.failures, 1);
        assert_eq!(c.successes, 1);
        assert_eq!(fail(&mut c).map(|t| t.to), Some(CircuitState::Open));
    }

    #[test]
    fn test_ignored_failure_only_touches_lifetime_stats() {
        let mut c = core(1, 1);
        assert_eq!(c.on_failure("expected".into(), false, Utc::now()), None);
        assert_eq!(c.failed_calls, 1);
        assert_eq!(c.failures, 0);
        assert_eq!(c.state, CircuitState::Closed);
        assert_eq!(c.last_failure.as_deref(), Some("expected"));
    }

    #[test]
    fn test_half_open_failure_reopens_without_partial_credit() {
        let mut c = core(1, 3);
        fail(&mut c);
        c.on_reset_elapsed(Utc::now());
        c.on_success(Utc::now());
        c.on_success(Utc::now());
        assert_eq!(c.half_open_successes, 2);

        assert_eq!(
            fail(&mut c),
            Some(Transition { from: CircuitState::HalfOpen, to: CircuitState::Open })
        );

        c.on_reset_elapsed(Utc::now());
        assert_eq!(c.state, CircuitState::HalfOpen);
        assert_eq!(c.half_open_successes, 0);
    }

    #[test]
    fn test_half_open_closes_and_resets_counters() {
        let mut c = core(2, 2);
        fail(&mut c);
        fail(&mut c);
        c.on_reset_elapsed(Utc::now());

        assert_eq!(c.on_success(Utc::now()), None);
        assert_eq!(
            c.on_success(Utc::now()),
            Some(Transition { from: CircuitState::HalfOpen, to: CircuitState::Closed })
        );
        assert_eq!(c.failures, 0);
        assert_eq!(c.successes, 0);
        assert_eq!(c.successful_calls, 2);
        assert_eq!(c.failed_calls, 2);
    }

    #[test]
    fn test_reset_elapsed_ignored_unless_open() {
        let mut c = core(5, 1);
        assert_eq!(c.on_reset_elapsed(Utc::now()), None);
        assert_eq!(c.state, CircuitState::Closed);
    }

    #[test]
    fn test_reset_zeroes_everything() {
        let mut c = core(1, 1);
        c.admit();
        fail(&mut c);
        assert_eq!(
            c.reset(),
            Some(Transition { from: CircuitState::Open, to: CircuitState::Closed })
        );
        assert_eq!(c, core(1, 1));
        assert_eq!(c.reset(), None);
    }

    #[test]
    fn test_force_same_state_is_noop() {
        let mut c = core(1, 1);
        assert_eq!(c.force(CircuitState::Closed, Utc::now()), None);
        assert!(c.force(CircuitState::Open, Utc::now()).is_some());
    }

    #[test]
    fn test_state_serialization() {
        assert_eq!(serde_json::to_string(&CircuitState::HalfOpen).unwrap(), "\"HALF_OPEN\"");
        assert_eq!(CircuitState::Open.to_string(), "OPEN");
    }
}
