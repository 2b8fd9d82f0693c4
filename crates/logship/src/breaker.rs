//! Circuit breaker guarding connection attempts.
//!
//! Three states. Closed lets every attempt through. Open fast-fails
//! attempts until [`OPEN_DURATION`] has elapsed since the last failure, at
//! which point the next attempt runs as a half-open trial. A trial success
//! closes the breaker; a trial failure reopens it for another window.

use std::sync::Mutex;
use std::time::{Duration, Instant};

use serde::Serialize;
use tracing::{info, warn};

/// Consecutive failures required to trip the breaker.
pub(crate) const FAILURE_THRESHOLD: u32 = 5;

/// How long the breaker stays open before allowing a trial.
pub(crate) const OPEN_DURATION: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum BreakerState {
    Closed,
    Open,
    HalfOpen,
}

/// Outcome of asking the breaker whether an attempt may proceed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Decision {
    /// Breaker is closed (or a trial is already underway); proceed.
    Allow,
    /// The open window elapsed; this attempt is the half-open trial.
    Trial,
    /// Still inside the open window; fail fast.
    Reject,
}

#[derive(Debug)]
struct BreakerInner {
    state: BreakerState,
    failure_count: u32,
    last_failure_time: Option<Instant>,
}

#[derive(Debug)]
pub(crate) struct CircuitBreaker {
    failure_threshold: u32,
    open_duration: Duration,
    inner: Mutex<BreakerInner>,
}

impl CircuitBreaker {
    pub fn new(failure_threshold: u32, open_duration: Duration) -> Self {
        Self {
            failure_threshold,
            open_duration,
            inner: Mutex::new(BreakerInner {
                state: BreakerState::Closed,
                failure_count: 0,
                last_failure_time: None,
            }),
        }
    }

    /// Decide whether an attempt may proceed, transitioning Open to
    /// HalfOpen when the open window has elapsed.
    pub fn check(&self) -> Decision {
        let mut inner = self.inner.lock().expect("breaker lock poisoned");
        match inner.state {
            BreakerState::Closed | BreakerState::HalfOpen => Decision::Allow,
            BreakerState::Open => {
                let elapsed = inner
                    .last_failure_time
                    .map(|at| at.elapsed())
                    .unwrap_or(Duration::MAX);
                if elapsed >= self.open_duration {
                    inner.state = BreakerState::HalfOpen;
                    info!("CONN | Circuit breaker half-open, allowing trial connect");
                    Decision::Trial
                } else {
                    Decision::Reject
                }
            }
        }
    }

    /// Whether an attempt made right now would be rejected.
    pub fn is_open(&self) -> bool {
        let inner = self.inner.lock().expect("breaker lock poisoned");
        inner.state == BreakerState::Open
            && inner
                .last_failure_time
                .map(|at| at.elapsed() < self.open_duration)
                .unwrap_or(false)
    }

    pub fn state(&self) -> BreakerState {
        self.inner.lock().expect("breaker lock poisoned").state
    }

    pub fn record_success(&self) {
        let mut inner = self.inner.lock().expect("breaker lock poisoned");
        if inner.state != BreakerState::Closed {
            info!("CONN | Circuit breaker closed");
        }
        inner.state = BreakerState::Closed;
        inner.failure_count = 0;
    }

    pub fn record_failure(&self) {
        let mut inner = self.inner.lock().expect("breaker lock poisoned");
        inner.failure_count += 1;
        inner.last_failure_time = Some(Instant::now());

        match inner.state {
            BreakerState::HalfOpen => {
                inner.state = BreakerState::Open;
                warn!("CONN | Half-open trial failed, circuit breaker open again");
            }
            BreakerState::Closed if inner.failure_count >= self.failure_threshold => {
                inner.state = BreakerState::Open;
                warn!(
                    "CONN | Circuit breaker open after {} consecutive failures",
                    inner.failure_count
                );
            }
            _ => {}
        }
    }
}

impl Default for CircuitBreaker {
    fn default() -> Self {
        Self::new(FAILURE_THRESHOLD, OPEN_DURATION)
    }
}
