//! Core circuit breaker implementation.

use std::error::Error;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use smallvec::SmallVec;
use tokio::time::Instant;
use tracing::debug;

use crate::hook::HookRegistry;
use crate::metrics::{MetricSink, NullMetricSink};
use crate::state::{FailureRecord, State};

type Matcher = Arc<dyn Fn(&(dyn Error + 'static)) -> bool + Send + Sync + 'static>;

/// Set of error kinds a breaker treats as circuit-relevant.
#[derive(Clone, Default)]
pub(crate) struct FailureKinds {
    matchers: SmallVec<[Matcher; 4]>,
}

impl FailureKinds {
    pub(crate) fn push<F>(&mut self, matcher: F)
    where
        F: Fn(&(dyn Error + 'static)) -> bool + Send + Sync + 'static,
    {
        self.matchers.push(Arc::new(matcher));
    }

    pub(crate) fn matches(&self, error: &(dyn Error + 'static)) -> bool {
        self.matchers.iter().any(|matcher| matcher(error))
    }

    pub(crate) fn len(&self) -> usize {
        self.matchers.len()
    }
}

/// Per-route failure tracker with closed, open and half-open health.
///
/// The breaker counts consecutive matched failures. Once `failure_threshold`
/// is reached it reports [`State::Open`] until `reset_timeout` has passed
/// since the last recorded failure, then [`State::HalfOpen`]. Starting a
/// probe with [`begin_probe`](Self::begin_probe) hands back the message that
/// caused the most recent failure and restarts the timeout, so at most one
/// replay happens per window.
///
/// State lives behind a short-lived lock that is never held across an await
/// point or while hooks run.
pub struct CircuitBreaker<M> {
    record: Mutex<FailureRecord<M>>,
    armed: bool,
    failure_threshold: u32,
    reset_timeout: Duration,
    kinds: FailureKinds,
    metric_sink: Arc<dyn MetricSink>,
    hooks: Arc<HookRegistry>,
}

impl<M> CircuitBreaker<M> {
    pub(crate) fn new(
        failure_threshold: u32,
        reset_timeout: Duration,
        kinds: FailureKinds,
        metric_sink: Arc<dyn MetricSink>,
        hooks: Arc<HookRegistry>,
    ) -> Self {
        Self {
            record: Mutex::new(FailureRecord::new()),
            armed: true,
            failure_threshold,
            reset_timeout,
            kinds,
            metric_sink,
            hooks,
        }
    }

    /// Creates a new builder for customizing a circuit breaker.
    pub fn builder() -> crate::config::BreakerBuilder<M> {
        crate::config::BreakerBuilder::new()
    }

    /// Creates a breaker that never matches, never records and is always closed.
    pub fn stub() -> Self {
        Self {
            record: Mutex::new(FailureRecord::new()),
            armed: false,
            failure_threshold: 1,
            reset_timeout: Duration::ZERO,
            kinds: FailureKinds::default(),
            metric_sink: Arc::new(NullMetricSink),
            hooks: Arc::new(HookRegistry::new()),
        }
    }

    /// Returns true for the no-op breaker.
    pub fn is_stub(&self) -> bool {
        !self.armed
    }

    /// Current health. Does not modify the breaker.
    pub fn status(&self) -> State {
        if !self.armed {
            return State::Closed;
        }

        self.record
            .lock()
            .state(self.failure_threshold, self.reset_timeout, Instant::now())
    }

    /// Returns true if `error` is one of the configured failure kinds.
    pub fn matches(&self, error: &(dyn Error + 'static)) -> bool {
        self.armed && self.kinds.matches(error)
    }

    /// Records a matched failure caused by `message`.
    pub fn open(&self, message: M) {
        if !self.armed {
            return;
        }

        let (before, after, failure_count) = {
            let mut record = self.record.lock();
            let now = Instant::now();
            let before = record.observed_state(self.failure_threshold, self.reset_timeout, now);
            record.record_failure(message, now);
            let after = record.state(self.failure_threshold, self.reset_timeout, now);
            (before, after, record.failure_count)
        };

        debug!(failure_count, state = %after, "circuit failure recorded");
        self.hooks.execute_failure_hook();

        if before != after {
            self.metric_sink.record_state_transition(before, after);
            self.hooks.execute_state_transition_hook(after);
        }
    }

    /// Clears the failure record. Idempotent.
    ///
    /// The reset hook fires whenever failures were cleared, including ones
    /// still below the threshold.
    pub fn close(&self) {
        if !self.armed {
            return;
        }

        let (before, failure_count) = {
            let mut record = self.record.lock();
            let before =
                record.observed_state(self.failure_threshold, self.reset_timeout, Instant::now());
            let failure_count = record.failure_count;
            record.clear();
            (before, failure_count)
        };

        if failure_count == 0 {
            return;
        }

        debug!(from = %before, failure_count, "circuit closed");
        if before != State::Closed {
            self.metric_sink.record_state_transition(before, State::Closed);
        }
        self.hooks.execute_state_transition_hook(State::Closed);
    }

    /// Number of consecutive failures recorded since the last close.
    pub fn failure_count(&self) -> u32 {
        self.record.lock().failure_count
    }

    /// Time since the last recorded failure, if any.
    pub fn last_failure_elapsed(&self) -> Option<Duration> {
        self.record.lock().last_failure.map(|at| at.elapsed())
    }

    /// Failures needed to leave the closed state.
    pub fn failure_threshold(&self) -> u32 {
        self.failure_threshold
    }

    /// Cool-down before an open breaker allows a probe.
    pub fn reset_timeout(&self) -> Duration {
        self.reset_timeout
    }
}

impl<M: Clone> CircuitBreaker<M> {
    /// Starts a half-open probe window.
    ///
    /// Returns the stored failing message and restarts the reset timeout when
    /// the breaker is half-open; returns `None` in every other state.
    pub fn begin_probe(&self) -> Option<M> {
        if !self.armed {
            return None;
        }

        let (message, reprobe) = {
            let mut record = self.record.lock();
            let now = Instant::now();
            if record.state(self.failure_threshold, self.reset_timeout, now) != State::HalfOpen {
                return None;
            }
            let reprobe = record.probing;
            record.begin_probe(now);
            (record.message.clone(), reprobe)
        };

        debug!(reprobe, "circuit half-open, replaying stored message");
        self.metric_sink.record_probe();
        // An unanswered replay leaves the breaker half-open
        if !reprobe {
            self.metric_sink
                .record_state_transition(State::Open, State::HalfOpen);
        }
        self.hooks.execute_state_transition_hook(State::HalfOpen);

        message
    }

    /// The message associated with the most recent failure.
    pub fn stored_message(&self) -> Option<M> {
        self.record.lock().message.clone()
    }
}

impl<M> fmt::Debug for CircuitBreaker<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let record = self.record.lock();
        let now = Instant::now();
        let state = if self.armed {
            record.state(self.failure_threshold, self.reset_timeout, now)
        } else {
            State::Closed
        };

        f.debug_struct("CircuitBreaker")
            .field("state", &state)
            .field("failure_count", &record.failure_count)
            .field(
                "last_failure_delta",
                &record.last_failure.map(|at| now.saturating_duration_since(at)),
            )
            .field("failure_kinds", &self.kinds.len())
            .field("stub", &!self.armed)
            .finish()
    }
}
