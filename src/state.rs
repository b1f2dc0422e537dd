//! Circuit breaker health states and failure bookkeeping.

use std::fmt;
use std::time::Duration;

use tokio::time::Instant;

/// Health signal derived from a breaker's failure record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum State {
    /// Fewer failures than the threshold; deliveries and fetches proceed normally.
    Closed,

    /// Threshold reached and still cooling down; nothing is fetched.
    Open,

    /// Cool-down elapsed; the stored failing message may be replayed once.
    HalfOpen,
}

impl State {
    /// Label used in logs and metrics.
    pub fn as_str(&self) -> &'static str {
        match self {
            State::Closed => "closed",
            State::Open => "open",
            State::HalfOpen => "half-open",
        }
    }
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Consecutive failure record kept by a breaker.
///
/// `message` is present exactly when `failure_count > 0`. `probing` is set
/// while a replayed message is outstanding and cleared by the next failure
/// or close.
#[derive(Debug)]
pub(crate) struct FailureRecord<M> {
    pub(crate) failure_count: u32,
    pub(crate) last_failure: Option<Instant>,
    pub(crate) message: Option<M>,
    pub(crate) probing: bool,
}

impl<M> FailureRecord<M> {
    pub(crate) fn new() -> Self {
        Self {
            failure_count: 0,
            last_failure: None,
            message: None,
            probing: false,
        }
    }

    /// Derives health without touching the record.
    pub(crate) fn state(&self, threshold: u32, reset_timeout: Duration, now: Instant) -> State {
        if self.failure_count < threshold {
            return State::Closed;
        }

        match self.last_failure {
            Some(at) if now.saturating_duration_since(at) > reset_timeout => State::HalfOpen,
            _ => State::Open,
        }
    }

    /// Health as seen by transition bookkeeping: an outstanding probe counts
    /// as half-open even though its window has been restarted.
    pub(crate) fn observed_state(
        &self,
        threshold: u32,
        reset_timeout: Duration,
        now: Instant,
    ) -> State {
        if self.probing {
            State::HalfOpen
        } else {
            self.state(threshold, reset_timeout, now)
        }
    }

    pub(crate) fn begin_probe(&mut self, now: Instant) {
        self.last_failure = Some(now);
        self.probing = true;
    }

    pub(crate) fn record_failure(&mut self, message: M, now: Instant) {
        self.failure_count = self.failure_count.saturating_add(1);
        self.last_failure = Some(now);
        self.message = Some(message);
        self.probing = false;
    }

    pub(crate) fn clear(&mut self) {
        self.failure_count = 0;
        self.last_failure = None;
        self.message = None;
        self.probing = false;
    }
}
