use proptest::prelude::*;
use parking_lot::Mutex;
use routebreaker::{CircuitBreaker, ConfigError, DeliveryOutcome, HookRegistry, MetricSink, State};
use std::error::Error;
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug)]
struct Timeout;

impl fmt::Display for Timeout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Timed out")
    }
}

impl Error for Timeout {}

#[derive(Debug)]
struct Rejected(u16);

impl fmt::Display for Rejected {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Rejected with status {}", self.0)
    }
}

impl Error for Rejected {}

// Collects breaker transitions as "from->to" and replays as "replay"
#[derive(Clone, Default)]
struct TransitionLog(Arc<Mutex<Vec<String>>>);

impl TransitionLog {
    fn take(&self) -> Vec<String> {
        std::mem::take(&mut *self.0.lock())
    }
}

impl MetricSink for TransitionLog {
    fn record_state_transition(&self, from: State, to: State) {
        self.0.lock().push(format!("{}->{}", from, to));
    }

    fn record_delivery(&self, _outcome: DeliveryOutcome, _duration: Duration) {}

    fn record_probe(&self) {
        self.0.lock().push("replay".to_string());
    }

    fn record_fetch(&self, _count: usize) {}
}

fn counting_hooks() -> (HookRegistry, Arc<AtomicUsize>, Arc<AtomicUsize>) {
    let trips = Arc::new(AtomicUsize::new(0));
    let resets = Arc::new(AtomicUsize::new(0));
    let hooks = HookRegistry::new();
    let counter = Arc::clone(&trips);
    hooks.set_on_trip(move || {
        counter.fetch_add(1, Ordering::SeqCst);
    });
    let counter = Arc::clone(&resets);
    hooks.set_on_reset(move || {
        counter.fetch_add(1, Ordering::SeqCst);
    });
    (hooks, trips, resets)
}

fn breaker(threshold: u32, reset_timeout: Duration) -> CircuitBreaker<u32> {
    CircuitBreaker::builder()
        .failure_threshold(threshold)
        .reset_timeout(reset_timeout)
        .trip_on::<Timeout>()
        .build()
        .unwrap()
}

proptest! {
    #[test]
    fn threshold_failures_open_the_circuit(threshold in 1u32..32) {
        let breaker = breaker(threshold, Duration::from_secs(3600));

        for message in 0..threshold - 1 {
            breaker.open(message);
            prop_assert_eq!(breaker.status(), State::Closed);
        }

        breaker.open(threshold);
        prop_assert_eq!(breaker.status(), State::Open);
        prop_assert_eq!(breaker.failure_count(), threshold);
        prop_assert_eq!(breaker.stored_message(), Some(threshold));
    }

    #[test]
    fn close_always_resets(threshold in 1u32..16, failures in 0u32..48) {
        let breaker = breaker(threshold, Duration::from_secs(3600));
        for message in 0..failures {
            breaker.open(message);
        }

        breaker.close();
        prop_assert_eq!(breaker.failure_count(), 0);
        prop_assert_eq!(breaker.stored_message(), None);
        prop_assert!(breaker.last_failure_elapsed().is_none());
        prop_assert_eq!(breaker.status(), State::Closed);
    }

    #[test]
    fn stored_message_tracks_failure_count(ops in proptest::collection::vec(any::<Option<u32>>(), 0..64)) {
        let breaker = breaker(4, Duration::from_secs(3600));
        for op in ops {
            match op {
                Some(message) => breaker.open(message),
                None => breaker.close(),
            }
            prop_assert_eq!(breaker.stored_message().is_some(), breaker.failure_count() > 0);
        }
    }
}

#[test]
fn test_breaker_defaults() {
    let breaker = CircuitBreaker::<u32>::builder().build().unwrap();

    assert_eq!(breaker.failure_threshold(), 5);
    assert_eq!(breaker.reset_timeout(), Duration::from_secs(15));
    assert_eq!(breaker.status(), State::Closed);
    assert_eq!(breaker.failure_count(), 0);
    assert!(breaker.stored_message().is_none());
    assert!(!breaker.is_stub());

    // No failure kinds configured: nothing matches
    assert!(!breaker.matches(&Timeout));
}

#[test]
fn test_zero_threshold_is_rejected() {
    let result = CircuitBreaker::<u32>::builder().failure_threshold(0).build();
    assert_eq!(result.unwrap_err(), ConfigError::ZeroThreshold);
}

#[test]
fn test_failure_kind_matching() {
    let breaker = CircuitBreaker::<u32>::builder()
        .trip_on::<Timeout>()
        .trip_when(|error| matches!(error.downcast_ref::<Rejected>(), Some(Rejected(status)) if *status >= 500))
        .build()
        .unwrap();

    assert!(breaker.matches(&Timeout));
    assert!(breaker.matches(&Rejected(503)));
    assert!(!breaker.matches(&Rejected(404)));

    let io = std::io::Error::new(std::io::ErrorKind::Other, "disk");
    assert!(!breaker.matches(&io));

    let any = CircuitBreaker::<u32>::builder().trip_on_any().build().unwrap();
    assert!(any.matches(&io));
}

#[test]
fn test_stub_breaker_is_inert() {
    let breaker = CircuitBreaker::<u32>::stub();

    assert!(breaker.is_stub());
    assert!(!breaker.matches(&Timeout));

    for message in 0..10 {
        breaker.open(message);
    }
    assert_eq!(breaker.failure_count(), 0);
    assert_eq!(breaker.status(), State::Closed);
    assert!(breaker.begin_probe().is_none());

    breaker.close();
    assert_eq!(breaker.status(), State::Closed);
}

#[tokio::test(start_paused = true)]
async fn test_status_is_pure_and_probe_refreshes_window() {
    let breaker = breaker(2, Duration::from_secs(1));
    breaker.open(1);
    breaker.open(2);
    assert_eq!(breaker.status(), State::Open);
    assert!(breaker.begin_probe().is_none());

    // Exactly at the timeout the circuit is still open
    tokio::time::advance(Duration::from_secs(1)).await;
    assert_eq!(breaker.status(), State::Open);

    tokio::time::advance(Duration::from_millis(1)).await;
    assert_eq!(breaker.status(), State::HalfOpen);
    assert_eq!(breaker.status(), State::HalfOpen);

    assert_eq!(breaker.begin_probe(), Some(2));
    assert_eq!(breaker.status(), State::Open);
    assert!(breaker.begin_probe().is_none());
    assert_eq!(breaker.failure_count(), 2);

    tokio::time::advance(Duration::from_millis(1001)).await;
    assert_eq!(breaker.begin_probe(), Some(2));
}

#[tokio::test(start_paused = true)]
async fn test_hooks_follow_transitions() {
    let trips = Arc::new(AtomicUsize::new(0));
    let probes = Arc::new(AtomicUsize::new(0));
    let resets = Arc::new(AtomicUsize::new(0));
    let failures = Arc::new(AtomicUsize::new(0));

    let hooks = HookRegistry::new();
    let counter = Arc::clone(&trips);
    hooks.set_on_trip(move || {
        counter.fetch_add(1, Ordering::SeqCst);
    });
    let counter = Arc::clone(&probes);
    hooks.set_on_probe(move || {
        counter.fetch_add(1, Ordering::SeqCst);
    });
    let counter = Arc::clone(&resets);
    hooks.set_on_reset(move || {
        counter.fetch_add(1, Ordering::SeqCst);
    });
    let counter = Arc::clone(&failures);
    hooks.set_on_failure(move || {
        counter.fetch_add(1, Ordering::SeqCst);
    });

    let breaker = CircuitBreaker::<u32>::builder()
        .failure_threshold(2)
        .reset_timeout(Duration::from_secs(1))
        .trip_on::<Timeout>()
        .hooks(hooks)
        .build()
        .unwrap();

    breaker.open(1);
    assert_eq!(trips.load(Ordering::SeqCst), 0);
    breaker.open(1);
    breaker.open(1);
    assert_eq!(trips.load(Ordering::SeqCst), 1);
    assert_eq!(failures.load(Ordering::SeqCst), 3);

    tokio::time::advance(Duration::from_secs(2)).await;
    assert_eq!(breaker.begin_probe(), Some(1));
    assert_eq!(probes.load(Ordering::SeqCst), 1);

    breaker.close();
    breaker.close();
    assert_eq!(resets.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn test_failed_replay_reports_reopen() {
    let log = TransitionLog::default();
    let (hooks, trips, resets) = counting_hooks();
    let breaker = CircuitBreaker::<u32>::builder()
        .failure_threshold(1)
        .reset_timeout(Duration::from_secs(1))
        .trip_on::<Timeout>()
        .metric_sink(log.clone())
        .hooks(hooks)
        .build()
        .unwrap();

    breaker.open(1);
    assert_eq!(log.take(), vec!["closed->open"]);
    assert_eq!(trips.load(Ordering::SeqCst), 1);

    tokio::time::advance(Duration::from_millis(1001)).await;
    assert_eq!(breaker.begin_probe(), Some(1));
    assert_eq!(log.take(), vec!["replay", "open->half-open"]);

    // The replayed message fails again
    breaker.open(1);
    assert_eq!(log.take(), vec!["half-open->open"]);
    assert_eq!(trips.load(Ordering::SeqCst), 2);
    assert_eq!(breaker.status(), State::Open);

    tokio::time::advance(Duration::from_millis(1001)).await;
    assert_eq!(breaker.begin_probe(), Some(1));
    assert_eq!(log.take(), vec!["replay", "open->half-open"]);

    breaker.close();
    assert_eq!(log.take(), vec!["half-open->closed"]);
    assert_eq!(resets.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn test_unanswered_replay_stays_half_open() {
    let log = TransitionLog::default();
    let breaker = CircuitBreaker::<u32>::builder()
        .failure_threshold(1)
        .reset_timeout(Duration::from_secs(1))
        .metric_sink(log.clone())
        .build()
        .unwrap();

    breaker.open(7);
    tokio::time::advance(Duration::from_millis(1001)).await;
    assert_eq!(breaker.begin_probe(), Some(7));

    // The replay was never delivered; the next window replays again
    tokio::time::advance(Duration::from_millis(1001)).await;
    assert_eq!(breaker.begin_probe(), Some(7));
    assert_eq!(
        log.take(),
        vec!["closed->open", "replay", "open->half-open", "replay"]
    );
}

#[test]
fn test_reset_hook_fires_below_threshold() {
    let log = TransitionLog::default();
    let (hooks, trips, resets) = counting_hooks();
    let breaker = CircuitBreaker::<u32>::builder()
        .failure_threshold(5)
        .metric_sink(log.clone())
        .hooks(hooks)
        .build()
        .unwrap();

    breaker.open(1);
    breaker.open(2);
    breaker.close();
    assert_eq!(resets.load(Ordering::SeqCst), 1);
    assert_eq!(trips.load(Ordering::SeqCst), 0);
    // Closed throughout, so no transition is reported
    assert!(log.take().is_empty());

    // Nothing to clear
    breaker.close();
    assert_eq!(resets.load(Ordering::SeqCst), 1);
}

#[test]
fn test_debug_output_reports_state() {
    let breaker = breaker(1, Duration::from_secs(60));
    breaker.open(7);

    let rendered = format!("{:?}", breaker);
    assert!(rendered.contains("state: Open"));
    assert!(rendered.contains("failure_count: 1"));
}
