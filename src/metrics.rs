//! Metric sinks for route and breaker events.

use std::fmt;
use std::time::Duration;

use crate::state::State;

/// How a single delivery attempt ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeliveryOutcome {
    /// The handler returned a result.
    Delivered,
    /// A matched failure below the threshold; the message is retried inline.
    Retried,
    /// The attempt failed and the error was surfaced to the caller.
    Failed,
    /// The route was stopped and the handler was not invoked.
    Disabled,
    /// The handler asked for deletion or cancellation instead of returning.
    Signalled,
}

impl DeliveryOutcome {
    /// Label used in logs and metrics.
    pub fn as_str(&self) -> &'static str {
        match self {
            DeliveryOutcome::Delivered => "delivered",
            DeliveryOutcome::Retried => "retried",
            DeliveryOutcome::Failed => "failed",
            DeliveryOutcome::Disabled => "disabled",
            DeliveryOutcome::Signalled => "signalled",
        }
    }
}

impl fmt::Display for DeliveryOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Trait for metrics sinks that can receive route and breaker events.
pub trait MetricSink: Send + Sync + 'static {
    /// Records a breaker state transition.
    fn record_state_transition(&self, from: State, to: State);

    /// Records the outcome of one delivery attempt.
    fn record_delivery(&self, outcome: DeliveryOutcome, duration: Duration);

    /// Records a half-open probe replay.
    fn record_probe(&self);

    /// Records the number of messages returned by a fetch.
    fn record_fetch(&self, count: usize);
}

/// A null metrics sink that discards all events.
pub struct NullMetricSink;

impl MetricSink for NullMetricSink {
    fn record_state_transition(&self, _from: State, _to: State) {}
    fn record_delivery(&self, _outcome: DeliveryOutcome, _duration: Duration) {}
    fn record_probe(&self) {}
    fn record_fetch(&self, _count: usize) {}
}

#[cfg(feature = "prometheus")]
pub use prometheus_sink::PrometheusSink;

#[cfg(feature = "prometheus")]
mod prometheus_sink {
    use std::time::Duration;

    use prometheus_client::encoding::EncodeLabelSet;
    use prometheus_client::metrics::counter::Counter;
    use prometheus_client::metrics::family::Family;
    use prometheus_client::metrics::histogram::{exponential_buckets, Histogram};
    use prometheus_client::registry::Registry;

    use super::{DeliveryOutcome, MetricSink};
    use crate::state::State;

    #[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
    struct TransitionLabels {
        from: String,
        to: String,
    }

    #[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
    struct OutcomeLabels {
        outcome: String,
    }

    /// Metric sink backed by `prometheus-client` collectors.
    ///
    /// Clones share collectors, so one registration can serve a route and
    /// its breaker.
    #[derive(Clone)]
    #[cfg_attr(docsrs, doc(cfg(feature = "prometheus")))]
    pub struct PrometheusSink {
        transitions: Family<TransitionLabels, Counter>,
        deliveries: Family<OutcomeLabels, Counter>,
        delivery_seconds: Histogram,
        probes: Counter,
        fetched: Counter,
    }

    impl PrometheusSink {
        /// Creates the collectors and registers them under `registry`.
        pub fn register(registry: &mut Registry) -> Self {
            let sink = Self {
                transitions: Family::default(),
                deliveries: Family::default(),
                delivery_seconds: Histogram::new(exponential_buckets(0.001, 2.0, 14)),
                probes: Counter::default(),
                fetched: Counter::default(),
            };

            registry.register(
                "route_breaker_transitions",
                "Circuit breaker state transitions",
                sink.transitions.clone(),
            );
            registry.register(
                "route_deliveries",
                "Delivery attempts by outcome",
                sink.deliveries.clone(),
            );
            registry.register(
                "route_delivery_seconds",
                "Delivery attempt latency",
                sink.delivery_seconds.clone(),
            );
            registry.register(
                "route_probes",
                "Half-open probe replays",
                sink.probes.clone(),
            );
            registry.register(
                "route_fetched_messages",
                "Messages returned by fetches",
                sink.fetched.clone(),
            );

            sink
        }
    }

    impl MetricSink for PrometheusSink {
        fn record_state_transition(&self, from: State, to: State) {
            self.transitions
                .get_or_create(&TransitionLabels {
                    from: from.as_str().to_string(),
                    to: to.as_str().to_string(),
                })
                .inc();
        }

        fn record_delivery(&self, outcome: DeliveryOutcome, duration: Duration) {
            self.deliveries
                .get_or_create(&OutcomeLabels {
                    outcome: outcome.as_str().to_string(),
                })
                .inc();
            self.delivery_seconds.observe(duration.as_secs_f64());
        }

        fn record_probe(&self) {
            self.probes.inc();
        }

        fn record_fetch(&self, count: usize) {
            self.fetched.inc_by(count as u64);
        }
    }
}
