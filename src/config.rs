//! Configuration for circuit breakers and routes.

use std::error::Error;
use std::marker::PhantomData;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::Duration;

use crate::breaker::{CircuitBreaker, FailureKinds};
use crate::error::ConfigError;
use crate::handler::{ErrorHandler, Handler};
use crate::hook::HookRegistry;
use crate::message::Content;
use crate::metrics::{MetricSink, NullMetricSink};
use crate::pool::WorkerPool;
use crate::provider::Provider;
use crate::route::Route;
use crate::translator::MessageTranslator;

/// Default number of consecutive failures that opens a breaker.
pub const DEFAULT_FAILURE_THRESHOLD: u32 = 5;

/// Default cool-down before an open breaker allows a probe.
pub const DEFAULT_RESET_TIMEOUT: Duration = Duration::from_secs(15);

/// Default route name.
pub const DEFAULT_ROUTE_NAME: &str = "default";

/// Builder for creating circuit breakers with custom configurations.
pub struct BreakerBuilder<M> {
    failure_threshold: u32,
    reset_timeout: Duration,
    kinds: FailureKinds,
    metric_sink: Arc<dyn MetricSink>,
    hook_registry: Arc<HookRegistry>,
    _message_type: PhantomData<fn() -> M>,
}

impl<M> Default for BreakerBuilder<M> {
    fn default() -> Self {
        Self::new()
    }
}

impl<M> BreakerBuilder<M> {
    /// Creates a new builder with default settings and no failure kinds.
    pub fn new() -> Self {
        Self {
            failure_threshold: DEFAULT_FAILURE_THRESHOLD,
            reset_timeout: DEFAULT_RESET_TIMEOUT,
            kinds: FailureKinds::default(),
            metric_sink: Arc::new(NullMetricSink),
            hook_registry: Arc::new(HookRegistry::new()),
            _message_type: PhantomData,
        }
    }

    /// Sets the number of consecutive failures that opens the circuit.
    pub fn failure_threshold(mut self, threshold: u32) -> Self {
        self.failure_threshold = threshold;
        self
    }

    /// Sets the cool-down before an open circuit allows a probe.
    pub fn reset_timeout(mut self, timeout: Duration) -> Self {
        self.reset_timeout = timeout;
        self
    }

    /// Treats handler errors of type `E` as circuit failures.
    pub fn trip_on<E>(mut self) -> Self
    where
        E: Error + 'static,
    {
        self.kinds.push(|error| error.is::<E>());
        self
    }

    /// Treats handler errors accepted by `predicate` as circuit failures.
    pub fn trip_when<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&(dyn Error + 'static)) -> bool + Send + Sync + 'static,
    {
        self.kinds.push(predicate);
        self
    }

    /// Treats every handler error as a circuit failure.
    pub fn trip_on_any(mut self) -> Self {
        self.kinds.push(|_| true);
        self
    }

    /// Sets a metric sink for the circuit breaker.
    pub fn metric_sink<S: MetricSink>(mut self, sink: S) -> Self {
        self.metric_sink = Arc::new(sink);
        self
    }

    /// Sets a hook registry for the circuit breaker.
    pub fn hooks(mut self, hooks: HookRegistry) -> Self {
        self.hook_registry = Arc::new(hooks);
        self
    }

    /// Builds the circuit breaker.
    pub fn build(self) -> Result<CircuitBreaker<M>, ConfigError> {
        if self.failure_threshold == 0 {
            return Err(ConfigError::ZeroThreshold);
        }

        Ok(CircuitBreaker::new(
            self.failure_threshold,
            self.reset_timeout,
            self.kinds,
            self.metric_sink,
            self.hook_registry,
        ))
    }
}

/// Builder binding a provider, handler and optional collaborators into a [`Route`].
pub struct RouteBuilder<M, R>
where
    M: Send + 'static,
{
    name: String,
    enabled: bool,
    provider: Option<Arc<dyn Provider<M>>>,
    translator: Option<Arc<dyn MessageTranslator<M>>>,
    handler: Option<Handler<M, R>>,
    error_handler: Option<ErrorHandler<M>>,
    circuit_breaker: Option<CircuitBreaker<M>>,
    worker_pool: Option<WorkerPool>,
    metric_sink: Arc<dyn MetricSink>,
}

impl<M, R> Default for RouteBuilder<M, R>
where
    M: Content,
    R: Send + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<M, R> RouteBuilder<M, R>
where
    M: Content,
    R: Send + 'static,
{
    /// Creates a builder for an enabled route named `default`.
    pub fn new() -> Self {
        Self {
            name: DEFAULT_ROUTE_NAME.to_string(),
            enabled: true,
            provider: None,
            translator: None,
            handler: None,
            error_handler: None,
            circuit_breaker: None,
            worker_pool: None,
            metric_sink: Arc::new(NullMetricSink),
        }
    }

    /// Sets the route name used in logs.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Sets whether the route starts enabled.
    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Binds the message provider. The caller may keep its own handle.
    pub fn provider<P>(mut self, provider: Arc<P>) -> Self
    where
        P: Provider<M> + 'static,
    {
        self.provider = Some(provider);
        self
    }

    /// Binds a message translator.
    pub fn translator<T>(mut self, translator: T) -> Self
    where
        T: MessageTranslator<M> + 'static,
    {
        self.translator = Some(Arc::new(translator));
        self
    }

    /// Binds the message handler.
    pub fn handler(mut self, handler: Handler<M, R>) -> Self {
        self.handler = Some(handler);
        self
    }

    /// Binds a custom error handler.
    pub fn error_handler(mut self, error_handler: ErrorHandler<M>) -> Self {
        self.error_handler = Some(error_handler);
        self
    }

    /// Binds a circuit breaker. Without one the route uses [`CircuitBreaker::stub`].
    pub fn circuit_breaker(mut self, breaker: CircuitBreaker<M>) -> Self {
        self.circuit_breaker = Some(breaker);
        self
    }

    /// Sets the pool for blocking handlers. Defaults to [`WorkerPool::shared`].
    pub fn worker_pool(mut self, pool: WorkerPool) -> Self {
        self.worker_pool = Some(pool);
        self
    }

    /// Sets a metric sink for delivery and fetch events.
    pub fn metric_sink<S: MetricSink>(mut self, sink: S) -> Self {
        self.metric_sink = Arc::new(sink);
        self
    }

    /// Validates the configuration and builds the route.
    pub fn build(self) -> Result<Route<M, R>, ConfigError> {
        if self.name.trim().is_empty() {
            return Err(ConfigError::EmptyName);
        }
        let provider = self.provider.ok_or(ConfigError::MissingProvider)?;
        let handler = self.handler.ok_or(ConfigError::MissingHandler)?;

        Ok(Route {
            name: self.name,
            enabled: AtomicBool::new(self.enabled),
            stopped: AtomicBool::new(false),
            provider,
            translator: self.translator,
            handler,
            error_handler: self.error_handler,
            circuit_breaker: self.circuit_breaker.unwrap_or_else(CircuitBreaker::stub),
            worker_pool: self.worker_pool.unwrap_or_else(WorkerPool::shared),
            metric_sink: self.metric_sink,
        })
    }
}
