//! Route: provider, translator, handler and circuit breaker bound together.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::future::join_all;
use tracing::{debug, info, warn};

use crate::breaker::CircuitBreaker;
use crate::config::RouteBuilder;
use crate::error::{RouteError, RouteResult, TranslationError};
use crate::handler::{ErrorHandler, Handler};
use crate::message::{Content, Delivery, Message, Metadata};
use crate::metrics::{DeliveryOutcome, MetricSink};
use crate::pool::WorkerPool;
use crate::provider::Provider;
use crate::state::State;
use crate::translator::MessageTranslator;

/// Binds one provider, an optional translator, one handler, an optional
/// error handler and one circuit breaker.
///
/// A scheduler drives a route by calling [`fetch_messages`](Self::fetch_messages)
/// and then [`deliver`](Self::deliver) for each message, or by calling
/// [`dispatch`](Self::dispatch) which does both and acknowledges with the
/// provider.
pub struct Route<M, R = bool>
where
    M: Send + 'static,
{
    pub(crate) name: String,
    pub(crate) enabled: AtomicBool,
    pub(crate) stopped: AtomicBool,
    pub(crate) provider: Arc<dyn Provider<M>>,
    pub(crate) translator: Option<Arc<dyn MessageTranslator<M>>>,
    pub(crate) handler: Handler<M, R>,
    pub(crate) error_handler: Option<ErrorHandler<M>>,
    pub(crate) circuit_breaker: CircuitBreaker<M>,
    pub(crate) worker_pool: WorkerPool,
    pub(crate) metric_sink: Arc<dyn MetricSink>,
}

impl<M, R> Route<M, R>
where
    M: Content,
    R: Send + 'static,
{
    /// Creates a new builder for a route.
    pub fn builder() -> RouteBuilder<M, R> {
        RouteBuilder::new()
    }

    /// Route name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns false once the route has been stopped.
    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }

    /// The route's circuit breaker (a stub when none was configured).
    pub fn circuit_breaker(&self) -> &CircuitBreaker<M> {
        &self.circuit_breaker
    }

    /// The bound provider.
    pub fn provider(&self) -> &Arc<dyn Provider<M>> {
        &self.provider
    }

    /// The bound handler.
    pub fn handler(&self) -> &Handler<M, R> {
        &self.handler
    }

    /// The pool blocking handlers run on.
    pub fn worker_pool(&self) -> &WorkerPool {
        &self.worker_pool
    }

    /// Translates a raw message into handler content and metadata.
    ///
    /// Without a translator the raw message is the content and metadata is
    /// empty. Blank translated content is an error.
    pub fn apply_translation(&self, raw: M) -> RouteResult<Message<M>> {
        let Some(translator) = &self.translator else {
            return Ok(Message::new(raw));
        };

        let translated = translator
            .translate(raw)
            .map_err(|source| TranslationError::Failed {
                route: self.name.clone(),
                source,
            })?;

        if translated.content.is_blank() {
            return Err(TranslationError::EmptyContent {
                route: self.name.clone(),
            }
            .into());
        }

        let mut metadata = Metadata::new();
        metadata.extend(translated.metadata);

        Ok(Message {
            content: translated.content,
            metadata,
        })
    }

    /// Translates `raw` and runs the handler once. Errors pass through unchanged.
    pub async fn run_handler(&self, raw: M) -> RouteResult<R> {
        let message = self.apply_translation(raw)?;
        info!(route = %self.name, payload = ?message.content, "delivering message");

        if self.handler.is_blocking() {
            debug!(route = %self.name, "handler will run on the worker pool");
        }

        self.handler
            .call(&self.worker_pool, message.content, message.metadata)
            .await
    }

    /// Delivers one raw message to the handler.
    ///
    /// Matched handler failures are recorded on the breaker and retried
    /// immediately while the breaker stays closed; once it opens the failure
    /// is returned. Deletion and cancellation signals, translation errors and
    /// unmatched failures are returned without touching the breaker. A
    /// successful delivery closes the breaker.
    pub async fn deliver(&self, message: M) -> RouteResult<Delivery<R>> {
        let max_attempts = self.circuit_breaker.failure_threshold();
        let mut attempt: u32 = 0;

        loop {
            if !self.is_enabled() {
                warn!(route = %self.name, payload = ?message, "ignoring message, route is not enabled");
                self.metric_sink
                    .record_delivery(DeliveryOutcome::Disabled, Duration::ZERO);
                return Ok(Delivery::Disabled);
            }

            attempt += 1;
            let started = Instant::now();

            let error = match self.run_handler(message.clone()).await {
                Ok(result) => {
                    self.metric_sink
                        .record_delivery(DeliveryOutcome::Delivered, started.elapsed());
                    self.circuit_breaker.close();
                    return Ok(Delivery::Delivered(result));
                }
                Err(error) => error,
            };

            let matched = match &error {
                RouteError::Handler(source) => self.circuit_breaker.matches(&**source),
                _ => false,
            };

            if !matched {
                let outcome = if error.is_control_signal() {
                    DeliveryOutcome::Signalled
                } else {
                    DeliveryOutcome::Failed
                };
                self.metric_sink.record_delivery(outcome, started.elapsed());
                return Err(error);
            }

            self.circuit_breaker.open(message.clone());
            let failure_count = self.circuit_breaker.failure_count();

            if self.circuit_breaker.status() == State::Closed && attempt < max_attempts {
                debug!(route = %self.name, attempt, failure_count, error = %error, "retrying delivery");
                self.metric_sink
                    .record_delivery(DeliveryOutcome::Retried, started.elapsed());
                continue;
            }

            debug!(route = %self.name, failure_count, "circuit open");
            self.metric_sink
                .record_delivery(DeliveryOutcome::Failed, started.elapsed());
            return Err(error);
        }
    }

    /// Runs the custom error handler, or returns `false` when none is configured.
    pub async fn error_handler(&self, error: RouteError, message: M) -> RouteResult<bool> {
        info!(route = %self.name, payload = ?message, error = %error, "error handler process originated by message");

        match &self.error_handler {
            Some(handler) => handler.call(&self.worker_pool, error, message).await,
            None => Ok(false),
        }
    }

    /// Fetches candidate messages, gated by the breaker.
    ///
    /// Open: nothing. Half-open: the stored failing message, once per
    /// reset window. Closed: whatever the provider returns.
    pub async fn fetch_messages(&self) -> RouteResult<Vec<M>> {
        let messages = match self.circuit_breaker.status() {
            State::Open => {
                debug!(route = %self.name, "circuit open, skipping fetch");
                Vec::new()
            }
            State::HalfOpen => {
                debug!(route = %self.name, "circuit half-open");
                self.circuit_breaker.begin_probe().into_iter().collect()
            }
            State::Closed => self
                .provider
                .fetch_messages()
                .await
                .map_err(RouteError::Provider)?,
        };

        self.metric_sink.record_fetch(messages.len());
        Ok(messages)
    }

    /// Disables the route and stops the provider and handler object. Idempotent.
    pub fn stop(&self) {
        self.enabled.store(false, Ordering::SeqCst);
        if self.stopped.swap(true, Ordering::SeqCst) {
            return;
        }

        info!(route = %self.name, "stopping route");
        self.provider.stop();
        self.handler.stop();
    }
}

impl<M, R> Route<M, R>
where
    M: Content,
    R: Into<bool> + Send + 'static,
{
    /// Delivers one message and acknowledges it with the provider.
    ///
    /// The handler result decides acknowledgement; a deletion signal always
    /// acknowledges; other failures go to [`error_handler`](Self::error_handler).
    /// Cancellation is returned before any acknowledgement.
    pub async fn process_message(&self, message: M) -> RouteResult<bool> {
        let acknowledge = match self.deliver(message.clone()).await {
            Ok(Delivery::Delivered(result)) => result.into(),
            Ok(Delivery::Disabled) => false,
            Err(RouteError::DeleteMessage) => {
                debug!(route = %self.name, "handler requested message deletion");
                true
            }
            Err(RouteError::Cancelled) => return Err(RouteError::Cancelled),
            Err(error) => self.error_handler(error, message.clone()).await?,
        };

        if acknowledge {
            self.provider
                .confirm_message(message)
                .await
                .map_err(RouteError::Provider)?;
        } else {
            self.provider
                .message_not_processed(message)
                .await
                .map_err(RouteError::Provider)?;
        }

        Ok(acknowledge)
    }

    /// Runs one fetch cycle and processes every fetched message concurrently
    /// on the calling task.
    ///
    /// Returns how many messages were acknowledged, or the first error once
    /// all messages have been processed.
    pub async fn dispatch(&self) -> RouteResult<usize> {
        let messages = self.fetch_messages().await?;
        if messages.is_empty() {
            return Ok(0);
        }

        debug!(route = %self.name, count = messages.len(), "dispatching messages");
        let outcomes = join_all(messages.into_iter().map(|m| self.process_message(m))).await;

        let mut acknowledged = 0;
        let mut first_error = None;
        for outcome in outcomes {
            match outcome {
                Ok(true) => acknowledged += 1,
                Ok(false) => {}
                Err(error) if first_error.is_none() => first_error = Some(error),
                Err(error) => warn!(route = %self.name, error = %error, "message processing failed"),
            }
        }

        match first_error {
            Some(error) => Err(error),
            None => Ok(acknowledged),
        }
    }
}

impl<M, R> fmt::Display for Route<M, R>
where
    M: Send + 'static,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "<Route(name={} enabled={} handler={:?})>",
            self.name,
            self.enabled.load(Ordering::SeqCst),
            self.handler
        )
    }
}

impl<M, R> fmt::Debug for Route<M, R>
where
    M: Send + 'static,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Route")
            .field("name", &self.name)
            .field("enabled", &self.enabled.load(Ordering::SeqCst))
            .field("translator", &self.translator.is_some())
            .field("handler", &self.handler)
            .field("error_handler", &self.error_handler)
            .field("circuit_breaker", &self.circuit_breaker)
            .field("worker_pool", &self.worker_pool)
            .finish()
    }
}
