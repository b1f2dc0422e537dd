//! Error types for routes, handlers and construction.

use thiserror::Error;

/// Boxed error type carried through handler, provider and translator seams.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Result type for route operations.
pub type RouteResult<T> = Result<T, RouteError>;

/// Outcome a handler may report instead of a value.
#[derive(Debug, Error)]
pub enum HandlerError {
    /// The message should be acknowledged and dropped without further processing.
    #[error("handler requested message deletion")]
    DeleteMessage,

    /// The handler observed a cancellation request.
    #[error("handler was cancelled")]
    Cancelled,

    /// The handler failed.
    #[error(transparent)]
    Failed(BoxError),
}

impl HandlerError {
    /// Wraps any error as a handler failure.
    pub fn failed<E>(error: E) -> Self
    where
        E: Into<BoxError>,
    {
        HandlerError::Failed(error.into())
    }
}

/// Failure to turn a raw message into handler content.
#[derive(Debug, Error)]
pub enum TranslationError {
    /// The translator itself raised.
    #[error("route {route} failed to translate message: {source}")]
    Failed {
        /// Name of the route doing the translation.
        route: String,
        /// Error raised by the translator.
        source: BoxError,
    },

    /// The translator produced blank content.
    #[error("route {route} translated message to empty content")]
    EmptyContent {
        /// Name of the route doing the translation.
        route: String,
    },
}

/// Error type for route operations.
#[derive(Debug, Error)]
pub enum RouteError {
    /// The raw message could not be translated.
    #[error(transparent)]
    Translation(#[from] TranslationError),

    /// The handler asked for the message to be deleted.
    #[error("message marked for deletion")]
    DeleteMessage,

    /// Handler execution was cancelled.
    #[error("delivery was cancelled")]
    Cancelled,

    /// The handler failed.
    #[error("handler failed: {0}")]
    Handler(#[source] BoxError),

    /// The provider failed to fetch or acknowledge.
    #[error("provider failed: {0}")]
    Provider(#[source] BoxError),

    /// The custom error handler failed.
    #[error("error handler failed: {0}")]
    ErrorHandler(#[source] BoxError),

    /// A blocking worker panicked.
    #[error("worker task failed: {0}")]
    Worker(#[source] tokio::task::JoinError),

    /// The worker pool no longer accepts work.
    #[error("worker pool is closed")]
    PoolClosed,
}

impl RouteError {
    /// Returns true for the caller-directed signals (deletion and cancellation).
    pub fn is_control_signal(&self) -> bool {
        matches!(self, RouteError::DeleteMessage | RouteError::Cancelled)
    }
}

impl From<HandlerError> for RouteError {
    fn from(error: HandlerError) -> Self {
        match error {
            HandlerError::DeleteMessage => RouteError::DeleteMessage,
            HandlerError::Cancelled => RouteError::Cancelled,
            HandlerError::Failed(e) => RouteError::Handler(e),
        }
    }
}

/// Invalid configuration detected while building a breaker, pool or route.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// No provider was bound to the route.
    #[error("route requires a provider")]
    MissingProvider,

    /// No handler was bound to the route.
    #[error("route requires a handler")]
    MissingHandler,

    /// The route name was empty.
    #[error("route name must not be empty")]
    EmptyName,

    /// The breaker failure threshold was zero.
    #[error("failure threshold must be at least 1")]
    ZeroThreshold,

    /// The worker pool size was zero.
    #[error("worker pool size must be at least 1")]
    ZeroPoolSize,

    /// The worker pool size exceeded the largest permit count a pool can hold.
    #[error("worker pool size must be at most {max}")]
    PoolTooLarge {
        /// Largest accepted size.
        max: usize,
    },
}
