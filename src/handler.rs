//! Handler and error handler entry points.
//!
//! Every handler shape is resolved once, at construction, into an [`Invoke`]
//! that is either blocking (run on the route's [`WorkerPool`]) or
//! non-blocking (awaited on the calling task).

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use futures::future::{BoxFuture, FutureExt};

use crate::error::{BoxError, HandlerError, RouteError, RouteResult};
use crate::message::Metadata;
use crate::pool::WorkerPool;

type StopHook = Arc<dyn Fn() + Send + Sync + 'static>;

pub(crate) enum Invoke<A, B, T, E> {
    Blocking(Arc<dyn Fn(A, B) -> Result<T, E> + Send + Sync + 'static>),
    NonBlocking(Arc<dyn Fn(A, B) -> BoxFuture<'static, Result<T, E>> + Send + Sync + 'static>),
}

impl<A, B, T, E> Invoke<A, B, T, E>
where
    A: Send + 'static,
    B: Send + 'static,
    T: Send + 'static,
    E: Send + 'static,
{
    fn is_blocking(&self) -> bool {
        matches!(self, Invoke::Blocking(_))
    }

    /// Calls the entry point. The outer result carries pool failures only.
    pub(crate) async fn call(&self, pool: &WorkerPool, a: A, b: B) -> RouteResult<Result<T, E>> {
        match self {
            Invoke::NonBlocking(f) => Ok(f(a, b).await),
            Invoke::Blocking(f) => {
                let f = Arc::clone(f);
                pool.run(move || f(a, b)).await
            }
        }
    }
}

/// Object-style handler whose `handle` is awaited on the calling task.
#[async_trait]
pub trait MessageHandler<M, R>: Send + Sync
where
    M: Send + 'static,
    R: Send + 'static,
{
    /// Processes one translated message.
    async fn handle(&self, content: M, metadata: Metadata) -> Result<R, HandlerError>;

    /// Called once when the owning route stops.
    fn stop(&self) {}
}

/// Object-style handler whose `handle` blocks and runs on the worker pool.
pub trait BlockingMessageHandler<M, R>: Send + Sync {
    /// Processes one translated message.
    fn handle(&self, content: M, metadata: Metadata) -> Result<R, HandlerError>;

    /// Called once when the owning route stops.
    fn stop(&self) {}
}

/// The message handler bound to a route.
pub struct Handler<M, R> {
    pub(crate) invoke: Invoke<M, Metadata, R, HandlerError>,
    stop: Option<StopHook>,
}

impl<M, R> Handler<M, R>
where
    M: Send + 'static,
    R: Send + 'static,
{
    /// A plain blocking function, run on the worker pool.
    pub fn blocking<F>(f: F) -> Self
    where
        F: Fn(M, Metadata) -> Result<R, HandlerError> + Send + Sync + 'static,
    {
        Self {
            invoke: Invoke::Blocking(Arc::new(f)),
            stop: None,
        }
    }

    /// A plain async function, awaited on the calling task.
    pub fn non_blocking<F, Fut>(f: F) -> Self
    where
        F: Fn(M, Metadata) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<R, HandlerError>> + Send + 'static,
    {
        Self {
            invoke: Invoke::NonBlocking(Arc::new(move |content: M, metadata: Metadata| {
                f(content, metadata).boxed()
            })),
            stop: None,
        }
    }

    /// An async handler object; its `stop` runs when the route stops.
    pub fn object<H>(handler: Arc<H>) -> Self
    where
        H: MessageHandler<M, R> + 'static,
    {
        let target = Arc::clone(&handler);
        Self {
            invoke: Invoke::NonBlocking(Arc::new(move |content: M, metadata: Metadata| {
                let target = Arc::clone(&target);
                async move { target.handle(content, metadata).await }.boxed()
            })),
            stop: Some(Arc::new(move || handler.stop())),
        }
    }

    /// A blocking handler object; its `stop` runs when the route stops.
    pub fn blocking_object<H>(handler: Arc<H>) -> Self
    where
        H: BlockingMessageHandler<M, R> + 'static,
    {
        let target = Arc::clone(&handler);
        Self {
            invoke: Invoke::Blocking(Arc::new(move |content: M, metadata: Metadata| {
                target.handle(content, metadata)
            })),
            stop: Some(Arc::new(move || handler.stop())),
        }
    }

    /// Returns true if the handler runs on the worker pool.
    pub fn is_blocking(&self) -> bool {
        self.invoke.is_blocking()
    }

    /// Returns true for handler objects, which expose a stop hook.
    pub fn has_stop_hook(&self) -> bool {
        self.stop.is_some()
    }

    pub(crate) fn stop(&self) {
        if let Some(stop) = &self.stop {
            stop();
        }
    }

    pub(crate) async fn call(
        &self,
        pool: &WorkerPool,
        content: M,
        metadata: Metadata,
    ) -> RouteResult<R> {
        self.invoke
            .call(pool, content, metadata)
            .await?
            .map_err(RouteError::from)
    }
}

impl<M, R> fmt::Debug for Handler<M, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Handler")
            .field("blocking", &matches!(self.invoke, Invoke::Blocking(_)))
            .field("stop_hook", &self.stop.is_some())
            .finish()
    }
}

/// Custom error handler bound to a route.
///
/// Receives the delivery error and the original raw message; returns whether
/// the message should be acknowledged.
pub struct ErrorHandler<M> {
    invoke: Invoke<RouteError, M, bool, BoxError>,
}

impl<M> ErrorHandler<M>
where
    M: Send + 'static,
{
    /// A blocking error handler, run on the worker pool.
    pub fn blocking<F>(f: F) -> Self
    where
        F: Fn(RouteError, M) -> Result<bool, BoxError> + Send + Sync + 'static,
    {
        Self {
            invoke: Invoke::Blocking(Arc::new(f)),
        }
    }

    /// An async error handler, awaited on the calling task.
    pub fn non_blocking<F, Fut>(f: F) -> Self
    where
        F: Fn(RouteError, M) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<bool, BoxError>> + Send + 'static,
    {
        Self {
            invoke: Invoke::NonBlocking(Arc::new(move |error: RouteError, message: M| {
                f(error, message).boxed()
            })),
        }
    }

    /// Returns true if the error handler runs on the worker pool.
    pub fn is_blocking(&self) -> bool {
        self.invoke.is_blocking()
    }

    pub(crate) async fn call(
        &self,
        pool: &WorkerPool,
        error: RouteError,
        message: M,
    ) -> RouteResult<bool> {
        self.invoke
            .call(pool, error, message)
            .await?
            .map_err(RouteError::ErrorHandler)
    }
}

impl<M> fmt::Debug for ErrorHandler<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ErrorHandler")
            .field("blocking", &matches!(self.invoke, Invoke::Blocking(_)))
            .finish()
    }
}
