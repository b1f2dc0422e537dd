//! # routebreaker
//!
//! The dispatch core of a message consumer: routes pull raw messages from a
//! provider, translate them, hand them to a handler and protect that handler
//! with a per-route circuit breaker.
//!
//! ## Routes
//!
//! A [`Route`] binds one [`Provider`], an optional [`MessageTranslator`], one
//! [`Handler`], an optional [`ErrorHandler`] and one [`CircuitBreaker`].
//! Handlers are either non-blocking (awaited on the calling task) or blocking
//! (run on a bounded [`WorkerPool`] while the calling task is suspended), so a
//! single-threaded scheduler is never stalled by synchronous work.
//!
//! ## Circuit breaking
//!
//! The breaker counts consecutive matched handler failures and derives a
//! health state:
//!
//! - **Closed**: fewer failures than the threshold. Matched failures are
//!   retried inline and the provider is fetched normally.
//! - **Open**: threshold reached. Failures are surfaced and nothing is fetched.
//! - **Half-Open**: the reset timeout elapsed. The message that caused the
//!   last failure is replayed once per timeout window instead of fetching.
//!
//! Errors that are not matched, deletion requests and cancellations never
//! touch the breaker.
//!
//! ## Basic Usage
//!
//! ```rust
//! use std::collections::VecDeque;
//! use std::fmt;
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! use async_trait::async_trait;
//! use parking_lot::Mutex;
//! use routebreaker::{BoxError, CircuitBreaker, Handler, HandlerError, Metadata, Provider, Route};
//!
//! #[derive(Debug)]
//! struct Unavailable;
//!
//! impl fmt::Display for Unavailable {
//!     fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
//!         write!(f, "downstream unavailable")
//!     }
//! }
//!
//! impl std::error::Error for Unavailable {}
//!
//! struct Inbox(Mutex<VecDeque<String>>);
//!
//! #[async_trait]
//! impl Provider<String> for Inbox {
//!     async fn fetch_messages(&self) -> Result<Vec<String>, BoxError> {
//!         Ok(self.0.lock().drain(..).collect())
//!     }
//!
//!     fn stop(&self) {}
//! }
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let breaker = CircuitBreaker::builder()
//!     .failure_threshold(3)
//!     .reset_timeout(Duration::from_secs(15))
//!     .trip_on::<Unavailable>()
//!     .build()?;
//!
//! let inbox = Arc::new(Inbox(Mutex::new(VecDeque::from(vec!["hello".to_string()]))));
//!
//! let route: Route<String> = Route::builder()
//!     .name("greetings")
//!     .provider(inbox)
//!     .handler(Handler::blocking(|content: String, _metadata: Metadata| {
//!         println!("received {}", content);
//!         Ok::<_, HandlerError>(true)
//!     }))
//!     .circuit_breaker(breaker)
//!     .build()?;
//!
//! let acknowledged = route.dispatch().await?;
//! assert_eq!(acknowledged, 1);
//!
//! route.stop();
//! # Ok(())
//! # }
//! ```
//!
//! ## Features
//!
//! - `prometheus` - Prometheus metric sink

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![cfg_attr(docsrs, feature(doc_cfg))]

mod breaker;
mod config;
mod error;
mod handler;
mod hook;
mod message;
mod metrics;
mod pool;
pub mod prelude;
mod provider;
mod route;
mod state;
mod translator;

// Re-exports
pub use breaker::CircuitBreaker;
pub use config::{
    BreakerBuilder, RouteBuilder, DEFAULT_FAILURE_THRESHOLD, DEFAULT_RESET_TIMEOUT,
    DEFAULT_ROUTE_NAME,
};
pub use error::{BoxError, ConfigError, HandlerError, RouteError, RouteResult, TranslationError};
pub use handler::{BlockingMessageHandler, ErrorHandler, Handler, MessageHandler};
pub use hook::HookRegistry;
pub use message::{Content, Delivery, Message, Metadata, Translated};
#[cfg(feature = "prometheus")]
pub use metrics::PrometheusSink;
pub use metrics::{DeliveryOutcome, MetricSink, NullMetricSink};
pub use pool::WorkerPool;
pub use provider::Provider;
pub use route::Route;
pub use state::State;
pub use translator::MessageTranslator;
