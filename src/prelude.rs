//! Re-exports the types needed to build and drive a route.
//!
//! # Example
//! ```rust,no_run
//! use routebreaker::prelude::*;
//! ```

pub use crate::{
    BoxError, CircuitBreaker, Content, Delivery, ErrorHandler, Handler, HandlerError, Metadata,
    Provider, Route, RouteError, State, Translated, WorkerPool,
};
