//! Message, content and delivery result types.

use std::fmt;

use ahash::AHashMap;
use serde_json::Value;

/// Metadata attached to a message by its translator.
pub type Metadata = AHashMap<String, Value>;

/// Payload types a route can carry.
///
/// `is_blank` decides whether translated content is degenerate; routes refuse
/// to hand blank content to a handler.
pub trait Content: Clone + fmt::Debug + Send + 'static {
    /// Returns true when there is nothing to deliver.
    fn is_blank(&self) -> bool;
}

impl Content for String {
    fn is_blank(&self) -> bool {
        self.is_empty()
    }
}

impl<T> Content for Vec<T>
where
    T: Clone + fmt::Debug + Send + 'static,
{
    fn is_blank(&self) -> bool {
        self.is_empty()
    }
}

impl Content for Value {
    fn is_blank(&self) -> bool {
        match self {
            Value::Null => true,
            Value::String(s) => s.is_empty(),
            Value::Array(items) => items.is_empty(),
            Value::Object(map) => map.is_empty(),
            Value::Bool(_) | Value::Number(_) => false,
        }
    }
}

impl<T: Content> Content for Option<T> {
    fn is_blank(&self) -> bool {
        self.as_ref().map_or(true, |content| content.is_blank())
    }
}

/// Content and metadata handed to a handler.
#[derive(Debug, Clone, PartialEq)]
pub struct Message<M> {
    /// Handler payload.
    pub content: M,
    /// Translator-supplied metadata; empty when no translator is bound.
    pub metadata: Metadata,
}

impl<M> Message<M> {
    /// Wraps raw content with empty metadata.
    pub fn new(content: M) -> Self {
        Self {
            content,
            metadata: Metadata::new(),
        }
    }
}

/// Output of a message translator.
#[derive(Debug, Clone, PartialEq)]
pub struct Translated<M> {
    /// Translated payload.
    pub content: M,
    /// Metadata merged into the delivered message.
    pub metadata: Metadata,
}

impl<M> Translated<M> {
    /// Translated content without metadata.
    pub fn new(content: M) -> Self {
        Self {
            content,
            metadata: Metadata::new(),
        }
    }

    /// Adds one metadata entry.
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

/// Result of [`Route::deliver`](crate::Route::deliver).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Delivery<R> {
    /// The handler ran and returned a result.
    Delivered(R),
    /// The route is stopped; the handler was not invoked.
    Disabled,
}

impl<R> Delivery<R> {
    /// Returns true if the handler ran.
    pub fn is_delivered(&self) -> bool {
        matches!(self, Delivery::Delivered(_))
    }

    /// The handler result, if the handler ran.
    pub fn into_result(self) -> Option<R> {
        match self {
            Delivery::Delivered(result) => Some(result),
            Delivery::Disabled => None,
        }
    }
}
