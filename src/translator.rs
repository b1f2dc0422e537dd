//! Raw message translation.

use crate::error::BoxError;
use crate::message::Translated;

/// Turns raw provider content into handler content plus metadata.
///
/// Any closure `Fn(M) -> Result<Translated<M>, BoxError>` is a translator.
pub trait MessageTranslator<M>: Send + Sync {
    /// Translates one raw message.
    fn translate(&self, content: M) -> Result<Translated<M>, BoxError>;
}

impl<M, F> MessageTranslator<M> for F
where
    F: Fn(M) -> Result<Translated<M>, BoxError> + Send + Sync,
{
    fn translate(&self, content: M) -> Result<Translated<M>, BoxError> {
        self(content)
    }
}
