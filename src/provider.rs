//! Message source consumed by routes.

use async_trait::async_trait;

use crate::error::BoxError;

/// External source of raw messages.
///
/// Routes hold providers by shared reference; a provider may outlive any
/// route bound to it and owns its own shutdown semantics.
#[async_trait]
pub trait Provider<M>: Send + Sync
where
    M: Send + 'static,
{
    /// Fetches the next batch. An empty batch means nothing is available right now.
    async fn fetch_messages(&self) -> Result<Vec<M>, BoxError>;

    /// Acknowledges a processed message.
    async fn confirm_message(&self, _message: M) -> Result<(), BoxError> {
        Ok(())
    }

    /// Reports a message that was not processed and should become visible again.
    async fn message_not_processed(&self, _message: M) -> Result<(), BoxError> {
        Ok(())
    }

    /// Signals the provider to stop producing and release its resources.
    fn stop(&self);
}
