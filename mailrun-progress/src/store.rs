use std::fmt::Debug;

use async_trait::async_trait;

use crate::error::Result;

/// Durable record of the next recipient index to process.
///
/// The dispatch engine is the only writer during a run. Values only move
/// forward, except through [`ProgressStore::reset`].
#[async_trait]
pub trait ProgressStore: Send + Sync + Debug {
    /// The stored index. Anything missing or unreadable counts as 0.
    async fn read(&self) -> usize;

    /// Persist `next_index`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::ProgressError::Persistence`] if the value could not be
    /// made durable.
    async fn write(&self, next_index: usize) -> Result<()>;

    /// Start over from the first recipient.
    ///
    /// # Errors
    ///
    /// See [`ProgressStore::write`].
    async fn reset(&self) -> Result<()> {
        self.write(0).await
    }
}
