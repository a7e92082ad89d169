use crate::{ClassifiedChange, Result};
use async_trait::async_trait;

/// Remote sink for classified changes.
///
/// The contract is all-or-nothing: `Ok(())` means every change in the batch
/// was committed, an error means none of them were.
#[async_trait]
pub trait SyncTransport: Send + Sync {
    async fn sync_changes(&self, changes: &[ClassifiedChange]) -> Result<()>;
}
