//! Single-item retrieval by identifier.

use crate::actions::{FetchContent, FetchMetadata, FetchRevisions, ItemAction, ItemOutcome};
use crate::error::{Error, Result};
use crate::retry::fetch_with_retry;
use crate::types::{ItemId, RemoteItem};

use super::Extractor;

impl Extractor {
    /// Download one item's metadata document
    ///
    /// Returns `Error::NotFound` when the store has no item with this id. Failures
    /// after the item is resolved are reported in the outcome.
    pub async fn download_metadata(&self, id: &ItemId) -> Result<ItemOutcome> {
        self.apply_to(id, &FetchMetadata::new(self.context())).await
    }

    /// Download one item's primary content
    pub async fn download_content(&self, id: &ItemId) -> Result<ItemOutcome> {
        self.apply_to(id, &FetchContent::new(self.context())).await
    }

    /// Download every revision of one item
    pub async fn download_revisions(&self, id: &ItemId) -> Result<ItemOutcome> {
        self.apply_to(id, &FetchRevisions::new(self.context())).await
    }

    async fn resolve(&self, id: &ItemId) -> Result<RemoteItem> {
        let enumerator = &self.enumerator;
        fetch_with_retry(&self.config.retry, &self.cancel_token, move || async move {
            enumerator.get_by_id(id).await
        })
        .await
    }

    async fn apply_to<A: ItemAction>(&self, id: &ItemId, action: &A) -> Result<ItemOutcome> {
        let item = tokio::select! {
            biased;
            _ = self.cancel_token.cancelled() => return Err(Error::Cancelled),
            item = self.resolve(id) => item?,
        };

        tracing::debug!(
            item_id = %item.id,
            title = %item.title,
            action = %action.kind(),
            "Resolved item"
        );

        tokio::select! {
            biased;
            _ = self.cancel_token.cancelled() => Err(Error::Cancelled),
            outcome = action.apply(&item) => Ok(outcome),
        }
    }
}
