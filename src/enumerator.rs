//! Remote store abstraction consumed by the extraction engine.
//!
//! Authentication, pagination, and the wire protocol all live behind
//! [`Enumerator`]. The engine only needs a lazy item sequence and the ability to
//! open byte streams for individual representations.

use futures::stream::BoxStream;
use tokio::io::AsyncRead;

use crate::error::Result;
use crate::types::{ItemId, RemoteItem, RevisionDescriptor, RevisionId};

/// Lazy, forward-only sequence of remote items.
///
/// An `Err` element means the collection itself could not be listed and ends the
/// run that is consuming it.
pub type ItemStream = BoxStream<'static, Result<RemoteItem>>;

/// An open byte channel for one representation of a remote item.
///
/// Owned by the retrieval call that opened it; dropping it releases the
/// underlying connection.
pub type EntryStream = Box<dyn AsyncRead + Send + Unpin>;

/// Producer of remote items and their byte streams.
///
/// `Ok(None)` from an `open_*` method means the store legitimately has nothing to
/// offer for that representation (for example a folder has no content), which the
/// engine treats as a skip rather than a failure.
#[async_trait::async_trait]
pub trait Enumerator: Send + Sync {
    /// Walk the whole remote collection, nested containers included.
    ///
    /// Each call starts a fresh walk from the beginning.
    async fn list_all(&self) -> Result<ItemStream>;

    /// Look up a single item. Fails with [`Error::NotFound`](crate::Error::NotFound)
    /// when the identifier is unknown.
    async fn get_by_id(&self, id: &ItemId) -> Result<RemoteItem>;

    /// Open the item's metadata document.
    async fn open_metadata_stream(&self, item: &RemoteItem) -> Result<Option<EntryStream>>;

    /// Open the item's primary content.
    async fn open_content_stream(&self, item: &RemoteItem) -> Result<Option<EntryStream>>;

    /// List the item's revisions in the order the store reports them.
    async fn list_revisions(&self, item_id: &ItemId) -> Result<Vec<RevisionDescriptor>>;

    /// Open one revision's bytes.
    async fn open_revision_stream(
        &self,
        item_id: &ItemId,
        revision_id: &RevisionId,
    ) -> Result<Option<EntryStream>>;
}
