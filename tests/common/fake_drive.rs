//! In-memory drive implementing `Enumerator` for integration tests

use std::collections::HashMap;
use std::io::Cursor;
use std::pin::Pin;
use std::sync::Mutex;
use std::task::{Context, Poll};
use std::time::Duration;

use drive_extract::{
    EntryStream, Enumerator, Error, ItemId, ItemStream, RemoteItem, Result, RevisionDescriptor,
    RevisionId,
};
use futures::StreamExt;
use tokio::io::{AsyncRead, ReadBuf};

/// Media type the store uses for folders
pub const FOLDER: &str = "application/vnd.google-apps.folder";

/// What opening a representation yields
#[derive(Clone)]
pub enum Payload {
    /// Stream of these bytes
    Bytes(Vec<u8>),
    /// Open fails with a non-retryable remote error
    OpenFails,
    /// Stream yields these bytes, then never completes
    Stalls(Vec<u8>),
}

/// Scripted drive: items in emission order, payloads per representation
#[derive(Default)]
pub struct FakeDrive {
    items: Vec<RemoteItem>,
    pull_delays: HashMap<ItemId, Duration>,
    metadata: HashMap<ItemId, Payload>,
    content: HashMap<ItemId, Payload>,
    revisions: HashMap<ItemId, Vec<(RevisionId, Payload)>>,
    calls: Mutex<Vec<String>>,
}

impl FakeDrive {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn file(mut self, id: &str, title: &str) -> Self {
        self.items.push(RemoteItem::new(id, title, "application/octet-stream"));
        self
    }

    pub fn folder(mut self, id: &str, title: &str) -> Self {
        self.items.push(RemoteItem::new(id, title, FOLDER));
        self
    }

    /// Delay before the listing yields this item
    pub fn slow_pull(mut self, id: &str, delay: Duration) -> Self {
        self.pull_delays.insert(id.into(), delay);
        self
    }

    pub fn metadata(mut self, id: &str, payload: Payload) -> Self {
        self.metadata.insert(id.into(), payload);
        self
    }

    pub fn content(mut self, id: &str, payload: Payload) -> Self {
        self.content.insert(id.into(), payload);
        self
    }

    pub fn revision(mut self, id: &str, revision: &str, payload: Payload) -> Self {
        self.revisions
            .entry(id.into())
            .or_default()
            .push((RevisionId::new(revision), payload));
        self
    }

    /// Every remote call made so far, as `"<operation> <item id>"`
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    /// Calls made for one item
    pub fn calls_for(&self, id: &str) -> Vec<String> {
        let suffix = format!(" {id}");
        self.calls()
            .into_iter()
            .filter(|c| c.ends_with(&suffix))
            .collect()
    }

    fn record(&self, operation: &str, id: &ItemId) {
        self.calls.lock().unwrap().push(format!("{operation} {id}"));
    }
}

fn open(payload: Option<&Payload>) -> Result<Option<EntryStream>> {
    match payload {
        None => Ok(None),
        Some(Payload::Bytes(bytes)) => Ok(Some(Box::new(Cursor::new(bytes.clone())))),
        Some(Payload::OpenFails) => Err(Error::permanent("stream open rejected")),
        Some(Payload::Stalls(bytes)) => Ok(Some(Box::new(Stalled {
            head: Cursor::new(bytes.clone()),
        }))),
    }
}

/// Yields its head, then stays pending forever
struct Stalled {
    head: Cursor<Vec<u8>>,
}

impl AsyncRead for Stalled {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<std::io::Result<()>> {
        if (self.head.position() as usize) < self.head.get_ref().len() {
            return Pin::new(&mut self.head).poll_read(cx, buf);
        }
        Poll::Pending
    }
}

#[async_trait::async_trait]
impl Enumerator for FakeDrive {
    async fn list_all(&self) -> Result<ItemStream> {
        let paced: Vec<(RemoteItem, Duration)> = self
            .items
            .iter()
            .map(|item| {
                let delay = self.pull_delays.get(&item.id).copied().unwrap_or_default();
                (item.clone(), delay)
            })
            .collect();

        Ok(futures::stream::iter(paced)
            .then(|(item, delay)| async move {
                if !delay.is_zero() {
                    tokio::time::sleep(delay).await;
                }
                Ok(item)
            })
            .boxed())
    }

    async fn get_by_id(&self, id: &ItemId) -> Result<RemoteItem> {
        self.record("get", id);
        self.items
            .iter()
            .find(|item| &item.id == id)
            .cloned()
            .ok_or_else(|| Error::NotFound(id.to_string()))
    }

    async fn open_metadata_stream(&self, item: &RemoteItem) -> Result<Option<EntryStream>> {
        self.record("metadata", &item.id);
        open(self.metadata.get(&item.id))
    }

    async fn open_content_stream(&self, item: &RemoteItem) -> Result<Option<EntryStream>> {
        self.record("content", &item.id);
        open(self.content.get(&item.id))
    }

    async fn list_revisions(&self, item_id: &ItemId) -> Result<Vec<RevisionDescriptor>> {
        self.record("list_revisions", item_id);
        Ok(self
            .revisions
            .get(item_id)
            .into_iter()
            .flatten()
            .map(|(rev, _)| RevisionDescriptor::new(item_id.clone(), rev.as_str()))
            .collect())
    }

    async fn open_revision_stream(
        &self,
        item_id: &ItemId,
        revision_id: &RevisionId,
    ) -> Result<Option<EntryStream>> {
        self.record(&format!("open_revision {revision_id}"), item_id);
        let payload = self
            .revisions
            .get(item_id)
            .and_then(|revs| revs.iter().find(|(rev, _)| rev == revision_id))
            .map(|(_, payload)| payload);
        open(payload)
    }
}
