//! Shared test helpers: in-memory streams and a scripted enumerator.

use std::collections::HashMap;
use std::io::Cursor;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};

use futures::stream::{self, StreamExt};
use tokio::io::{AsyncRead, ReadBuf};

use crate::config::{Config, RetryConfig};
use crate::enumerator::{Enumerator, EntryStream, ItemStream};
use crate::error::{Error, Result};
use crate::types::{FOLDER_MIME_TYPE, ItemId, RemoteItem, RevisionDescriptor, RevisionId};

/// Stream yielding `bytes` then EOF
pub(crate) fn stream_of(bytes: Vec<u8>) -> EntryStream {
    Box::new(Cursor::new(bytes))
}

/// Stream yielding `bytes` then a non-transient read error
pub(crate) fn failing_stream(bytes: Vec<u8>) -> EntryStream {
    Box::new(FailAfter {
        data: Cursor::new(bytes),
    })
}

struct FailAfter {
    data: Cursor<Vec<u8>>,
}

impl AsyncRead for FailAfter {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<std::io::Result<()>> {
        if (self.data.position() as usize) < self.data.get_ref().len() {
            return Pin::new(&mut self.data).poll_read(cx, buf);
        }
        Poll::Ready(Err(std::io::Error::other("connection dropped mid-stream")))
    }
}

/// Runs a callback when the wrapped stream is dropped
struct Tracked {
    inner: EntryStream,
    on_drop: Option<Box<dyn FnOnce() + Send>>,
}

impl AsyncRead for Tracked {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<std::io::Result<()>> {
        Pin::new(&mut self.inner).poll_read(cx, buf)
    }
}

impl Drop for Tracked {
    fn drop(&mut self) {
        if let Some(on_drop) = self.on_drop.take() {
            on_drop();
        }
    }
}

/// Observes whether a stream handed to the code under test was released
#[derive(Clone)]
pub(crate) struct StreamProbe {
    closed: Arc<AtomicBool>,
}

impl StreamProbe {
    pub(crate) fn wrap(bytes: Vec<u8>) -> (EntryStream, StreamProbe) {
        let closed = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&closed);
        let stream = Tracked {
            inner: stream_of(bytes),
            on_drop: Some(Box::new(move || flag.store(true, Ordering::SeqCst))),
        };
        (Box::new(stream), StreamProbe { closed })
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

pub(crate) fn file_item(id: &str, title: &str) -> RemoteItem {
    RemoteItem::new(id, title, "text/plain")
}

pub(crate) fn folder_item(id: &str, title: &str) -> RemoteItem {
    RemoteItem::new(id, title, FOLDER_MIME_TYPE)
}

/// Config rooted in `dir` with retries off and no disk space preflight
pub(crate) fn test_config(dir: &std::path::Path) -> Config {
    let mut config = Config::with_output_dir(dir);
    config.retry = RetryConfig::disabled();
    config.disk_space.enabled = false;
    config
}

#[derive(Clone)]
enum Body {
    Bytes(Vec<u8>),
    Absent,
    Broken,
}

impl Body {
    fn open(&self, what: &str) -> Result<Option<Vec<u8>>> {
        match self {
            Body::Bytes(bytes) => Ok(Some(bytes.clone())),
            Body::Absent => Ok(None),
            Body::Broken => Err(Error::permanent(format!("{what} unavailable"))),
        }
    }
}

#[derive(Clone, Copy)]
enum Listing {
    Complete,
    FailAfter(usize, fn() -> Error),
    StallAfter(usize),
}

/// Enumerator over a fixed item list, with scripted representations and faults.
///
/// Every remote call and every item pull is appended to a shared journal so tests
/// can assert on ordering and on calls that must not happen.
pub(crate) struct MockEnumerator {
    items: Vec<RemoteItem>,
    metadata: HashMap<ItemId, Body>,
    content: HashMap<ItemId, Body>,
    revisions: HashMap<ItemId, Vec<(RevisionId, Body)>>,
    listing: Listing,
    transient_content_failures: Mutex<HashMap<ItemId, u32>>,
    journal: Arc<Mutex<Vec<String>>>,
    live_streams: Arc<AtomicUsize>,
}

impl MockEnumerator {
    pub(crate) fn new(items: Vec<RemoteItem>) -> Self {
        Self {
            items,
            metadata: HashMap::new(),
            content: HashMap::new(),
            revisions: HashMap::new(),
            listing: Listing::Complete,
            transient_content_failures: Mutex::new(HashMap::new()),
            journal: Arc::new(Mutex::new(Vec::new())),
            live_streams: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub(crate) fn with_metadata(mut self, id: &str, bytes: &[u8]) -> Self {
        self.metadata.insert(id.into(), Body::Bytes(bytes.to_vec()));
        self
    }

    pub(crate) fn with_broken_metadata(mut self, id: &str) -> Self {
        self.metadata.insert(id.into(), Body::Broken);
        self
    }

    pub(crate) fn with_content(mut self, id: &str, bytes: &[u8]) -> Self {
        self.content.insert(id.into(), Body::Bytes(bytes.to_vec()));
        self
    }

    pub(crate) fn with_revision(mut self, id: &str, revision: &str, bytes: &[u8]) -> Self {
        self.push_revision(id, revision, Body::Bytes(bytes.to_vec()));
        self
    }

    pub(crate) fn with_absent_revision(mut self, id: &str, revision: &str) -> Self {
        self.push_revision(id, revision, Body::Absent);
        self
    }

    pub(crate) fn with_broken_revision(mut self, id: &str, revision: &str) -> Self {
        self.push_revision(id, revision, Body::Broken);
        self
    }

    /// Listing yields `n` items, then an enumeration error
    pub(crate) fn failing_listing_after(self, n: usize) -> Self {
        self.listing_error_after(n, || Error::Enumeration("listing interrupted".to_string()))
    }

    /// Listing yields `n` items, then the error built by `make`
    pub(crate) fn listing_error_after(mut self, n: usize, make: fn() -> Error) -> Self {
        self.listing = Listing::FailAfter(n, make);
        self
    }

    /// Listing yields `n` items, then never produces another
    pub(crate) fn stalling_after(mut self, n: usize) -> Self {
        self.listing = Listing::StallAfter(n);
        self
    }

    /// The first `failures` content opens for `id` fail with a retryable error
    pub(crate) fn with_transient_content_failures(self, id: &str, failures: u32) -> Self {
        self.transient_content_failures
            .lock()
            .unwrap()
            .insert(id.into(), failures);
        self
    }

    fn push_revision(&mut self, id: &str, revision: &str, body: Body) {
        self.revisions
            .entry(id.into())
            .or_default()
            .push((RevisionId::new(revision), body));
    }

    /// Shared journal of pulls and remote calls, in the order they happened
    pub(crate) fn journal(&self) -> Arc<Mutex<Vec<String>>> {
        Arc::clone(&self.journal)
    }

    pub(crate) fn entries(&self) -> Vec<String> {
        self.journal.lock().unwrap().clone()
    }

    /// Number of remote calls (anything but pulls) made for `id`
    pub(crate) fn remote_calls_for(&self, id: &str) -> usize {
        self.entries()
            .iter()
            .filter(|e| !e.starts_with("pull ") && e.ends_with(&format!(" {id}")))
            .count()
    }

    /// Streams handed out and not yet dropped
    pub(crate) fn live_streams(&self) -> usize {
        self.live_streams.load(Ordering::SeqCst)
    }

    fn record(&self, entry: String) {
        self.journal.lock().unwrap().push(entry);
    }

    fn hand_out(&self, bytes: Option<Vec<u8>>) -> Option<EntryStream> {
        let bytes = bytes?;
        self.live_streams.fetch_add(1, Ordering::SeqCst);
        let live = Arc::clone(&self.live_streams);
        Some(Box::new(Tracked {
            inner: stream_of(bytes),
            on_drop: Some(Box::new(move || {
                live.fetch_sub(1, Ordering::SeqCst);
            })),
        }))
    }
}

#[async_trait::async_trait]
impl Enumerator for MockEnumerator {
    async fn list_all(&self) -> Result<ItemStream> {
        let mut results: Vec<Result<RemoteItem>> = self.items.iter().cloned().map(Ok).collect();
        let journal = Arc::clone(&self.journal);
        let log_pull = move |result: &Result<RemoteItem>| {
            if let Ok(item) = result {
                journal.lock().unwrap().push(format!("pull {}", item.id));
            }
        };

        let stream = match self.listing {
            Listing::Complete => stream::iter(results).inspect(log_pull).boxed(),
            Listing::FailAfter(n, make) => {
                results.truncate(n);
                results.push(Err(make()));
                stream::iter(results).inspect(log_pull).boxed()
            }
            Listing::StallAfter(n) => {
                results.truncate(n);
                stream::iter(results)
                    .chain(stream::pending())
                    .inspect(log_pull)
                    .boxed()
            }
        };
        Ok(stream)
    }

    async fn get_by_id(&self, id: &ItemId) -> Result<RemoteItem> {
        self.record(format!("get {id}"));
        self.items
            .iter()
            .find(|item| &item.id == id)
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("item {id}")))
    }

    async fn open_metadata_stream(&self, item: &RemoteItem) -> Result<Option<EntryStream>> {
        self.record(format!("metadata {}", item.id));
        let bytes = match self.metadata.get(&item.id) {
            Some(body) => body.open("metadata")?,
            None => None,
        };
        Ok(self.hand_out(bytes))
    }

    async fn open_content_stream(&self, item: &RemoteItem) -> Result<Option<EntryStream>> {
        self.record(format!("content {}", item.id));
        {
            let mut failures = self.transient_content_failures.lock().unwrap();
            if let Some(remaining) = failures.get_mut(&item.id)
                && *remaining > 0
            {
                *remaining -= 1;
                return Err(Error::transient("rate limited"));
            }
        }
        let bytes = match self.content.get(&item.id) {
            Some(body) => body.open("content")?,
            None => None,
        };
        Ok(self.hand_out(bytes))
    }

    async fn list_revisions(&self, id: &ItemId) -> Result<Vec<RevisionDescriptor>> {
        self.record(format!("revisions {id}"));
        Ok(self
            .revisions
            .get(id)
            .map(|revisions| {
                revisions
                    .iter()
                    .map(|(rev, _)| RevisionDescriptor::new(id.clone(), rev.as_str()))
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn open_revision_stream(
        &self,
        id: &ItemId,
        revision: &RevisionId,
    ) -> Result<Option<EntryStream>> {
        self.record(format!("revision {revision} {id}"));
        let body = self
            .revisions
            .get(id)
            .and_then(|revisions| revisions.iter().find(|(rev, _)| rev == revision))
            .map(|(_, body)| body.clone());
        let bytes = match body {
            Some(body) => body.open("revision")?,
            None => None,
        };
        Ok(self.hand_out(bytes))
    }
}

/// Extractor over `mock` writing into a fresh temp dir (which must be kept alive)
pub(crate) fn create_test_extractor(
    mock: MockEnumerator,
) -> (crate::Extractor, tempfile::TempDir, Arc<MockEnumerator>) {
    let temp_dir = tempfile::tempdir().unwrap();
    let mock = Arc::new(mock);
    let enumerator: Arc<dyn Enumerator> = mock.clone();
    let extractor = crate::Extractor::new(test_config(temp_dir.path()), enumerator).unwrap();
    (extractor, temp_dir, mock)
}
