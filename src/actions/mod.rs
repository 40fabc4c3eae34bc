//! Per-item actions -- what happens to each item the orchestrator pulls.
//!
//! Split into focused submodules:
//! - [`fetch`] - Metadata and content downloads
//! - [`revisions`] - Revision history downloads
//! - [`summary`] - Flat summary file appends
//!
//! Every action absorbs its own failures: `apply` always returns an
//! [`ItemOutcome`], never an error, so one bad item cannot stop a run.

mod fetch;
mod revisions;
mod summary;

use std::sync::Arc;

use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

use crate::config::RetryConfig;
use crate::enumerator::Enumerator;
use crate::error::Error;
use crate::types::{ActionKind, Category, Event, RemoteItem};
use crate::writer::{OutputName, StreamWriter, WrittenFile};

pub use fetch::{FetchContent, FetchMetadata};
pub use revisions::FetchRevisions;
pub use summary::{Summarize, format_summary_block};

/// Result of applying an action to one item
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ItemOutcome {
    /// The action finished and wrote `written` files
    Completed {
        /// Number of files (or summary blocks) written
        written: usize,
    },
    /// Nothing to retrieve for this item
    Skipped {
        /// Why the item was skipped
        reason: String,
    },
    /// A handled failure; already logged and reported
    Failed {
        /// Error message
        error: String,
    },
}

impl ItemOutcome {
    /// Whether the action reported a failure
    pub fn is_failed(&self) -> bool {
        matches!(self, ItemOutcome::Failed { .. })
    }
}

/// Capability applied to each item by a driving policy
#[async_trait::async_trait]
pub trait ItemAction: Send + Sync {
    /// Which variant this action is, for events and logs
    fn kind(&self) -> ActionKind;

    /// Process one item, trapping every item-level failure
    async fn apply(&self, item: &RemoteItem) -> ItemOutcome;
}

/// Marker for actions that may run several items at once.
///
/// Only these are accepted by
/// [`Orchestrator::run_bounded_parallel`](crate::Orchestrator::run_bounded_parallel).
/// [`Summarize`] deliberately does not implement it: it appends to one shared file
/// and must stay on the sequential policy.
pub trait ConcurrentAction: ItemAction {}

/// Shared collaborators for the download actions
#[derive(Clone)]
pub struct ActionContext {
    pub(crate) enumerator: Arc<dyn Enumerator>,
    pub(crate) writer: Arc<StreamWriter>,
    pub(crate) retry: RetryConfig,
    pub(crate) event_tx: broadcast::Sender<Event>,
    pub(crate) cancel_token: CancellationToken,
}

impl ActionContext {
    /// Bundle the collaborators an action needs
    pub fn new(
        enumerator: Arc<dyn Enumerator>,
        writer: Arc<StreamWriter>,
        retry: RetryConfig,
        event_tx: broadcast::Sender<Event>,
        cancel_token: CancellationToken,
    ) -> Self {
        Self {
            enumerator,
            writer,
            retry,
            event_tx,
            cancel_token,
        }
    }

    /// Log and broadcast a written file
    pub(crate) fn report_written(&self, item: &RemoteItem, category: Category, file: &WrittenFile) {
        tracing::info!(
            item_id = %item.id,
            title = %item.title,
            category = %category,
            path = %file.path.display(),
            bytes = file.bytes,
            "Written to disk"
        );
        self.event_tx
            .send(Event::ItemWritten {
                id: item.id.clone(),
                title: item.title.clone(),
                category,
                path: file.path.clone(),
                bytes: file.bytes,
            })
            .ok();
    }

    pub(crate) fn skip(&self, item: &RemoteItem, reason: impl Into<String>) -> ItemOutcome {
        report_skip(&self.event_tx, item, reason.into())
    }

    pub(crate) fn fail(&self, kind: ActionKind, item: &RemoteItem, error: &Error) -> ItemOutcome {
        report_failure(&self.event_tx, kind, item, error.code(), error.to_string())
    }
}

pub(crate) fn report_skip(
    event_tx: &broadcast::Sender<Event>,
    item: &RemoteItem,
    reason: String,
) -> ItemOutcome {
    tracing::debug!(item_id = %item.id, title = %item.title, reason = %reason, "Skipped");
    event_tx
        .send(Event::ItemSkipped {
            id: item.id.clone(),
            title: item.title.clone(),
            reason: reason.clone(),
        })
        .ok();
    ItemOutcome::Skipped { reason }
}

pub(crate) fn report_failure(
    event_tx: &broadcast::Sender<Event>,
    kind: ActionKind,
    item: &RemoteItem,
    code: &'static str,
    error: String,
) -> ItemOutcome {
    tracing::warn!(
        action = %kind,
        item_id = %item.id,
        title = %item.title,
        code,
        error = %error,
        "Item failed"
    );
    event_tx
        .send(Event::ItemFailed {
            id: item.id.clone(),
            title: item.title.clone(),
            code: code.to_string(),
            error: error.clone(),
        })
        .ok();
    ItemOutcome::Failed { error }
}

/// Name a representation is written under, before sanitization
///
/// The title becomes the stem. The revision id and the `.json` extension go into
/// the suffix so that shortening a long title never merges two outputs.
pub fn output_filename(category: Category, item: &RemoteItem, revision: Option<&str>) -> OutputName {
    let suffix = match (category, revision) {
        (Category::Content, _) => String::new(),
        (Category::Revisions, Some(rev)) => format!(" - {rev}.json"),
        (Category::Metadata, _) | (Category::Revisions, None) => ".json".to_string(),
    };
    OutputName::new(item.title.as_str(), suffix)
}
