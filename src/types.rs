//! Core types for drive-extract

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Media type the remote store uses to mark containers (folders)
pub const FOLDER_MIME_TYPE: &str = "application/vnd.google-apps.folder";

/// Unique identifier of a remote item
#[derive(Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ItemId(pub String);

impl ItemId {
    /// Create a new ItemId
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow the raw identifier
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ItemId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for ItemId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl std::fmt::Display for ItemId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identifier of one historical version, scoped to its parent item
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RevisionId(pub String);

impl RevisionId {
    /// Create a new RevisionId
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow the raw identifier
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for RevisionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// A user or service account known to the remote store
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Principal {
    /// Name shown in the remote UI
    pub display_name: String,
    /// Account email, when the store exposes it
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email_address: Option<String>,
}

impl Principal {
    /// Create a principal with only a display name
    pub fn named(display_name: impl Into<String>) -> Self {
        Self {
            display_name: display_name.into(),
            email_address: None,
        }
    }
}

/// Snapshot of one entry (file or folder) as returned by enumeration
///
/// Identity is [`id`](Self::id). Titles are not unique and are only used to build
/// output filenames.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteItem {
    /// Unique identifier
    pub id: ItemId,
    /// Display title
    pub title: String,
    /// Filename the item was uploaded with
    #[serde(default)]
    pub original_filename: Option<String>,
    /// Media type; [`FOLDER_MIME_TYPE`] for containers
    pub mime_type: String,
    /// Size of the primary content in bytes (absent for native documents and folders)
    #[serde(default)]
    pub file_size: Option<u64>,
    /// MD5 checksum reported by the store
    #[serde(default)]
    pub md5_checksum: Option<String>,
    /// Creation time
    #[serde(default)]
    pub created_date: Option<DateTime<Utc>>,
    /// Last modification time
    #[serde(default)]
    pub modified_date: Option<DateTime<Utc>>,
    /// Last modification by the authenticated account
    #[serde(default)]
    pub modified_by_me_date: Option<DateTime<Utc>>,
    /// Last view by the authenticated account
    #[serde(default)]
    pub last_viewed_by_me_date: Option<DateTime<Utc>>,
    /// Whether the item is shared
    #[serde(default)]
    pub shared: bool,
    /// Principal who shared the item with the account
    #[serde(default)]
    pub sharing_user: Option<Principal>,
    /// Principal who last modified the item
    #[serde(default)]
    pub last_modifying_user: Option<Principal>,
    /// Direct content download location
    #[serde(default)]
    pub download_url: Option<String>,
    /// Whether the item was moved to the trash explicitly
    #[serde(default)]
    pub explicitly_trashed: bool,
}

impl RemoteItem {
    /// Minimal item with an id, title, and media type
    pub fn new(
        id: impl Into<ItemId>,
        title: impl Into<String>,
        mime_type: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            mime_type: mime_type.into(),
            ..Self::default()
        }
    }

    /// Whether this item is a container with no content or revisions of its own
    pub fn is_folder(&self) -> bool {
        self.mime_type == FOLDER_MIME_TYPE
    }
}

/// One historical version of a remote item
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RevisionDescriptor {
    /// Revision identifier
    pub id: RevisionId,
    /// Item the revision belongs to
    pub item_id: ItemId,
}

impl RevisionDescriptor {
    /// Create a revision descriptor
    pub fn new(item_id: ItemId, id: impl Into<String>) -> Self {
        Self {
            id: RevisionId::new(id),
            item_id,
        }
    }
}

/// Output category, one subdirectory of the output root each
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    /// Primary content bytes
    Content,
    /// Metadata documents
    Metadata,
    /// Historical revisions
    Revisions,
}

impl Category {
    /// Name of the subdirectory holding this category
    pub fn dir_name(&self) -> &'static str {
        match self {
            Category::Content => "Content",
            Category::Metadata => "Metadata",
            Category::Revisions => "Revisions",
        }
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.dir_name())
    }
}

/// Per-item action variants
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    /// Append the item's metadata to the summary file
    Summarize,
    /// Download the metadata document
    FetchMetadata,
    /// Download the primary content
    FetchContent,
    /// Download every historical revision
    FetchRevisions,
}

impl std::fmt::Display for ActionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ActionKind::Summarize => "summarize",
            ActionKind::FetchMetadata => "fetch_metadata",
            ActionKind::FetchContent => "fetch_content",
            ActionKind::FetchRevisions => "fetch_revisions",
        };
        f.write_str(name)
    }
}

/// Driving policy used to pull items from the enumerator
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Policy {
    /// One item at a time, in emission order
    Sequential,
    /// Up to `max_concurrency` items in flight
    BoundedParallel {
        /// Upper bound on simultaneously running actions
        max_concurrency: usize,
    },
}

/// Counters for one run
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunStats {
    /// Items handed to the action
    pub dispatched: u64,
    /// Items whose action wrote at least one output or finished cleanly
    pub completed: u64,
    /// Items with nothing to retrieve
    pub skipped: u64,
    /// Items whose action reported a handled failure
    pub failed: u64,
}

impl RunStats {
    /// Items whose action has returned
    pub fn finished(&self) -> u64 {
        self.completed + self.skipped + self.failed
    }
}

/// Event emitted during extraction
///
/// Subscribe with [`Extractor::subscribe`](crate::Extractor::subscribe).
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// A run began pulling items
    RunStarted {
        /// Action being applied
        action: ActionKind,
        /// Driving policy
        policy: Policy,
    },

    /// One representation was written to disk
    ItemWritten {
        /// Item identifier
        id: ItemId,
        /// Item title
        title: String,
        /// Output category
        category: Category,
        /// Final path of the written file
        path: PathBuf,
        /// Bytes copied
        bytes: u64,
    },

    /// Nothing to retrieve for an item
    ItemSkipped {
        /// Item identifier
        id: ItemId,
        /// Item title
        title: String,
        /// Why it was skipped
        reason: String,
    },

    /// An item-level failure was absorbed
    ItemFailed {
        /// Item identifier
        id: ItemId,
        /// Item title
        title: String,
        /// Machine-readable error code
        code: String,
        /// Error message
        error: String,
    },

    /// A run finished after the enumerator was exhausted
    RunComplete {
        /// Action that was applied
        action: ActionKind,
        /// Final counters
        stats: RunStats,
    },

    /// A run aborted on an enumeration-level failure
    RunFailed {
        /// Action that was applied
        action: ActionKind,
        /// Machine-readable error code
        code: String,
        /// Error message
        error: String,
    },

    /// A run was cancelled
    RunCancelled {
        /// Action that was applied
        action: ActionKind,
        /// Counters at the time of cancellation
        stats: RunStats,
    },
}
