//! Flat summary file -- one metadata block per item, appended in emission order.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use tokio::io::AsyncWriteExt;
use tokio::sync::broadcast;

use crate::error::Result;
use crate::types::{ActionKind, Event, RemoteItem};

use super::{ItemAction, ItemOutcome, report_failure};

const BLOCK_SEPARATOR: &str = "======================================";

/// Appends each item's metadata to the summary file.
///
/// The file is a single append target without any locking, so this action is an
/// [`ItemAction`] but not a [`ConcurrentAction`](super::ConcurrentAction): it can
/// only be driven by the sequential policy.
pub struct Summarize {
    path: PathBuf,
    event_tx: broadcast::Sender<Event>,
}

impl Summarize {
    /// Create (or truncate) the summary file and return an action appending to it.
    pub async fn create(
        path: impl Into<PathBuf>,
        event_tx: broadcast::Sender<Event>,
    ) -> Result<Self> {
        let path = path.into();
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::File::create(&path).await?;

        Ok(Self { path, event_tx })
    }

    /// Path of the summary file
    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn append(&self, block: &str) -> Result<()> {
        let mut file = tokio::fs::OpenOptions::new()
            .append(true)
            .open(&self.path)
            .await?;
        file.write_all(block.as_bytes()).await?;
        file.flush().await?;
        Ok(())
    }
}

#[async_trait::async_trait]
impl ItemAction for Summarize {
    fn kind(&self) -> ActionKind {
        ActionKind::Summarize
    }

    async fn apply(&self, item: &RemoteItem) -> ItemOutcome {
        let block = format_summary_block(item);
        match self.append(&block).await {
            Ok(()) => {
                tracing::info!(item_id = %item.id, title = %item.title, "Recorded in summary");
                ItemOutcome::Completed { written: 1 }
            }
            Err(e) => report_failure(
                &self.event_tx,
                self.kind(),
                item,
                e.code(),
                format!("failed to append to {}: {}", self.path.display(), e),
            ),
        }
    }
}

fn date(value: Option<&DateTime<Utc>>) -> String {
    value.map(|d| d.to_rfc3339()).unwrap_or_default()
}

/// Render one item as a summary block, separator included
///
/// Missing values render as empty; the sharing user line only appears when the
/// store reports one.
pub fn format_summary_block(item: &RemoteItem) -> String {
    let mut lines = vec![
        format!("File ID: {}", item.id),
        format!("Title: {}", item.title),
        format!(
            "Original Filename: {}",
            item.original_filename.as_deref().unwrap_or_default()
        ),
        format!(
            "Md5Checksum: {}",
            item.md5_checksum.as_deref().unwrap_or_default()
        ),
        format!(
            "File Size: {}",
            item.file_size.map(|s| s.to_string()).unwrap_or_default()
        ),
        format!("MIME type: {}", item.mime_type),
        format!("Created Date: {}", date(item.created_date.as_ref())),
        format!("Modified Date: {}", date(item.modified_date.as_ref())),
        format!(
            "Last Modifying User: {}",
            item.last_modifying_user
                .as_ref()
                .map(|p| p.display_name.as_str())
                .unwrap_or_default()
        ),
        format!(
            "Last Viewed By Me Date: {}",
            date(item.last_viewed_by_me_date.as_ref())
        ),
        String::new(),
        format!("Shared: {}", item.shared),
    ];
    if let Some(sharing_user) = &item.sharing_user {
        lines.push(format!("Sharing User: {}", sharing_user.display_name));
    }
    lines.extend([
        format!(
            "Last modified by me: {}",
            date(item.modified_by_me_date.as_ref())
        ),
        format!(
            "Download URL: {}",
            item.download_url.as_deref().unwrap_or_default()
        ),
        format!("Explicitly Trashed: {}", item.explicitly_trashed),
        String::new(),
        BLOCK_SEPARATOR.to_string(),
        String::new(),
    ]);

    let mut block = lines.join("\n");
    block.push('\n');
    block
}
