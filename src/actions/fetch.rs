//! Metadata and content downloads -- one representation, one file per item.

use crate::enumerator::EntryStream;
use crate::error::Result;
use crate::retry::fetch_with_retry;
use crate::types::{ActionKind, Category, RemoteItem};
use crate::writer::WrittenFile;

use super::{ActionContext, ConcurrentAction, ItemAction, ItemOutcome, output_filename};

/// Downloads each item's metadata document to `Metadata/<title>.json`
#[derive(Clone)]
pub struct FetchMetadata {
    ctx: ActionContext,
}

impl FetchMetadata {
    /// Create the action
    pub fn new(ctx: ActionContext) -> Self {
        Self { ctx }
    }
}

#[async_trait::async_trait]
impl ItemAction for FetchMetadata {
    fn kind(&self) -> ActionKind {
        ActionKind::FetchMetadata
    }

    async fn apply(&self, item: &RemoteItem) -> ItemOutcome {
        fetch_representation(&self.ctx, self.kind(), Category::Metadata, item).await
    }
}

impl ConcurrentAction for FetchMetadata {}

/// Downloads each item's primary content to `Content/<title>`
#[derive(Clone)]
pub struct FetchContent {
    ctx: ActionContext,
}

impl FetchContent {
    /// Create the action
    pub fn new(ctx: ActionContext) -> Self {
        Self { ctx }
    }
}

#[async_trait::async_trait]
impl ItemAction for FetchContent {
    fn kind(&self) -> ActionKind {
        ActionKind::FetchContent
    }

    async fn apply(&self, item: &RemoteItem) -> ItemOutcome {
        if let Some(size) = item.file_size
            && let Err(e) = self.ctx.writer.check_disk_space(size)
        {
            return self.ctx.fail(self.kind(), item, &e);
        }

        fetch_representation(&self.ctx, self.kind(), Category::Content, item).await
    }
}

impl ConcurrentAction for FetchContent {}

async fn open_representation(
    ctx: &ActionContext,
    category: Category,
    item: &RemoteItem,
) -> Result<Option<EntryStream>> {
    match category {
        Category::Metadata => ctx.enumerator.open_metadata_stream(item).await,
        Category::Content | Category::Revisions => ctx.enumerator.open_content_stream(item).await,
    }
}

/// Open one representation and hand it to the writer, retrying transient failures.
async fn fetch_representation(
    ctx: &ActionContext,
    kind: ActionKind,
    category: Category,
    item: &RemoteItem,
) -> ItemOutcome {
    let name = output_filename(category, item, None);
    let name = &name;

    let result = fetch_with_retry(&ctx.retry, &ctx.cancel_token, move || async move {
        match open_representation(ctx, category, item).await? {
            Some(stream) => ctx
                .writer
                .write(stream, category, name)
                .await
                .map(Some),
            None => Ok::<Option<WrittenFile>, _>(None),
        }
    })
    .await;

    match result {
        Ok(Some(file)) => {
            ctx.report_written(item, category, &file);
            ItemOutcome::Completed { written: 1 }
        }
        Ok(None) => ctx.skip(item, format!("no {} representation", category.dir_name())),
        Err(e) => ctx.fail(kind, item, &e),
    }
}
