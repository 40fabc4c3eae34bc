//! Revision history downloads -- one file per historical version.

use crate::error::Error;
use crate::retry::fetch_with_retry;
use crate::types::{ActionKind, Category, RemoteItem, RevisionDescriptor};
use crate::writer::WrittenFile;

use super::{ActionContext, ConcurrentAction, ItemAction, ItemOutcome, output_filename};

/// Downloads every revision of each file to `Revisions/<title> - <revisionId>.json`
///
/// Folders are skipped without touching the remote store. A failing revision is
/// logged and does not stop its siblings.
#[derive(Clone)]
pub struct FetchRevisions {
    ctx: ActionContext,
}

impl FetchRevisions {
    /// Create the action
    pub fn new(ctx: ActionContext) -> Self {
        Self { ctx }
    }

    async fn fetch_revision(
        &self,
        item: &RemoteItem,
        revision: &RevisionDescriptor,
    ) -> Result<Option<WrittenFile>, Error> {
        let ctx = &self.ctx;
        let name = output_filename(Category::Revisions, item, Some(revision.id.as_str()));
        let name = &name;

        fetch_with_retry(&ctx.retry, &ctx.cancel_token, move || async move {
            match ctx
                .enumerator
                .open_revision_stream(&item.id, &revision.id)
                .await?
            {
                Some(stream) => ctx
                    .writer
                    .write(stream, Category::Revisions, name)
                    .await
                    .map(Some),
                None => Ok(None),
            }
        })
        .await
    }
}

#[async_trait::async_trait]
impl ItemAction for FetchRevisions {
    fn kind(&self) -> ActionKind {
        ActionKind::FetchRevisions
    }

    async fn apply(&self, item: &RemoteItem) -> ItemOutcome {
        let ctx = &self.ctx;

        if item.is_folder() {
            return ctx.skip(item, "folders have no revisions");
        }

        let revisions = match fetch_with_retry(&ctx.retry, &ctx.cancel_token, move || async move {
            ctx.enumerator.list_revisions(&item.id).await
        })
        .await
        {
            Ok(revisions) => revisions,
            Err(e) => return ctx.fail(self.kind(), item, &e),
        };

        if revisions.is_empty() {
            return ctx.skip(item, "no revisions");
        }

        let total = revisions.len();
        let mut written = 0;
        let mut failures = 0;
        let mut last_error = None;

        for revision in &revisions {
            match self.fetch_revision(item, revision).await {
                Ok(Some(file)) => {
                    ctx.report_written(item, Category::Revisions, &file);
                    written += 1;
                }
                Ok(None) => {
                    tracing::debug!(
                        item_id = %item.id,
                        revision_id = %revision.id,
                        "Revision has no downloadable bytes"
                    );
                }
                Err(e) => {
                    tracing::warn!(
                        item_id = %item.id,
                        title = %item.title,
                        revision_id = %revision.id,
                        error = %e,
                        "Revision download failed"
                    );
                    failures += 1;
                    last_error = Some(e);
                }
            }
        }

        match last_error {
            Some(e) => ctx.fail(
                self.kind(),
                item,
                &Error::Other(format!(
                    "{failures} of {total} revisions failed (wrote {written}), last error: {e}"
                )),
            ),
            None if written == 0 => ctx.skip(item, "no revision had downloadable bytes"),
            None => ItemOutcome::Completed { written },
        }
    }
}

impl ConcurrentAction for FetchRevisions {}
