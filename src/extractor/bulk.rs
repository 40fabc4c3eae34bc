//! Whole-store runs, one per output category.

use crate::actions::{FetchContent, FetchMetadata, FetchRevisions, Summarize};
use crate::error::Result;
use crate::types::RunStats;

use super::Extractor;

impl Extractor {
    /// Write one summary block per item to `<output_dir>/<summary_file_name>`.
    ///
    /// The file is truncated first. Blocks appear in emission order, so this run
    /// always uses the sequential policy.
    pub async fn download_summary(&self) -> Result<RunStats> {
        let summarize =
            Summarize::create(self.config.summary_path(), self.event_tx.clone()).await?;
        self.orchestrator().run_sequential(&summarize).await
    }

    /// Download every item's metadata document into `Metadata/`
    pub async fn download_all_metadata(&self) -> Result<RunStats> {
        let action = FetchMetadata::new(self.context());
        self.orchestrator()
            .run_bounded_parallel(&action, self.config.max_concurrency)
            .await
    }

    /// Download every item's primary content into `Content/`
    pub async fn download_all_contents(&self) -> Result<RunStats> {
        let action = FetchContent::new(self.context());
        self.orchestrator()
            .run_bounded_parallel(&action, self.config.max_concurrency)
            .await
    }

    /// Download every revision of every file into `Revisions/`
    pub async fn download_all_revisions(&self) -> Result<RunStats> {
        let action = FetchRevisions::new(self.context());
        self.orchestrator()
            .run_bounded_parallel(&action, self.config.max_concurrency)
            .await
    }
}
