//! # drive-extract
//!
//! Bulk retrieval engine for forensic acquisition of a remote drive.
//!
//! ## Design Philosophy
//!
//! drive-extract is designed to be:
//! - **Faithful** - Every byte lands on disk exactly as the store served it
//! - **Fault-isolating** - One bad item never stops a run; only enumeration failures do
//! - **Library-first** - No CLI or UI, purely a Rust crate for embedding
//! - **Event-driven** - Consumers subscribe to events, no polling required
//!
//! The remote store is reached through an [`Enumerator`] supplied by the caller.
//! An [`Extractor`] pulls every item from it and writes one of four outputs under
//! the configured root:
//!
//! ```text
//! <output_dir>/result.txt                      summary, one block per item
//! <output_dir>/Metadata/<title>.json
//! <output_dir>/Content/<title>
//! <output_dir>/Revisions/<title> - <revision>.json
//! ```
//!
//! ## Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use drive_extract::{Config, Enumerator, Extractor, run_with_shutdown};
//!
//! async fn acquire(enumerator: Arc<dyn Enumerator>) -> drive_extract::Result<()> {
//!     let extractor = Extractor::new(Config::with_output_dir("evidence"), enumerator)?;
//!
//!     // Subscribe to events
//!     let mut events = extractor.subscribe();
//!     tokio::spawn(async move {
//!         while let Ok(event) = events.recv().await {
//!             println!("Event: {:?}", event);
//!         }
//!     });
//!
//!     extractor.download_summary().await?;
//!     run_with_shutdown(&extractor, extractor.download_all_contents()).await?;
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// Per-item actions
pub mod actions;
/// Configuration types
pub mod config;
/// Remote store abstraction
pub mod enumerator;
/// Error types
pub mod error;
/// Extraction facade
pub mod extractor;
/// Driving policies
pub mod orchestrator;
/// Retry logic with exponential backoff
pub mod retry;
/// Core types and events
pub mod types;
/// Utility functions
pub mod utils;
/// Output tree writer
pub mod writer;

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
pub(crate) mod test_helpers;

use std::future::Future;

// Re-export commonly used types
pub use actions::{
    ActionContext, ConcurrentAction, FetchContent, FetchMetadata, FetchRevisions, ItemAction,
    ItemOutcome, Summarize,
};
pub use config::{Config, DiskSpaceConfig, FileCollisionAction, RetryConfig};
pub use enumerator::{Enumerator, EntryStream, ItemStream};
pub use error::{Error, Result, WriteError};
pub use extractor::Extractor;
pub use orchestrator::Orchestrator;
pub use types::{
    ActionKind, Category, Event, ItemId, Policy, Principal, RemoteItem, RevisionDescriptor,
    RevisionId, RunStats,
};
pub use writer::{OutputName, StreamWriter, WrittenFile};

/// Helper function to drive a run with graceful signal handling.
///
/// Awaits `run`; if a termination signal arrives first, the extractor is cancelled
/// and `run` is awaited until it winds down (normally with [`Error::Cancelled`]).
///
/// - **Unix:** listens for SIGTERM and SIGINT, with fallbacks if signal registration fails.
/// - **Windows/other:** listens for Ctrl+C via `tokio::signal::ctrl_c()`.
///
/// # Example
///
/// ```no_run
/// use drive_extract::{Extractor, run_with_shutdown};
///
/// # async fn example(extractor: Extractor) -> drive_extract::Result<()> {
/// let stats = run_with_shutdown(&extractor, extractor.download_all_revisions()).await?;
/// println!("{} items processed", stats.finished());
/// # Ok(())
/// # }
/// ```
pub async fn run_with_shutdown<F, T>(extractor: &Extractor, run: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    tokio::pin!(run);

    tokio::select! {
        result = &mut run => result,
        _ = wait_for_signal() => {
            extractor.cancel();
            run.await
        }
    }
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{SignalKind, signal};

    // Set up signal handlers - these may fail in restricted environments (containers, tests)
    let sigterm_result = signal(SignalKind::terminate());
    let sigint_result = signal(SignalKind::interrupt());

    match (sigterm_result, sigint_result) {
        (Ok(mut sigterm), Ok(mut sigint)) => {
            tokio::select! {
                _ = sigterm.recv() => {
                    tracing::info!("Received SIGTERM signal");
                }
                _ = sigint.recv() => {
                    tracing::info!("Received SIGINT signal (Ctrl+C)");
                }
            }
        }
        (Err(e), _) => {
            tracing::warn!(error = %e, "Could not register SIGTERM handler, waiting for SIGINT only");
            if let Ok(mut sigint) = signal(SignalKind::interrupt()) {
                sigint.recv().await;
                tracing::info!("Received SIGINT signal (Ctrl+C)");
            } else {
                tracing::error!("Could not register any signal handlers, using ctrl_c fallback");
                tokio::signal::ctrl_c().await.ok();
            }
        }
        (_, Err(e)) => {
            tracing::warn!(error = %e, "Could not register SIGINT handler, waiting for SIGTERM only");
            if let Ok(mut sigterm) = signal(SignalKind::terminate()) {
                sigterm.recv().await;
                tracing::info!("Received SIGTERM signal");
            } else {
                tracing::error!("Could not register any signal handlers, using ctrl_c fallback");
                tokio::signal::ctrl_c().await.ok();
            }
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => {
            tracing::info!("Received Ctrl+C signal");
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C signal");
        }
    }
}
