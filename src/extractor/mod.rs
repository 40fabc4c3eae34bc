//! Extraction facade split into focused submodules.
//!
//! The `Extractor` struct and its methods are organized by entry point:
//! - [`bulk`] - Whole-store runs (summary, metadata, content, revisions)
//! - [`by_id`] - Single-item retrieval by identifier

mod bulk;
mod by_id;


use std::sync::Arc;

use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

use crate::actions::ActionContext;
use crate::config::Config;
use crate::enumerator::Enumerator;
use crate::error::Result;
use crate::orchestrator::Orchestrator;
use crate::types::Event;
use crate::writer::StreamWriter;

/// Main extraction handle (cloneable - all fields are Arc-wrapped or cheap handles)
#[derive(Clone)]
pub struct Extractor {
    /// Configuration (wrapped in Arc for sharing across tasks)
    pub(crate) config: Arc<Config>,
    /// Source of items and their streams
    pub(crate) enumerator: Arc<dyn Enumerator>,
    /// Lays out downloaded streams under the output root
    pub(crate) writer: Arc<StreamWriter>,
    /// Event broadcast channel sender (multiple subscribers supported)
    pub(crate) event_tx: broadcast::Sender<Event>,
    /// Cancels whichever run is in progress, and every later one
    pub(crate) cancel_token: CancellationToken,
}

impl Extractor {
    /// Create a new extractor over `enumerator`
    ///
    /// The configuration is validated up front; nothing touches the filesystem
    /// until a run writes its first file.
    pub fn new(config: Config, enumerator: Arc<dyn Enumerator>) -> Result<Self> {
        config.validate()?;

        let (event_tx, _rx) = broadcast::channel(config.event_channel_capacity);
        let writer = Arc::new(StreamWriter::new(&config));

        tracing::debug!(
            output_dir = %config.output_dir.display(),
            max_concurrency = config.max_concurrency,
            atomic_writes = config.atomic_writes,
            "Extractor initialized"
        );

        Ok(Self {
            config: Arc::new(config),
            enumerator,
            writer,
            event_tx,
            cancel_token: CancellationToken::new(),
        })
    }

    /// Active configuration
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Subscribe to extraction events
    ///
    /// Multiple subscribers are supported. Each subscriber receives all events independently.
    /// A subscriber that falls behind by more than `event_channel_capacity` events
    /// receives `RecvError::Lagged`.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// # use drive_extract::{Extractor, Event};
    /// # async fn watch(extractor: &Extractor) {
    /// let mut events = extractor.subscribe();
    /// tokio::spawn(async move {
    ///     while let Ok(event) = events.recv().await {
    ///         if let Event::ItemFailed { title, error, .. } = event {
    ///             eprintln!("{title}: {error}");
    ///         }
    ///     }
    /// });
    /// # }
    /// ```
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.event_tx.subscribe()
    }

    /// Token observed by every run; cancel it to stop extraction
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel_token.clone()
    }

    /// Stop the current run. In-flight items are abandoned and their streams released.
    pub fn cancel(&self) {
        tracing::info!("Cancelling extraction");
        self.cancel_token.cancel();
    }

    /// Orchestrator bound to this extractor's enumerator, events and token
    pub fn orchestrator(&self) -> Orchestrator {
        Orchestrator::new(
            Arc::clone(&self.enumerator),
            self.event_tx.clone(),
            self.cancel_token.clone(),
        )
    }

    /// Collaborators for building download actions
    pub fn context(&self) -> ActionContext {
        ActionContext::new(
            Arc::clone(&self.enumerator),
            Arc::clone(&self.writer),
            self.config.retry.clone(),
            self.event_tx.clone(),
            self.cancel_token.clone(),
        )
    }
}
