//! Retrieval orchestrator -- drives the enumerator's item sequence through a
//! driving policy and applies a per-item action to every item.
//!
//! Two policies share the same contract:
//! - [`run_sequential`](Orchestrator::run_sequential): one action at a time, in
//!   emission order
//! - [`run_bounded_parallel`](Orchestrator::run_bounded_parallel): up to N actions in
//!   flight; dispatch follows emission order, completion order is unconstrained
//!
//! Only enumeration failures and cancellation end a run early. Item failures are
//! absorbed by the actions and only show up in [`RunStats`].

use std::sync::Arc;

use futures::stream::{FuturesUnordered, StreamExt};
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

use crate::actions::{ConcurrentAction, ItemAction, ItemOutcome};
use crate::enumerator::{Enumerator, ItemStream};
use crate::error::{Error, Result};
use crate::types::{ActionKind, Event, Policy, RunStats};

impl RunStats {
    pub(crate) fn record(&mut self, outcome: &ItemOutcome) {
        match outcome {
            ItemOutcome::Completed { .. } => self.completed += 1,
            ItemOutcome::Skipped { .. } => self.skipped += 1,
            ItemOutcome::Failed { .. } => self.failed += 1,
        }
    }
}

/// Pulls items from an [`Enumerator`] and applies actions to them
#[derive(Clone)]
pub struct Orchestrator {
    enumerator: Arc<dyn Enumerator>,
    event_tx: broadcast::Sender<Event>,
    cancel_token: CancellationToken,
}

impl Orchestrator {
    /// Create an orchestrator over `enumerator`
    pub fn new(
        enumerator: Arc<dyn Enumerator>,
        event_tx: broadcast::Sender<Event>,
        cancel_token: CancellationToken,
    ) -> Self {
        Self {
            enumerator,
            event_tx,
            cancel_token,
        }
    }

    /// Apply `action` to every item, one at a time, in emission order.
    ///
    /// The next item is not requested until the previous action has returned.
    pub async fn run_sequential<A>(&self, action: &A) -> Result<RunStats>
    where
        A: ItemAction + ?Sized,
    {
        let kind = action.kind();
        let mut items = self.start(kind, Policy::Sequential).await?;
        let mut stats = RunStats::default();

        loop {
            let next = tokio::select! {
                biased;
                _ = self.cancel_token.cancelled() => return Err(self.cancelled(kind, stats)),
                next = items.next() => next,
            };

            let item = match next {
                Some(Ok(item)) => item,
                Some(Err(e)) => return Err(self.enumeration_failed(kind, stats, e)),
                None => break,
            };

            stats.dispatched += 1;
            let outcome = tokio::select! {
                biased;
                _ = self.cancel_token.cancelled() => return Err(self.cancelled(kind, stats)),
                outcome = action.apply(&item) => outcome,
            };
            stats.record(&outcome);
        }

        Ok(self.complete(kind, stats))
    }

    /// Apply `action` to every item with at most `max_concurrency` actions in flight.
    ///
    /// A slot is refilled from the enumerator as soon as its action returns. The
    /// call returns once the enumerator is exhausted and every dispatched action has
    /// completed. An enumeration failure stops dispatch and drops the actions still
    /// in flight, which releases their streams.
    pub async fn run_bounded_parallel<A>(&self, action: &A, max_concurrency: usize) -> Result<RunStats>
    where
        A: ConcurrentAction + ?Sized,
    {
        if max_concurrency == 0 {
            return Err(Error::Config {
                message: "max_concurrency must be at least 1".to_string(),
                key: Some("max_concurrency".to_string()),
            });
        }

        let kind = action.kind();
        let mut items = self
            .start(kind, Policy::BoundedParallel { max_concurrency })
            .await?;
        let mut in_flight = FuturesUnordered::new();
        let mut stats = RunStats::default();
        let mut exhausted = false;

        loop {
            let can_dispatch = !exhausted && in_flight.len() < max_concurrency;
            if !can_dispatch && in_flight.is_empty() {
                break;
            }

            tokio::select! {
                biased;
                _ = self.cancel_token.cancelled() => {
                    return Err(self.cancelled(kind, stats));
                }
                Some(outcome) = in_flight.next(), if !in_flight.is_empty() => {
                    stats.record(&outcome);
                }
                next = items.next(), if can_dispatch => match next {
                    Some(Ok(item)) => {
                        stats.dispatched += 1;
                        in_flight.push(async move { action.apply(&item).await });
                    }
                    Some(Err(e)) => return Err(self.enumeration_failed(kind, stats, e)),
                    None => exhausted = true,
                },
                else => break,
            }
        }

        Ok(self.complete(kind, stats))
    }

    async fn start(&self, kind: ActionKind, policy: Policy) -> Result<ItemStream> {
        tracing::info!(action = %kind, policy = ?policy, "Starting run");
        self.event_tx
            .send(Event::RunStarted {
                action: kind,
                policy,
            })
            .ok();

        tokio::select! {
            biased;
            _ = self.cancel_token.cancelled() => Err(self.cancelled(kind, RunStats::default())),
            listing = self.enumerator.list_all() => {
                listing.map_err(|e| self.enumeration_failed(kind, RunStats::default(), e))
            }
        }
    }

    fn complete(&self, kind: ActionKind, stats: RunStats) -> RunStats {
        tracing::info!(
            action = %kind,
            dispatched = stats.dispatched,
            completed = stats.completed,
            skipped = stats.skipped,
            failed = stats.failed,
            "Run complete"
        );
        self.event_tx
            .send(Event::RunComplete {
                action: kind,
                stats,
            })
            .ok();
        stats
    }

    /// End the run on an error from the enumerator.
    ///
    /// A cancelled listing ends the run as cancelled. Other run-level errors pass
    /// through and anything item-shaped becomes [`Error::Enumeration`].
    fn enumeration_failed(&self, kind: ActionKind, stats: RunStats, error: Error) -> Error {
        if matches!(error, Error::Cancelled) {
            return self.cancelled(kind, stats);
        }

        let error = if error.is_fatal() {
            error
        } else {
            Error::Enumeration(error.to_string())
        };
        tracing::error!(
            action = %kind,
            code = error.code(),
            error = %error,
            dispatched = stats.dispatched,
            "Enumeration failed, aborting run"
        );
        self.event_tx
            .send(Event::RunFailed {
                action: kind,
                code: error.code().to_string(),
                error: error.to_string(),
            })
            .ok();
        error
    }

    fn cancelled(&self, kind: ActionKind, stats: RunStats) -> Error {
        tracing::warn!(
            action = %kind,
            dispatched = stats.dispatched,
            finished = stats.finished(),
            "Run cancelled"
        );
        self.event_tx
            .send(Event::RunCancelled {
                action: kind,
                stats,
            })
            .ok();
        Error::Cancelled
    }
}
