//! Retry logic with exponential backoff
//!
//! Per-item retrieval wraps its stream-open and write steps in
//! [`fetch_with_retry`]. Only failures classified as transient by [`IsRetryable`]
//! are attempted again; everything else is returned immediately. Waiting between
//! attempts stops as soon as the run is cancelled.
//!
//! # Example
//!
//! ```no_run
//! use drive_extract::retry::{IsRetryable, fetch_with_retry};
//! use drive_extract::config::RetryConfig;
//! use tokio_util::sync::CancellationToken;
//!
//! #[derive(Debug)]
//! enum MyError {
//!     Transient,
//!     Permanent,
//! }
//!
//! impl std::fmt::Display for MyError {
//!     fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
//!         write!(f, "{:?}", self)
//!     }
//! }
//!
//! impl IsRetryable for MyError {
//!     fn is_retryable(&self) -> bool {
//!         matches!(self, MyError::Transient)
//!     }
//! }
//!
//! # async fn example() -> Result<(), MyError> {
//! let config = RetryConfig::default();
//! let cancel = CancellationToken::new();
//! let result = fetch_with_retry(&config, &cancel, || async {
//!     Ok::<_, MyError>(())
//! }).await?;
//! # Ok(())
//! # }
//! ```

use crate::config::RetryConfig;
use crate::error::{Error, WriteError};
use rand::Rng;
use std::future::Future;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Trait for errors that can be classified as retryable or not
///
/// Transient failures (timeouts, throttling, connection reset) should return `true`.
/// Permanent failures (not found, permission denied, disk full) should return `false`.
pub trait IsRetryable {
    /// Returns true if the error is transient and the operation should be retried
    fn is_retryable(&self) -> bool;
}

fn is_transient_io(e: &std::io::Error) -> bool {
    matches!(
        e.kind(),
        std::io::ErrorKind::TimedOut
            | std::io::ErrorKind::ConnectionRefused
            | std::io::ErrorKind::ConnectionReset
            | std::io::ErrorKind::ConnectionAborted
            | std::io::ErrorKind::NotConnected
            | std::io::ErrorKind::BrokenPipe
            | std::io::ErrorKind::Interrupted
    )
}

impl IsRetryable for Error {
    fn is_retryable(&self) -> bool {
        match self {
            Error::Remote { retryable, .. } => *retryable,
            Error::Io(e) => is_transient_io(e),
            // A copy failure is a read from the remote stream dropping out part way
            Error::Write(WriteError::Copy { source, .. }) => is_transient_io(source),
            Error::Write(_) => false,
            Error::Config { .. } => false,
            Error::Enumeration(_) => false,
            Error::NotFound(_) => false,
            Error::InsufficientSpace { .. } => false,
            Error::DiskSpaceCheckFailed(_) => false,
            Error::Cancelled => false,
            Error::Other(_) => false,
        }
    }
}

/// Delays to wait between attempts of one operation
///
/// Yields at most `max_attempts` delays. The first is `initial_delay`, each later
/// one is `backoff_multiplier` times the previous, and none exceeds `max_delay`
/// before jitter. With jitter on, each delay is stretched by a random 0-100%.
#[derive(Debug)]
pub struct Backoff<'a> {
    config: &'a RetryConfig,
    remaining: u32,
    base: Duration,
}

impl<'a> Backoff<'a> {
    /// Fresh schedule for `config`
    pub fn new(config: &'a RetryConfig) -> Self {
        Self {
            config,
            remaining: config.max_attempts,
            base: config.initial_delay.min(config.max_delay),
        }
    }
}

impl Iterator for Backoff<'_> {
    type Item = Duration;

    fn next(&mut self) -> Option<Duration> {
        self.remaining = self.remaining.checked_sub(1)?;

        let base = self.base;
        self.base = Duration::try_from_secs_f64(base.as_secs_f64() * self.config.backoff_multiplier)
            .unwrap_or(self.config.max_delay)
            .min(self.config.max_delay);

        if self.config.jitter {
            let stretch: f64 = rand::thread_rng().gen_range(1.0..=2.0);
            Some(Duration::try_from_secs_f64(base.as_secs_f64() * stretch).unwrap_or(base))
        } else {
            Some(base)
        }
    }
}

/// Run `operation`, retrying transient failures on the [`Backoff`] schedule
///
/// Permanent failures are returned at once. When the schedule runs out, or
/// `cancel` fires while waiting for the next attempt, the last error is returned
/// without trying again. With `max_attempts == 0` the operation runs exactly once.
pub async fn fetch_with_retry<F, Fut, T, E>(
    config: &RetryConfig,
    cancel: &CancellationToken,
    mut operation: F,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: IsRetryable + std::fmt::Display,
{
    let mut backoff = Backoff::new(config);
    let mut attempt: u32 = 1;

    loop {
        let error = match operation().await {
            Ok(value) => {
                if attempt > 1 {
                    tracing::info!(attempts = attempt, "Fetch succeeded after retry");
                }
                return Ok(value);
            }
            Err(e) if !e.is_retryable() => return Err(e),
            Err(e) => e,
        };

        let Some(delay) = backoff.next() else {
            if attempt > 1 {
                tracing::debug!(error = %error, attempts = attempt, "Retries exhausted");
            }
            return Err(error);
        };

        tracing::warn!(
            error = %error,
            attempt,
            max_attempts = config.max_attempts,
            delay_ms = delay.as_millis() as u64,
            "Transient failure, retrying"
        );

        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                tracing::debug!(error = %error, attempt, "Cancelled during backoff");
                return Err(error);
            }
            _ = tokio::time::sleep(delay) => {}
        }
        attempt += 1;
    }
}
