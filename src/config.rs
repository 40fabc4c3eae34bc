//! Configuration types for drive-extract

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::{path::PathBuf, time::Duration};

/// Main configuration for [`Extractor`](crate::Extractor)
///
/// Every field has a default, so an empty JSON object is a valid configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Config {
    /// Root of the output tree (default: "./extraction")
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,

    /// Maximum actions in flight under the bounded-parallel policy (default: 4)
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,

    /// Name of the flat summary file inside `output_dir` (default: "result.txt")
    #[serde(default = "default_summary_file_name")]
    pub summary_file_name: String,

    /// Stage writes in a hidden file and rename into place (default: true)
    ///
    /// When disabled, destinations are truncated and written directly, so an
    /// interrupted run can leave a partial file behind.
    #[serde(default = "default_true")]
    pub atomic_writes: bool,

    /// Replace path separators and reserved characters in remote titles (default: true)
    #[serde(default = "default_true")]
    pub sanitize_filenames: bool,

    /// What to do when a destination file already exists
    #[serde(default)]
    pub file_collision: FileCollisionAction,

    /// Retry behavior for transient per-item failures
    #[serde(default)]
    pub retry: RetryConfig,

    /// Free space checks before content writes
    #[serde(default)]
    pub disk_space: DiskSpaceConfig,

    /// Capacity of the event broadcast channel (default: 1000)
    #[serde(default = "default_event_channel_capacity")]
    pub event_channel_capacity: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            output_dir: default_output_dir(),
            max_concurrency: default_max_concurrency(),
            summary_file_name: default_summary_file_name(),
            atomic_writes: true,
            sanitize_filenames: true,
            file_collision: FileCollisionAction::default(),
            retry: RetryConfig::default(),
            disk_space: DiskSpaceConfig::default(),
            event_channel_capacity: default_event_channel_capacity(),
        }
    }
}

impl Config {
    /// Create a configuration rooted at `output_dir` with all other settings defaulted
    pub fn with_output_dir(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
            ..Self::default()
        }
    }

    /// Check settings that cannot be expressed through types alone
    pub fn validate(&self) -> Result<()> {
        if self.max_concurrency == 0 {
            return Err(Error::Config {
                message: "max_concurrency must be at least 1".to_string(),
                key: Some("max_concurrency".to_string()),
            });
        }
        if self.event_channel_capacity == 0 {
            return Err(Error::Config {
                message: "event_channel_capacity must be at least 1".to_string(),
                key: Some("event_channel_capacity".to_string()),
            });
        }
        let summary = std::path::Path::new(&self.summary_file_name);
        if self.summary_file_name.is_empty() || summary.components().count() != 1 {
            return Err(Error::Config {
                message: format!(
                    "summary_file_name must be a plain file name, got '{}'",
                    self.summary_file_name
                ),
                key: Some("summary_file_name".to_string()),
            });
        }
        if !self.retry.backoff_multiplier.is_finite() || self.retry.backoff_multiplier < 1.0 {
            return Err(Error::Config {
                message: "retry backoff_multiplier must be a finite value >= 1.0".to_string(),
                key: Some("retry.backoff_multiplier".to_string()),
            });
        }
        if !self.disk_space.size_multiplier.is_finite() || self.disk_space.size_multiplier < 0.0 {
            return Err(Error::Config {
                message: "disk_space size_multiplier must be a finite, non-negative value"
                    .to_string(),
                key: Some("disk_space.size_multiplier".to_string()),
            });
        }
        Ok(())
    }

    /// Path of the flat summary file
    pub fn summary_path(&self) -> PathBuf {
        self.output_dir.join(&self.summary_file_name)
    }
}

/// Retry configuration for transient failures
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Maximum number of retry attempts after the first try (default: 3, 0 disables retry)
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Initial delay before first retry (default: 1 second)
    #[serde(default = "default_initial_delay", with = "duration_serde")]
    pub initial_delay: Duration,

    /// Maximum delay between retries (default: 30 seconds)
    #[serde(default = "default_max_delay", with = "duration_serde")]
    pub max_delay: Duration,

    /// Multiplier for exponential backoff (default: 2.0)
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,

    /// Add random jitter to delays (default: true)
    #[serde(default = "default_true")]
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_delay: default_initial_delay(),
            max_delay: default_max_delay(),
            backoff_multiplier: default_backoff_multiplier(),
            jitter: true,
        }
    }
}

impl RetryConfig {
    /// A configuration that never retries
    pub fn disabled() -> Self {
        Self {
            max_attempts: 0,
            ..Self::default()
        }
    }
}

/// File collision handling
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileCollisionAction {
    /// Add (1), (2), etc. to the filename
    Rename,
    /// Replace the existing file (default)
    #[default]
    Overwrite,
    /// Leave the existing file and report the item as failed
    Skip,
}

/// Disk space checking configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DiskSpaceConfig {
    /// Enable disk space checking (default: true)
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Minimum free space to keep after a write (default: 64 MiB)
    #[serde(default = "default_min_free_space")]
    pub min_free_space: u64,

    /// Multiplier applied to the item's reported size (default: 1.0)
    #[serde(default = "default_size_multiplier")]
    pub size_multiplier: f64,
}

impl Default for DiskSpaceConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            min_free_space: default_min_free_space(),
            size_multiplier: default_size_multiplier(),
        }
    }
}

// Default value functions
fn default_output_dir() -> PathBuf {
    PathBuf::from("extraction")
}

fn default_max_concurrency() -> usize {
    4
}

fn default_summary_file_name() -> String {
    "result.txt".to_string()
}

fn default_true() -> bool {
    true
}

fn default_max_attempts() -> u32 {
    3
}

fn default_initial_delay() -> Duration {
    Duration::from_secs(1)
}

fn default_max_delay() -> Duration {
    Duration::from_secs(30)
}

fn default_backoff_multiplier() -> f64 {
    2.0
}

fn default_min_free_space() -> u64 {
    64 * 1024 * 1024
}

fn default_size_multiplier() -> f64 {
    1.0
}

fn default_event_channel_capacity() -> usize {
    1000
}

// Duration serialization helper
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_secs())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}
