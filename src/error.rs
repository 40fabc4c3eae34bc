//! Error types for drive-extract
//!
//! Errors fall into three tiers:
//! - Run-level failures (enumeration, cancellation, configuration) that cross the
//!   orchestrator boundary and abort a run
//! - Item-level failures (remote stream errors, filesystem errors) that are absorbed
//!   by the per-item actions and reported through logs and events
//! - Writer failures ([`WriteError`]) raised by the stream writer while laying out
//!   output files

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for drive-extract operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for drive-extract
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "max_concurrency")
        key: Option<String>,
    },

    /// The remote collection could not be listed; fatal to the whole run
    #[error("enumeration failed: {0}")]
    Enumeration(String),

    /// Remote item not found by identifier
    #[error("item not found: {0}")]
    NotFound(String),

    /// Remote store rejected or failed a request
    #[error("remote error: {message}")]
    Remote {
        /// Error detail reported by the enumerator
        message: String,
        /// Whether the failure is transient (timeouts, throttling, 5xx)
        retryable: bool,
    },

    /// Stream writer failure
    #[error("write error: {0}")]
    Write(#[from] WriteError),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Insufficient disk space for an item's content
    #[error("insufficient disk space: need {required} bytes, have {available} bytes")]
    InsufficientSpace {
        /// Number of bytes required for the write
        required: u64,
        /// Number of bytes currently available on disk
        available: u64,
    },

    /// Failed to check disk space
    #[error("failed to check disk space: {0}")]
    DiskSpaceCheckFailed(String),

    /// Run was cancelled before completion
    #[error("run cancelled")]
    Cancelled,

    /// Other error
    #[error("{0}")]
    Other(String),
}

/// Failures raised while persisting a stream to the output tree
#[derive(Debug, Error)]
pub enum WriteError {
    /// Category directory could not be created
    #[error("failed to create directory {path}: {source}")]
    CreateDir {
        /// Directory that could not be created
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// Staging file next to the destination could not be created
    #[error("failed to create staging file in {path}: {source}")]
    Stage {
        /// Directory the staging file was to be created in
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// Copying the stream into the destination failed part way
    #[error("failed to copy stream into {path}: {source}")]
    Copy {
        /// Destination (or staging) path being written
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// Staged file could not be moved into place
    #[error("failed to move staged file to {path}: {source}")]
    Persist {
        /// Final destination path
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// Destination already exists and the collision policy forbids replacing it
    #[error("file collision at {path}: {reason}")]
    FileCollision {
        /// The path where the collision occurred
        path: PathBuf,
        /// The reason for the collision (e.g., "file already exists")
        reason: String,
    },

    /// Filename cannot be turned into a usable path
    #[error("invalid path {path}: {reason}")]
    InvalidPath {
        /// The invalid path that was encountered
        path: PathBuf,
        /// The reason the path is invalid
        reason: String,
    },
}

impl Error {
    /// Construct a transient remote error
    pub fn transient(message: impl Into<String>) -> Self {
        Error::Remote {
            message: message.into(),
            retryable: true,
        }
    }

    /// Construct a permanent remote error
    pub fn permanent(message: impl Into<String>) -> Self {
        Error::Remote {
            message: message.into(),
            retryable: false,
        }
    }

    /// Whether this error aborts a whole run rather than a single item
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Error::Enumeration(_) | Error::Cancelled | Error::Config { .. }
        )
    }

    /// Machine-readable error code, carried by failure events and log fields
    pub fn code(&self) -> &'static str {
        match self {
            Error::Config { .. } => "config_error",
            Error::Enumeration(_) => "enumeration_failed",
            Error::NotFound(_) => "not_found",
            Error::Remote { .. } => "remote_error",
            Error::Write(WriteError::CreateDir { .. }) => "create_dir_failed",
            Error::Write(WriteError::Stage { .. }) => "stage_failed",
            Error::Write(WriteError::Copy { .. }) => "copy_failed",
            Error::Write(WriteError::Persist { .. }) => "persist_failed",
            Error::Write(WriteError::FileCollision { .. }) => "file_collision",
            Error::Write(WriteError::InvalidPath { .. }) => "invalid_path",
            Error::Io(_) => "io_error",
            Error::InsufficientSpace { .. } => "insufficient_space",
            Error::DiskSpaceCheckFailed(_) => "disk_space_check_failed",
            Error::Cancelled => "cancelled",
            Error::Other(_) => "internal_error",
        }
    }
}
