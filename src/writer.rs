//! Stream writer -- persists one open remote stream under `<root>/<category>/<filename>`.
//!
//! Category directories are created on first write. With atomic writes enabled the
//! bytes land in a hidden staging file inside the category directory and are
//! renamed over the destination only after the stream is fully drained and synced,
//! so an interrupted run never leaves a truncated file at a final path.

use std::path::{Path, PathBuf};

use tokio::io::AsyncWriteExt;

use crate::config::{Config, DiskSpaceConfig, FileCollisionAction};
use crate::enumerator::EntryStream;
use crate::error::{Error, Result, WriteError};
use crate::types::Category;
use crate::utils::{
    MAX_RENAME_ATTEMPTS, get_available_space, nearest_existing_ancestor, numbered_path,
    sanitize_filename_with_suffix,
};

/// Prefix and suffix of staging files, so leftovers are easy to recognize
const STAGING_PREFIX: &str = ".";
const STAGING_SUFFIX: &str = ".part";

/// A file the writer finished
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WrittenFile {
    /// Final path on disk (may differ from the requested name under the rename policy)
    pub path: PathBuf,
    /// Bytes copied from the stream
    pub bytes: u64,
}

/// Requested name of an output file
///
/// The stem comes from the remote title and may be shortened to fit the
/// filesystem. The suffix distinguishes files of the same item and is kept whole.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct OutputName {
    /// Title-derived part
    pub stem: String,
    /// Fixed tail, such as `" - <revision>.json"` or `".json"`
    pub suffix: String,
}

impl OutputName {
    /// Create a name from its two parts
    pub fn new(stem: impl Into<String>, suffix: impl Into<String>) -> Self {
        Self {
            stem: stem.into(),
            suffix: suffix.into(),
        }
    }
}

impl From<&str> for OutputName {
    fn from(name: &str) -> Self {
        Self::new(name, "")
    }
}

impl From<&OutputName> for OutputName {
    fn from(name: &OutputName) -> Self {
        name.clone()
    }
}

impl std::fmt::Display for OutputName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}{}", self.stem, self.suffix)
    }
}

/// Lays out downloaded streams in the output tree
#[derive(Clone, Debug)]
pub struct StreamWriter {
    root: PathBuf,
    atomic: bool,
    sanitize: bool,
    collision: FileCollisionAction,
    disk_space: DiskSpaceConfig,
}

impl StreamWriter {
    /// Build a writer from the extraction configuration
    pub fn new(config: &Config) -> Self {
        Self {
            root: config.output_dir.clone(),
            atomic: config.atomic_writes,
            sanitize: config.sanitize_filenames,
            collision: config.file_collision,
            disk_space: config.disk_space.clone(),
        }
    }

    /// Root of the output tree
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory that holds a category's files
    pub fn category_dir(&self, category: Category) -> PathBuf {
        self.root.join(category.dir_name())
    }

    /// Create the category directory if it does not exist yet.
    ///
    /// Concurrent callers racing on the same directory all succeed.
    pub async fn ensure_category_dir(&self, category: Category) -> Result<PathBuf> {
        let dir = self.category_dir(category);
        match tokio::fs::create_dir_all(&dir).await {
            Ok(()) => Ok(dir),
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists && dir.is_dir() => Ok(dir),
            Err(source) => Err(WriteError::CreateDir { path: dir, source }.into()),
        }
    }

    /// Resolve the destination path for `name` inside `dir`.
    ///
    /// Without sanitization the name is used verbatim, but anything that would
    /// escape the category directory is still rejected.
    pub fn destination(&self, dir: &Path, name: &OutputName) -> Result<PathBuf> {
        if self.sanitize {
            return Ok(dir.join(sanitize_filename_with_suffix(&name.stem, &name.suffix)));
        }

        let filename = name.to_string();
        let mut components = Path::new(&filename).components();
        match (components.next(), components.next()) {
            (Some(std::path::Component::Normal(_)), None) => Ok(dir.join(&filename)),
            _ => Err(WriteError::InvalidPath {
                path: dir.join(&filename),
                reason: "filename must be a single path component".to_string(),
            }
            .into()),
        }
    }

    /// Fail early when the output volume cannot hold `size_bytes` more.
    pub fn check_disk_space(&self, size_bytes: u64) -> Result<()> {
        if !self.disk_space.enabled {
            return Ok(());
        }

        let required = (size_bytes as f64 * self.disk_space.size_multiplier) as u64;
        let required_with_buffer = required.saturating_add(self.disk_space.min_free_space);

        let check_path = nearest_existing_ancestor(&self.root).ok_or_else(|| {
            Error::DiskSpaceCheckFailed(format!(
                "Cannot find an existing ancestor of '{}'",
                self.root.display()
            ))
        })?;

        let available = get_available_space(check_path).map_err(|e| {
            Error::DiskSpaceCheckFailed(format!(
                "Failed to check disk space for '{}': {}",
                check_path.display(),
                e
            ))
        })?;

        if available < required_with_buffer {
            return Err(Error::InsufficientSpace {
                required: required_with_buffer,
                available,
            });
        }

        Ok(())
    }

    /// Drain `stream` into `<root>/<category>/<name>`.
    ///
    /// The stream is consumed and therefore closed on every exit path. Completion
    /// means every byte has been written (and, for atomic writes, synced and moved
    /// into place).
    pub async fn write(
        &self,
        stream: EntryStream,
        category: Category,
        name: impl Into<OutputName>,
    ) -> Result<WrittenFile> {
        let dir = self.ensure_category_dir(category).await?;
        let dest = self.destination(&dir, &name.into())?;

        // Refuse before pulling any bytes off the network
        if self.collision == FileCollisionAction::Skip && dest.exists() {
            return Err(collision(&dest));
        }

        let written = if self.atomic {
            self.write_staged(stream, &dir, &dest).await?
        } else {
            self.write_direct(stream, &dest).await?
        };

        tracing::debug!(
            category = %category,
            path = %written.path.display(),
            bytes = written.bytes,
            "Stream written to disk"
        );

        Ok(written)
    }

    async fn write_staged(&self, stream: EntryStream, dir: &Path, dest: &Path) -> Result<WrittenFile> {
        let staged = tempfile::Builder::new()
            .prefix(STAGING_PREFIX)
            .suffix(STAGING_SUFFIX)
            .tempfile_in(dir)
            .map_err(|source| WriteError::Stage {
                path: dir.to_path_buf(),
                source,
            })?;
        let (file, staging_path) = staged.into_parts();

        // Dropping staging_path on any error below removes the partial file
        let mut out = tokio::fs::File::from_std(file);
        let bytes = drain_into(stream, &mut out, &staging_path).await?;
        out.sync_all().await.map_err(|source| WriteError::Copy {
            path: staging_path.to_path_buf(),
            source,
        })?;
        drop(out);

        let path = self.persist(staging_path, dest)?;
        Ok(WrittenFile { path, bytes })
    }

    fn persist(&self, mut staging_path: tempfile::TempPath, dest: &Path) -> Result<PathBuf> {
        match self.collision {
            FileCollisionAction::Overwrite => {
                staging_path.persist(dest).map_err(|e| WriteError::Persist {
                    path: dest.to_path_buf(),
                    source: e.error,
                })?;
                Ok(dest.to_path_buf())
            }
            FileCollisionAction::Skip => match staging_path.persist_noclobber(dest) {
                Ok(()) => Ok(dest.to_path_buf()),
                Err(e) if e.error.kind() == std::io::ErrorKind::AlreadyExists => {
                    Err(collision(dest))
                }
                Err(e) => Err(WriteError::Persist {
                    path: dest.to_path_buf(),
                    source: e.error,
                }
                .into()),
            },
            FileCollisionAction::Rename => {
                for attempt in 0..=MAX_RENAME_ATTEMPTS {
                    let candidate = numbered_path(dest, attempt);
                    match staging_path.persist_noclobber(&candidate) {
                        Ok(()) => return Ok(candidate),
                        Err(e) if e.error.kind() == std::io::ErrorKind::AlreadyExists => {
                            staging_path = e.path;
                        }
                        Err(e) => {
                            return Err(WriteError::Persist {
                                path: candidate,
                                source: e.error,
                            }
                            .into());
                        }
                    }
                }
                Err(rename_exhausted(dest))
            }
        }
    }

    async fn write_direct(&self, stream: EntryStream, dest: &Path) -> Result<WrittenFile> {
        let (mut out, path) = self.open_direct(dest).await?;

        match drain_into(stream, &mut out, &path).await {
            Ok(bytes) => Ok(WrittenFile { path, bytes }),
            Err(e) => {
                drop(out);
                if let Err(remove_err) = tokio::fs::remove_file(&path).await {
                    tracing::warn!(
                        path = %path.display(),
                        error = %remove_err,
                        "Failed to remove partial file"
                    );
                }
                Err(e)
            }
        }
    }

    async fn open_direct(&self, dest: &Path) -> Result<(tokio::fs::File, PathBuf)> {
        let open_err = |path: &Path, source: std::io::Error| -> Error {
            WriteError::Copy {
                path: path.to_path_buf(),
                source,
            }
            .into()
        };

        match self.collision {
            FileCollisionAction::Overwrite => {
                let file = tokio::fs::File::create(dest)
                    .await
                    .map_err(|e| open_err(dest, e))?;
                Ok((file, dest.to_path_buf()))
            }
            FileCollisionAction::Skip => match create_new(dest).await {
                Ok(file) => Ok((file, dest.to_path_buf())),
                Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => Err(collision(dest)),
                Err(e) => Err(open_err(dest, e)),
            },
            FileCollisionAction::Rename => {
                for attempt in 0..=MAX_RENAME_ATTEMPTS {
                    let candidate = numbered_path(dest, attempt);
                    match create_new(&candidate).await {
                        Ok(file) => return Ok((file, candidate)),
                        Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => continue,
                        Err(e) => return Err(open_err(&candidate, e)),
                    }
                }
                Err(rename_exhausted(dest))
            }
        }
    }
}

async fn create_new(path: &Path) -> std::io::Result<tokio::fs::File> {
    tokio::fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(path)
        .await
}

/// Copy the whole stream into `out` and flush. Consumes the stream.
async fn drain_into(
    mut stream: EntryStream,
    out: &mut tokio::fs::File,
    path: &Path,
) -> Result<u64> {
    let copy_err = |source| WriteError::Copy {
        path: path.to_path_buf(),
        source,
    };
    let bytes = tokio::io::copy(&mut stream, out).await.map_err(copy_err)?;
    out.flush().await.map_err(copy_err)?;
    Ok(bytes)
}

fn collision(path: &Path) -> Error {
    WriteError::FileCollision {
        path: path.to_path_buf(),
        reason: "File already exists and collision action is Skip".to_string(),
    }
    .into()
}

fn rename_exhausted(path: &Path) -> Error {
    WriteError::FileCollision {
        path: path.to_path_buf(),
        reason: format!(
            "Could not find unique filename after {} attempts",
            MAX_RENAME_ATTEMPTS
        ),
    }
    .into()
}
