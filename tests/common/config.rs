//! Test configuration helpers

use std::path::Path;
use std::sync::Arc;

use drive_extract::{Config, Extractor, RetryConfig};

use super::FakeDrive;

/// Config rooted in `dir`: no retries, no disk space preflight
pub fn test_config(dir: &Path) -> Config {
    let mut config = Config::with_output_dir(dir);
    config.retry = RetryConfig::disabled();
    config.disk_space.enabled = false;
    config
}

/// Extractor over `drive` writing into a fresh temp dir (which must be kept alive)
pub fn extractor_for(drive: FakeDrive) -> (Extractor, tempfile::TempDir, Arc<FakeDrive>) {
    extractor_with(drive, |_| {})
}

/// Like [`extractor_for`], with a chance to adjust the config first
pub fn extractor_with(
    drive: FakeDrive,
    configure: impl FnOnce(&mut Config),
) -> (Extractor, tempfile::TempDir, Arc<FakeDrive>) {
    let temp_dir = tempfile::tempdir().unwrap();
    let mut config = test_config(temp_dir.path());
    configure(&mut config);

    let drive = Arc::new(drive);
    let extractor = Extractor::new(config, drive.clone()).unwrap();
    (extractor, temp_dir, drive)
}
