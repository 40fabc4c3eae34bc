//! Custom test assertions for integration tests

use std::path::Path;

use drive_extract::Event;
use tokio::sync::broadcast;

/// Names of the regular files directly inside `dir`, sorted; empty if `dir` is missing
pub fn file_names(dir: &Path) -> Vec<String> {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return Vec::new();
    };
    let mut names: Vec<String> = entries
        .map(|e| e.unwrap())
        .filter(|e| e.file_type().unwrap().is_file())
        .map(|e| e.file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}

/// Assert no staging leftovers (`*.part`) remain in `dir`
pub fn assert_no_staging_files(dir: &Path) {
    let leftovers: Vec<String> = file_names(dir)
        .into_iter()
        .filter(|name| name.ends_with(".part"))
        .collect();
    assert!(
        leftovers.is_empty(),
        "staging files left in {}: {:?}",
        dir.display(),
        leftovers
    );
}

/// `File ID` values of a summary file, in file order
pub fn summary_ids(summary: &Path) -> Vec<String> {
    std::fs::read_to_string(summary)
        .unwrap()
        .lines()
        .filter_map(|line| line.strip_prefix("File ID: "))
        .map(str::to_string)
        .collect()
}

/// Every event currently buffered for `events`
pub fn drain_events(events: &mut broadcast::Receiver<Event>) -> Vec<Event> {
    let mut out = Vec::new();
    while let Ok(event) = events.try_recv() {
        out.push(event);
    }
    out
}
