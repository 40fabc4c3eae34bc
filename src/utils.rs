//! Filename and filesystem helpers for laying out the output tree

use std::path::{Path, PathBuf};

/// Maximum number of numbered alternatives tried under the rename collision policy
pub const MAX_RENAME_ATTEMPTS: u32 = 9999;

/// Longest filename (in bytes) most filesystems accept
const MAX_FILENAME_BYTES: usize = 255;

/// Fallback for titles that sanitize to nothing
const UNTITLED: &str = "untitled";

const RESERVED_DEVICE_NAMES: &[&str] = &[
    "CON", "PRN", "AUX", "NUL", "COM1", "COM2", "COM3", "COM4", "COM5", "COM6", "COM7", "COM8",
    "COM9", "LPT1", "LPT2", "LPT3", "LPT4", "LPT5", "LPT6", "LPT7", "LPT8", "LPT9",
];

/// Turn a remote title into a single, portable path component
///
/// Path separators, characters reserved on Windows (`:*?"<>|`), and control
/// characters become `_`. Trailing dots and spaces are trimmed, Windows device
/// names get a `_` prefix, and the result is capped at 255 bytes.
///
/// # Examples
///
/// ```
/// use drive_extract::utils::sanitize_filename;
///
/// assert_eq!(sanitize_filename("Q3/Q4 report: final?.pdf"), "Q3_Q4 report_ final_.pdf");
/// assert_eq!(sanitize_filename(".."), "untitled");
/// assert_eq!(sanitize_filename("CON.txt"), "_CON.txt");
/// ```
#[must_use]
pub fn sanitize_filename(name: &str) -> String {
    sanitize_filename_with_suffix(name, "")
}

/// Sanitize `stem` and append `suffix`, shortening only the stem
///
/// The suffix (a revision id, an extension) has reserved characters replaced
/// like the stem but is never trimmed or cut, so two names that differ only in
/// their suffix stay distinct however long the stem is. A suffix that alone
/// exceeds the limit is kept whole and left for the filesystem to reject.
///
/// # Examples
///
/// ```
/// use drive_extract::utils::sanitize_filename_with_suffix;
///
/// let long = "x".repeat(300);
/// let name = sanitize_filename_with_suffix(&long, " - r1.json");
/// assert_eq!(name.len(), 255);
/// assert!(name.ends_with("x - r1.json"));
/// ```
#[must_use]
pub fn sanitize_filename_with_suffix(stem: &str, suffix: &str) -> String {
    let suffix = replace_reserved(suffix);
    let replaced = replace_reserved(stem);

    let trimmed = replaced.trim_end_matches(['.', ' ']).trim_start();
    let mut sanitized = if trimmed.is_empty() {
        UNTITLED.to_string()
    } else if is_device_name(trimmed) {
        format!("_{trimmed}")
    } else {
        trimmed.to_string()
    };

    truncate_to_char_boundary(&mut sanitized, MAX_FILENAME_BYTES.saturating_sub(suffix.len()));
    if suffix.is_empty() {
        let kept = sanitized.trim_end_matches(['.', ' ']).len();
        sanitized.truncate(kept);
    }
    if sanitized.is_empty() {
        sanitized.push_str(UNTITLED);
    }

    sanitized.push_str(&suffix);
    sanitized
}

fn replace_reserved(s: &str) -> String {
    s.chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect()
}

fn is_device_name(name: &str) -> bool {
    let stem = name.split('.').next().unwrap_or(name);
    RESERVED_DEVICE_NAMES
        .iter()
        .any(|reserved| reserved.eq_ignore_ascii_case(stem))
}

fn truncate_to_char_boundary(s: &mut String, max_bytes: usize) {
    if s.len() <= max_bytes {
        return;
    }
    let mut end = max_bytes;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    s.truncate(end);
}

/// Build the `attempt`-th numbered alternative for a path: `name (n).ext`
///
/// Attempt 0 is the path itself.
///
/// # Examples
///
/// ```
/// use drive_extract::utils::numbered_path;
/// use std::path::{Path, PathBuf};
///
/// let path = Path::new("/out/Content/report.pdf");
/// assert_eq!(numbered_path(path, 0), PathBuf::from("/out/Content/report.pdf"));
/// assert_eq!(numbered_path(path, 2), PathBuf::from("/out/Content/report (2).pdf"));
/// ```
#[must_use]
pub fn numbered_path(path: &Path, attempt: u32) -> PathBuf {
    if attempt == 0 {
        return path.to_path_buf();
    }

    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let new_name = match path.extension() {
        Some(ext) => format!("{} ({}).{}", stem, attempt, ext.to_string_lossy()),
        None => format!("{} ({})", stem, attempt),
    };

    match path.parent() {
        Some(parent) => parent.join(new_name),
        None => PathBuf::from(new_name),
    }
}

/// Closest ancestor of `path` (including itself) that exists on disk
///
/// Used to measure free space before the output tree has been created.
pub fn nearest_existing_ancestor(path: &Path) -> Option<&Path> {
    path.ancestors()
        .find(|p| !p.as_os_str().is_empty() && p.exists())
        .or_else(|| path.is_relative().then_some(Path::new(".")))
}

/// Get available disk space for a given path
///
/// Returns the space available to unprivileged users, in bytes.
pub fn get_available_space(path: &Path) -> std::io::Result<u64> {
    #[cfg(unix)]
    {
        use std::ffi::CString;
        use std::os::unix::ffi::OsStrExt;

        let c_path = CString::new(path.as_os_str().as_bytes())
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidInput, e))?;

        // SAFETY: c_path is a valid NUL-terminated string, stat is zero-initialized,
        // and stat is only read after statvfs reports success.
        unsafe {
            let mut stat: libc::statvfs = std::mem::zeroed();
            if libc::statvfs(c_path.as_ptr(), &mut stat) != 0 {
                return Err(std::io::Error::last_os_error());
            }
            #[allow(clippy::unnecessary_cast)]
            Ok((stat.f_bavail as u64).saturating_mul(stat.f_frsize as u64))
        }
    }

    #[cfg(windows)]
    {
        use std::os::windows::ffi::OsStrExt;
        use winapi::um::fileapi::GetDiskFreeSpaceExW;

        let wide_path: Vec<u16> = path
            .as_os_str()
            .encode_wide()
            .chain(std::iter::once(0))
            .collect();

        // SAFETY: wide_path is NUL-terminated and every out pointer refers to a
        // live, aligned u64 that is only read after a successful call.
        unsafe {
            let mut free_bytes_available: u64 = 0;
            let mut total_bytes: u64 = 0;
            let mut total_free_bytes: u64 = 0;

            if GetDiskFreeSpaceExW(
                wide_path.as_ptr(),
                &mut free_bytes_available as *mut u64 as *mut _,
                &mut total_bytes as *mut u64 as *mut _,
                &mut total_free_bytes as *mut u64 as *mut _,
            ) == 0
            {
                return Err(std::io::Error::last_os_error());
            }

            Ok(free_bytes_available)
        }
    }

    #[cfg(not(any(unix, windows)))]
    {
        let _ = path;
        Err(std::io::Error::new(
            std::io::ErrorKind::Unsupported,
            "Disk space checking is not supported on this platform",
        ))
    }
}
