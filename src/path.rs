//! Location strings: cleanup of raw record bytes and mapping onto the
//! local filesystem.

use std::path::{Path, PathBuf};

/// Characters kept by [`sanitize`] besides alphanumerics.
const PATH_SAFE: &[char] = &['/', '\\', '.', '_', '-', ' '];

/// Turn the raw 256-byte location field into a clean string.
///
/// Everything from the first NUL on is dropped, invalid UTF-8 is dropped,
/// and only alphanumerics plus `/ \ . _ -` and space survive.
pub fn sanitize(raw: &[u8]) -> String {
    let end = raw.iter().position(|&b| b == 0).unwrap_or(raw.len());
    String::from_utf8_lossy(&raw[..end])
        .chars()
        .filter(|c| c.is_alphanumeric() || PATH_SAFE.contains(c))
        .collect()
}

pub fn is_separator(c: char) -> bool {
    c == '/' || c == '\\'
}

/// A location is usable when it is non-empty and starts with a separator.
pub fn is_valid_location(location: &str) -> bool {
    location.chars().next().is_some_and(is_separator)
}

pub fn to_unix(location: &str) -> String {
    location.replace('\\', "/")
}

pub fn to_windows(location: &str) -> String {
    location.replace('/', "\\")
}

/// Map a location under `dir`.
///
/// The location is sanitized first; empty, `.` and `..` components are
/// dropped so an entry can never land outside `dir`.
pub fn output_path(dir: &Path, location: &str) -> PathBuf {
    let clean = sanitize(location.as_bytes());
    let mut out = dir.to_path_buf();
    for part in clean.split(is_separator) {
        match part {
            "" | "." | ".." => continue,
            _ => out.push(part),
        }
    }
    out
}

/// Build a location from a path relative to some root, joined with `sep`.
pub fn location_from_relative(relative: &Path, sep: char) -> String {
    let mut location = String::new();
    for part in relative.components() {
        location.push(sep);
        location.push_str(&part.as_os_str().to_string_lossy());
    }
    location
}
