//! Path and URI normalization helpers.
//!
//! Table metadata may record file locations with a scheme and authority
//! (`hdfs://ns1/warehouse/t/data/f.parquet`) while storage listings report
//! plain keys (`/warehouse/t/data/f.parquet`). The collector compares both
//! as strings, so every path entering a reachable set or candidate list is
//! normalized with [`uri_path`] first.

/// Strips the scheme and authority from a URI, returning the plain path.
///
/// Plain paths pass through unchanged:
///
/// - `hdfs://ns1/warehouse/t/f.parquet` -> `/warehouse/t/f.parquet`
/// - `s3://bucket/warehouse/t/f.parquet` -> `/warehouse/t/f.parquet`
/// - `file:/warehouse/t/f.parquet` -> `/warehouse/t/f.parquet`
/// - `/warehouse/t/f.parquet` -> `/warehouse/t/f.parquet`
#[must_use]
pub fn uri_path(location: &str) -> String {
    if let Some((scheme, rest)) = location.split_once("://") {
        if is_scheme(scheme) {
            // Authority runs to the next '/'; absent means the root path.
            return match rest.find('/') {
                Some(idx) => rest[idx..].to_string(),
                None => "/".to_string(),
            };
        }
    } else if let Some((scheme, rest)) = location.split_once(":/") {
        if is_scheme(scheme) {
            return format!("/{rest}");
        }
    }
    location.to_string()
}

fn is_scheme(candidate: &str) -> bool {
    !candidate.is_empty()
        && candidate
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '+' || c == '-' || c == '.')
        && candidate.starts_with(|c: char| c.is_ascii_alphabetic())
}

/// Returns the parent directory of a path, without a trailing slash.
///
/// Returns `None` for root-level paths (`/a`, `a`) and the root itself.
#[must_use]
pub fn parent(path: &str) -> Option<&str> {
    let trimmed = path.trim_end_matches('/');
    match trimmed.rfind('/') {
        Some(0) | None => None,
        Some(idx) => Some(&trimmed[..idx]),
    }
}

/// Returns the final path segment (the file name).
#[must_use]
pub fn file_name(path: &str) -> &str {
    let trimmed = path.trim_end_matches('/');
    match trimmed.rfind('/') {
        Some(idx) => &trimmed[idx + 1..],
        None => trimmed,
    }
}

/// Ensures a directory path carries a trailing slash, for prefix listing.
#[must_use]
pub fn as_dir_prefix(path: &str) -> String {
    if path.ends_with('/') {
        path.to_string()
    } else {
        format!("{path}/")
    }
}

/// Joins a directory and a relative segment with exactly one separator.
#[must_use]
pub fn join(dir: &str, segment: &str) -> String {
    format!(
        "{}/{}",
        dir.trim_end_matches('/'),
        segment.trim_start_matches('/')
    )
}
