//! Storage backend abstraction for table storage (object stores, HDFS, local).
//!
//! This module defines the storage contract all backends must implement:
//!
//! - Conditional writes with preconditions (CAS on version-hint files)
//! - Recursive listing with `last_modified` metadata
//! - Idempotent deletes and explicit empty-directory removal
//!
//! Directory semantics matter here: the deletion executor removes
//! now-empty directories after deleting orphan files, so backends expose
//! `remove_dir` with "not empty" and "already gone" as normal outcomes,
//! not errors. Backends without physical directories (flat object stores)
//! may report `DirRemoval::NotFound` unconditionally.
//!
//! The version token is an opaque `String` so different backends can map
//! it onto their native CAS primitive (GCS generation, S3/Azure `ETag`).

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, RwLock};

use crate::error::{Error, Result};
use crate::paths;

/// Precondition for conditional writes (CAS operations).
#[derive(Debug, Clone)]
pub enum WritePrecondition {
    /// Write only if the object does not exist.
    DoesNotExist,
    /// Write only if the object's version matches the given token.
    MatchesVersion(String),
    /// Write unconditionally.
    None,
}

/// Result of a conditional write.
#[derive(Debug, Clone)]
pub enum WriteResult {
    /// Write succeeded, returns new version token.
    Success {
        /// The new version token after the write.
        version: String,
    },
    /// Precondition failed, returns current version token.
    PreconditionFailed {
        /// The current version that caused the precondition to fail.
        current_version: String,
    },
}

/// Outcome of an empty-directory removal attempt.
///
/// `NotEmpty` and `NotFound` are benign: the directory sweep treats them
/// as "stop" and "keep walking up" respectively, never as failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DirRemoval {
    /// The directory existed, was empty, and was removed.
    Removed,
    /// The directory still contains files or subdirectories.
    NotEmpty,
    /// The directory does not exist (possibly removed concurrently).
    NotFound,
}

/// Metadata about a stored file.
#[derive(Debug, Clone)]
pub struct FileMeta {
    /// File path (key).
    pub path: String,
    /// File size in bytes.
    pub size: u64,
    /// Opaque version token for CAS operations.
    pub version: String,
    /// Last modification timestamp, if the backend reports one.
    ///
    /// Absent timestamps make a file ineligible for orphan deletion: the
    /// age gate cannot prove it is old enough.
    pub last_modified: Option<DateTime<Utc>>,
}

/// Storage backend trait for table storage.
///
/// All backends (cloud object stores, HDFS, memory) implement this trait.
#[async_trait]
pub trait StorageBackend: Send + Sync + 'static {
    /// Reads an entire object.
    ///
    /// Returns `Error::NotFound` if the object doesn't exist.
    async fn get(&self, path: &str) -> Result<Bytes>;

    /// Writes with an optional precondition.
    ///
    /// Returns `WriteResult::PreconditionFailed` if the precondition is not
    /// met. Precondition failure is a normal result, never an error.
    async fn put(
        &self,
        path: &str,
        data: Bytes,
        precondition: WritePrecondition,
    ) -> Result<WriteResult>;

    /// Deletes a file.
    ///
    /// Succeeds even if the file doesn't exist (idempotent). Parent
    /// directories are left in place.
    async fn delete(&self, path: &str) -> Result<()>;

    /// Returns true if a file or directory exists at `path`.
    async fn exists(&self, path: &str) -> Result<bool>;

    /// Lists all files under the given prefix, recursively.
    ///
    /// Returns an empty vec if nothing matches, including when the prefix
    /// directory itself does not exist.
    ///
    /// **Ordering**: arbitrary and backend-dependent. Callers requiring
    /// deterministic order should sort.
    async fn list(&self, prefix: &str) -> Result<Vec<FileMeta>>;

    /// Gets file metadata without reading content.
    ///
    /// Returns `None` if the file doesn't exist.
    async fn head(&self, path: &str) -> Result<Option<FileMeta>>;

    /// Removes a directory if and only if it is empty.
    async fn remove_dir(&self, path: &str) -> Result<DirRemoval>;
}

/// In-memory storage backend for testing.
///
/// Thread-safe via `RwLock`. Not suitable for production. Tracks
/// directories explicitly so empty-directory removal behaves like a
/// filesystem-backed store: every `put` registers the ancestor chain of
/// the written path.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    state: Arc<RwLock<MemoryState>>,
}

#[derive(Debug, Default)]
struct MemoryState {
    files: HashMap<String, StoredObject>,
    dirs: HashSet<String>,
}

#[derive(Debug, Clone)]
struct StoredObject {
    data: Bytes,
    /// Numeric version stored as i64 internally, exposed as String.
    version: i64,
    last_modified: DateTime<Utc>,
}

impl MemoryBackend {
    /// Creates a new empty memory backend.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Overrides a stored file's modification time.
    ///
    /// Test hook for exercising the age gate; returns false if the file
    /// does not exist.
    pub fn set_last_modified(&self, path: &str, when: DateTime<Utc>) -> bool {
        let Ok(mut state) = self.state.write() else {
            return false;
        };
        if let Some(obj) = state.files.get_mut(path) {
            obj.last_modified = when;
            true
        } else {
            false
        }
    }

    fn meta_for(path: &str, obj: &StoredObject) -> FileMeta {
        FileMeta {
            path: path.to_string(),
            size: obj.data.len() as u64,
            version: obj.version.to_string(),
            last_modified: Some(obj.last_modified),
        }
    }
}

fn lock_poisoned() -> Error {
    Error::Internal {
        message: "memory backend lock poisoned".into(),
    }
}

#[async_trait]
impl StorageBackend for MemoryBackend {
    async fn get(&self, path: &str) -> Result<Bytes> {
        let state = self.state.read().map_err(|_| lock_poisoned())?;
        state
            .files
            .get(path)
            .map(|o| o.data.clone())
            .ok_or_else(|| Error::NotFound(format!("object not found: {path}")))
    }

    async fn put(
        &self,
        path: &str,
        data: Bytes,
        precondition: WritePrecondition,
    ) -> Result<WriteResult> {
        let mut state = self.state.write().map_err(|_| lock_poisoned())?;

        let current = state.files.get(path);
        match precondition {
            WritePrecondition::DoesNotExist => {
                if let Some(obj) = current {
                    return Ok(WriteResult::PreconditionFailed {
                        current_version: obj.version.to_string(),
                    });
                }
            }
            WritePrecondition::MatchesVersion(expected) => {
                let expected_num: i64 = expected.parse().unwrap_or(-1);
                match current {
                    Some(obj) if obj.version != expected_num => {
                        return Ok(WriteResult::PreconditionFailed {
                            current_version: obj.version.to_string(),
                        });
                    }
                    None => {
                        return Ok(WriteResult::PreconditionFailed {
                            current_version: "0".to_string(),
                        });
                    }
                    _ => {}
                }
            }
            WritePrecondition::None => {}
        }

        let new_version = current.map_or(1, |o| o.version + 1);
        state.files.insert(
            path.to_string(),
            StoredObject {
                data,
                version: new_version,
                last_modified: Utc::now(),
            },
        );

        // Register the ancestor directory chain, filesystem-style.
        let mut dir = paths::parent(path);
        while let Some(d) = dir {
            if !state.dirs.insert(d.to_string()) {
                break;
            }
            dir = paths::parent(d);
        }

        Ok(WriteResult::Success {
            version: new_version.to_string(),
        })
    }

    async fn delete(&self, path: &str) -> Result<()> {
        self.state
            .write()
            .map_err(|_| lock_poisoned())?
            .files
            .remove(path);
        Ok(())
    }

    async fn exists(&self, path: &str) -> Result<bool> {
        let state = self.state.read().map_err(|_| lock_poisoned())?;
        let trimmed = path.trim_end_matches('/');
        if state.files.contains_key(path) || state.dirs.contains(trimmed) {
            return Ok(true);
        }
        let prefix = format!("{trimmed}/");
        Ok(state.files.keys().any(|k| k.starts_with(&prefix)))
    }

    async fn list(&self, prefix: &str) -> Result<Vec<FileMeta>> {
        let state = self.state.read().map_err(|_| lock_poisoned())?;
        Ok(state
            .files
            .iter()
            .filter(|(k, _)| k.starts_with(prefix))
            .map(|(path, obj)| Self::meta_for(path, obj))
            .collect())
    }

    async fn head(&self, path: &str) -> Result<Option<FileMeta>> {
        let state = self.state.read().map_err(|_| lock_poisoned())?;
        Ok(state.files.get(path).map(|obj| Self::meta_for(path, obj)))
    }

    async fn remove_dir(&self, path: &str) -> Result<DirRemoval> {
        let mut state = self.state.write().map_err(|_| lock_poisoned())?;
        let trimmed = path.trim_end_matches('/');
        let prefix = format!("{trimmed}/");

        if state.files.keys().any(|k| k.starts_with(&prefix))
            || state.dirs.iter().any(|d| d.starts_with(&prefix))
        {
            return Ok(DirRemoval::NotEmpty);
        }
        if state.dirs.remove(trimmed) {
            Ok(DirRemoval::Removed)
        } else {
            Ok(DirRemoval::NotFound)
        }
    }
}
