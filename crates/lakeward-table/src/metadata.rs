//! Versioned store metadata: snapshot log, manifest lists, manifests.
//!
//! Each store keeps JSON metadata version files
//! (`metadata/v{N}.metadata.json`) plus a `version-hint.text` pointer that
//! is compare-and-swapped on commit. A metadata version holds the full
//! snapshot log; each snapshot points at a manifest-list document, which
//! points at manifest documents, which enumerate data and delete files.
//!
//! All loaders here re-read storage on every call. Metadata is never
//! cached across cleaning cycles.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use lakeward_core::error::{Error, Result};
use lakeward_core::storage::FileMeta;

use crate::handle::StoreHandle;

/// Content class of a manifest entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileContent {
    /// A data file.
    Data,
    /// A positional or equality delete file.
    Deletes,
}

/// One file tracked by a manifest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestEntry {
    /// Full path of the tracked file.
    pub path: String,
    /// Whether the file carries data or deletes.
    pub content: FileContent,
}

/// A manifest document: the files added by one snapshot.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    /// Tracked files.
    #[serde(default)]
    pub entries: Vec<ManifestEntry>,
}

/// A manifest-list document: the manifests reachable from one snapshot.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestList {
    /// Paths of the snapshot's manifest documents.
    #[serde(default)]
    pub manifest_paths: Vec<String>,
}

/// One committed snapshot of a store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    /// Monotonically increasing snapshot identifier.
    pub snapshot_id: i64,
    /// Commit wall-clock time in epoch milliseconds.
    pub timestamp_ms: i64,
    /// Path of the snapshot's manifest-list document.
    pub manifest_list: String,
    /// Commit summary properties. Streaming writers record their job
    /// identifier here under configured marker keys.
    #[serde(default)]
    pub summary: HashMap<String, String>,
}

/// A store's metadata version: the snapshot log and current pointer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreMetadata {
    /// Metadata format version.
    pub format_version: u32,
    /// Root location of the store.
    pub location: String,
    /// Identifier of the current snapshot, if any snapshot exists.
    pub current_snapshot_id: Option<i64>,
    /// The retained snapshot log, oldest first.
    #[serde(default)]
    pub snapshots: Vec<Snapshot>,
}

impl StoreMetadata {
    /// Current metadata format version written by this crate.
    pub const FORMAT_VERSION: u32 = 1;

    /// Creates empty metadata for a store with no commits yet.
    #[must_use]
    pub fn empty(location: impl Into<String>) -> Self {
        Self {
            format_version: Self::FORMAT_VERSION,
            location: location.into(),
            current_snapshot_id: None,
            snapshots: Vec::new(),
        }
    }

    /// The current snapshot, if one exists.
    #[must_use]
    pub fn current_snapshot(&self) -> Option<&Snapshot> {
        let id = self.current_snapshot_id?;
        self.snapshots.iter().find(|s| s.snapshot_id == id)
    }
}

fn parse_json<T: for<'de> Deserialize<'de>>(path: &str, data: &[u8]) -> Result<T> {
    serde_json::from_slice(data).map_err(|e| Error::Serialization {
        message: format!("failed to parse {path}: {e}"),
    })
}

impl StoreHandle {
    /// Reads the current metadata version number from the version hint.
    ///
    /// Returns `None` for a store with no commits yet.
    ///
    /// # Errors
    ///
    /// Returns an error if the hint exists but cannot be read or parsed.
    pub async fn current_version(&self) -> Result<Option<u64>> {
        let hint_path = self.version_hint_path();
        let data = match self.io().get(&hint_path).await {
            Ok(data) => data,
            Err(e) if e.is_not_found() => return Ok(None),
            Err(e) => return Err(e),
        };
        let text = std::str::from_utf8(&data).map_err(|e| Error::Serialization {
            message: format!("version hint at {hint_path} is not UTF-8: {e}"),
        })?;
        let version = text.trim().parse::<u64>().map_err(|e| Error::Serialization {
            message: format!("version hint at {hint_path} is not a number: {e}"),
        })?;
        Ok(Some(version))
    }

    /// Loads the store's current metadata, fresh from storage.
    ///
    /// Returns `None` for a store with no commits yet. A missing hint is
    /// not an error: a store may legitimately be empty.
    ///
    /// # Errors
    ///
    /// Returns an error if the hinted metadata file is missing or
    /// unparsable (the hint then points at nothing, which is a real
    /// corruption, not an empty store).
    pub async fn load_metadata(&self) -> Result<Option<StoreMetadata>> {
        let Some(version) = self.current_version().await? else {
            return Ok(None);
        };
        let path = self.metadata_file_path(version);
        let data = self.io().get(&path).await?;
        Ok(Some(parse_json(&path, &data)?))
    }

    /// Loads a manifest-list document.
    ///
    /// # Errors
    ///
    /// Returns an error if the document is missing or unparsable.
    pub async fn load_manifest_list(&self, path: &str) -> Result<ManifestList> {
        let data = self.io().get(path).await?;
        parse_json(path, &data)
    }

    /// Loads a manifest document.
    ///
    /// # Errors
    ///
    /// Returns an error if the document is missing or unparsable.
    pub async fn load_manifest(&self, path: &str) -> Result<Manifest> {
        let data = self.io().get(path).await?;
        parse_json(path, &data)
    }

    /// Lists every metadata version file of this store, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the listing fails.
    pub async fn list_metadata_versions(&self) -> Result<Vec<(u64, FileMeta)>> {
        let prefix = lakeward_core::paths::as_dir_prefix(&self.metadata_dir());
        let mut versions: Vec<(u64, FileMeta)> = self
            .io()
            .list(&prefix)
            .await?
            .into_iter()
            .filter_map(|meta| Some((parse_metadata_version(&meta.path)?, meta)))
            .collect();
        versions.sort_by(|a, b| b.0.cmp(&a.0));
        Ok(versions)
    }
}

/// Extracts the version number from a metadata file path.
///
/// `.../metadata/v12.metadata.json` -> `12`
#[must_use]
pub fn parse_metadata_version(path: &str) -> Option<u64> {
    let name = lakeward_core::paths::file_name(path);
    let rest = name.strip_prefix('v')?;
    let digits = rest.strip_suffix(".metadata.json")?;
    digits.parse().ok()
}
