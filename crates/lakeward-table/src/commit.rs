//! Minimal append-commit support.
//!
//! Two-phase publish: immutable snapshot documents (manifest, manifest
//! list, next metadata version) are written with `DoesNotExist`
//! preconditions, then the version hint is compare-and-swapped to make
//! the new version visible. A hint CAS failure means a concurrent commit
//! won; nothing written here is visible, and the losing documents are
//! exactly the kind of orphans the maintenance layer collects later.

use std::collections::HashMap;

use bytes::Bytes;
use chrono::Utc;
use serde::Serialize;

use lakeward_core::error::{Error, Result};
use lakeward_core::paths;
use lakeward_core::storage::{WritePrecondition, WriteResult};

use crate::handle::StoreHandle;
use crate::metadata::{
    FileContent, Manifest, ManifestEntry, ManifestList, Snapshot, StoreMetadata,
};

/// Builder for appending files (and summary properties) to a store as a
/// single new snapshot.
#[derive(Debug)]
pub struct AppendFiles<'a> {
    store: &'a StoreHandle,
    entries: Vec<ManifestEntry>,
    summary: HashMap<String, String>,
}

impl<'a> AppendFiles<'a> {
    /// Starts a new append against the given store.
    #[must_use]
    pub fn new(store: &'a StoreHandle) -> Self {
        Self {
            store,
            entries: Vec::new(),
            summary: HashMap::new(),
        }
    }

    /// Adds a data file to the snapshot.
    #[must_use]
    pub fn append_file(mut self, path: impl Into<String>) -> Self {
        self.entries.push(ManifestEntry {
            path: path.into(),
            content: FileContent::Data,
        });
        self
    }

    /// Adds a delete file to the snapshot.
    #[must_use]
    pub fn append_delete_file(mut self, path: impl Into<String>) -> Self {
        self.entries.push(ManifestEntry {
            path: path.into(),
            content: FileContent::Deletes,
        });
        self
    }

    /// Sets a snapshot summary property (e.g. a writer's job identifier).
    #[must_use]
    pub fn set(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.summary.insert(key.into(), value.into());
        self
    }

    /// Commits the append, returning the new snapshot id.
    ///
    /// An empty append (no files) is valid and produces a snapshot that
    /// only carries summary properties.
    ///
    /// # Errors
    ///
    /// Returns [`Error::PreconditionFailed`] when a concurrent commit
    /// wins the version-hint CAS, and storage/serialization errors
    /// otherwise.
    pub async fn commit(self) -> Result<i64> {
        let store = self.store;
        let io = store.io();
        let hint_path = store.version_hint_path();

        // Capture the hint version token before reading metadata so the
        // final CAS detects any commit that lands in between.
        let hint_meta = io.head(&hint_path).await?;
        let (current_version, hint_precondition) = match &hint_meta {
            Some(meta) => (
                store.current_version().await?,
                WritePrecondition::MatchesVersion(meta.version.clone()),
            ),
            None => (None, WritePrecondition::DoesNotExist),
        };

        let mut metadata = match current_version {
            Some(version) => {
                let path = store.metadata_file_path(version);
                let data = io.get(&path).await?;
                serde_json::from_slice::<StoreMetadata>(&data).map_err(|e| {
                    Error::Serialization {
                        message: format!("failed to parse {path}: {e}"),
                    }
                })?
            }
            None => StoreMetadata::empty(store.location()),
        };

        let snapshot_id = metadata
            .snapshots
            .iter()
            .map(|s| s.snapshot_id)
            .max()
            .unwrap_or(0)
            + 1;

        let manifest_path = paths::join(
            &store.metadata_dir(),
            &format!("snap-{snapshot_id}-m0.manifest.json"),
        );
        let manifest_list_path = paths::join(
            &store.metadata_dir(),
            &format!("snap-{snapshot_id}.manifest-list.json"),
        );

        put_new_document(
            store,
            &manifest_path,
            &Manifest {
                entries: self.entries,
            },
        )
        .await?;
        put_new_document(
            store,
            &manifest_list_path,
            &ManifestList {
                manifest_paths: vec![manifest_path.clone()],
            },
        )
        .await?;

        metadata.snapshots.push(Snapshot {
            snapshot_id,
            timestamp_ms: Utc::now().timestamp_millis(),
            manifest_list: manifest_list_path,
            summary: self.summary,
        });
        metadata.current_snapshot_id = Some(snapshot_id);

        let next_version = current_version.unwrap_or(0) + 1;
        put_new_document(store, &store.metadata_file_path(next_version), &metadata).await?;

        let result = io
            .put(
                &hint_path,
                Bytes::from(next_version.to_string()),
                hint_precondition,
            )
            .await?;
        match result {
            WriteResult::Success { .. } => Ok(snapshot_id),
            WriteResult::PreconditionFailed { current_version } => {
                Err(Error::PreconditionFailed {
                    message: format!(
                        "concurrent commit on {} (hint version is now {current_version})",
                        store.location()
                    ),
                })
            }
        }
    }
}

async fn put_new_document<T: Serialize>(
    store: &StoreHandle,
    path: &str,
    document: &T,
) -> Result<()> {
    let body = serde_json::to_vec(document).map_err(|e| Error::Serialization {
        message: format!("failed to serialize {path}: {e}"),
    })?;
    let result = store
        .io()
        .put(path, Bytes::from(body), WritePrecondition::DoesNotExist)
        .await?;
    match result {
        WriteResult::Success { .. } => Ok(()),
        WriteResult::PreconditionFailed { .. } => Err(Error::PreconditionFailed {
            message: format!("document already exists (concurrent commit?): {path}"),
        }),
    }
}
