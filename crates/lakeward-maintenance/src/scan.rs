//! Reachability scanning over a store's snapshot log.
//!
//! Produces the set of normalized paths referenced by the store's
//! retained snapshot history: every manifest list, manifest, data file,
//! and delete file reachable from the snapshot log, plus the separately
//! tracked retained metadata-version files. Read-only against the
//! metadata layer; a store with zero snapshots yields an empty reachable
//! set, not an error.

use std::collections::HashSet;

use lakeward_core::error::Result;
use lakeward_core::paths;
use lakeward_table::handle::StoreHandle;

/// The files a store's retained metadata can reach.
///
/// Content references (snapshot-reachable files) and retained
/// metadata-version files are tracked separately: old version files are
/// deletable independently of snapshot reachability.
#[derive(Debug, Clone, Default)]
pub struct ReachableSet {
    content: HashSet<String>,
    metadata_versions: HashSet<String>,
}

impl ReachableSet {
    /// Returns true if the normalized path is reachable at all.
    #[must_use]
    pub fn contains(&self, normalized_path: &str) -> bool {
        self.content.contains(normalized_path) || self.metadata_versions.contains(normalized_path)
    }

    /// Records a content reference (already-normalized path).
    pub(crate) fn insert_content(&mut self, normalized_path: impl Into<String>) {
        self.content.insert(normalized_path.into());
    }

    /// Absorbs another reachable set (for table-wide unions).
    pub fn merge(&mut self, other: Self) {
        self.content.extend(other.content);
        self.metadata_versions.extend(other.metadata_versions);
    }

    /// Total number of tracked references.
    #[must_use]
    pub fn len(&self) -> usize {
        self.content.len() + self.metadata_versions.len()
    }

    /// Returns true when nothing is reachable.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.content.is_empty() && self.metadata_versions.is_empty()
    }
}

/// Scans a store's metadata and returns its reachable set.
///
/// `retain_versions` controls how many of the most recent metadata
/// version files stay protected; older version files become
/// orphan-eligible like any other unreferenced file. The version hint is
/// always protected.
///
/// # Errors
///
/// Returns an error if the metadata layer cannot be read (missing or
/// unparsable manifest documents, listing failures).
pub async fn scan_store(store: &StoreHandle, retain_versions: usize) -> Result<ReachableSet> {
    let mut reachable = ReachableSet::default();
    reachable
        .metadata_versions
        .insert(paths::uri_path(&store.version_hint_path()));

    for (_, meta) in store
        .list_metadata_versions()
        .await?
        .into_iter()
        .take(retain_versions)
    {
        reachable
            .metadata_versions
            .insert(paths::uri_path(&meta.path));
    }

    let Some(metadata) = store.load_metadata().await? else {
        return Ok(reachable);
    };

    for snapshot in &metadata.snapshots {
        reachable
            .content
            .insert(paths::uri_path(&snapshot.manifest_list));
        let manifest_list = store.load_manifest_list(&snapshot.manifest_list).await?;
        for manifest_path in &manifest_list.manifest_paths {
            reachable.content.insert(paths::uri_path(manifest_path));
            let manifest = store.load_manifest(manifest_path).await?;
            for entry in &manifest.entries {
                reachable.content.insert(paths::uri_path(&entry.path));
            }
        }
    }

    tracing::debug!(
        store = %store.kind(),
        location = store.location(),
        references = reachable.len(),
        "scanned reachable set"
    );
    Ok(reachable)
}

/// Returns the normalized paths of every file the *current* snapshot
/// references (data and delete files).
///
/// Used by the post-condition check after the data phase: each of these
/// must still exist in storage.
///
/// # Errors
///
/// Returns an error if the metadata layer cannot be read.
pub async fn current_content_files(store: &StoreHandle) -> Result<Vec<String>> {
    let Some(metadata) = store.load_metadata().await? else {
        return Ok(Vec::new());
    };
    let Some(snapshot) = metadata.current_snapshot() else {
        return Ok(Vec::new());
    };

    let mut files = Vec::new();
    let manifest_list = store.load_manifest_list(&snapshot.manifest_list).await?;
    for manifest_path in &manifest_list.manifest_paths {
        let manifest = store.load_manifest(manifest_path).await?;
        for entry in &manifest.entries {
            files.push(paths::uri_path(&entry.path));
        }
    }
    Ok(files)
}

/// Reads the active protected-marker values from the store's current
/// snapshot summary.
///
/// A marker value recorded by a still-active external writer protects
/// any staged file whose name contains it. Values recorded only on
/// older snapshots are stale and protect nothing.
///
/// # Errors
///
/// Returns an error if the metadata layer cannot be read.
pub async fn active_markers(store: &StoreHandle, marker_keys: &[String]) -> Result<HashSet<String>> {
    let mut markers = HashSet::new();
    let Some(metadata) = store.load_metadata().await? else {
        return Ok(markers);
    };
    let Some(snapshot) = metadata.current_snapshot() else {
        return Ok(markers);
    };

    for key in marker_keys {
        if let Some(value) = snapshot.summary.get(key) {
            if !value.is_empty() {
                markers.insert(value.clone());
            }
        }
    }
    Ok(markers)
}
