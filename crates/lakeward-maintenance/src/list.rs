//! Physical listing of store subtrees.
//!
//! The cleaning pipeline compares the storage layer's view of a subtree
//! against the reachable set; this module produces the storage-layer
//! view. Each phase targets exactly one subtree: the data subtree or the
//! metadata subtree, never the store root as a whole, so the two phases
//! cannot observe each other's half-applied state.

use chrono::{DateTime, Utc};

use lakeward_core::error::Result;
use lakeward_core::paths;
use lakeward_table::handle::StoreHandle;

/// Which half of a store a cleaning phase targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Subtree {
    /// `{store}/data`: data and delete files.
    Data,
    /// `{store}/metadata`: version files, manifests, manifest lists.
    Metadata,
}

impl Subtree {
    /// Lowercase label for log fields and metric labels.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Data => "data",
            Self::Metadata => "metadata",
        }
    }
}

impl std::fmt::Display for Subtree {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One file as the storage layer sees it.
///
/// The path is normalized with [`paths::uri_path`] so it compares
/// directly against reachable-set entries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhysicalFile {
    /// Normalized path of the file.
    pub path: String,
    /// Modification time; `None` means the backend reported no timestamp
    /// and the file can never pass the age gate.
    pub last_modified: Option<DateTime<Utc>>,
}

/// Root directory of the given subtree within a store.
#[must_use]
pub fn subtree_root(store: &StoreHandle, subtree: Subtree) -> String {
    match subtree {
        Subtree::Data => store.data_dir(),
        Subtree::Metadata => store.metadata_dir(),
    }
}

/// Lists every file under one subtree of a store.
///
/// A subtree that does not exist yet (a table that has never written
/// data) lists as empty, not as an error.
///
/// # Errors
///
/// Returns an error when the storage listing itself fails; such a
/// failure aborts the subtree's cleaning phase without touching any
/// file.
pub async fn list_subtree(store: &StoreHandle, subtree: Subtree) -> Result<Vec<PhysicalFile>> {
    let root = subtree_root(store, subtree);
    let listed = match store.io().list(&paths::as_dir_prefix(&root)).await {
        Ok(listed) => listed,
        Err(e) if e.is_not_found() => Vec::new(),
        Err(e) => return Err(e),
    };

    let files: Vec<PhysicalFile> = listed
        .into_iter()
        .map(|meta| PhysicalFile {
            path: paths::uri_path(&meta.path),
            last_modified: meta.last_modified,
        })
        .collect();

    tracing::debug!(
        store = %store.kind(),
        subtree = %subtree,
        files = files.len(),
        "listed subtree"
    );
    Ok(files)
}
