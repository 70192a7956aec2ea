//! Deletion execution.
//!
//! Candidates are deleted independently: one failure is logged, counted,
//! and skipped, and never aborts the rest of the batch. After the batch,
//! a best-effort sweep removes directories left empty, walking each
//! affected parent chain upward until a non-empty directory or the
//! subtree root. Sweep failures are logged at debug and otherwise
//! ignored; directories cost nothing to leave behind.

use std::collections::BTreeSet;
use std::sync::Arc;

use lakeward_core::paths;
use lakeward_core::storage::{DirRemoval, StorageBackend};

use crate::list::PhysicalFile;

/// Counters from one deletion batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeleteOutcome {
    /// Files successfully deleted.
    pub deleted: usize,
    /// Files whose deletion failed.
    pub failed: usize,
}

/// Deletes the given candidates, then sweeps empty parent directories up
/// to (but never including) `subtree_root`.
pub async fn delete_candidates(
    io: &Arc<dyn StorageBackend>,
    candidates: &[PhysicalFile],
    subtree_root: &str,
) -> DeleteOutcome {
    let mut outcome = DeleteOutcome::default();
    // BTreeSet dedupes shared parents and sweeps deepest-first.
    let mut parents = BTreeSet::new();

    for candidate in candidates {
        match io.delete(&candidate.path).await {
            Ok(()) => {
                tracing::info!(path = %candidate.path, "deleted orphan file");
                outcome.deleted += 1;
                if let Some(parent) = paths::parent(&candidate.path) {
                    parents.insert(parent.to_string());
                }
            }
            Err(e) => {
                tracing::warn!(path = %candidate.path, error = %e, "failed to delete orphan file");
                outcome.failed += 1;
            }
        }
    }

    let root = subtree_root.trim_end_matches('/');
    for parent in parents.into_iter().rev() {
        sweep_upward(io, &parent, root).await;
    }
    outcome
}

/// Removes `dir` if empty, then its parent, stopping at the first
/// non-empty directory or at the subtree root.
async fn sweep_upward(io: &Arc<dyn StorageBackend>, dir: &str, root: &str) {
    let mut current = dir.to_string();
    loop {
        if !is_below(&current, root) {
            return;
        }
        match io.remove_dir(&current).await {
            Ok(DirRemoval::Removed) => {
                tracing::debug!(dir = %current, "removed empty directory");
            }
            // Already gone; the parent may still be removable.
            Ok(DirRemoval::NotFound) => {}
            Ok(DirRemoval::NotEmpty) => return,
            Err(e) => {
                tracing::debug!(dir = %current, error = %e, "directory sweep stopped");
                return;
            }
        }
        match paths::parent(&current) {
            Some(parent) => current = parent.to_string(),
            None => return,
        }
    }
}

/// True when `dir` is a strict descendant of `root`. Segment-aware:
/// `/wh/database` is not below `/wh/data`.
fn is_below(dir: &str, root: &str) -> bool {
    dir != root && dir.starts_with(&format!("{root}/"))
}
