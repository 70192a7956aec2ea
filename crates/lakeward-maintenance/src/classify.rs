//! Orphan classification: the deletion gate.
//!
//! A listed file becomes a deletion candidate only if it fails all three
//! checks, evaluated in a fixed order:
//!
//! 1. **Reachability** — referenced by retained metadata? keep.
//! 2. **Age** — modified at or after the cutoff, or timestamp unknown?
//!    keep. The comparison is strict: a file is deletable only when its
//!    modification time is strictly older than the cutoff.
//! 3. **Protected markers** — file name contains an active writer's
//!    marker value? keep.
//!
//! Everything the gate keeps is untouched; there is no "probably orphan"
//! state. When in doubt (missing timestamp, matching marker), the file
//! survives the cycle and is reconsidered the next time.

use std::collections::HashSet;

use chrono::{DateTime, Utc};

use lakeward_core::paths;

use crate::list::PhysicalFile;
use crate::scan::ReachableSet;

/// Why a file was kept, used only for trace logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Keep {
    Reachable,
    TooYoung,
    Marked,
}

/// Filters listed files down to deletion candidates.
///
/// `cutoff` is the newest modification time still eligible for deletion,
/// exclusive. `active_markers` holds the protected-marker values of the
/// store's current snapshot; a candidate whose file name contains any of
/// them is kept.
#[must_use]
pub fn classify(
    files: Vec<PhysicalFile>,
    reachable: &ReachableSet,
    cutoff: DateTime<Utc>,
    active_markers: &HashSet<String>,
) -> Vec<PhysicalFile> {
    let mut candidates = Vec::new();
    for file in files {
        match keep_reason(&file, reachable, cutoff, active_markers) {
            Some(reason) => {
                tracing::trace!(path = %file.path, reason = ?reason, "keeping file");
            }
            None => candidates.push(file),
        }
    }
    candidates
}

fn keep_reason(
    file: &PhysicalFile,
    reachable: &ReachableSet,
    cutoff: DateTime<Utc>,
    active_markers: &HashSet<String>,
) -> Option<Keep> {
    if reachable.contains(&file.path) {
        return Some(Keep::Reachable);
    }
    match file.last_modified {
        Some(modified) if modified < cutoff => {}
        // Unknown age can never prove the file is old enough.
        _ => return Some(Keep::TooYoung),
    }
    let name = paths::file_name(&file.path);
    if active_markers.iter().any(|marker| name.contains(marker)) {
        return Some(Keep::Marked);
    }
    None
}
