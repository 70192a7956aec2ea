//! Cleaning reports and cycle outcomes.

use lakeward_table::handle::{StoreKind, TableIdent};

use crate::list::PhysicalFile;

/// Counters for one cleaning phase of one store.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CleanStats {
    /// Files classified as deletion candidates.
    pub candidates: usize,
    /// Candidates successfully deleted.
    pub deleted: usize,
    /// Candidates whose deletion failed.
    pub failed: usize,
}

impl CleanStats {
    /// Adds another phase's counters into this one.
    pub fn merge(&mut self, other: Self) {
        self.candidates += other.candidates;
        self.deleted += other.deleted;
        self.failed += other.failed;
    }
}

/// Result of cleaning one store of a table.
#[derive(Debug, Clone)]
pub struct StoreCleanReport {
    /// Which store this report covers.
    pub store: StoreKind,
    /// Data-subtree counters.
    pub data: CleanStats,
    /// Metadata-subtree counters.
    pub metadata: CleanStats,
    /// Phase-level errors (scan or listing failures that skipped a
    /// phase). Deletion failures are counted, not recorded here.
    pub errors: Vec<String>,
    /// Post-condition violations: current-snapshot files missing from
    /// storage after the data phase.
    pub divergences: Vec<String>,
}

impl StoreCleanReport {
    /// Creates an empty report for the given store.
    #[must_use]
    pub fn new(store: StoreKind) -> Self {
        Self {
            store,
            data: CleanStats::default(),
            metadata: CleanStats::default(),
            errors: Vec::new(),
            divergences: Vec::new(),
        }
    }
}

/// Result of one cleaning cycle over a whole table.
#[derive(Debug, Clone)]
pub struct TableCleanReport {
    /// The cleaned table.
    pub table: TableIdent,
    /// Per-store reports, base first.
    pub stores: Vec<StoreCleanReport>,
}

impl TableCleanReport {
    /// Sums counters across all stores and phases.
    #[must_use]
    pub fn totals(&self) -> CleanStats {
        let mut totals = CleanStats::default();
        for store in &self.stores {
            totals.merge(store.data);
            totals.merge(store.metadata);
        }
        totals
    }

    /// True if any store hit a phase-level error.
    #[must_use]
    pub fn has_errors(&self) -> bool {
        self.stores.iter().any(|s| !s.errors.is_empty())
    }

    /// True if any post-condition violation was detected.
    #[must_use]
    pub fn has_divergences(&self) -> bool {
        self.stores.iter().any(|s| !s.divergences.is_empty())
    }
}

/// Outcome of requesting a cleaning cycle for one table.
#[derive(Debug, Clone)]
pub enum CleanOutcome {
    /// The table has orphan cleaning disabled; nothing was touched.
    Disabled,
    /// Another cycle for the same table is still running; this request
    /// was dropped, not queued.
    SkippedBusy,
    /// A cycle ran to completion (possibly with per-phase errors).
    Cleaned(TableCleanReport),
}

/// Deletion candidates for one store, computed without deleting.
#[derive(Debug, Clone)]
pub struct StoreCleanPlan {
    /// Which store this plan covers.
    pub store: StoreKind,
    /// Data-subtree candidates.
    pub data_candidates: Vec<PhysicalFile>,
    /// Metadata-subtree candidates.
    pub metadata_candidates: Vec<PhysicalFile>,
}

/// Dry-run result: what a cycle would delete right now.
#[derive(Debug, Clone)]
pub struct CleanPlan {
    /// The inspected table.
    pub table: TableIdent,
    /// Per-store plans, base first.
    pub stores: Vec<StoreCleanPlan>,
}

impl CleanPlan {
    /// Total number of candidates across all stores and subtrees.
    #[must_use]
    pub fn candidate_count(&self) -> usize {
        self.stores
            .iter()
            .map(|s| s.data_candidates.len() + s.metadata_candidates.len())
            .sum()
    }
}
