//! Maintenance metrics.
//!
//! Provides metrics for orphan-cleaning cycles. These complement the
//! structured logging approach already in place.

use metrics::{counter, describe_counter, describe_histogram, histogram};

// ============================================================================
// Orphan-Cleaning Metrics
// ============================================================================

/// Orphan files deleted counter, labeled by subtree.
pub const ORPHAN_FILES_DELETED: &str = "lakeward_orphan_files_deleted_total";

/// Orphan deletion failures counter, labeled by subtree.
pub const ORPHAN_DELETE_ERRORS: &str = "lakeward_orphan_delete_errors_total";

/// Phase-level cleaning errors counter (scan/list failures), labeled by phase.
pub const CLEAN_ERRORS: &str = "lakeward_clean_errors_total";

/// Post-condition divergence counter.
pub const CLEAN_DIVERGENCES: &str = "lakeward_clean_divergences_total";

/// Table cleaning cycle duration histogram.
pub const CLEAN_CYCLE_DURATION: &str = "lakeward_clean_cycle_duration_seconds";

// ============================================================================
// Metric Registration
// ============================================================================

/// Registers all maintenance metric descriptions.
///
/// Call this once at application startup after initializing the metrics recorder.
pub fn register_metrics() {
    describe_counter!(ORPHAN_FILES_DELETED, "Total orphan files deleted");
    describe_counter!(ORPHAN_DELETE_ERRORS, "Total orphan deletion failures");
    describe_counter!(CLEAN_ERRORS, "Total phase-level cleaning errors");
    describe_counter!(
        CLEAN_DIVERGENCES,
        "Total post-condition divergences detected after cleaning"
    );
    describe_histogram!(
        CLEAN_CYCLE_DURATION,
        "Duration of table cleaning cycles in seconds"
    );
}

// ============================================================================
// Metric Recording
// ============================================================================

/// Records the outcome of one subtree's deletion batch.
pub fn record_subtree_clean(subtree: &str, deleted: u64, failed: u64) {
    let labels = [("subtree", subtree.to_string())];

    counter!(ORPHAN_FILES_DELETED, &labels).increment(deleted);
    counter!(ORPHAN_DELETE_ERRORS, &labels).increment(failed);
}

/// Records a phase-level cleaning error.
pub fn record_clean_error(phase: &str) {
    counter!(CLEAN_ERRORS, "phase" => phase.to_string()).increment(1);
}

/// Records a post-condition divergence.
pub fn record_divergence() {
    counter!(CLEAN_DIVERGENCES).increment(1);
}

/// Records a completed table cleaning cycle.
pub fn record_cycle_duration(duration_secs: f64) {
    histogram!(CLEAN_CYCLE_DURATION).record(duration_secs);
}
