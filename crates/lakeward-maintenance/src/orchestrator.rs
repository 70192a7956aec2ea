//! Per-table cleaning orchestration.
//!
//! [`OrphanCleaner`] drives the full pipeline for one table: resolve a
//! fresh handle, parse retention settings, scan every store, then clean
//! each store's data subtree followed by its metadata subtree. Cycles
//! for the same table are serialized; a request that finds a cycle
//! already running is dropped ([`CleanOutcome::SkippedBusy`]), not
//! queued. Across tables, [`OrphanCleaner::clean_all`] bounds
//! concurrency.
//!
//! Keyed tables get one asymmetric safety rule: the change store's data
//! phase classifies against the union of the change and base reachable
//! sets, because base commits may absorb change-store files in place.
//! The base store never references change-only files the other way
//! around, and metadata phases are always per-store.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use tracing::Instrument;

use lakeward_core::error::{Error, Result};
use lakeward_core::observability::table_span;
use lakeward_table::config::RetentionConfig;
use lakeward_table::handle::{StoreHandle, StoreKind, TableIdent};
use lakeward_table::resolver::TableResolver;

use crate::classify::classify;
use crate::delete::delete_candidates;
use crate::list::{list_subtree, subtree_root, Subtree};
use crate::metrics;
use crate::report::{
    CleanOutcome, CleanPlan, CleanStats, StoreCleanPlan, StoreCleanReport, TableCleanReport,
};
use crate::scan::{active_markers, current_content_files, scan_store, ReachableSet};

/// Cleaner-wide settings (not per-table; those live in table properties).
#[derive(Debug, Clone)]
pub struct CleanerConfig {
    /// Upper bound on tables cleaned concurrently by [`OrphanCleaner::clean_all`].
    pub max_concurrent_tables: usize,
    /// Budget for one store's reachability scan; an overrun aborts the
    /// store's cycle with [`Error::Timeout`].
    pub scan_timeout: Duration,
}

impl Default for CleanerConfig {
    fn default() -> Self {
        Self {
            max_concurrent_tables: 4,
            scan_timeout: Duration::from_secs(600),
        }
    }
}

impl CleanerConfig {
    /// Validates the settings; returns a message describing the first
    /// problem found.
    #[must_use]
    pub fn validate(&self) -> Option<String> {
        if self.max_concurrent_tables == 0 {
            return Some("max_concurrent_tables must be at least 1".to_string());
        }
        None
    }
}

/// The orphan-file cleaner.
///
/// Holds no per-table state beyond the in-flight cycle locks; every
/// cycle resolves a fresh handle and re-reads table properties.
pub struct OrphanCleaner {
    resolver: Arc<dyn TableResolver>,
    config: CleanerConfig,
    inflight: Mutex<HashMap<TableIdent, Arc<tokio::sync::Mutex<()>>>>,
}

impl OrphanCleaner {
    /// Creates a cleaner over the given resolver.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] when the configuration is invalid.
    pub fn new(resolver: Arc<dyn TableResolver>, config: CleanerConfig) -> Result<Self> {
        if let Some(message) = config.validate() {
            return Err(Error::config(message));
        }
        Ok(Self {
            resolver,
            config,
            inflight: Mutex::new(HashMap::new()),
        })
    }

    /// Runs one cleaning cycle for a table.
    ///
    /// Returns [`CleanOutcome::Disabled`] without touching storage when
    /// the table's `maintenance.orphan-clean.enabled` property is not
    /// `true`, and [`CleanOutcome::SkippedBusy`] when a cycle for the
    /// same table is still running. Phase-level failures (scan, listing)
    /// skip the affected phase and are reported, never silently ignored.
    ///
    /// # Errors
    ///
    /// Returns an error when the table cannot be resolved or its
    /// retention properties are unparsable.
    pub async fn clean_table(&self, ident: &TableIdent) -> Result<CleanOutcome> {
        let cell = self.cycle_lock(ident)?;
        let Ok(guard) = cell.clone().try_lock_owned() else {
            tracing::info!(table = %ident, "cleaning cycle already in flight, skipping");
            return Ok(CleanOutcome::SkippedBusy);
        };

        let span = table_span("orphan_clean", &ident.to_string());
        let result = self.run_cycle(ident).instrument(span).await;
        drop(guard);
        self.evict_cycle_lock(ident, &cell);
        result
    }

    /// Runs cleaning cycles for many tables with bounded concurrency.
    ///
    /// Per-table failures do not affect other tables; each table's
    /// outcome (or error) is returned alongside its identifier.
    pub async fn clean_all(&self, tables: &[TableIdent]) -> Vec<(TableIdent, Result<CleanOutcome>)> {
        stream::iter(tables.iter().cloned())
            .map(|ident| async move {
                let outcome = self.clean_table(&ident).await;
                (ident, outcome)
            })
            .buffer_unordered(self.config.max_concurrent_tables)
            .collect()
            .await
    }

    /// Computes what a cycle would delete right now, without deleting.
    ///
    /// Dry runs take no cycle lock and may overlap a real cycle; the
    /// plan is advisory.
    ///
    /// # Errors
    ///
    /// Returns an error when the table cannot be resolved, its
    /// properties are unparsable, or any store's scan or listing fails.
    pub async fn plan_table(&self, ident: &TableIdent) -> Result<CleanPlan> {
        let handle = self.resolver.resolve(ident).await?;
        let retention = RetentionConfig::from_properties(handle.properties())?;
        let cutoff = cycle_cutoff(&retention);

        let stores = handle.stores();
        let mut scans = Vec::with_capacity(stores.len());
        for store in &stores {
            scans.push(self.scan_with_timeout(store, retention.metadata_version_retain_count).await?);
        }

        let mut plans = Vec::with_capacity(stores.len());
        for (idx, store) in stores.iter().enumerate() {
            let markers = active_markers(store, &retention.protected_marker_keys).await?;
            let data_reachable = data_phase_reachable(&scans, idx);

            let data_files = list_subtree(store, Subtree::Data).await?;
            let data_candidates = classify(data_files, &data_reachable, cutoff, &markers);

            let metadata_files = list_subtree(store, Subtree::Metadata).await?;
            let metadata_candidates = classify(metadata_files, &scans[idx], cutoff, &markers);

            plans.push(StoreCleanPlan {
                store: store.kind(),
                data_candidates,
                metadata_candidates,
            });
        }
        Ok(CleanPlan {
            table: ident.clone(),
            stores: plans,
        })
    }

    async fn run_cycle(&self, ident: &TableIdent) -> Result<CleanOutcome> {
        let started = Instant::now();
        let handle = self.resolver.resolve(ident).await?;
        let retention = RetentionConfig::from_properties(handle.properties())?;
        if !retention.enabled {
            tracing::debug!(table = %ident, "orphan cleaning disabled, skipping");
            return Ok(CleanOutcome::Disabled);
        }

        // One cutoff for the whole cycle; files created after this point
        // are untouchable even if the cycle runs long.
        let cutoff = cycle_cutoff(&retention);

        let stores = handle.stores();
        let mut scans = Vec::with_capacity(stores.len());
        for store in &stores {
            scans.push(
                self.scan_with_timeout(store, retention.metadata_version_retain_count)
                    .await,
            );
        }

        let store_reports = futures::future::join_all(
            stores
                .iter()
                .enumerate()
                .map(|(idx, store)| self.clean_store(store, idx, &scans, &retention, cutoff)),
        )
        .await;

        let report = TableCleanReport {
            table: ident.clone(),
            stores: store_reports,
        };
        let totals = report.totals();
        metrics::record_cycle_duration(started.elapsed().as_secs_f64());
        tracing::info!(
            table = %ident,
            candidates = totals.candidates,
            deleted = totals.deleted,
            failed = totals.failed,
            errors = report.has_errors(),
            "cleaning cycle finished"
        );
        Ok(CleanOutcome::Cleaned(report))
    }

    /// Cleans one store: data phase, post-condition check, then a fresh
    /// rescan and the metadata phase.
    async fn clean_store(
        &self,
        store: &StoreHandle,
        idx: usize,
        scans: &[Result<ReachableSet>],
        retention: &RetentionConfig,
        cutoff: DateTime<Utc>,
    ) -> StoreCleanReport {
        let mut report = StoreCleanReport::new(store.kind());

        let markers = match active_markers(store, &retention.protected_marker_keys).await {
            Ok(markers) => markers,
            Err(e) => {
                record_phase_error(&mut report, "scan", store.kind(), &e);
                return report;
            }
        };

        // Data phase. The change store additionally needs the base scan
        // (base commits may reference change-store files).
        let phase_scans_ok = scans[..=idx].iter().all(Result::is_ok);
        if phase_scans_ok {
            let reachable = data_phase_reachable_ok(scans, idx);
            match self
                .clean_subtree(store, Subtree::Data, &reachable, cutoff, &markers)
                .await
            {
                Ok(stats) => report.data = stats,
                Err(e) => record_phase_error(&mut report, "list", store.kind(), &e),
            }
            self.check_post_condition(store, &mut report).await;
        } else {
            for result in &scans[..=idx] {
                if let Err(e) = result {
                    record_phase_error(&mut report, "scan", store.kind(), e);
                }
            }
        }

        // Metadata phase classifies against a fresh scan so commits that
        // landed during the data phase are respected.
        match self
            .scan_with_timeout(store, retention.metadata_version_retain_count)
            .await
        {
            Ok(reachable) => {
                match self
                    .clean_subtree(store, Subtree::Metadata, &reachable, cutoff, &markers)
                    .await
                {
                    Ok(stats) => report.metadata = stats,
                    Err(e) => record_phase_error(&mut report, "list", store.kind(), &e),
                }
            }
            Err(e) => record_phase_error(&mut report, "scan", store.kind(), &e),
        }

        report
    }

    /// Lists, classifies, and deletes within one subtree.
    async fn clean_subtree(
        &self,
        store: &StoreHandle,
        subtree: Subtree,
        reachable: &ReachableSet,
        cutoff: DateTime<Utc>,
        markers: &HashSet<String>,
    ) -> Result<CleanStats> {
        let files = list_subtree(store, subtree).await?;
        let candidates = classify(files, reachable, cutoff, markers);
        let outcome =
            delete_candidates(store.io(), &candidates, &subtree_root(store, subtree)).await;

        metrics::record_subtree_clean(
            subtree.as_str(),
            outcome.deleted as u64,
            outcome.failed as u64,
        );
        Ok(CleanStats {
            candidates: candidates.len(),
            deleted: outcome.deleted,
            failed: outcome.failed,
        })
    }

    /// Verifies every file the current snapshot references still exists.
    ///
    /// A violation means a live file was deleted (a bug, or an external
    /// actor): it is recorded as a divergence and surfaced loudly, but
    /// the cycle continues so the report stays complete.
    async fn check_post_condition(&self, store: &StoreHandle, report: &mut StoreCleanReport) {
        let files = match current_content_files(store).await {
            Ok(files) => files,
            Err(e) => {
                record_phase_error(report, "post-condition", store.kind(), &e);
                return;
            }
        };
        for path in files {
            match store.io().exists(&path).await {
                Ok(true) => {}
                Ok(false) => {
                    let error = Error::divergence(format!(
                        "{} store current snapshot references a missing file: {path}",
                        store.kind()
                    ));
                    tracing::error!(store = %store.kind(), error = %error, "divergence after cleaning");
                    metrics::record_divergence();
                    report.divergences.push(path);
                }
                Err(e) => {
                    record_phase_error(report, "post-condition", store.kind(), &e);
                    return;
                }
            }
        }
    }

    async fn scan_with_timeout(
        &self,
        store: &StoreHandle,
        retain_versions: usize,
    ) -> Result<ReachableSet> {
        match tokio::time::timeout(self.config.scan_timeout, scan_store(store, retain_versions))
            .await
        {
            Ok(result) => result,
            Err(_) => Err(Error::Timeout(format!(
                "reachability scan of {} store at {} exceeded {:?}",
                store.kind(),
                store.location(),
                self.config.scan_timeout
            ))),
        }
    }

    fn cycle_lock(&self, ident: &TableIdent) -> Result<Arc<tokio::sync::Mutex<()>>> {
        let mut inflight = self.inflight.lock().map_err(|_| Error::Internal {
            message: "cleaner in-flight lock poisoned".to_string(),
        })?;
        Ok(inflight.entry(ident.clone()).or_default().clone())
    }

    /// Drops a table's lock entry once no request holds or awaits it,
    /// so the map tracks only in-flight tables.
    fn evict_cycle_lock(&self, ident: &TableIdent, cell: &Arc<tokio::sync::Mutex<()>>) {
        if let Ok(mut inflight) = self.inflight.lock() {
            // The map's reference plus ours; more means another request
            // already fetched the entry.
            if Arc::strong_count(cell) == 2 {
                inflight.remove(ident);
            }
        }
    }
}

/// Cutoff for the cycle. A minimum-existing-time beyond the calendar
/// range clamps to the earliest representable instant, which keeps every
/// file rather than deleting any.
fn cycle_cutoff(retention: &RetentionConfig) -> DateTime<Utc> {
    Utc::now()
        .checked_sub_signed(retention.min_existing_time())
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}

/// Reachable set for a store's data phase: its own scan, plus the base
/// scan when cleaning a change store.
fn data_phase_reachable_ok(scans: &[Result<ReachableSet>], idx: usize) -> ReachableSet {
    let mut reachable = ReachableSet::default();
    for scan in scans[..=idx].iter().flatten() {
        reachable.merge(scan.clone());
    }
    reachable
}

fn data_phase_reachable(scans: &[ReachableSet], idx: usize) -> ReachableSet {
    let mut reachable = ReachableSet::default();
    for scan in &scans[..=idx] {
        reachable.merge(scan.clone());
    }
    reachable
}

fn record_phase_error(report: &mut StoreCleanReport, phase: &str, store: StoreKind, error: &Error) {
    tracing::warn!(store = %store, phase = phase, error = %error, "cleaning phase failed");
    metrics::record_clean_error(phase);
    report.errors.push(format!("{store}/{phase}: {error}"));
}

#[cfg(test)]
mod tests {
    use super::*;
    use lakeward_core::storage::MemoryBackend;
    use lakeward_table::handle::TableLayout;
    use lakeward_table::resolver::InMemoryResolver;

    #[tokio::test]
    async fn cycle_locks_are_evicted_after_the_cycle() {
        let io: Arc<dyn lakeward_core::storage::StorageBackend> = Arc::new(MemoryBackend::new());
        let resolver = Arc::new(InMemoryResolver::new(io));
        let ident = TableIdent::new("demo", "db", "t1");
        resolver.register(
            ident.clone(),
            "/wh/db/t1",
            TableLayout::Unkeyed,
            HashMap::new(),
        );
        let cleaner = OrphanCleaner::new(resolver, CleanerConfig::default()).expect("cleaner");

        cleaner.clean_table(&ident).await.expect("clean");
        assert!(cleaner.inflight.lock().expect("inflight lock").is_empty());

        // Repeated cycles come and go without accumulating entries.
        cleaner.clean_table(&ident).await.expect("clean");
        assert!(cleaner.inflight.lock().expect("inflight lock").is_empty());
    }

    #[test]
    fn oversized_retention_clamps_the_cutoff() {
        let retention = RetentionConfig {
            min_existing_time_minutes: u64::MAX,
            ..RetentionConfig::default()
        };
        assert_eq!(cycle_cutoff(&retention), DateTime::<Utc>::MIN_UTC);
    }
}
