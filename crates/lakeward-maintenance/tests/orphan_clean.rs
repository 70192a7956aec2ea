//! Integration tests for orphan-file cleaning cycles.
//!
//! Each test builds a table on a fresh memory backend, commits real
//! snapshots through the table layer, plants orphan files directly in
//! storage, and verifies exactly which files a cleaning cycle removes.

use std::collections::HashMap;
use std::sync::Arc;

use bytes::Bytes;
use chrono::{Duration, Utc};

use lakeward_core::error::Error;
use lakeward_core::storage::{MemoryBackend, StorageBackend, WritePrecondition};
use lakeward_maintenance::report::TableCleanReport;
use lakeward_maintenance::{CleanOutcome, CleanerConfig, OrphanCleaner};
use lakeward_table::commit::AppendFiles;
use lakeward_table::config::keys;
use lakeward_table::handle::{TableIdent, TableLayout};
use lakeward_table::resolver::{InMemoryResolver, TableResolver};

fn props(extra: &[(&str, &str)]) -> HashMap<String, String> {
    let mut props = HashMap::new();
    props.insert(keys::ORPHAN_CLEAN_ENABLED.to_string(), "true".to_string());
    props.insert(keys::MIN_EXISTING_TIME_MINUTES.to_string(), "0".to_string());
    for (k, v) in extra {
        props.insert((*k).to_string(), (*v).to_string());
    }
    props
}

async fn put(io: &Arc<MemoryBackend>, path: &str) {
    io.put(path, Bytes::from("x"), WritePrecondition::None)
        .await
        .expect("put");
}

fn cleaner(resolver: Arc<InMemoryResolver>) -> OrphanCleaner {
    OrphanCleaner::new(resolver, CleanerConfig::default()).expect("valid config")
}

fn cleaned(outcome: CleanOutcome) -> TableCleanReport {
    match outcome {
        CleanOutcome::Cleaned(report) => report,
        other => panic!("expected a completed cycle, got {other:?}"),
    }
}

#[tokio::test]
async fn referenced_files_survive_and_orphans_are_deleted() {
    let io = Arc::new(MemoryBackend::new());
    let resolver = Arc::new(InMemoryResolver::new(io.clone()));
    let ident = TableIdent::new("demo", "db", "t1");
    resolver.register(ident.clone(), "/wh/db/t1", TableLayout::Unkeyed, props(&[]));

    put(&io, "/wh/db/t1/data/live.parquet").await;
    let handle = resolver.resolve(&ident).await.expect("resolve");
    AppendFiles::new(&handle.base_store())
        .append_file("/wh/db/t1/data/live.parquet")
        .commit()
        .await
        .expect("commit");
    put(&io, "/wh/db/t1/data/orphan.parquet").await;

    let report = cleaned(
        cleaner(resolver)
            .clean_table(&ident)
            .await
            .expect("clean"),
    );

    assert!(io.exists("/wh/db/t1/data/live.parquet").await.expect("exists"));
    assert!(!io.exists("/wh/db/t1/data/orphan.parquet").await.expect("exists"));
    assert_eq!(report.totals().deleted, 1);
    assert!(!report.has_errors());
    assert!(!report.has_divergences());
}

#[tokio::test]
async fn disabled_table_is_untouched() {
    let io = Arc::new(MemoryBackend::new());
    let resolver = Arc::new(InMemoryResolver::new(io.clone()));
    let ident = TableIdent::new("demo", "db", "t1");
    // No properties at all: cleaning defaults to disabled.
    resolver.register(ident.clone(), "/wh/db/t1", TableLayout::Unkeyed, HashMap::new());
    put(&io, "/wh/db/t1/data/orphan.parquet").await;

    let outcome = cleaner(resolver)
        .clean_table(&ident)
        .await
        .expect("clean");

    assert!(matches!(outcome, CleanOutcome::Disabled));
    assert!(io.exists("/wh/db/t1/data/orphan.parquet").await.expect("exists"));
}

#[tokio::test]
async fn enabling_mid_flight_is_observed_by_the_next_cycle() {
    let io = Arc::new(MemoryBackend::new());
    let resolver = Arc::new(InMemoryResolver::new(io.clone()));
    let ident = TableIdent::new("demo", "db", "t1");
    resolver.register(
        ident.clone(),
        "/wh/db/t1",
        TableLayout::Unkeyed,
        props(&[(keys::ORPHAN_CLEAN_ENABLED, "false")]),
    );
    put(&io, "/wh/db/t1/data/orphan.parquet").await;

    let cleaner = cleaner(resolver.clone());
    assert!(matches!(
        cleaner.clean_table(&ident).await.expect("clean"),
        CleanOutcome::Disabled
    ));

    resolver
        .set_property(&ident, keys::ORPHAN_CLEAN_ENABLED, "true")
        .expect("set property");

    let report = cleaned(cleaner.clean_table(&ident).await.expect("clean"));
    assert_eq!(report.totals().deleted, 1);
    assert!(!io.exists("/wh/db/t1/data/orphan.parquet").await.expect("exists"));
}

#[tokio::test]
async fn young_orphans_are_kept_until_old_enough() {
    let io = Arc::new(MemoryBackend::new());
    let resolver = Arc::new(InMemoryResolver::new(io.clone()));
    let ident = TableIdent::new("demo", "db", "t1");
    // Default 48h minimum-existing-time.
    resolver.register(
        ident.clone(),
        "/wh/db/t1",
        TableLayout::Unkeyed,
        props(&[(keys::MIN_EXISTING_TIME_MINUTES, "2880")]),
    );

    put(&io, "/wh/db/t1/data/young-orphan.parquet").await;
    put(&io, "/wh/db/t1/data/old-orphan.parquet").await;
    assert!(io.set_last_modified(
        "/wh/db/t1/data/old-orphan.parquet",
        Utc::now() - Duration::days(3),
    ));

    let report = cleaned(
        cleaner(resolver)
            .clean_table(&ident)
            .await
            .expect("clean"),
    );

    assert!(io.exists("/wh/db/t1/data/young-orphan.parquet").await.expect("exists"));
    assert!(!io.exists("/wh/db/t1/data/old-orphan.parquet").await.expect("exists"));
    assert_eq!(report.totals().deleted, 1);
}

#[tokio::test]
async fn second_cycle_finds_nothing() {
    let io = Arc::new(MemoryBackend::new());
    let resolver = Arc::new(InMemoryResolver::new(io.clone()));
    let ident = TableIdent::new("demo", "db", "t1");
    resolver.register(ident.clone(), "/wh/db/t1", TableLayout::Unkeyed, props(&[]));

    put(&io, "/wh/db/t1/data/live.parquet").await;
    let handle = resolver.resolve(&ident).await.expect("resolve");
    AppendFiles::new(&handle.base_store())
        .append_file("/wh/db/t1/data/live.parquet")
        .commit()
        .await
        .expect("commit");
    put(&io, "/wh/db/t1/data/orphan.parquet").await;

    let cleaner = cleaner(resolver);
    let first = cleaned(cleaner.clean_table(&ident).await.expect("clean"));
    assert_eq!(first.totals().deleted, 1);

    let second = cleaned(cleaner.clean_table(&ident).await.expect("clean"));
    assert_eq!(second.totals().candidates, 0);
    assert_eq!(second.totals().deleted, 0);
    assert!(io.exists("/wh/db/t1/data/live.parquet").await.expect("exists"));
}

#[tokio::test]
async fn empty_partition_directories_are_swept() {
    let io = Arc::new(MemoryBackend::new());
    let resolver = Arc::new(InMemoryResolver::new(io.clone()));
    let ident = TableIdent::new("demo", "db", "t1");
    resolver.register(ident.clone(), "/wh/db/t1", TableLayout::Unkeyed, props(&[]));

    put(&io, "/wh/db/t1/data/testLocation/part=1/orphan.parquet").await;
    put(&io, "/wh/db/t1/data/keep/live.parquet").await;
    let handle = resolver.resolve(&ident).await.expect("resolve");
    AppendFiles::new(&handle.base_store())
        .append_file("/wh/db/t1/data/keep/live.parquet")
        .commit()
        .await
        .expect("commit");

    cleaned(
        cleaner(resolver)
            .clean_table(&ident)
            .await
            .expect("clean"),
    );

    assert!(!io.exists("/wh/db/t1/data/testLocation/part=1").await.expect("exists"));
    assert!(!io.exists("/wh/db/t1/data/testLocation").await.expect("exists"));
    assert!(io.exists("/wh/db/t1/data").await.expect("exists"));
    assert!(io.exists("/wh/db/t1/data/keep/live.parquet").await.expect("exists"));
}

#[tokio::test]
async fn metadata_retention_keeps_recent_versions_and_live_manifests() {
    let io = Arc::new(MemoryBackend::new());
    let resolver = Arc::new(InMemoryResolver::new(io.clone()));
    let ident = TableIdent::new("demo", "db", "t1");
    resolver.register(
        ident.clone(),
        "/wh/db/t1",
        TableLayout::Unkeyed,
        props(&[(keys::METADATA_VERSION_RETAIN_COUNT, "1")]),
    );

    let handle = resolver.resolve(&ident).await.expect("resolve");
    for i in 1..=3 {
        put(&io, &format!("/wh/db/t1/data/f{i}.parquet")).await;
        AppendFiles::new(&handle.base_store())
            .append_file(format!("/wh/db/t1/data/f{i}.parquet"))
            .commit()
            .await
            .expect("commit");
    }
    put(&io, "/wh/db/t1/metadata/stray.json").await;

    let report = cleaned(
        cleaner(resolver)
            .clean_table(&ident)
            .await
            .expect("clean"),
    );

    // Only the most recent version file is retained.
    assert!(!io.exists("/wh/db/t1/metadata/v1.metadata.json").await.expect("exists"));
    assert!(!io.exists("/wh/db/t1/metadata/v2.metadata.json").await.expect("exists"));
    assert!(io.exists("/wh/db/t1/metadata/v3.metadata.json").await.expect("exists"));
    assert!(io.exists("/wh/db/t1/metadata/version-hint.text").await.expect("exists"));
    // Manifests of every snapshot in the retained log stay reachable.
    for i in 1..=3 {
        assert!(io
            .exists(&format!("/wh/db/t1/metadata/snap-{i}.manifest-list.json"))
            .await
            .expect("exists"));
        assert!(io
            .exists(&format!("/wh/db/t1/metadata/snap-{i}-m0.manifest.json"))
            .await
            .expect("exists"));
    }
    assert!(!io.exists("/wh/db/t1/metadata/stray.json").await.expect("exists"));
    // v1, v2, stray.json.
    assert_eq!(report.totals().deleted, 3);
}

#[tokio::test]
async fn active_markers_protect_staged_files_per_store() {
    let io = Arc::new(MemoryBackend::new());
    let resolver = Arc::new(InMemoryResolver::new(io.clone()));
    let ident = TableIdent::new("demo", "db", "keyed");
    resolver.register(ident.clone(), "/wh/db/keyed", TableLayout::Keyed, props(&[]));

    let handle = resolver.resolve(&ident).await.expect("resolve");
    let change = handle.change_store().expect("keyed table");
    AppendFiles::new(&change)
        .set("writer.job-id", "job-old")
        .commit()
        .await
        .expect("first change commit");
    AppendFiles::new(&change)
        .set("writer.job-id", "job-live")
        .commit()
        .await
        .expect("second change commit");

    // Staged by the still-active change writer: protected.
    put(&io, "/wh/db/keyed/change/data/part-job-live-0001.parquet").await;
    // Named after a superseded marker value: plain orphan.
    put(&io, "/wh/db/keyed/change/data/part-job-old-0001.parquet").await;
    // Markers are per-store; the change writer's marker means nothing in
    // the base store.
    put(&io, "/wh/db/keyed/base/data/part-job-live-0002.parquet").await;

    cleaned(
        cleaner(resolver)
            .clean_table(&ident)
            .await
            .expect("clean"),
    );

    assert!(io
        .exists("/wh/db/keyed/change/data/part-job-live-0001.parquet")
        .await
        .expect("exists"));
    assert!(!io
        .exists("/wh/db/keyed/change/data/part-job-old-0001.parquet")
        .await
        .expect("exists"));
    assert!(!io
        .exists("/wh/db/keyed/base/data/part-job-live-0002.parquet")
        .await
        .expect("exists"));
}

#[tokio::test]
async fn markers_protect_metadata_subtree_files_too() {
    let io = Arc::new(MemoryBackend::new());
    let resolver = Arc::new(InMemoryResolver::new(io.clone()));
    let ident = TableIdent::new("demo", "db", "t1");
    resolver.register(ident.clone(), "/wh/db/t1", TableLayout::Unkeyed, props(&[]));

    let handle = resolver.resolve(&ident).await.expect("resolve");
    AppendFiles::new(&handle.base_store())
        .set("writer.job-id", "job-stale")
        .commit()
        .await
        .expect("first commit");
    AppendFiles::new(&handle.base_store())
        .set("writer.job-id", "job-active")
        .commit()
        .await
        .expect("second commit");

    put(&io, "/wh/db/t1/metadata/flink-job-active.json").await;
    put(&io, "/wh/db/t1/metadata/flink-job-stale.json").await;
    put(&io, "/wh/db/t1/metadata/stray.json").await;

    cleaned(
        cleaner(resolver)
            .clean_table(&ident)
            .await
            .expect("clean"),
    );

    assert!(io.exists("/wh/db/t1/metadata/flink-job-active.json").await.expect("exists"));
    assert!(!io.exists("/wh/db/t1/metadata/flink-job-stale.json").await.expect("exists"));
    assert!(!io.exists("/wh/db/t1/metadata/stray.json").await.expect("exists"));
}

#[tokio::test]
async fn change_files_absorbed_by_base_commits_survive() {
    let io = Arc::new(MemoryBackend::new());
    let resolver = Arc::new(InMemoryResolver::new(io.clone()));
    let ident = TableIdent::new("demo", "db", "keyed");
    resolver.register(ident.clone(), "/wh/db/keyed", TableLayout::Keyed, props(&[]));

    for i in 1..=3 {
        put(&io, &format!("/wh/db/keyed/change/data/c{i}.parquet")).await;
    }
    let handle = resolver.resolve(&ident).await.expect("resolve");
    AppendFiles::new(&handle.change_store().expect("keyed table"))
        .append_file("/wh/db/keyed/change/data/c1.parquet")
        .append_file("/wh/db/keyed/change/data/c2.parquet")
        .commit()
        .await
        .expect("change commit");
    // c3 was moved into the base dataset in place; only base metadata
    // references it now.
    AppendFiles::new(&handle.base_store())
        .append_file("/wh/db/keyed/change/data/c3.parquet")
        .commit()
        .await
        .expect("base commit");
    put(&io, "/wh/db/keyed/change/data/c4.parquet").await;

    let report = cleaned(
        cleaner(resolver)
            .clean_table(&ident)
            .await
            .expect("clean"),
    );

    for i in 1..=3 {
        assert!(
            io.exists(&format!("/wh/db/keyed/change/data/c{i}.parquet"))
                .await
                .expect("exists"),
            "c{i} must survive"
        );
    }
    assert!(!io.exists("/wh/db/keyed/change/data/c4.parquet").await.expect("exists"));
    assert_eq!(report.totals().deleted, 1);
    assert!(!report.has_errors());
}

#[tokio::test]
async fn overlapping_cycles_for_one_table_are_skipped() {
    /// Resolver that stalls inside `resolve`, holding the cycle lock long
    /// enough for a second request to arrive.
    struct SlowResolver {
        inner: InMemoryResolver,
    }

    #[async_trait::async_trait]
    impl TableResolver for SlowResolver {
        async fn resolve(
            &self,
            ident: &TableIdent,
        ) -> lakeward_core::error::Result<lakeward_table::handle::TableHandle> {
            tokio::time::sleep(std::time::Duration::from_millis(200)).await;
            self.inner.resolve(ident).await
        }
    }

    let io = Arc::new(MemoryBackend::new());
    let inner = InMemoryResolver::new(io.clone());
    let ident = TableIdent::new("demo", "db", "t1");
    inner.register(ident.clone(), "/wh/db/t1", TableLayout::Unkeyed, props(&[]));

    let cleaner = Arc::new(
        OrphanCleaner::new(Arc::new(SlowResolver { inner }), CleanerConfig::default())
            .expect("valid config"),
    );

    let first = {
        let cleaner = cleaner.clone();
        let ident = ident.clone();
        tokio::spawn(async move { cleaner.clean_table(&ident).await })
    };
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    let second = cleaner.clean_table(&ident).await.expect("clean");

    assert!(matches!(second, CleanOutcome::SkippedBusy));
    assert!(matches!(
        first.await.expect("join").expect("clean"),
        CleanOutcome::Cleaned(_)
    ));
}

#[tokio::test]
async fn clean_all_reports_every_table() {
    let io = Arc::new(MemoryBackend::new());
    let resolver = Arc::new(InMemoryResolver::new(io.clone()));
    let enabled = TableIdent::new("demo", "db", "enabled");
    let disabled = TableIdent::new("demo", "db", "disabled");
    resolver.register(enabled.clone(), "/wh/db/enabled", TableLayout::Unkeyed, props(&[]));
    resolver.register(
        disabled.clone(),
        "/wh/db/disabled",
        TableLayout::Unkeyed,
        HashMap::new(),
    );
    put(&io, "/wh/db/enabled/data/orphan.parquet").await;
    put(&io, "/wh/db/disabled/data/orphan.parquet").await;

    let outcomes = cleaner(resolver)
        .clean_all(&[enabled.clone(), disabled.clone()])
        .await;

    assert_eq!(outcomes.len(), 2);
    for (ident, outcome) in outcomes {
        match outcome.expect("clean") {
            CleanOutcome::Cleaned(report) => {
                assert_eq!(ident, enabled);
                assert_eq!(report.totals().deleted, 1);
            }
            CleanOutcome::Disabled => assert_eq!(ident, disabled),
            CleanOutcome::SkippedBusy => panic!("no overlap expected"),
        }
    }
    assert!(!io.exists("/wh/db/enabled/data/orphan.parquet").await.expect("exists"));
    assert!(io.exists("/wh/db/disabled/data/orphan.parquet").await.expect("exists"));
}

#[tokio::test]
async fn plan_reports_candidates_without_deleting() {
    let io = Arc::new(MemoryBackend::new());
    let resolver = Arc::new(InMemoryResolver::new(io.clone()));
    let ident = TableIdent::new("demo", "db", "t1");
    resolver.register(ident.clone(), "/wh/db/t1", TableLayout::Unkeyed, props(&[]));

    put(&io, "/wh/db/t1/data/live.parquet").await;
    let handle = resolver.resolve(&ident).await.expect("resolve");
    AppendFiles::new(&handle.base_store())
        .append_file("/wh/db/t1/data/live.parquet")
        .commit()
        .await
        .expect("commit");
    put(&io, "/wh/db/t1/data/orphan.parquet").await;

    let plan = cleaner(resolver)
        .plan_table(&ident)
        .await
        .expect("plan");

    assert_eq!(plan.candidate_count(), 1);
    assert_eq!(plan.stores[0].data_candidates[0].path, "/wh/db/t1/data/orphan.parquet");
    assert!(io.exists("/wh/db/t1/data/orphan.parquet").await.expect("exists"));
}

#[tokio::test]
async fn externally_deleted_live_file_is_reported_as_divergence() {
    let io = Arc::new(MemoryBackend::new());
    let resolver = Arc::new(InMemoryResolver::new(io.clone()));
    let ident = TableIdent::new("demo", "db", "t1");
    resolver.register(ident.clone(), "/wh/db/t1", TableLayout::Unkeyed, props(&[]));

    put(&io, "/wh/db/t1/data/live.parquet").await;
    let handle = resolver.resolve(&ident).await.expect("resolve");
    AppendFiles::new(&handle.base_store())
        .append_file("/wh/db/t1/data/live.parquet")
        .commit()
        .await
        .expect("commit");
    // Someone outside the maintenance layer removed the file.
    io.delete("/wh/db/t1/data/live.parquet").await.expect("delete");

    let report = cleaned(
        cleaner(resolver)
            .clean_table(&ident)
            .await
            .expect("clean"),
    );

    assert!(report.has_divergences());
    assert_eq!(
        report.stores[0].divergences,
        vec!["/wh/db/t1/data/live.parquet".to_string()]
    );
}

#[tokio::test]
async fn scheme_qualified_locations_clean_and_sweep() {
    let io = Arc::new(MemoryBackend::new());
    let resolver = Arc::new(InMemoryResolver::new(io.clone()));
    let ident = TableIdent::new("demo", "db", "t1");
    resolver.register(
        ident.clone(),
        "hdfs://ns1/wh/db/t1",
        TableLayout::Unkeyed,
        props(&[]),
    );

    put(&io, "/wh/db/t1/data/live.parquet").await;
    let handle = resolver.resolve(&ident).await.expect("resolve");
    // Writers may record fully qualified URIs in metadata.
    AppendFiles::new(&handle.base_store())
        .append_file("hdfs://ns1/wh/db/t1/data/live.parquet")
        .commit()
        .await
        .expect("commit");
    put(&io, "/wh/db/t1/data/part=1/orphan.parquet").await;

    let report = cleaned(
        cleaner(resolver)
            .clean_table(&ident)
            .await
            .expect("clean"),
    );

    assert!(io.exists("/wh/db/t1/data/live.parquet").await.expect("exists"));
    assert!(!io.exists("/wh/db/t1/data/part=1/orphan.parquet").await.expect("exists"));
    // The emptied partition directory is swept, the subtree root is not.
    assert!(!io.exists("/wh/db/t1/data/part=1").await.expect("exists"));
    assert!(io.exists("/wh/db/t1/data").await.expect("exists"));
    assert_eq!(report.totals().deleted, 1);
    assert!(!report.has_errors());
    assert!(!report.has_divergences());
}

#[tokio::test]
async fn extreme_age_floor_keeps_everything() {
    let io = Arc::new(MemoryBackend::new());
    let resolver = Arc::new(InMemoryResolver::new(io.clone()));
    let ident = TableIdent::new("demo", "db", "t1");
    // Representable as a duration but far beyond the calendar range; the
    // cutoff clamps to the earliest instant instead of overflowing.
    resolver.register(
        ident.clone(),
        "/wh/db/t1",
        TableLayout::Unkeyed,
        props(&[(keys::MIN_EXISTING_TIME_MINUTES, "100000000000000")]),
    );
    put(&io, "/wh/db/t1/data/orphan.parquet").await;

    let report = cleaned(
        cleaner(resolver)
            .clean_table(&ident)
            .await
            .expect("clean"),
    );

    assert_eq!(report.totals().candidates, 0);
    assert!(!report.has_errors());
    assert!(io.exists("/wh/db/t1/data/orphan.parquet").await.expect("exists"));
}

#[tokio::test]
async fn unparsable_retention_fails_only_that_table() {
    let io = Arc::new(MemoryBackend::new());
    let resolver = Arc::new(InMemoryResolver::new(io.clone()));
    let bad = TableIdent::new("demo", "db", "bad");
    let good = TableIdent::new("demo", "db", "good");
    let huge = u64::MAX.to_string();
    resolver.register(
        bad.clone(),
        "/wh/db/bad",
        TableLayout::Unkeyed,
        props(&[(keys::MIN_EXISTING_TIME_MINUTES, huge.as_str())]),
    );
    resolver.register(good.clone(), "/wh/db/good", TableLayout::Unkeyed, props(&[]));
    put(&io, "/wh/db/good/data/orphan.parquet").await;

    let outcomes = cleaner(resolver).clean_all(&[bad.clone(), good.clone()]).await;

    assert_eq!(outcomes.len(), 2);
    for (ident, outcome) in outcomes {
        if ident == bad {
            assert!(matches!(
                outcome.expect_err("must fail"),
                Error::Config { .. }
            ));
        } else {
            let report = cleaned(outcome.expect("clean"));
            assert_eq!(report.totals().deleted, 1);
        }
    }
    assert!(!io.exists("/wh/db/good/data/orphan.parquet").await.expect("exists"));
}
