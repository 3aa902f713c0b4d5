use bigdecimal::BigDecimal;
use scd2::audit::memory::MemoryAuditSink;
use scd2::destination::memory::MemoryDestination;
use scd2::error::{ErrorCategory, ErrorKind};
use scd2::fingerprint::fingerprint;
use scd2::pipeline::Pipeline;
use scd2::source::json::JsonFileSource;
use scd2::source::memory::MemorySource;
use scd2::test_utils::bundle::{BundleBuilder, bundle_to_json, fact_row};
use scd2::test_utils::faulty_destination::{FaultPoint, FaultyDestination};
use scd2::test_utils::rows::run_ts;
use scd2::types::{
    Cell, MergeResult, RunOutcome, RunStage, RunStatus, SourceBundle, VersionedRecord,
};
use scd2_config::shared::PipelineConfig;
use scd2_telemetry::init_test_tracing;
use std::collections::HashMap;
use std::str::FromStr;

fn dec(value: &str) -> BigDecimal {
    BigDecimal::from_str(value).unwrap()
}

fn single_book(amount: i64) -> SourceBundle {
    BundleBuilder::new()
        .entity(1, "A")
        .fact(fact_row(1, "2024-01-01", 10, amount))
        .build()
}

fn create_pipeline(
    bundle: SourceBundle,
) -> (
    Pipeline<MemorySource, MemoryDestination, MemoryAuditSink>,
    MemorySource,
    MemoryDestination,
    MemoryAuditSink,
) {
    let source = MemorySource::new(bundle);
    let destination = MemoryDestination::new();
    let audit = MemoryAuditSink::new();
    let pipeline = Pipeline::new(
        PipelineConfig::default(),
        source.clone(),
        destination.clone(),
        audit.clone(),
    );

    (pipeline, source, destination, audit)
}

/// Asserts that every entity has exactly one open version and all others are closed.
fn assert_single_current(history: &[VersionedRecord]) {
    let mut current: HashMap<i64, usize> = HashMap::new();
    for record in history {
        if record.is_current {
            assert!(record.effective_to.is_none());
            *current.entry(record.entity_id).or_default() += 1;
        } else {
            assert!(record.effective_to.is_some());
        }
    }

    for record in history {
        assert_eq!(current.get(&record.entity_id), Some(&1), "{record:?}");
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn price_change_closes_and_reopens_version() {
    init_test_tracing();
    let (pipeline, source, destination, audit) = create_pipeline(single_book(100));
    let (t1, t2) = (run_ts(1), run_ts(2));

    let first = pipeline.run_at(t1).await.unwrap();
    assert_eq!(
        first.metrics.merge,
        MergeResult {
            new_count: 1,
            changed_count: 0,
            inserted_count: 1
        }
    );

    let history = destination.history().await;
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].unit_price, dec("10.00"));
    assert_eq!(history[0].effective_from, t1);
    assert!(history[0].is_current);
    let f1 = history[0].fingerprint;

    source.replace(single_book(120)).await;
    let second = pipeline.run_at(t2).await.unwrap();
    assert_eq!(
        second.metrics.merge,
        MergeResult {
            new_count: 0,
            changed_count: 1,
            inserted_count: 1
        }
    );

    let history = destination.history().await;
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].effective_from, t1);
    assert_eq!(history[0].effective_to, Some(t2));
    assert!(!history[0].is_current);
    assert_eq!(history[1].effective_from, t2);
    assert_eq!(history[1].effective_to, None);
    assert!(history[1].is_current);
    assert_eq!(history[1].unit_price, dec("12.00"));
    assert_ne!(history[1].fingerprint, f1);
    assert_single_current(&history);

    let records = audit.records().await;
    assert_eq!(records.len(), 2);
    assert!(records.iter().all(|record| record.status == RunStatus::Success));
    assert_eq!(records[0].pipeline_name, PipelineConfig::DEFAULT_NAME);
}

#[tokio::test(flavor = "multi_thread")]
async fn extract_count_is_the_fact_row_count() {
    init_test_tracing();
    let bundle = BundleBuilder::new()
        .entity(1, "A")
        .author(2, "Unused")
        .fact(fact_row(1, "2024-01-01", 10, 100))
        .build();
    assert!(bundle.total_rows() > 1);
    let (pipeline, _, _, audit) = create_pipeline(bundle);

    let report = pipeline.run_at(run_ts(1)).await.unwrap();
    assert_eq!(report.metrics.extract_rows, 1);
    assert_eq!(report.metrics.transform_rows, 1);

    let Some(RunOutcome::Success(metrics)) = audit.last().await.unwrap().outcome else {
        panic!("expected a successful run");
    };
    assert_eq!(metrics.extract_rows, 1);
}

#[tokio::test(flavor = "multi_thread")]
async fn replaying_an_unchanged_batch_writes_nothing() {
    init_test_tracing();
    let bundle = BundleBuilder::new()
        .fact(fact_row(1, "2024-01-01", 10, 100))
        .fact(fact_row(2, "2024-01-01", 4, 10))
        .fact(fact_row(3, "2024-01-01", 3, 10))
        .build();
    let (pipeline, _, destination, _) = create_pipeline(bundle);

    pipeline.run_at(run_ts(1)).await.unwrap();
    let before = destination.history().await;

    let replay = pipeline.run_at(run_ts(2)).await.unwrap();
    assert_eq!(replay.metrics.merge, MergeResult::default());
    assert_eq!(replay.metrics.transform_rows, 3);
    assert_eq!(destination.history().await, before);
}

#[tokio::test(flavor = "multi_thread")]
async fn negative_quantity_fails_validation_without_writes() {
    init_test_tracing();
    let (pipeline, source, destination, audit) = create_pipeline(single_book(100));
    pipeline.run_at(run_ts(1)).await.unwrap();
    let before = destination.history().await;

    source
        .replace(
            BundleBuilder::new()
                .entity(1, "A")
                .fact(fact_row(1, "2024-01-01", -1, 100))
                .build(),
        )
        .await;
    let err = pipeline.run_at(run_ts(2)).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NegativeMeasure);
    assert_eq!(err.category(), ErrorCategory::Semantic);
    assert_eq!(destination.history().await, before);

    let last = audit.last().await.unwrap();
    assert_eq!(last.status, RunStatus::Failed);
    match last.outcome.unwrap() {
        RunOutcome::Failed { stage, message } => {
            assert_eq!(stage, RunStage::Validate);
            assert!(message.contains("negative"), "{message}");
        }
        other => panic!("expected a failed outcome, got {other:?}"),
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn validation_failure_before_first_run_creates_nothing() {
    init_test_tracing();
    let bundle = BundleBuilder::new()
        .fact(fact_row(1, "2024-01-01", 10, 100))
        .without_table("categories")
        .build();
    let (pipeline, _, destination, _) = create_pipeline(bundle);

    let err = pipeline.run_at(run_ts(1)).await.unwrap_err();
    assert_eq!(err.category(), ErrorCategory::Structural);
    assert!(!destination.history_table_exists().await);
}

#[tokio::test(flavor = "multi_thread")]
async fn zero_quantity_fails_in_transform_stage() {
    init_test_tracing();
    let bundle = BundleBuilder::new()
        .fact(fact_row(1, "2024-01-01", 0, 0))
        .build();
    let (pipeline, _, destination, audit) = create_pipeline(bundle);

    let err = pipeline.run_at(run_ts(1)).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ZeroQuantity);
    assert!(destination.history().await.is_empty());

    let last = audit.last().await.unwrap();
    assert!(matches!(
        last.outcome,
        Some(RunOutcome::Failed {
            stage: RunStage::Transform,
            ..
        })
    ));
}

#[tokio::test(flavor = "multi_thread")]
async fn duplicate_dimension_keys_fail_in_transform_stage() {
    init_test_tracing();
    let bundle = BundleBuilder::new()
        .author(1, "Author")
        .author(1, "Author (alias)")
        .fact(fact_row(1, "2024-01-01", 1, 1))
        .build();
    let (pipeline, _, destination, _) = create_pipeline(bundle);

    let err = pipeline.run_at(run_ts(1)).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::PostJoinGrainViolation);
    assert!(destination.history().await.is_empty());
}

#[tokio::test(flavor = "multi_thread")]
async fn orphaned_fact_rows_are_dropped_not_fatal() {
    init_test_tracing();
    let mut orphan = fact_row(2, "2024-01-01", 1, 1);
    orphan.category_id = Cell::I64(99);
    let bundle = BundleBuilder::new()
        .fact(fact_row(1, "2024-01-01", 1, 1))
        .fact(orphan)
        .build();
    let (pipeline, _, destination, _) = create_pipeline(bundle);

    let report = pipeline.run_at(run_ts(1)).await.unwrap();
    assert_eq!(report.metrics.transform_rows, 1);
    assert_eq!(report.metrics.merge.new_count, 1);

    let history = destination.history().await;
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].entity_id, 1);
}

#[tokio::test(flavor = "multi_thread")]
async fn several_dates_for_a_new_entity_abort_the_merge() {
    // History is keyed by entity id alone: two dates of one new entity would both become
    // current, which the destination rejects. The whole run rolls back.
    init_test_tracing();
    let bundle = BundleBuilder::new()
        .fact(fact_row(1, "2024-01-01", 10, 100))
        .fact(fact_row(1, "2024-02-01", 10, 120))
        .fact(fact_row(2, "2024-01-01", 1, 5))
        .build();
    let (pipeline, _, destination, audit) = create_pipeline(bundle);

    let err = pipeline.run_at(run_ts(1)).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::DestinationConstraintViolation);
    assert!(destination.history().await.is_empty());

    let last = audit.last().await.unwrap();
    assert!(matches!(
        last.outcome,
        Some(RunOutcome::Failed {
            stage: RunStage::Merge,
            ..
        })
    ));
}

#[tokio::test(flavor = "multi_thread")]
async fn several_dates_for_a_known_entity_version_by_entity_only() {
    // Each row is compared with the single current version of its entity. A row equal to that
    // version is unchanged; a row that differs replaces it.
    init_test_tracing();
    let (pipeline, source, destination, _) = create_pipeline(single_book(100));
    pipeline.run_at(run_ts(1)).await.unwrap();

    source
        .replace(
            BundleBuilder::new()
                .entity(1, "A")
                .fact(fact_row(1, "2024-01-01", 10, 100))
                .fact(fact_row(1, "2024-02-01", 10, 150))
                .build(),
        )
        .await;
    let report = pipeline.run_at(run_ts(2)).await.unwrap();
    assert_eq!(report.metrics.merge.changed_count, 1);
    assert_eq!(report.metrics.merge.new_count, 0);

    let history = destination.history().await;
    assert_eq!(history.len(), 2);
    assert_eq!(history[1].unit_price, dec("15.00"));
    assert_single_current(&history);
}

#[tokio::test(flavor = "multi_thread")]
async fn failure_after_close_leaves_previous_versions_current() {
    init_test_tracing();
    let source = MemorySource::new(single_book(100));
    let destination = FaultyDestination::new(MemoryDestination::new());
    let audit = MemoryAuditSink::new();
    let pipeline = Pipeline::new(
        PipelineConfig::default(),
        source.clone(),
        destination.clone(),
        audit.clone(),
    );

    pipeline.run_at(run_ts(1)).await.unwrap();
    let before = destination.inner().history().await;

    destination.set_fault(Some(FaultPoint::Append)).await;
    source.replace(single_book(120)).await;
    let err = pipeline.run_at(run_ts(2)).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::DestinationQueryFailed);
    assert_eq!(destination.inner().history().await, before);

    destination.set_fault(Some(FaultPoint::Commit)).await;
    let err = pipeline.run_at(run_ts(3)).await.unwrap_err();
    assert_eq!(err.category(), ErrorCategory::Destination);
    assert_eq!(destination.inner().history().await, before);

    destination.set_fault(None).await;
    let report = pipeline.run_at(run_ts(4)).await.unwrap();
    assert_eq!(report.metrics.merge.changed_count, 1);
    let history = destination.inner().history().await;
    assert_eq!(history[0].effective_to, Some(run_ts(4)));
    assert_single_current(&history);
}

#[tokio::test(flavor = "multi_thread")]
async fn snapshot_table_is_replaced_inside_the_run() {
    init_test_tracing();
    let config = PipelineConfig {
        snapshot_table: Some("analytics_books".to_string()),
        ..PipelineConfig::default()
    };
    let source = MemorySource::new(single_book(100));
    let destination = FaultyDestination::new(MemoryDestination::new());
    let pipeline = Pipeline::new(config, source.clone(), destination.clone(), MemoryAuditSink::new());

    let report = pipeline.run_at(run_ts(1)).await.unwrap();
    assert_eq!(report.metrics.snapshot_rows, Some(1));
    let snapshot = destination.inner().snapshot().await.unwrap();
    assert_eq!(snapshot.len(), 1);
    assert_eq!(snapshot[0].unit_price, dec("10.00"));

    destination.set_fault(Some(FaultPoint::Snapshot)).await;
    source.replace(single_book(150)).await;
    pipeline.run_at(run_ts(2)).await.unwrap_err();

    // Neither the snapshot nor the history moved.
    assert_eq!(destination.inner().snapshot().await.unwrap(), snapshot);
    assert_eq!(destination.inner().history().await.len(), 1);
}

#[tokio::test(flavor = "multi_thread")]
async fn missing_source_file_fails_in_extract_stage() {
    init_test_tracing();
    let audit = MemoryAuditSink::new();
    let pipeline = Pipeline::new(
        PipelineConfig::default(),
        JsonFileSource::new("/nonexistent/scd2/input.json"),
        MemoryDestination::new(),
        audit.clone(),
    );

    let err = pipeline.run_at(run_ts(1)).await.unwrap_err();
    assert_eq!(err.category(), ErrorCategory::Source);
    assert!(matches!(
        audit.last().await.unwrap().outcome,
        Some(RunOutcome::Failed {
            stage: RunStage::Extract,
            ..
        })
    ));
}

#[tokio::test(flavor = "multi_thread")]
async fn json_file_source_runs_end_to_end() {
    init_test_tracing();
    let bundle = BundleBuilder::new()
        .entity(1, "A")
        .entity(2, "B")
        .fact(fact_row(1, "2024-01-01", 10, 100))
        .fact(fact_row(2, "2024-01-01", 3, 10))
        .build();
    let path = std::env::temp_dir().join(format!("scd2-bundle-{}.json", uuid::Uuid::new_v4()));
    std::fs::write(&path, serde_json::to_vec(&bundle_to_json(&bundle)).unwrap()).unwrap();

    let destination = MemoryDestination::new();
    let pipeline = Pipeline::new(
        PipelineConfig::default(),
        JsonFileSource::new(&path),
        destination.clone(),
        MemoryAuditSink::new(),
    );
    let report = pipeline.run_at(run_ts(1)).await;
    std::fs::remove_file(&path).unwrap();

    let report = report.unwrap();
    assert_eq!(report.metrics.extract_rows, 2);
    assert_eq!(report.metrics.merge.new_count, 2);

    let history = destination.history().await;
    let b = history.iter().find(|record| record.entity_id == 2).unwrap();
    assert_eq!(b.unit_price, dec("3.33"));
    assert_eq!(b.name.as_deref(), Some("B"));
}

#[tokio::test(flavor = "multi_thread")]
async fn history_stays_consistent_across_many_runs() {
    init_test_tracing();
    let (pipeline, source, destination, _) = create_pipeline(SourceBundle::new());

    for day in 1..=6i64 {
        let mut builder = BundleBuilder::new();
        for entity_id in 1..=5i64 {
            // Entity `n` changes price every `n` runs; entity 5 appears from run 3 on.
            if entity_id == 5 && day < 3 {
                continue;
            }
            let amount = 10 * (1 + day / entity_id);
            builder = builder.fact(fact_row(entity_id, "2024-01-01", 1, amount));
        }
        source.replace(builder.build()).await;
        pipeline.run_at(run_ts(day)).await.unwrap();
    }

    let history = destination.history().await;
    assert_single_current(&history);

    // Consecutive versions of an entity are contiguous.
    let mut by_entity: HashMap<i64, Vec<&VersionedRecord>> = HashMap::new();
    for record in &history {
        by_entity.entry(record.entity_id).or_default().push(record);
    }
    for versions in by_entity.values() {
        for pair in versions.windows(2) {
            assert_eq!(pair[0].effective_to, Some(pair[1].effective_from));
        }
    }

    for record in destination.current_history().await {
        let amount = 10 * (1 + 6 / record.entity_id);
        assert_eq!(record.unit_price, BigDecimal::from(amount));
    }
}

#[test]
fn equal_tracked_attributes_share_a_fingerprint_across_dates() {
    let a = scd2::test_utils::rows::analytical_row(1, "2024-01-01", "10.00");
    let b = scd2::test_utils::rows::analytical_row(1, "2024-03-01", "10");
    assert_eq!(fingerprint(&a), fingerprint(&b));
}
