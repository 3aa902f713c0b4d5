use scd2::audit::memory::MemoryAuditSink;
use scd2::destination::memory::MemoryDestination;
use scd2::error::ErrorKind;
use scd2::failpoints::{MERGE_AFTER_CLOSE, MERGE_BEFORE_SNAPSHOT, RUN_BEFORE_COMMIT};
use scd2::pipeline::Pipeline;
use scd2::source::memory::MemorySource;
use scd2::test_utils::bundle::{BundleBuilder, fact_row};
use scd2::test_utils::failpoints::CustomFailScenario;
use scd2::test_utils::rows::run_ts;
use scd2::types::{RunOutcome, RunStage, SourceBundle};
use scd2_config::shared::PipelineConfig;
use scd2_telemetry::init_test_tracing;

fn books(amount: i64) -> SourceBundle {
    BundleBuilder::new()
        .fact(fact_row(1, "2024-01-01", 10, amount))
        .fact(fact_row(2, "2024-01-01", 5, amount))
        .build()
}

async fn seeded_pipeline() -> (
    Pipeline<MemorySource, MemoryDestination, MemoryAuditSink>,
    MemorySource,
    MemoryDestination,
    MemoryAuditSink,
) {
    let source = MemorySource::new(books(100));
    let destination = MemoryDestination::new();
    let audit = MemoryAuditSink::new();
    let config = PipelineConfig {
        snapshot_table: Some("analytics_books".to_string()),
        ..PipelineConfig::default()
    };
    let pipeline = Pipeline::new(config, source.clone(), destination.clone(), audit.clone());

    pipeline.run_at(run_ts(1)).await.unwrap();
    source.replace(books(200)).await;

    (pipeline, source, destination, audit)
}

#[tokio::test(flavor = "multi_thread")]
async fn failure_between_close_and_append_rolls_back_the_close() {
    init_test_tracing();
    let mut scenario = CustomFailScenario::setup(&[]);
    let (pipeline, _, destination, audit) = seeded_pipeline().await;
    let before = destination.history().await;

    scenario.configure(MERGE_AFTER_CLOSE, "return");

    let err = pipeline.run_at(run_ts(2)).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::FailpointTriggered);

    // Both entities still have their original, open version.
    let history = destination.history().await;
    assert_eq!(history, before);
    assert!(history.iter().all(|record| record.is_current));

    assert!(matches!(
        audit.last().await.unwrap().outcome,
        Some(RunOutcome::Failed {
            stage: RunStage::Merge,
            ..
        })
    ));
}

#[tokio::test(flavor = "multi_thread")]
async fn failure_parameter_selects_the_error_kind() {
    init_test_tracing();
    let mut scenario = CustomFailScenario::setup(&[]);
    let (pipeline, _, destination, _) = seeded_pipeline().await;
    let before = destination.history().await;

    scenario.configure(MERGE_AFTER_CLOSE, "return(constraint)");

    let err = pipeline.run_at(run_ts(2)).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::DestinationConstraintViolation);
    assert_eq!(destination.history().await, before);
}

#[tokio::test(flavor = "multi_thread")]
async fn failure_before_snapshot_discards_the_merge() {
    init_test_tracing();
    let mut scenario = CustomFailScenario::setup(&[]);
    let (pipeline, _, destination, _) = seeded_pipeline().await;
    let history = destination.history().await;
    let snapshot = destination.snapshot().await;

    scenario.configure(MERGE_BEFORE_SNAPSHOT, "return");

    pipeline.run_at(run_ts(2)).await.unwrap_err();
    assert_eq!(destination.history().await, history);
    assert_eq!(destination.snapshot().await, snapshot);
}

#[tokio::test(flavor = "multi_thread")]
async fn failure_before_commit_discards_every_write() {
    init_test_tracing();
    let mut scenario = CustomFailScenario::setup(&[]);
    let (pipeline, _, destination, _) = seeded_pipeline().await;
    let history = destination.history().await;
    let snapshot = destination.snapshot().await;

    scenario.configure(RUN_BEFORE_COMMIT, "return");
    pipeline.run_at(run_ts(2)).await.unwrap_err();
    assert_eq!(destination.history().await, history);
    assert_eq!(destination.snapshot().await, snapshot);
    scenario.configure(RUN_BEFORE_COMMIT, "off");

    // Once the failpoint is off the same batch goes through.
    let report = pipeline.run_at(run_ts(3)).await.unwrap();
    assert_eq!(report.metrics.merge.changed_count, 2);
    assert_eq!(destination.history().await.len(), 4);
}
