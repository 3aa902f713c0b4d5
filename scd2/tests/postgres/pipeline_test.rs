use std::str::FromStr;

use bigdecimal::BigDecimal;
use scd2::audit::postgres::PostgresAuditSink;
use scd2::destination::postgres::PostgresDestination;
use scd2::error::ErrorKind;
use scd2::pipeline::Pipeline;
use scd2::source::postgres::PostgresSource;
use scd2::test_utils::database::{TEST_DATABASE_SCHEMA, local_pg_connection_config, test_table_name};
use scd2::test_utils::rows::run_ts;
use scd2_config::shared::{PgConnectionConfig, PipelineConfig};
use scd2_postgres::audit::fetch_run;
use scd2_postgres::history::{HistoryRow, fetch_history};
use scd2_postgres::schema::TableName;
use scd2_postgres::test_utils::{create_pg_database, drop_pg_database};
use scd2_telemetry::init_test_tracing;
use sqlx::{Executor, PgPool};

const HISTORY_TABLE: &str = "book_analytics_scd2";
const SNAPSHOT_TABLE: &str = "analytics_books";
const RUN_LOG_TABLE: &str = "scd2_run_log";

type PgPipeline = Pipeline<PostgresSource, PostgresDestination, PostgresAuditSink>;

/// Creates the normalized source tables with two books sold on 2024-01-01.
async fn seed_source(pool: &PgPool) {
    pool.execute(
        r#"
        create table author_names (author_id integer primary key, author text);
        create table categories (category_id integer primary key, category text);
        create table languages (language_id integer primary key, language text);
        create table entity_names (entity_id bigint primary key, name text);
        create table fact_table (
            entity_id bigint,
            author_id integer,
            category_id integer,
            language_id integer,
            page_count integer,
            event_date date,
            quantity integer,
            amount numeric(12, 2)
        );

        insert into author_names values (1, 'Author 1');
        insert into categories values (1, 'Novel');
        insert into languages values (1, 'EN');
        insert into entity_names values (1, 'Book 1'), (2, 'Book 2');
        insert into fact_table values
            (1, 1, 1, 1, 320, '2024-01-01', 10, 100.00),
            (2, 1, 1, 1, 210, '2024-01-01', 4, 50.00);
        "#,
    )
    .await
    .expect("Failed to seed source tables");
}

async fn setup() -> (PgConnectionConfig, PgPool, PgPipeline) {
    init_test_tracing();

    let config = local_pg_connection_config();
    let pool = create_pg_database(&config).await;
    seed_source(&pool).await;

    let pipeline_config = PipelineConfig {
        snapshot_table: Some(SNAPSHOT_TABLE.to_string()),
        ..PipelineConfig::default()
    };
    let tables = pipeline_config
        .schema
        .required_tables()
        .iter()
        .map(|table| table.to_string())
        .collect();

    let source = PostgresSource::new(pool.clone(), TEST_DATABASE_SCHEMA, tables);
    let destination = PostgresDestination::new(
        pool.clone(),
        test_table_name(HISTORY_TABLE),
        Some(test_table_name(SNAPSHOT_TABLE)),
    );
    let audit = PostgresAuditSink::new(pool.clone(), test_table_name(RUN_LOG_TABLE))
        .await
        .unwrap();

    let pipeline = Pipeline::new(pipeline_config, source, destination, audit);

    (config, pool, pipeline)
}

async fn history(pool: &PgPool) -> Vec<HistoryRow> {
    let mut conn = pool.acquire().await.unwrap();
    fetch_history(&mut conn, &test_table_name(HISTORY_TABLE))
        .await
        .unwrap()
}

async fn table_exists(pool: &PgPool, table: &TableName) -> bool {
    sqlx::query_scalar::<_, bool>("select to_regclass($1) is not null")
        .bind(table.as_quoted_identifier())
        .fetch_one(pool)
        .await
        .unwrap()
}

#[tokio::test(flavor = "multi_thread")]
#[ignore = "requires a running Postgres instance"]
async fn price_change_closes_and_reopens_the_version() {
    let (config, pool, pipeline) = setup().await;

    let first = pipeline.run_at(run_ts(1)).await.unwrap();
    assert_eq!(first.metrics.merge.new_count, 2);
    assert_eq!(first.metrics.merge.inserted_count, 2);

    pool.execute("update fact_table set amount = 120.00 where entity_id = 1")
        .await
        .unwrap();

    let second = pipeline.run_at(run_ts(2)).await.unwrap();
    assert_eq!(second.metrics.merge.new_count, 0);
    assert_eq!(second.metrics.merge.changed_count, 1);
    assert_eq!(second.metrics.merge.inserted_count, 1);

    let rows = history(&pool).await;
    assert_eq!(rows.len(), 3);

    let book_one = rows.iter().filter(|row| row.entity_id == 1).collect::<Vec<_>>();
    assert_eq!(book_one.len(), 2);
    assert!(!book_one[0].is_current);
    assert_eq!(book_one[0].effective_from, run_ts(1));
    assert_eq!(book_one[0].effective_to, Some(run_ts(2)));
    assert_eq!(book_one[0].unit_price, BigDecimal::from_str("10.00").unwrap());
    assert!(book_one[1].is_current);
    assert_eq!(book_one[1].effective_from, run_ts(2));
    assert_eq!(book_one[1].effective_to, None);
    assert_eq!(book_one[1].unit_price, BigDecimal::from_str("12.00").unwrap());
    assert_ne!(book_one[0].record_hash, book_one[1].record_hash);

    let book_two = rows.iter().filter(|row| row.entity_id == 2).collect::<Vec<_>>();
    assert_eq!(book_two.len(), 1);
    assert!(book_two[0].is_current);
    assert_eq!(book_two[0].unit_price, BigDecimal::from_str("12.50").unwrap());

    let run = fetch_run(&pool, &test_table_name(RUN_LOG_TABLE), second.run_id.0)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(run.status, "SUCCESS");
    assert_eq!(run.extract_rows, Some(2));
    assert_eq!(run.transform_rows, Some(2));
    assert_eq!(run.scd_changed, Some(1));
    assert_eq!(run.scd_inserted, Some(1));
    let ended_at = run.ended_at.unwrap();
    assert!(ended_at >= run.started_at);
    assert_eq!(
        run.duration_sec,
        Some((ended_at - run.started_at).num_seconds())
    );

    drop(pipeline);
    pool.close().await;
    drop_pg_database(&config).await;
}

#[tokio::test(flavor = "multi_thread")]
#[ignore = "requires a running Postgres instance"]
async fn replaying_an_unchanged_batch_writes_nothing() {
    let (config, pool, pipeline) = setup().await;

    pipeline.run_at(run_ts(1)).await.unwrap();
    let before = history(&pool).await;

    let replay = pipeline.run_at(run_ts(2)).await.unwrap();
    assert_eq!(replay.metrics.merge.inserted_count, 0);
    assert_eq!(history(&pool).await.len(), before.len());

    drop(pipeline);
    pool.close().await;
    drop_pg_database(&config).await;
}

#[tokio::test(flavor = "multi_thread")]
#[ignore = "requires a running Postgres instance"]
async fn snapshot_table_mirrors_the_latest_batch() {
    let (config, pool, pipeline) = setup().await;

    pipeline.run_at(run_ts(1)).await.unwrap();
    pool.execute("delete from fact_table where entity_id = 2")
        .await
        .unwrap();
    let report = pipeline.run_at(run_ts(2)).await.unwrap();
    assert_eq!(report.metrics.snapshot_rows, Some(1));

    let count = sqlx::query_scalar::<_, i64>(&format!(
        "select count(*) from {}",
        test_table_name(SNAPSHOT_TABLE).as_quoted_identifier()
    ))
    .fetch_one(&pool)
    .await
    .unwrap();
    assert_eq!(count, 1);

    // History keeps the entity that left the batch open.
    let rows = history(&pool).await;
    assert_eq!(rows.iter().filter(|row| row.is_current).count(), 2);

    drop(pipeline);
    pool.close().await;
    drop_pg_database(&config).await;
}

#[tokio::test(flavor = "multi_thread")]
#[ignore = "requires a running Postgres instance"]
async fn validation_failure_is_audited_without_touching_the_destination() {
    let (config, pool, pipeline) = setup().await;

    pool.execute("update fact_table set quantity = -1 where entity_id = 2")
        .await
        .unwrap();

    let err = pipeline.run_at(run_ts(1)).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NegativeMeasure);
    assert!(!table_exists(&pool, &test_table_name(HISTORY_TABLE)).await);

    let run = fetch_run(&pool, &test_table_name(RUN_LOG_TABLE), 1)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(run.status, "FAILED");
    assert_eq!(run.fail_stage.as_deref(), Some("validate"));
    assert!(run.error_message.is_some());

    drop(pipeline);
    pool.close().await;
    drop_pg_database(&config).await;
}

#[tokio::test(flavor = "multi_thread")]
#[ignore = "requires a running Postgres instance"]
async fn second_current_version_is_rejected_and_rolled_back() {
    let (config, pool, pipeline) = setup().await;

    // A new entity sold on two dates yields two candidate current versions.
    pool.execute(
        r#"
        insert into entity_names values (3, 'Book 3');
        insert into fact_table values
            (3, 1, 1, 1, 100, '2024-01-01', 1, 10.00),
            (3, 1, 1, 1, 100, '2024-01-02', 1, 11.00);
        "#,
    )
    .await
    .unwrap();

    let err = pipeline.run_at(run_ts(1)).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::DestinationConstraintViolation);

    // The table itself is created inside the rolled back transaction.
    assert!(!table_exists(&pool, &test_table_name(HISTORY_TABLE)).await);

    let run = fetch_run(&pool, &test_table_name(RUN_LOG_TABLE), 1)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(run.status, "FAILED");
    assert_eq!(run.fail_stage.as_deref(), Some("merge"));

    drop(pipeline);
    pool.close().await;
    drop_pg_database(&config).await;
}
