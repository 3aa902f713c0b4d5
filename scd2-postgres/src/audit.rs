//! The run-log table recording every pipeline run.

use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};

use crate::schema::TableName;

/// Values written when a run ends.
#[derive(Debug, Clone)]
pub struct RunLogEnd<'a> {
    pub status: &'a str,
    pub ended_at: DateTime<Utc>,
    pub extract_rows: Option<i64>,
    pub transform_rows: Option<i64>,
    pub scd_new: Option<i64>,
    pub scd_changed: Option<i64>,
    pub scd_inserted: Option<i64>,
    pub fail_stage: Option<&'a str>,
    pub error_message: Option<&'a str>,
}

/// A stored run-log entry.
#[derive(Debug, Clone, FromRow)]
pub struct RunLogRow {
    pub run_id: i64,
    pub pipeline_name: String,
    pub status: String,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    /// Whole seconds between start and end.
    pub duration_sec: Option<i64>,
    pub extract_rows: Option<i64>,
    pub transform_rows: Option<i64>,
    pub scd_new: Option<i64>,
    pub scd_changed: Option<i64>,
    pub scd_inserted: Option<i64>,
    pub fail_stage: Option<String>,
    pub error_message: Option<String>,
}

pub async fn create_run_log_table_if_missing(pool: &PgPool, table: &TableName) -> sqlx::Result<()> {
    let quoted = table.as_quoted_identifier();

    sqlx::query(&format!(
        r#"
        create table if not exists {quoted} (
            run_id bigserial primary key,
            pipeline_name text not null,
            status text not null,
            started_at timestamptz not null,
            ended_at timestamptz,
            duration_sec bigint,
            extract_rows bigint,
            transform_rows bigint,
            scd_new bigint,
            scd_changed bigint,
            scd_inserted bigint,
            fail_stage text,
            error_message text
        )
        "#
    ))
    .execute(pool)
    .await?;

    // Run logs created before the duration column existed.
    sqlx::query(&format!(
        "alter table {quoted} add column if not exists duration_sec bigint"
    ))
    .execute(pool)
    .await?;

    Ok(())
}

/// Inserts a run in `status` and returns its generated id.
pub async fn insert_run_start(
    pool: &PgPool,
    table: &TableName,
    pipeline_name: &str,
    status: &str,
    started_at: DateTime<Utc>,
) -> sqlx::Result<i64> {
    sqlx::query_scalar(&format!(
        r#"
        insert into {} (pipeline_name, status, started_at)
        values ($1, $2, $3)
        returning run_id
        "#,
        table.as_quoted_identifier()
    ))
    .bind(pipeline_name)
    .bind(status)
    .bind(started_at)
    .fetch_one(pool)
    .await
}

/// Records the end of a run. Returns the number of updated rows, zero for an unknown run.
pub async fn update_run_end(
    pool: &PgPool,
    table: &TableName,
    run_id: i64,
    end: &RunLogEnd<'_>,
) -> sqlx::Result<u64> {
    let result = sqlx::query(&format!(
        r#"
        update {}
        set status = $2, ended_at = $3,
            duration_sec = floor(extract(epoch from $3 - started_at))::bigint,
            extract_rows = $4, transform_rows = $5,
            scd_new = $6, scd_changed = $7, scd_inserted = $8,
            fail_stage = $9, error_message = $10
        where run_id = $1
        "#,
        table.as_quoted_identifier()
    ))
    .bind(run_id)
    .bind(end.status)
    .bind(end.ended_at)
    .bind(end.extract_rows)
    .bind(end.transform_rows)
    .bind(end.scd_new)
    .bind(end.scd_changed)
    .bind(end.scd_inserted)
    .bind(end.fail_stage)
    .bind(end.error_message)
    .execute(pool)
    .await?;

    Ok(result.rows_affected())
}

pub async fn fetch_run(pool: &PgPool, table: &TableName, run_id: i64) -> sqlx::Result<Option<RunLogRow>> {
    sqlx::query_as::<_, RunLogRow>(&format!(
        r#"
        select run_id, pipeline_name, status, started_at, ended_at, duration_sec, extract_rows,
               transform_rows, scd_new, scd_changed, scd_inserted, fail_stage, error_message
        from {}
        where run_id = $1
        "#,
        table.as_quoted_identifier()
    ))
    .bind(run_id)
    .fetch_optional(pool)
    .await
}
