use chrono::Utc;
use scd2_config::shared::{IntoConnectOptions, PgConnectionConfig, SCD2_AUDIT_OPTIONS};
use scd2_postgres::audit::{self, RunLogEnd};
use scd2_postgres::schema::TableName;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use tracing::{debug, warn};

use crate::audit::AuditSink;
use crate::error::{ErrorKind, EtlError, EtlResult};
use crate::etl_error;
use crate::types::{RunId, RunOutcome, RunStatus};

/// Sink writing runs to a Postgres run-log table.
///
/// Writes use their own pool, outside the destination transaction, so failed runs are recorded
/// even though their data writes roll back.
#[derive(Debug, Clone)]
pub struct PostgresAuditSink {
    pool: PgPool,
    table: TableName,
}

impl PostgresAuditSink {
    /// Wraps `pool` and creates the run-log table if it is missing.
    pub async fn new(pool: PgPool, table: TableName) -> EtlResult<Self> {
        audit::create_run_log_table_if_missing(&pool, &table)
            .await
            .map_err(audit_error)?;

        Ok(Self { pool, table })
    }

    pub async fn connect(config: &PgConnectionConfig, table: TableName) -> EtlResult<Self> {
        let options = config.with_db(Some(&SCD2_AUDIT_OPTIONS));
        let pool = PgPoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await
            .map_err(audit_error)?;

        Self::new(pool, table).await
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub fn table(&self) -> &TableName {
        &self.table
    }
}

impl AuditSink for PostgresAuditSink {
    fn name() -> &'static str {
        "postgres"
    }

    async fn start_run(&self, pipeline_name: &str) -> EtlResult<RunId> {
        let run_id = audit::insert_run_start(
            &self.pool,
            &self.table,
            pipeline_name,
            RunStatus::Running.as_str(),
            Utc::now(),
        )
        .await
        .map_err(audit_error)?;

        debug!(run_id, table = %self.table, "recorded run start");

        Ok(RunId(run_id))
    }

    async fn end_run(&self, run_id: RunId, outcome: &RunOutcome) -> EtlResult<()> {
        let status = outcome.status();
        let end = match outcome {
            RunOutcome::Success(metrics) => RunLogEnd {
                status: status.as_str(),
                ended_at: Utc::now(),
                extract_rows: Some(metrics.extract_rows as i64),
                transform_rows: Some(metrics.transform_rows as i64),
                scd_new: Some(metrics.merge.new_count as i64),
                scd_changed: Some(metrics.merge.changed_count as i64),
                scd_inserted: Some(metrics.merge.inserted_count as i64),
                fail_stage: None,
                error_message: None,
            },
            RunOutcome::Failed { stage, message } => RunLogEnd {
                status: status.as_str(),
                ended_at: Utc::now(),
                extract_rows: None,
                transform_rows: None,
                scd_new: None,
                scd_changed: None,
                scd_inserted: None,
                fail_stage: Some(stage.as_str()),
                error_message: Some(message.as_str()),
            },
        };

        let updated = audit::update_run_end(&self.pool, &self.table, run_id.0, &end)
            .await
            .map_err(audit_error)?;
        if updated == 0 {
            warn!(%run_id, table = %self.table, "run end did not match any run");
        }

        Ok(())
    }
}

fn audit_error(err: sqlx::Error) -> EtlError {
    let detail = err.to_string();
    etl_error!(
        ErrorKind::AuditSinkFailed,
        "Run audit write failed",
        detail = detail,
        source: err
    )
}
