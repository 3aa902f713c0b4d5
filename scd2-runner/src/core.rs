use std::convert::Infallible;

use scd2::audit::AuditSink;
use scd2::audit::log::LogAuditSink;
use scd2::audit::postgres::PostgresAuditSink;
use scd2::destination::HistoryDestination;
use scd2::destination::memory::MemoryDestination;
use scd2::destination::postgres::PostgresDestination;
use scd2::pipeline::{Pipeline, RunReport};
use scd2::source::SourceProvider;
use scd2::source::json::JsonFileSource;
use scd2::source::postgres::PostgresSource;
use scd2_config::shared::{
    AuditConfig, DestinationConfig, PgConnectionConfig, PipelineConfig, RunnerConfig, SourceConfig,
};
use scd2_postgres::schema::TableName;
use tracing::{debug, info};

use crate::error::RunnerResult;

/// Runs one batch with the source, destination and audit sink named in `config`.
///
/// Every combination is dispatched statically, one generic layer per collaborator.
pub async fn run_with_config(config: RunnerConfig) -> RunnerResult<RunReport> {
    info!(pipeline = %config.pipeline.name, "starting scd2 run");

    log_config(&config);

    let RunnerConfig {
        pipeline,
        source,
        destination,
        audit,
        ..
    } = config;

    match source {
        SourceConfig::Postgres {
            connection,
            schema_name,
        } => {
            let tables = pipeline
                .schema
                .required_tables()
                .iter()
                .map(|table| table.to_string())
                .collect();
            let source = PostgresSource::connect(&connection, schema_name, tables).await?;

            with_destination(pipeline, source, destination, audit).await
        }
        SourceConfig::JsonFile { path } => {
            let source = JsonFileSource::new(path);

            with_destination(pipeline, source, destination, audit).await
        }
    }
}

async fn with_destination<S>(
    pipeline: PipelineConfig,
    source: S,
    destination: DestinationConfig,
    audit: AuditConfig,
) -> RunnerResult<RunReport>
where
    S: SourceProvider + Send + Sync,
{
    match destination {
        DestinationConfig::Memory => {
            let destination = MemoryDestination::new();
            let report = with_audit(pipeline, source, destination.clone(), audit).await?;

            // Nothing outlives the process, so report what the run would have written.
            info!(
                versions = destination.history().await.len(),
                current = destination.current_history().await.len(),
                "memory destination contents"
            );

            Ok(report)
        }
        DestinationConfig::Postgres { connection } => {
            let history_table = table_name(&pipeline.history_table);
            let snapshot_table = pipeline.snapshot_table.as_deref().map(table_name);
            let destination =
                PostgresDestination::connect(&connection, history_table, snapshot_table).await?;

            with_audit(pipeline, source, destination, audit).await
        }
    }
}

async fn with_audit<S, D>(
    pipeline: PipelineConfig,
    source: S,
    destination: D,
    audit: AuditConfig,
) -> RunnerResult<RunReport>
where
    S: SourceProvider + Send + Sync,
    D: HistoryDestination + Send + Sync,
{
    match audit {
        AuditConfig::Log => run_pipeline(pipeline, source, destination, LogAuditSink::new()).await,
        AuditConfig::Postgres { connection, table } => {
            let audit = PostgresAuditSink::connect(&connection, table_name(&table)).await?;

            run_pipeline(pipeline, source, destination, audit).await
        }
    }
}

#[tracing::instrument(skip_all, fields(pipeline = %config.name))]
async fn run_pipeline<S, D, A>(
    config: PipelineConfig,
    source: S,
    destination: D,
    audit: A,
) -> RunnerResult<RunReport>
where
    S: SourceProvider + Send + Sync,
    D: HistoryDestination + Send + Sync,
    A: AuditSink + Send + Sync,
{
    debug!(
        source = S::name(),
        destination = D::name(),
        audit = A::name(),
        "assembled pipeline"
    );

    let pipeline = Pipeline::new(config, source, destination, audit);
    let report = pipeline.run().await?;

    Ok(report)
}

/// Parses `table` or `schema.table`, defaulting to the `public` schema.
fn table_name(name: &str) -> TableName {
    name.parse::<TableName>()
        .unwrap_or_else(|never: Infallible| match never {})
}

fn log_config(config: &RunnerConfig) {
    log_pipeline_config(&config.pipeline);

    match &config.source {
        SourceConfig::Postgres {
            connection,
            schema_name,
        } => {
            debug!(schema_name, "using postgres source config");
            log_pg_connection_config("source", connection);
        }
        SourceConfig::JsonFile { path } => {
            debug!(path = %path.display(), "using json file source config");
        }
    }

    match &config.destination {
        DestinationConfig::Memory => debug!("using memory destination config"),
        DestinationConfig::Postgres { connection } => {
            log_pg_connection_config("destination", connection)
        }
    }

    match &config.audit {
        AuditConfig::Log => debug!("using log audit config"),
        AuditConfig::Postgres { connection, table } => {
            debug!(table, "using postgres audit config");
            log_pg_connection_config("audit", connection);
        }
    }
}

fn log_pipeline_config(config: &PipelineConfig) {
    debug!(
        name = config.name,
        history_table = config.history_table,
        snapshot_table = config.snapshot_table.as_deref(),
        duplicate_sample_size = config.duplicate_sample_size,
        fact_table = config.schema.fact.table,
        "pipeline config"
    );
}

fn log_pg_connection_config(role: &str, config: &PgConnectionConfig) {
    debug!(
        role,
        host = config.host,
        port = config.port,
        dbname = config.name,
        username = config.username,
        tls_enabled = config.tls.enabled,
        "postgres connection config",
    );
}
