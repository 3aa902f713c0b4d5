use chrono::{DateTime, SubsecRound, Utc};
use scd2_config::shared::PipelineConfig;
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::audit::AuditSink;
use crate::denormalize::Denormalizer;
use crate::destination::{HistoryDestination, HistoryTransaction};
use crate::detect::classify;
use crate::error::{EtlError, EtlResult};
#[cfg(feature = "failpoints")]
use crate::failpoints::{MERGE_BEFORE_SNAPSHOT, RUN_BEFORE_COMMIT, etl_fail_point};
use crate::fingerprint::fingerprint_rows;
use crate::merge;
use crate::source::SourceProvider;
use crate::types::{
    AnalyticalRow, MergeResult, RunId, RunMetrics, RunOutcome, RunStage, SourceTable,
};
use crate::validator::Validator;

/// Result of a successful run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunReport {
    pub run_id: RunId,
    /// Timestamp stamped on every version written by the run.
    pub run_ts: DateTime<Utc>,
    pub metrics: RunMetrics,
}

/// An error tagged with the stage it was raised in.
#[derive(Debug)]
struct StageError {
    stage: RunStage,
    error: EtlError,
}

trait StageResultExt<T> {
    fn in_stage(self, stage: RunStage) -> Result<T, StageError>;
}

impl<T> StageResultExt<T> for EtlResult<T> {
    fn in_stage(self, stage: RunStage) -> Result<T, StageError> {
        self.map_err(|error| StageError { stage, error })
    }
}

/// Runs one batch end to end: extract, validate, transform, merge.
///
/// Every destination write of a run happens in one transaction. The audit sink sees the start of
/// every run and its outcome, including the failing stage.
#[derive(Debug)]
pub struct Pipeline<S, D, A> {
    config: Arc<PipelineConfig>,
    source: S,
    destination: D,
    audit: A,
}

impl<S, D, A> Pipeline<S, D, A>
where
    S: SourceProvider + Send + Sync,
    D: HistoryDestination + Send + Sync,
    A: AuditSink + Send + Sync,
{
    pub fn new(config: PipelineConfig, source: S, destination: D, audit: A) -> Self {
        Self {
            config: Arc::new(config),
            source,
            destination,
            audit,
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn destination(&self) -> &D {
        &self.destination
    }

    /// Runs one batch stamped with the current time.
    pub async fn run(&self) -> EtlResult<RunReport> {
        self.run_at(Utc::now()).await
    }

    /// Runs one batch stamped with `run_ts`, truncated to microseconds.
    pub async fn run_at(&self, run_ts: DateTime<Utc>) -> EtlResult<RunReport> {
        let run_ts = run_ts.trunc_subsecs(6);

        info!(
            pipeline = %self.config.name,
            source = S::name(),
            destination = D::name(),
            audit = A::name(),
            "starting pipeline run"
        );

        let run_id = self.audit.start_run(&self.config.name).await?;

        match self.execute(run_ts).await {
            Ok(metrics) => {
                if let Err(err) = self
                    .audit
                    .end_run(run_id, &RunOutcome::Success(metrics))
                    .await
                {
                    error!(%run_id, error = %err, "failed to record successful run end");
                }

                info!(%run_id, %run_ts, "pipeline run completed");

                Ok(RunReport {
                    run_id,
                    run_ts,
                    metrics,
                })
            }
            Err(StageError { stage, error }) => {
                error!(%run_id, fail_stage = %stage, error = %error, "pipeline run failed");

                let outcome = RunOutcome::Failed {
                    stage,
                    message: error.summary(),
                };
                if let Err(audit_err) = self.audit.end_run(run_id, &outcome).await {
                    return Err(vec![error, audit_err].into());
                }

                Err(error)
            }
        }
    }

    async fn execute(&self, run_ts: DateTime<Utc>) -> Result<RunMetrics, StageError> {
        let bundle = self.source.extract().await.in_stage(RunStage::Extract)?;
        let extract_rows = bundle
            .table(&self.config.schema.fact.table)
            .map_or(0, SourceTable::len) as u64;
        info!(
            fact_rows = extract_rows,
            total_rows = bundle.total_rows(),
            "extracted source bundle"
        );

        Validator::new(&self.config.schema)
            .with_duplicate_sample_size(self.config.duplicate_sample_size)
            .validate(&bundle)
            .in_stage(RunStage::Validate)?;

        let rows = Denormalizer::new(&self.config.schema)
            .denormalize(&bundle)
            .in_stage(RunStage::Transform)?;
        let transform_rows = rows.len() as u64;
        info!(rows = transform_rows, "built analytical snapshot");

        let (merge, snapshot_rows) = self.merge(rows, run_ts).await.in_stage(RunStage::Merge)?;

        Ok(RunMetrics {
            extract_rows,
            transform_rows,
            merge,
            snapshot_rows,
        })
    }

    /// Classifies and writes `rows` inside one destination transaction.
    async fn merge(
        &self,
        rows: Vec<AnalyticalRow>,
        run_ts: DateTime<Utc>,
    ) -> EtlResult<(MergeResult, Option<u64>)> {
        let mut transaction = self.destination.begin().await?;

        match self.write(&mut transaction, rows, run_ts).await {
            Ok(result) => {
                transaction.commit().await?;
                Ok(result)
            }
            Err(err) => {
                if let Err(rollback_err) = transaction.rollback().await {
                    warn!(error = %rollback_err, "failed to roll back destination transaction");
                }
                Err(err)
            }
        }
    }

    async fn write(
        &self,
        transaction: &mut D::Transaction,
        rows: Vec<AnalyticalRow>,
        run_ts: DateTime<Utc>,
    ) -> EtlResult<(MergeResult, Option<u64>)> {
        // Reading current versions needs the table on a first run.
        transaction.ensure_history_table().await?;
        let current_versions = transaction.current_versions().await?;

        let classification = classify(fingerprint_rows(&rows), &current_versions);
        info!(
            new = classification.new.len(),
            changed = classification.changed.len(),
            unchanged = classification.unchanged.len(),
            "classified analytical rows"
        );

        let result = merge::apply(
            transaction,
            &classification.new,
            &classification.changed,
            run_ts,
        )
        .await?;

        #[cfg(feature = "failpoints")]
        etl_fail_point(MERGE_BEFORE_SNAPSHOT)?;

        let snapshot_rows = match &self.config.snapshot_table {
            Some(_) => Some(transaction.replace_snapshot(&rows).await?),
            None => None,
        };

        #[cfg(feature = "failpoints")]
        etl_fail_point(RUN_BEFORE_COMMIT)?;

        Ok((result, snapshot_rows))
    }
}
