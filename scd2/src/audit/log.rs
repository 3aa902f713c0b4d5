use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};
use tracing::{error, info};

use crate::audit::AuditSink;
use crate::error::EtlResult;
use crate::types::{RunId, RunOutcome, RunStatus};

/// Sink that only emits tracing events. Run ids count up from 1 per process.
#[derive(Debug, Clone, Default)]
pub struct LogAuditSink {
    next_run_id: Arc<AtomicI64>,
}

impl LogAuditSink {
    pub fn new() -> Self {
        Self::default()
    }
}

impl AuditSink for LogAuditSink {
    fn name() -> &'static str {
        "log"
    }

    async fn start_run(&self, pipeline_name: &str) -> EtlResult<RunId> {
        let run_id = RunId(self.next_run_id.fetch_add(1, Ordering::Relaxed) + 1);
        info!(
            %run_id,
            pipeline = pipeline_name,
            status = %RunStatus::Running,
            "run started"
        );

        Ok(run_id)
    }

    async fn end_run(&self, run_id: RunId, outcome: &RunOutcome) -> EtlResult<()> {
        match outcome {
            RunOutcome::Success(metrics) => info!(
                %run_id,
                status = %RunStatus::Success,
                extract_rows = metrics.extract_rows,
                transform_rows = metrics.transform_rows,
                scd_new = metrics.merge.new_count,
                scd_changed = metrics.merge.changed_count,
                scd_inserted = metrics.merge.inserted_count,
                "run finished"
            ),
            RunOutcome::Failed { stage, message } => error!(
                %run_id,
                status = %RunStatus::Failed,
                fail_stage = %stage,
                error = %message,
                "run failed"
            ),
        }

        Ok(())
    }
}
