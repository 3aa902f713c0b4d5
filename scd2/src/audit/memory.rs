use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::audit::AuditSink;
use crate::bail;
use crate::error::{ErrorKind, EtlResult};
use crate::types::{RunId, RunOutcome, RunStatus};

/// One run as recorded by a [`MemoryAuditSink`].
#[derive(Debug, Clone, PartialEq)]
pub struct AuditRecord {
    pub run_id: RunId,
    pub pipeline_name: String,
    pub status: RunStatus,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub outcome: Option<RunOutcome>,
}

/// Sink keeping run records in memory, for tests.
#[derive(Debug, Clone, Default)]
pub struct MemoryAuditSink {
    records: Arc<Mutex<Vec<AuditRecord>>>,
}

impl MemoryAuditSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns all recorded runs in start order.
    pub async fn records(&self) -> Vec<AuditRecord> {
        let records = self.records.lock().await;
        records.clone()
    }

    /// Returns the most recently started run.
    pub async fn last(&self) -> Option<AuditRecord> {
        let records = self.records.lock().await;
        records.last().cloned()
    }
}

impl AuditSink for MemoryAuditSink {
    fn name() -> &'static str {
        "memory"
    }

    async fn start_run(&self, pipeline_name: &str) -> EtlResult<RunId> {
        let mut records = self.records.lock().await;
        let run_id = RunId(records.len() as i64 + 1);
        records.push(AuditRecord {
            run_id,
            pipeline_name: pipeline_name.to_string(),
            status: RunStatus::Running,
            started_at: Utc::now(),
            ended_at: None,
            outcome: None,
        });

        Ok(run_id)
    }

    async fn end_run(&self, run_id: RunId, outcome: &RunOutcome) -> EtlResult<()> {
        let mut records = self.records.lock().await;
        let Some(record) = records.iter_mut().find(|record| record.run_id == run_id) else {
            bail!(
                ErrorKind::AuditSinkFailed,
                "Unknown run id",
                format!("Run {run_id} was never started")
            );
        };

        record.status = outcome.status();
        record.ended_at = Some(Utc::now());
        record.outcome = Some(outcome.clone());

        Ok(())
    }
}
