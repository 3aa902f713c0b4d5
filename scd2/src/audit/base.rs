use std::future::Future;

use crate::error::EtlResult;
use crate::types::{RunId, RunOutcome};

/// Receives run lifecycle events.
///
/// A run is recorded as `RUNNING` by [`AuditSink::start_run`] and moved to `SUCCESS` or `FAILED`
/// by [`AuditSink::end_run`].
pub trait AuditSink {
    /// Returns the name of the sink.
    fn name() -> &'static str;

    /// Records the start of a run of `pipeline_name` and returns its id.
    fn start_run(&self, pipeline_name: &str) -> impl Future<Output = EtlResult<RunId>> + Send;

    /// Records how the run `run_id` ended.
    fn end_run(
        &self,
        run_id: RunId,
        outcome: &RunOutcome,
    ) -> impl Future<Output = EtlResult<()>> + Send;
}
