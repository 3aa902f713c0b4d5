//! Runs one SCD2 batch as configured in `./configuration`.
//!
//! Exits with a non-zero status and a short report when the run fails.

use std::process::ExitCode;

use scd2::pipeline::RunReport;
use scd2_config::shared::RunnerConfig;
use scd2_telemetry::init_tracing;
use tracing::{error, info};

use crate::config::load_runner_config;
use crate::core::run_with_config;
use crate::error::{RunnerError, RunnerResult};

mod config;
mod core;
mod error;

fn main() -> ExitCode {
    match try_main() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprint!("{}", err.render_report());
            ExitCode::FAILURE
        }
    }
}

fn try_main() -> RunnerResult<()> {
    let runner_config = load_runner_config()?;

    let _log_flusher = init_tracing(env!("CARGO_BIN_NAME"), &runner_config.telemetry)
        .map_err(RunnerError::config)?;

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?
        .block_on(async_main(runner_config))
}

async fn async_main(runner_config: RunnerConfig) -> RunnerResult<()> {
    match run_with_config(runner_config).await {
        Ok(report) => {
            log_report(&report);
            Ok(())
        }
        Err(err) => {
            error!(error = %err, "scd2 run failed");
            Err(err)
        }
    }
}

fn log_report(report: &RunReport) {
    info!(
        run_id = report.run_id.0,
        run_ts = %report.run_ts,
        extract_rows = report.metrics.extract_rows,
        transform_rows = report.metrics.transform_rows,
        new = report.metrics.merge.new_count,
        changed = report.metrics.merge.changed_count,
        inserted = report.metrics.merge.inserted_count,
        snapshot_rows = report.metrics.snapshot_rows,
        "scd2 run completed"
    );
}
