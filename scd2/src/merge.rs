//! The SCD2 merge writer.
//!
//! Applies a [`crate::detect::Classification`] in two phases inside the caller's transaction:
//! the current versions of changed entities are closed, then new and changed rows are appended
//! as the new current versions. Both phases share `run_ts`, so a closed version ends exactly where
//! its successor starts.

use chrono::{DateTime, Utc};
use std::collections::BTreeSet;
use tracing::{debug, info};

use crate::destination::HistoryTransaction;
use crate::error::EtlResult;
#[cfg(feature = "failpoints")]
use crate::failpoints::{MERGE_AFTER_CLOSE, etl_fail_point};
use crate::types::{FingerprintedRow, MergeResult, VersionedRecord};

/// Writes `new` and `changed` into the history held by `transaction`.
///
/// Empty inputs skip their phase. The caller owns the transaction and decides whether to commit.
pub async fn apply<T>(
    transaction: &mut T,
    new: &[FingerprintedRow],
    changed: &[FingerprintedRow],
    run_ts: DateTime<Utc>,
) -> EtlResult<MergeResult>
where
    T: HistoryTransaction,
{
    transaction.ensure_history_table().await?;

    if !changed.is_empty() {
        let entity_ids: Vec<i64> = changed
            .iter()
            .map(FingerprintedRow::entity_id)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();

        let closed = transaction
            .close_current_versions(&entity_ids, run_ts)
            .await?;
        debug!(entities = entity_ids.len(), closed, "closed superseded versions");
    }

    #[cfg(feature = "failpoints")]
    etl_fail_point(MERGE_AFTER_CLOSE)?;

    let records: Vec<VersionedRecord> = new
        .iter()
        .chain(changed)
        .map(|row| VersionedRecord::current(row, run_ts))
        .collect();

    if !records.is_empty() {
        let appended = transaction.append_versions(&records).await?;
        debug!(appended, "appended current versions");
    }

    let result = MergeResult {
        new_count: new.len() as u64,
        changed_count: changed.len() as u64,
        inserted_count: records.len() as u64,
    };

    info!(
        new = result.new_count,
        changed = result.changed_count,
        inserted = result.inserted_count,
        %run_ts,
        "applied scd2 merge"
    );

    Ok(result)
}
