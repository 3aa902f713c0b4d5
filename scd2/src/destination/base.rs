use chrono::{DateTime, Utc};
use std::future::Future;

use crate::error::EtlResult;
use crate::types::{AnalyticalRow, CurrentVersion, VersionedRecord};

/// A store holding the SCD2 history table and, optionally, the analytics snapshot table.
pub trait HistoryDestination {
    type Transaction: HistoryTransaction + Send;

    /// Returns the name of the destination.
    fn name() -> &'static str;

    /// Opens a transaction. Nothing written through it is visible until
    /// [`HistoryTransaction::commit`] succeeds.
    fn begin(&self) -> impl Future<Output = EtlResult<Self::Transaction>> + Send;
}

/// One atomic unit of work against a [`HistoryDestination`].
///
/// Dropping a transaction without committing discards its writes.
pub trait HistoryTransaction {
    /// Creates the history table if it does not exist yet. Idempotent.
    fn ensure_history_table(&mut self) -> impl Future<Output = EtlResult<()>> + Send;

    /// Returns `(entity_id, fingerprint)` of every version with `is_current = true`.
    fn current_versions(&mut self) -> impl Future<Output = EtlResult<Vec<CurrentVersion>>> + Send;

    /// Closes the current version of each entity in `entity_ids` at `effective_to`.
    ///
    /// Issues a single statement for the whole id set and returns the number of closed rows.
    fn close_current_versions(
        &mut self,
        entity_ids: &[i64],
        effective_to: DateTime<Utc>,
    ) -> impl Future<Output = EtlResult<u64>> + Send;

    /// Appends `records` in one bulk write and returns the number of appended rows.
    ///
    /// Fails with [`crate::error::ErrorKind::DestinationConstraintViolation`] when an appended
    /// current version would give an entity a second current row.
    fn append_versions(
        &mut self,
        records: &[VersionedRecord],
    ) -> impl Future<Output = EtlResult<u64>> + Send;

    /// Replaces the contents of the analytics snapshot table with `rows`.
    fn replace_snapshot(
        &mut self,
        rows: &[AnalyticalRow],
    ) -> impl Future<Output = EtlResult<u64>> + Send;

    /// Makes every write of this transaction visible.
    fn commit(self) -> impl Future<Output = EtlResult<()>> + Send;

    /// Discards every write of this transaction.
    fn rollback(self) -> impl Future<Output = EtlResult<()>> + Send;
}
