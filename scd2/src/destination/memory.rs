use chrono::{DateTime, Utc};
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{debug, info};

use crate::bail;
use crate::destination::{HistoryDestination, HistoryTransaction};
use crate::error::{ErrorKind, EtlResult};
use crate::types::{AnalyticalRow, CurrentVersion, VersionedRecord};

#[derive(Debug, Clone, Default)]
struct Inner {
    history_table_exists: bool,
    history: Vec<VersionedRecord>,
    snapshot: Option<Vec<AnalyticalRow>>,
}

/// In-memory history store for tests and local runs.
///
/// A transaction holds the store's lock for its whole lifetime and works on a private copy of
/// the state. Committing swaps the copy in; dropping or rolling back discards it. The store
/// enforces that each entity has at most one current version.
#[derive(Debug, Clone, Default)]
pub struct MemoryDestination {
    inner: Arc<Mutex<Inner>>,
}

impl MemoryDestination {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns every stored version in insertion order.
    pub async fn history(&self) -> Vec<VersionedRecord> {
        let inner = self.inner.lock().await;
        inner.history.clone()
    }

    /// Returns the current version of every entity.
    pub async fn current_history(&self) -> Vec<VersionedRecord> {
        let inner = self.inner.lock().await;
        inner
            .history
            .iter()
            .filter(|record| record.is_current)
            .cloned()
            .collect()
    }

    pub async fn history_table_exists(&self) -> bool {
        let inner = self.inner.lock().await;
        inner.history_table_exists
    }

    /// Returns the rows of the last committed snapshot load, if any.
    pub async fn snapshot(&self) -> Option<Vec<AnalyticalRow>> {
        let inner = self.inner.lock().await;
        inner.snapshot.clone()
    }
}

impl HistoryDestination for MemoryDestination {
    type Transaction = MemoryTransaction;

    fn name() -> &'static str {
        "memory"
    }

    async fn begin(&self) -> EtlResult<MemoryTransaction> {
        let guard = self.inner.clone().lock_owned().await;
        let staged = guard.clone();

        Ok(MemoryTransaction { guard, staged })
    }
}

/// A transaction of a [`MemoryDestination`].
#[derive(Debug)]
pub struct MemoryTransaction {
    guard: OwnedMutexGuard<Inner>,
    staged: Inner,
}

impl MemoryTransaction {
    fn require_history_table(&self) -> EtlResult<()> {
        if !self.staged.history_table_exists {
            bail!(
                ErrorKind::DestinationQueryFailed,
                "History table does not exist"
            );
        }

        Ok(())
    }
}

impl HistoryTransaction for MemoryTransaction {
    async fn ensure_history_table(&mut self) -> EtlResult<()> {
        self.staged.history_table_exists = true;

        Ok(())
    }

    async fn current_versions(&mut self) -> EtlResult<Vec<CurrentVersion>> {
        self.require_history_table()?;

        Ok(self
            .staged
            .history
            .iter()
            .filter(|record| record.is_current)
            .map(|record| CurrentVersion {
                entity_id: record.entity_id,
                fingerprint: record.fingerprint,
            })
            .collect())
    }

    async fn close_current_versions(
        &mut self,
        entity_ids: &[i64],
        effective_to: DateTime<Utc>,
    ) -> EtlResult<u64> {
        self.require_history_table()?;

        let entity_ids: HashSet<i64> = entity_ids.iter().copied().collect();
        let mut closed = 0;
        for record in &mut self.staged.history {
            if record.is_current && entity_ids.contains(&record.entity_id) {
                record.close(effective_to);
                closed += 1;
            }
        }

        debug!(closed, "closing current versions in memory");

        Ok(closed)
    }

    async fn append_versions(&mut self, records: &[VersionedRecord]) -> EtlResult<u64> {
        self.require_history_table()?;

        let mut current: HashSet<i64> = self
            .staged
            .history
            .iter()
            .filter(|record| record.is_current)
            .map(|record| record.entity_id)
            .collect();

        for record in records.iter().filter(|record| record.is_current) {
            if !current.insert(record.entity_id) {
                bail!(
                    ErrorKind::DestinationConstraintViolation,
                    "Destination constraint violated",
                    format!(
                        "Entity {} would have more than one current version",
                        record.entity_id
                    )
                );
            }
        }

        self.staged.history.extend_from_slice(records);

        Ok(records.len() as u64)
    }

    async fn replace_snapshot(&mut self, rows: &[AnalyticalRow]) -> EtlResult<u64> {
        self.staged.snapshot = Some(rows.to_vec());

        Ok(rows.len() as u64)
    }

    async fn commit(mut self) -> EtlResult<()> {
        info!(
            versions = self.staged.history.len(),
            "committing memory transaction"
        );
        *self.guard = self.staged;

        Ok(())
    }

    async fn rollback(self) -> EtlResult<()> {
        debug!("rolling back memory transaction");

        Ok(())
    }
}
