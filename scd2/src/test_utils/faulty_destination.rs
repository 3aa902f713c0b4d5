use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::bail;
use crate::destination::{HistoryDestination, HistoryTransaction};
use crate::error::{ErrorKind, EtlResult};
use crate::types::{AnalyticalRow, CurrentVersion, VersionedRecord};

/// Destination operations a [`FaultyDestination`] can fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultPoint {
    Begin,
    CurrentVersions,
    Close,
    Append,
    Snapshot,
    Commit,
}

/// Wraps a destination and fails the configured operation with
/// [`ErrorKind::DestinationQueryFailed`].
///
/// The fault is read when a transaction begins, so changing it does not affect open transactions.
#[derive(Debug, Clone)]
pub struct FaultyDestination<D> {
    inner: D,
    fault: Arc<RwLock<Option<FaultPoint>>>,
}

impl<D> FaultyDestination<D> {
    pub fn new(inner: D) -> Self {
        Self {
            inner,
            fault: Arc::new(RwLock::new(None)),
        }
    }

    pub fn inner(&self) -> &D {
        &self.inner
    }

    pub async fn set_fault(&self, fault: Option<FaultPoint>) {
        *self.fault.write().await = fault;
    }
}

fn check(fault: Option<FaultPoint>, point: FaultPoint) -> EtlResult<()> {
    if fault == Some(point) {
        bail!(
            ErrorKind::DestinationQueryFailed,
            "Injected destination fault",
            format!("{point:?} failed")
        );
    }

    Ok(())
}

impl<D> HistoryDestination for FaultyDestination<D>
where
    D: HistoryDestination + Sync,
{
    type Transaction = FaultyTransaction<D::Transaction>;

    fn name() -> &'static str {
        "faulty"
    }

    async fn begin(&self) -> EtlResult<Self::Transaction> {
        let fault = *self.fault.read().await;
        check(fault, FaultPoint::Begin)?;

        Ok(FaultyTransaction {
            inner: self.inner.begin().await?,
            fault,
        })
    }
}

/// A transaction of a [`FaultyDestination`].
#[derive(Debug)]
pub struct FaultyTransaction<T> {
    inner: T,
    fault: Option<FaultPoint>,
}

impl<T> HistoryTransaction for FaultyTransaction<T>
where
    T: HistoryTransaction + Send,
{
    async fn ensure_history_table(&mut self) -> EtlResult<()> {
        self.inner.ensure_history_table().await
    }

    async fn current_versions(&mut self) -> EtlResult<Vec<CurrentVersion>> {
        check(self.fault, FaultPoint::CurrentVersions)?;
        self.inner.current_versions().await
    }

    async fn close_current_versions(
        &mut self,
        entity_ids: &[i64],
        effective_to: DateTime<Utc>,
    ) -> EtlResult<u64> {
        check(self.fault, FaultPoint::Close)?;
        self.inner
            .close_current_versions(entity_ids, effective_to)
            .await
    }

    async fn append_versions(&mut self, records: &[VersionedRecord]) -> EtlResult<u64> {
        check(self.fault, FaultPoint::Append)?;
        self.inner.append_versions(records).await
    }

    async fn replace_snapshot(&mut self, rows: &[AnalyticalRow]) -> EtlResult<u64> {
        check(self.fault, FaultPoint::Snapshot)?;
        self.inner.replace_snapshot(rows).await
    }

    async fn commit(self) -> EtlResult<()> {
        if let Err(err) = check(self.fault, FaultPoint::Commit) {
            self.inner.rollback().await?;
            return Err(err);
        }

        self.inner.commit().await
    }

    async fn rollback(self) -> EtlResult<()> {
        self.inner.rollback().await
    }
}
