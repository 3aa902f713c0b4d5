use chrono::{DateTime, Utc};
use scd2_config::shared::{IntoConnectOptions, PgConnectionConfig, SCD2_DESTINATION_OPTIONS};
use scd2_postgres::history::{self, NewHistoryRow};
use scd2_postgres::schema::TableName;
use scd2_postgres::snapshot::{self, SnapshotRow};
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Postgres, Transaction};
use tracing::{debug, info};

use crate::destination::{HistoryDestination, HistoryTransaction};
use crate::error::{ErrorKind, EtlResult};
use crate::types::{AnalyticalRow, CurrentVersion, Fingerprint, VersionedRecord};
use crate::{bail, etl_error};

/// Postgres-backed history store.
///
/// Each transaction is a sqlx transaction on one pooled connection. A transaction dropped without
/// commit is rolled back when its connection returns to the pool.
#[derive(Debug, Clone)]
pub struct PostgresDestination {
    pool: PgPool,
    history_table: TableName,
    snapshot_table: Option<TableName>,
}

impl PostgresDestination {
    pub fn new(pool: PgPool, history_table: TableName, snapshot_table: Option<TableName>) -> Self {
        Self {
            pool,
            history_table,
            snapshot_table,
        }
    }

    /// Connects a single-connection pool to the database described by `config`.
    pub async fn connect(
        config: &PgConnectionConfig,
        history_table: TableName,
        snapshot_table: Option<TableName>,
    ) -> EtlResult<Self> {
        let options = config.with_db(Some(&SCD2_DESTINATION_OPTIONS));
        let pool = PgPoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await
            .map_err(|err| {
                etl_error!(
                    ErrorKind::DestinationConnectionFailed,
                    "Failed to connect to the destination database",
                    format!("{}:{}/{}", config.host, config.port, config.name),
                    source: err
                )
            })?;

        info!(
            host = %config.host,
            database = %config.name,
            history_table = %history_table,
            "connected to postgres destination"
        );

        Ok(Self::new(pool, history_table, snapshot_table))
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub fn history_table(&self) -> &TableName {
        &self.history_table
    }
}

impl HistoryDestination for PostgresDestination {
    type Transaction = PostgresTransaction;

    fn name() -> &'static str {
        "postgres"
    }

    async fn begin(&self) -> EtlResult<PostgresTransaction> {
        let transaction = self.pool.begin().await?;

        Ok(PostgresTransaction {
            transaction,
            history_table: self.history_table.clone(),
            snapshot_table: self.snapshot_table.clone(),
        })
    }
}

/// A transaction of a [`PostgresDestination`].
#[derive(Debug)]
pub struct PostgresTransaction {
    transaction: Transaction<'static, Postgres>,
    history_table: TableName,
    snapshot_table: Option<TableName>,
}

impl HistoryTransaction for PostgresTransaction {
    async fn ensure_history_table(&mut self) -> EtlResult<()> {
        history::create_history_table_if_missing(&mut self.transaction, &self.history_table)
            .await?;

        Ok(())
    }

    async fn current_versions(&mut self) -> EtlResult<Vec<CurrentVersion>> {
        let rows =
            history::fetch_current_versions(&mut self.transaction, &self.history_table).await?;

        rows.into_iter()
            .map(|row| -> EtlResult<CurrentVersion> {
                let fingerprint: Fingerprint = row.record_hash.trim().parse()?;
                Ok(CurrentVersion {
                    entity_id: row.entity_id,
                    fingerprint,
                })
            })
            .collect()
    }

    async fn close_current_versions(
        &mut self,
        entity_ids: &[i64],
        effective_to: DateTime<Utc>,
    ) -> EtlResult<u64> {
        let closed = history::close_current_versions(
            &mut self.transaction,
            &self.history_table,
            entity_ids,
            effective_to,
        )
        .await?;

        debug!(closed, table = %self.history_table, "closed current versions");

        Ok(closed)
    }

    async fn append_versions(&mut self, records: &[VersionedRecord]) -> EtlResult<u64> {
        let hashes: Vec<String> = records
            .iter()
            .map(|record| record.fingerprint.to_string())
            .collect();
        let rows: Vec<NewHistoryRow<'_>> = records
            .iter()
            .zip(&hashes)
            .map(|(record, hash)| NewHistoryRow {
                entity_id: record.entity_id,
                name: record.name.as_deref(),
                author: record.author.as_deref(),
                category: record.category.as_deref(),
                language: record.language.as_deref(),
                unit_price: &record.unit_price,
                record_hash: hash,
                effective_from: record.effective_from,
                effective_to: record.effective_to,
                is_current: record.is_current,
            })
            .collect();

        let inserted =
            history::insert_versions(&mut self.transaction, &self.history_table, &rows).await?;

        Ok(inserted)
    }

    async fn replace_snapshot(&mut self, rows: &[AnalyticalRow]) -> EtlResult<u64> {
        let Some(table) = &self.snapshot_table else {
            bail!(
                ErrorKind::ConfigError,
                "No snapshot table is configured for the destination"
            );
        };

        let snapshot_rows: Vec<SnapshotRow<'_>> = rows
            .iter()
            .map(|row| SnapshotRow {
                entity_id: row.entity_id,
                name: row.name.as_deref(),
                author: row.author.as_deref(),
                category: row.category.as_deref(),
                language: row.language.as_deref(),
                event_date: row.event_date,
                year: row.year,
                month: row.month as i32,
                quantity: &row.quantity,
                amount: &row.amount,
                unit_price: &row.unit_price,
            })
            .collect();

        let loaded = snapshot::replace_snapshot(&mut self.transaction, table, &snapshot_rows).await?;
        info!(rows = loaded, table = %table, "replaced analytics snapshot");

        Ok(loaded)
    }

    async fn commit(self) -> EtlResult<()> {
        self.transaction.commit().await?;

        Ok(())
    }

    async fn rollback(self) -> EtlResult<()> {
        self.transaction.rollback().await?;

        Ok(())
    }
}
