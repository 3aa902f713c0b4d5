use bigdecimal::BigDecimal;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use scd2_config::shared::{IntoConnectOptions, PgConnectionConfig, SCD2_SOURCE_OPTIONS};
use scd2_postgres::schema::TableName;
use scd2_postgres::source::{fetch_table_columns, fetch_table_rows};
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{Column, PgPool, Row, TypeInfo};
use tracing::{info, warn};

use crate::error::{ErrorKind, EtlError, EtlResult};
use crate::source::SourceProvider;
use crate::types::{Cell, SourceBundle, SourceTable};
use crate::{bail, etl_error};

/// Source reading the input tables from a Postgres schema.
///
/// All tables are read inside one transaction so they come from a single snapshot. Tables that do
/// not exist are left out of the bundle.
#[derive(Debug, Clone)]
pub struct PostgresSource {
    pool: PgPool,
    schema_name: String,
    tables: Vec<String>,
}

impl PostgresSource {
    pub fn new(pool: PgPool, schema_name: impl Into<String>, tables: Vec<String>) -> Self {
        Self {
            pool,
            schema_name: schema_name.into(),
            tables,
        }
    }

    /// Connects to the database described by `config` and reads `tables` from `schema_name`.
    pub async fn connect(
        config: &PgConnectionConfig,
        schema_name: impl Into<String>,
        tables: Vec<String>,
    ) -> EtlResult<Self> {
        let options = config.with_db(Some(&SCD2_SOURCE_OPTIONS));
        let pool = PgPoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await
            .map_err(|err| {
                etl_error!(
                    ErrorKind::SourceConnectionFailed,
                    "Failed to connect to the source database",
                    format!("{}:{}/{}", config.host, config.port, config.name),
                    source: err
                )
            })?;

        Ok(Self::new(pool, schema_name, tables))
    }
}

impl SourceProvider for PostgresSource {
    fn name() -> &'static str {
        "postgres"
    }

    async fn extract(&self) -> EtlResult<SourceBundle> {
        let mut transaction = self.pool.begin().await.map_err(source_query_error)?;

        let mut bundle = SourceBundle::new();
        for name in &self.tables {
            let table_name = TableName::new(self.schema_name.clone(), name.clone());

            let columns = fetch_table_columns(&mut transaction, &table_name)
                .await
                .map_err(source_query_error)?;
            if columns.is_empty() {
                warn!(table = %table_name, "source table not found");
                continue;
            }

            let rows = fetch_table_rows(&mut transaction, &table_name)
                .await
                .map_err(source_query_error)?;

            let mut table = SourceTable::new(name.clone(), columns);
            for row in &rows {
                table.push_row(row_to_cells(row)?);
            }

            info!(table = %table_name, rows = table.len(), "extracted source table");
            bundle.insert(table);
        }

        transaction.commit().await.map_err(source_query_error)?;

        Ok(bundle)
    }
}

/// Converts every column of a row into a [`Cell`] based on its Postgres type.
fn row_to_cells(row: &PgRow) -> EtlResult<Vec<Cell>> {
    let mut cells = Vec::with_capacity(row.len());
    for (index, column) in row.columns().iter().enumerate() {
        let type_name = column.type_info().name();
        let cell = match type_name {
            "BOOL" => row.try_get::<Option<bool>, _>(index).map(Cell::from),
            "INT2" => row
                .try_get::<Option<i16>, _>(index)
                .map(|value| value.map(i64::from).into()),
            "INT4" => row
                .try_get::<Option<i32>, _>(index)
                .map(|value| value.map(i64::from).into()),
            "INT8" => row.try_get::<Option<i64>, _>(index).map(Cell::from),
            "FLOAT4" => row
                .try_get::<Option<f32>, _>(index)
                .map(|value| value.map(f64::from).into()),
            "FLOAT8" => row.try_get::<Option<f64>, _>(index).map(Cell::from),
            "NUMERIC" => row.try_get::<Option<BigDecimal>, _>(index).map(Cell::from),
            "TEXT" | "VARCHAR" | "BPCHAR" | "NAME" => {
                row.try_get::<Option<String>, _>(index).map(Cell::from)
            }
            "DATE" => row.try_get::<Option<NaiveDate>, _>(index).map(Cell::from),
            "TIMESTAMP" => row
                .try_get::<Option<NaiveDateTime>, _>(index)
                .map(|value| value.map_or(Cell::Null, Cell::Timestamp)),
            "TIMESTAMPTZ" => row
                .try_get::<Option<DateTime<Utc>>, _>(index)
                .map(|value| value.map_or(Cell::Null, |value| Cell::Timestamp(value.naive_utc()))),
            other => bail!(
                ErrorKind::SourceQueryFailed,
                "Unsupported source column type",
                format!("Column `{}` has type {other}", column.name())
            ),
        };

        cells.push(cell.map_err(source_query_error)?);
    }

    Ok(cells)
}

fn source_query_error(err: sqlx::Error) -> EtlError {
    let detail = err.to_string();
    etl_error!(
        ErrorKind::SourceQueryFailed,
        "Source query failed",
        detail = detail,
        source: err
    )
}
