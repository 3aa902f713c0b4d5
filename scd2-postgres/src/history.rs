//! Statements over the SCD2 history table.

use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgConnection, Postgres, QueryBuilder};
use tracing::debug;

use crate::MAX_BIND_PARAMETERS;
use crate::schema::TableName;

/// Number of bound values per appended history row.
const HISTORY_INSERT_COLUMNS: usize = 10;

/// Postgres error code for unique constraint violations.
pub const UNIQUE_VIOLATION: &str = "23505";

/// A stored version of an entity.
#[derive(Debug, Clone, PartialEq, FromRow)]
pub struct HistoryRow {
    pub scd_id: i64,
    pub entity_id: i64,
    pub name: Option<String>,
    pub author: Option<String>,
    pub category: Option<String>,
    pub language: Option<String>,
    pub unit_price: BigDecimal,
    pub record_hash: String,
    pub effective_from: DateTime<Utc>,
    pub effective_to: Option<DateTime<Utc>>,
    pub is_current: bool,
}

/// A version about to be appended.
#[derive(Debug, Clone)]
pub struct NewHistoryRow<'a> {
    pub entity_id: i64,
    pub name: Option<&'a str>,
    pub author: Option<&'a str>,
    pub category: Option<&'a str>,
    pub language: Option<&'a str>,
    pub unit_price: &'a BigDecimal,
    pub record_hash: &'a str,
    pub effective_from: DateTime<Utc>,
    pub effective_to: Option<DateTime<Utc>>,
    pub is_current: bool,
}

/// Fingerprint of the current version of an entity.
#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct CurrentVersionRow {
    pub entity_id: i64,
    pub record_hash: String,
}

/// Creates the history table and its indexes if they are missing.
///
/// The partial unique index guarantees at most one current version per entity.
pub async fn create_history_table_if_missing(
    conn: &mut PgConnection,
    table: &TableName,
) -> sqlx::Result<()> {
    let quoted = table.as_quoted_identifier();

    sqlx::query(&format!(
        r#"
        create table if not exists {quoted} (
            scd_id bigserial primary key,
            entity_id bigint not null,
            name text,
            author text,
            category text,
            language text,
            unit_price numeric(12, 2) not null,
            record_hash char(32) not null,
            effective_from timestamptz not null,
            effective_to timestamptz,
            is_current boolean not null default true,
            check ((effective_to is null) = is_current)
        )
        "#
    ))
    .execute(&mut *conn)
    .await?;

    sqlx::query(&format!(
        "create unique index if not exists {} on {quoted} (entity_id) where is_current",
        table.derived_identifier("current_uidx")
    ))
    .execute(&mut *conn)
    .await?;

    sqlx::query(&format!(
        "create index if not exists {} on {quoted} (effective_from)",
        table.derived_identifier("from_idx")
    ))
    .execute(&mut *conn)
    .await?;

    Ok(())
}

/// Returns the `(entity_id, record_hash)` pairs of all current versions.
pub async fn fetch_current_versions(
    conn: &mut PgConnection,
    table: &TableName,
) -> sqlx::Result<Vec<CurrentVersionRow>> {
    sqlx::query_as::<_, CurrentVersionRow>(&format!(
        "select entity_id, record_hash from {} where is_current = true",
        table.as_quoted_identifier()
    ))
    .fetch_all(conn)
    .await
}

/// Closes the current versions of the given entities in a single statement.
///
/// Returns the number of closed rows.
pub async fn close_current_versions(
    conn: &mut PgConnection,
    table: &TableName,
    entity_ids: &[i64],
    effective_to: DateTime<Utc>,
) -> sqlx::Result<u64> {
    if entity_ids.is_empty() {
        return Ok(0);
    }

    let result = sqlx::query(&format!(
        r#"
        update {}
        set effective_to = $1, is_current = false
        where is_current = true and entity_id = any($2)
        "#,
        table.as_quoted_identifier()
    ))
    .bind(effective_to)
    .bind(entity_ids)
    .execute(conn)
    .await?;

    Ok(result.rows_affected())
}

/// Appends versions with multi-row inserts, split only as far as the bind limit requires.
///
/// Returns the number of inserted rows.
pub async fn insert_versions(
    conn: &mut PgConnection,
    table: &TableName,
    rows: &[NewHistoryRow<'_>],
) -> sqlx::Result<u64> {
    let mut inserted = 0;
    let rows_per_statement = MAX_BIND_PARAMETERS / HISTORY_INSERT_COLUMNS;

    for chunk in rows.chunks(rows_per_statement) {
        let mut builder: QueryBuilder<Postgres> = QueryBuilder::new(format!(
            "insert into {} (entity_id, name, author, category, language, unit_price, \
             record_hash, effective_from, effective_to, is_current) ",
            table.as_quoted_identifier()
        ));
        builder.push_values(chunk, |mut values, row| {
            values
                .push_bind(row.entity_id)
                .push_bind(row.name)
                .push_bind(row.author)
                .push_bind(row.category)
                .push_bind(row.language)
                .push_bind(row.unit_price)
                .push_bind(row.record_hash)
                .push_bind(row.effective_from)
                .push_bind(row.effective_to)
                .push_bind(row.is_current);
        });

        let result = builder.build().execute(&mut *conn).await?;
        inserted += result.rows_affected();
        debug!(rows = chunk.len(), table = %table, "inserted history chunk");
    }

    Ok(inserted)
}

/// Returns the full history ordered by entity and creation order.
pub async fn fetch_history(
    conn: &mut PgConnection,
    table: &TableName,
) -> sqlx::Result<Vec<HistoryRow>> {
    sqlx::query_as::<_, HistoryRow>(&format!(
        r#"
        select scd_id, entity_id, name, author, category, language, unit_price,
               record_hash, effective_from, effective_to, is_current
        from {}
        order by entity_id, scd_id
        "#,
        table.as_quoted_identifier()
    ))
    .fetch_all(conn)
    .await
}
