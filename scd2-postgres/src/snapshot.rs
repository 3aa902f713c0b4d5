//! Full-replace load of the flat analytics snapshot table.

use bigdecimal::BigDecimal;
use chrono::NaiveDate;
use sqlx::{PgConnection, Postgres, QueryBuilder};

use crate::MAX_BIND_PARAMETERS;
use crate::schema::TableName;

const SNAPSHOT_INSERT_COLUMNS: usize = 11;

/// One denormalized row of the analytics snapshot.
#[derive(Debug, Clone)]
pub struct SnapshotRow<'a> {
    pub entity_id: i64,
    pub name: Option<&'a str>,
    pub author: Option<&'a str>,
    pub category: Option<&'a str>,
    pub language: Option<&'a str>,
    pub event_date: NaiveDate,
    pub year: i32,
    pub month: i32,
    pub quantity: &'a BigDecimal,
    pub amount: &'a BigDecimal,
    pub unit_price: &'a BigDecimal,
}

/// Drops and recreates the snapshot table, then loads `rows` into it.
///
/// Runs on the caller's connection, so inside a transaction the old snapshot stays visible to
/// other sessions until commit.
pub async fn replace_snapshot(
    conn: &mut PgConnection,
    table: &TableName,
    rows: &[SnapshotRow<'_>],
) -> sqlx::Result<u64> {
    let quoted = table.as_quoted_identifier();

    sqlx::query(&format!("drop table if exists {quoted}"))
        .execute(&mut *conn)
        .await?;

    sqlx::query(&format!(
        r#"
        create table {quoted} (
            entity_id bigint not null,
            name text,
            author text,
            category text,
            language text,
            event_date date not null,
            year integer not null,
            month integer not null,
            quantity numeric not null,
            amount numeric not null,
            unit_price numeric(12, 2) not null,
            primary key (entity_id, event_date)
        )
        "#
    ))
    .execute(&mut *conn)
    .await?;

    let mut inserted = 0;
    for chunk in rows.chunks(MAX_BIND_PARAMETERS / SNAPSHOT_INSERT_COLUMNS) {
        let mut builder: QueryBuilder<Postgres> = QueryBuilder::new(format!(
            "insert into {quoted} (entity_id, name, author, category, language, event_date, \
             year, month, quantity, amount, unit_price) "
        ));
        builder.push_values(chunk, |mut values, row| {
            values
                .push_bind(row.entity_id)
                .push_bind(row.name)
                .push_bind(row.author)
                .push_bind(row.category)
                .push_bind(row.language)
                .push_bind(row.event_date)
                .push_bind(row.year)
                .push_bind(row.month)
                .push_bind(row.quantity)
                .push_bind(row.amount)
                .push_bind(row.unit_price);
        });

        inserted += builder.build().execute(&mut *conn).await?.rows_affected();
    }

    Ok(inserted)
}
