//! Reads of the normalized source tables.

use sqlx::PgConnection;
use sqlx::postgres::PgRow;

use crate::schema::TableName;

/// Returns the column names of `table` in ordinal order.
///
/// Empty when the table does not exist.
pub async fn fetch_table_columns(
    conn: &mut PgConnection,
    table: &TableName,
) -> sqlx::Result<Vec<String>> {
    sqlx::query_scalar(
        r#"
        select column_name::text
        from information_schema.columns
        where table_schema = $1 and table_name = $2
        order by ordinal_position
        "#,
    )
    .bind(&table.schema)
    .bind(&table.name)
    .fetch_all(conn)
    .await
}

/// Returns every row of `table`.
pub async fn fetch_table_rows(conn: &mut PgConnection, table: &TableName) -> sqlx::Result<Vec<PgRow>> {
    sqlx::query(&format!("select * from {}", table.as_quoted_identifier()))
        .fetch_all(conn)
        .await
}
