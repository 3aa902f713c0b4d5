//! Helpers creating throwaway databases for integration tests.

use scd2_config::shared::{IntoConnectOptions, PgConnectionConfig};
use sqlx::{Connection, Executor, PgConnection, PgPool};

/// Creates a new Postgres database and returns a pool connected to it.
///
/// # Panics
/// Panics if connection or database creation fails.
pub async fn create_pg_database(config: &PgConnectionConfig) -> PgPool {
    let mut connection = PgConnection::connect_with(&config.without_db(None))
        .await
        .expect("Failed to connect to Postgres");
    connection
        .execute(&*format!(r#"create database "{}";"#, config.name))
        .await
        .expect("Failed to create database");

    PgPool::connect_with(config.with_db(None))
        .await
        .expect("Failed to connect to Postgres")
}

/// Drops a Postgres database, terminating its remaining connections first.
///
/// Never panics, so test cleanup cannot mask the test outcome.
pub async fn drop_pg_database(config: &PgConnectionConfig) {
    let mut connection = match PgConnection::connect_with(&config.without_db(None)).await {
        Ok(connection) => connection,
        Err(err) => {
            eprintln!("warning: failed to connect to Postgres for cleanup: {err}");
            return;
        }
    };

    if let Err(err) = connection
        .execute(&*format!(
            r#"
            select pg_terminate_backend(pg_stat_activity.pid)
            from pg_stat_activity
            where pg_stat_activity.datname = '{}'
            and pid <> pg_backend_pid();"#,
            config.name
        ))
        .await
    {
        eprintln!(
            "warning: failed to terminate connections for database {}: {err}",
            config.name
        );
    }

    if let Err(err) = connection
        .execute(&*format!(r#"drop database if exists "{}";"#, config.name))
        .await
    {
        eprintln!("warning: failed to drop database {}: {err}", config.name);
    }
}
