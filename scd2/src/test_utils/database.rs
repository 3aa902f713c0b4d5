use scd2_config::shared::{PgConnectionConfig, TlsConfig};
use scd2_postgres::schema::TableName;
use uuid::Uuid;

/// Schema holding the test source tables.
pub const TEST_DATABASE_SCHEMA: &str = "public";

pub fn test_table_name(name: &str) -> TableName {
    TableName::new(TEST_DATABASE_SCHEMA, name)
}

/// Connection settings for a database with a unique name on the test server.
///
/// The server is read from the environment:
/// - `TESTS_DATABASE_HOST`: Postgres server hostname (required)
/// - `TESTS_DATABASE_PORT`: Postgres server port (required)
/// - `TESTS_DATABASE_USERNAME`: Database user (required)
/// - `TESTS_DATABASE_PASSWORD`: Database password (optional)
///
/// # Panics
/// Panics if a required variable is missing.
pub fn local_pg_connection_config() -> PgConnectionConfig {
    PgConnectionConfig {
        host: std::env::var("TESTS_DATABASE_HOST").expect("TESTS_DATABASE_HOST must be set"),
        port: std::env::var("TESTS_DATABASE_PORT")
            .expect("TESTS_DATABASE_PORT must be set")
            .parse()
            .expect("TESTS_DATABASE_PORT must be a valid port number"),
        name: Uuid::new_v4().to_string(),
        username: std::env::var("TESTS_DATABASE_USERNAME")
            .expect("TESTS_DATABASE_USERNAME must be set"),
        password: std::env::var("TESTS_DATABASE_PASSWORD")
            .ok()
            .map(Into::into),
        tls: TlsConfig::disabled(),
    }
}
