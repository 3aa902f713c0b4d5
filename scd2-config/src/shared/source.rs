use serde::Deserialize;
use std::path::PathBuf;

use crate::shared::{PgConnectionConfig, ValidationError};

/// Where the normalized source bundle is read from.
///
/// This intentionally does not implement [`serde::Serialize`] because the Postgres variant
/// carries a password.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceConfig {
    /// Reads every required table from a Postgres schema.
    Postgres {
        connection: PgConnectionConfig,
        #[serde(default = "default_source_schema")]
        schema_name: String,
    },
    /// Reads a JSON document of the form `{"tables": {"name": [{"column": value}]}}`.
    JsonFile { path: PathBuf },
}

impl SourceConfig {
    pub fn validate(&self) -> Result<(), ValidationError> {
        match self {
            SourceConfig::Postgres {
                connection,
                schema_name,
            } => {
                if schema_name.trim().is_empty() {
                    return Err(ValidationError::EmptyName("source.schema_name".to_string()));
                }
                connection.validate()
            }
            SourceConfig::JsonFile { path } => {
                if path.as_os_str().is_empty() {
                    return Err(ValidationError::EmptyName("source.path".to_string()));
                }
                Ok(())
            }
        }
    }
}

fn default_source_schema() -> String {
    "public".to_string()
}
