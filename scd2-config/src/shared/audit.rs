use serde::Deserialize;

use crate::shared::{PgConnectionConfig, ValidationError};

/// Sink recording the start and end of every run.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum AuditConfig {
    /// Emits run events through `tracing` only.
    #[default]
    Log,
    /// Persists run events into a run-log table.
    Postgres {
        connection: PgConnectionConfig,
        #[serde(default = "default_run_log_table")]
        table: String,
    },
}

impl AuditConfig {
    pub const DEFAULT_RUN_LOG_TABLE: &'static str = "etl_run_log";

    pub fn validate(&self) -> Result<(), ValidationError> {
        match self {
            AuditConfig::Log => Ok(()),
            AuditConfig::Postgres { connection, table } => {
                if table.trim().is_empty() {
                    return Err(ValidationError::EmptyName("audit.table".to_string()));
                }
                connection.validate()
            }
        }
    }
}

fn default_run_log_table() -> String {
    AuditConfig::DEFAULT_RUN_LOG_TABLE.to_string()
}
