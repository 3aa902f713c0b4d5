use serde::Deserialize;

use crate::shared::{PgConnectionConfig, ValidationError};

/// Store holding the SCD2 history table.
///
/// This intentionally does not implement [`serde::Serialize`] to avoid accidentally leaking
/// secrets in the config into serialized forms.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DestinationConfig {
    /// Keeps the history in process memory; useful for dry runs and tests.
    Memory,
    Postgres { connection: PgConnectionConfig },
}

impl DestinationConfig {
    pub fn validate(&self) -> Result<(), ValidationError> {
        match self {
            DestinationConfig::Memory => Ok(()),
            DestinationConfig::Postgres { connection } => connection.validate(),
        }
    }
}
