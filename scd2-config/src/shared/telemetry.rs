use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Logging settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TelemetryConfig {
    /// Directory receiving daily-rolling log files. Logs go to stdout only when unset.
    #[serde(default)]
    pub log_dir: Option<PathBuf>,
    /// Emit JSON formatted log lines instead of human readable ones.
    #[serde(default)]
    pub json: bool,
}
