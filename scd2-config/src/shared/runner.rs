use serde::Deserialize;

use crate::Config;
use crate::shared::{
    AuditConfig, DestinationConfig, PipelineConfig, SourceConfig, TelemetryConfig, ValidationError,
};

/// Complete configuration of the runner binary.
///
/// This intentionally does not implement [`serde::Serialize`] to avoid accidentally leaking
/// secrets in the config into serialized forms.
#[derive(Debug, Clone, Deserialize)]
pub struct RunnerConfig {
    #[serde(default)]
    pub pipeline: PipelineConfig,
    pub source: SourceConfig,
    pub destination: DestinationConfig,
    #[serde(default)]
    pub audit: AuditConfig,
    #[serde(default)]
    pub telemetry: TelemetryConfig,
}

impl RunnerConfig {
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.pipeline.validate()?;
        self.source.validate()?;
        self.destination.validate()?;
        self.audit.validate()
    }
}

impl Config for RunnerConfig {
    const LIST_PARSE_KEYS: &'static [&'static str] = &[];
}
