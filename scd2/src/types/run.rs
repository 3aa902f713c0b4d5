use std::fmt;

/// Identifier assigned to a run by the audit sink.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RunId(pub i64);

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Running,
    Success,
    Failed,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Running => "RUNNING",
            RunStatus::Success => "SUCCESS",
            RunStatus::Failed => "FAILED",
        }
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The stage a run was in when it failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStage {
    Extract,
    Validate,
    Transform,
    Merge,
}

impl RunStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunStage::Extract => "extract",
            RunStage::Validate => "validate",
            RunStage::Transform => "transform",
            RunStage::Merge => "merge",
        }
    }
}

impl fmt::Display for RunStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Counts reported by the merge writer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MergeResult {
    pub new_count: u64,
    pub changed_count: u64,
    /// Always `new_count + changed_count`.
    pub inserted_count: u64,
}

/// Metrics of a successful run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunMetrics {
    /// Rows of the fact table read from the source.
    pub extract_rows: u64,
    /// Analytical rows produced by denormalization.
    pub transform_rows: u64,
    pub merge: MergeResult,
    /// Rows loaded into the snapshot table, when one is configured.
    pub snapshot_rows: Option<u64>,
}

/// How a run ended, as reported to the audit sink.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    Success(RunMetrics),
    Failed { stage: RunStage, message: String },
}

impl RunOutcome {
    pub fn status(&self) -> RunStatus {
        match self {
            RunOutcome::Success(_) => RunStatus::Success,
            RunOutcome::Failed { .. } => RunStatus::Failed,
        }
    }
}
