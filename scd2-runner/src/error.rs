use scd2::error::EtlError;
use std::backtrace::Backtrace;
use std::error::Error;
use std::fmt;

/// Returns whether terminal output should include backtraces.
fn should_render_backtrace() -> bool {
    matches!(
        std::env::var("RUST_BACKTRACE").as_deref(),
        Ok("1") | Ok("full")
    )
}

/// Result type for runner operations.
pub type RunnerResult<T> = Result<T, RunnerError>;

/// Captured backtrace wrapper for the non-pipeline variants.
pub struct CapturedBacktrace(Backtrace);

impl CapturedBacktrace {
    fn capture() -> Self {
        Self(Backtrace::capture())
    }
}

impl fmt::Debug for CapturedBacktrace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Error type of the runner binary.
///
/// Wraps [`EtlError`] for everything raised by a run and adds the failures that happen before a
/// pipeline exists.
#[derive(Debug)]
pub enum RunnerError {
    /// A run, or the construction of its source, destination or audit sink, failed.
    Etl(EtlError),
    Config(Box<dyn Error + Send + Sync>, CapturedBacktrace),
    Io(std::io::Error, CapturedBacktrace),
}

impl RunnerError {
    pub fn category(&self) -> &'static str {
        match self {
            RunnerError::Etl(_) => "pipeline error",
            RunnerError::Config(_, _) => "configuration error",
            RunnerError::Io(_, _) => "i/o error",
        }
    }

    pub fn backtrace(&self) -> Option<&Backtrace> {
        match self {
            RunnerError::Etl(err) => err.backtrace(),
            RunnerError::Config(_, cb) => Some(&cb.0),
            RunnerError::Io(_, cb) => Some(&cb.0),
        }
    }

    /// Creates a configuration error from any error source.
    pub fn config<E: Error + Send + Sync + 'static>(err: E) -> Self {
        RunnerError::Config(Box::new(err), CapturedBacktrace::capture())
    }

    /// Returns a user-oriented report for terminal output.
    pub fn render_report(&self) -> String {
        let mut out = String::new();
        out.push_str("scd2 run failed\n");
        out.push_str(&format!("category: {}\n", self.category()));

        match self {
            RunnerError::Etl(err) => {
                out.push_str(&format!("error: {}\n", err.summary()));
                out.push_str(&format!("kinds: {:?}\n", err.kinds()));
            }
            _ => out.push_str(&format!("error: {self}\n")),
        }

        let mut source = Error::source(self);
        let mut idx = 1usize;
        while let Some(err) = source {
            out.push_str(&format!("cause {idx}: {err}\n"));
            source = err.source();
            idx += 1;
        }

        if should_render_backtrace()
            && let Some(backtrace) = self.backtrace()
        {
            out.push_str("backtrace:\n");
            out.push_str(&backtrace.to_string());
            if !out.ends_with('\n') {
                out.push('\n');
            }
        }

        out
    }
}

impl fmt::Display for RunnerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunnerError::Etl(err) => write!(f, "{}", err.summary()),
            RunnerError::Config(source, _) => write!(f, "configuration error: {source}"),
            RunnerError::Io(source, _) => write!(f, "i/o error: {source}"),
        }
    }
}

impl Error for RunnerError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            RunnerError::Etl(err) => err.source(),
            RunnerError::Config(source, _) => Some(source.as_ref()),
            RunnerError::Io(source, _) => Some(source),
        }
    }
}

impl From<std::io::Error> for RunnerError {
    fn from(err: std::io::Error) -> Self {
        RunnerError::Io(err, CapturedBacktrace::capture())
    }
}

impl From<EtlError> for RunnerError {
    fn from(err: EtlError) -> Self {
        RunnerError::Etl(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use scd2::error::ErrorKind;

    #[test]
    fn report_names_the_pipeline_failure() {
        let err: RunnerError = EtlError::from((
            ErrorKind::NegativeMeasure,
            "Negative measures found in the fact table",
            "quantity: 1 rows",
        ))
        .into();

        let report = err.render_report();
        assert!(report.starts_with("scd2 run failed\n"));
        assert!(report.contains("category: pipeline error\n"));
        assert!(report.contains("error: Negative measures found in the fact table: quantity: 1 rows\n"));
        assert!(report.contains("NegativeMeasure"));
    }

    #[test]
    fn config_errors_keep_their_source() {
        let err = RunnerError::config(std::io::Error::other("missing base.yaml"));

        assert_eq!(err.category(), "configuration error");
        assert_eq!(err.to_string(), "configuration error: missing base.yaml");
        assert!(err.render_report().contains("cause 1: missing base.yaml\n"));
    }
}
