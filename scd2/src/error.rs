//! Error types and result definitions for pipeline operations.
//!
//! Every failure in the pipeline is an [`EtlError`] carrying an [`ErrorKind`]. Kinds group into
//! [`ErrorCategory`]s so callers can tell structural, semantic, coercion, grain and destination
//! failures apart without matching on messages. Errors can also aggregate several failures.

use std::backtrace::Backtrace;
use std::borrow::Cow;
use std::error;
use std::fmt;
use std::panic::Location;
use std::sync::Arc;

/// Convenient result type for pipeline operations using [`EtlError`] as the error type.
pub type EtlResult<T> = Result<T, EtlError>;

/// Detailed payload stored for single [`EtlError`] instances.
#[derive(Debug, Clone)]
struct ErrorPayload {
    kind: ErrorKind,
    description: Cow<'static, str>,
    detail: Option<Cow<'static, str>>,
    source: Option<Arc<dyn error::Error + Send + Sync>>,
    location: &'static Location<'static>,
    backtrace: Arc<Backtrace>,
}

/// Main error type for pipeline operations.
#[derive(Debug, Clone)]
pub struct EtlError {
    repr: ErrorRepr,
}

#[derive(Debug, Clone)]
enum ErrorRepr {
    Single(ErrorPayload),
    /// Multiple aggregated errors.
    Many {
        errors: Vec<EtlError>,
        location: &'static Location<'static>,
    },
}

/// Specific categories of errors that can occur during a run.
#[derive(PartialEq, Eq, Copy, Clone, Debug, Hash)]
#[non_exhaustive]
pub enum ErrorKind {
    // Structural errors
    MissingTable,
    MissingColumn,

    // Semantic validation errors
    NullForeignKey,
    DuplicateGrain,
    NegativeMeasure,

    // Coercion errors
    ConversionError,
    ZeroQuantity,

    // Post-join grain errors
    PostJoinGrainViolation,

    // Source errors
    SourceConnectionFailed,
    SourceQueryFailed,
    SourceError,

    // Destination errors
    DestinationConnectionFailed,
    DestinationQueryFailed,
    DestinationConstraintViolation,
    DestinationError,

    // Audit errors
    AuditSinkFailed,

    // Configuration & IO errors
    ConfigError,
    IoError,
    SerializationError,
    DeserializationError,

    // State errors
    InvalidState,

    Unknown,

    /// Raised by fault injection in tests.
    #[cfg(feature = "failpoints")]
    FailpointTriggered,
}

/// Coarse classification of [`ErrorKind`]s.
#[derive(PartialEq, Eq, Copy, Clone, Debug, Hash)]
pub enum ErrorCategory {
    /// A required table or column is missing.
    Structural,
    /// Nulls in keys, duplicate grain, or negative measures.
    Semantic,
    /// A value could not be coerced to its target type.
    Coercion,
    /// A join multiplied rows of the fact grain.
    GrainViolation,
    Source,
    Destination,
    Audit,
    Configuration,
    Internal,
}

impl ErrorKind {
    /// Returns the [`ErrorCategory`] this kind belongs to.
    pub fn category(self) -> ErrorCategory {
        match self {
            ErrorKind::MissingTable | ErrorKind::MissingColumn => ErrorCategory::Structural,
            ErrorKind::NullForeignKey | ErrorKind::DuplicateGrain | ErrorKind::NegativeMeasure => {
                ErrorCategory::Semantic
            }
            ErrorKind::ConversionError | ErrorKind::ZeroQuantity => ErrorCategory::Coercion,
            ErrorKind::PostJoinGrainViolation => ErrorCategory::GrainViolation,
            ErrorKind::SourceConnectionFailed
            | ErrorKind::SourceQueryFailed
            | ErrorKind::SourceError => ErrorCategory::Source,
            ErrorKind::DestinationConnectionFailed
            | ErrorKind::DestinationQueryFailed
            | ErrorKind::DestinationConstraintViolation
            | ErrorKind::DestinationError => ErrorCategory::Destination,
            ErrorKind::AuditSinkFailed => ErrorCategory::Audit,
            ErrorKind::ConfigError => ErrorCategory::Configuration,
            ErrorKind::IoError
            | ErrorKind::SerializationError
            | ErrorKind::DeserializationError
            | ErrorKind::InvalidState
            | ErrorKind::Unknown => ErrorCategory::Internal,
            #[cfg(feature = "failpoints")]
            ErrorKind::FailpointTriggered => ErrorCategory::Internal,
        }
    }
}

impl EtlError {
    /// Returns the [`ErrorKind`] of this error.
    ///
    /// For multiple errors, returns the kind of the first error or [`ErrorKind::Unknown`]
    /// if the error list is empty.
    pub fn kind(&self) -> ErrorKind {
        match self.repr {
            ErrorRepr::Single(ref payload) => payload.kind,
            ErrorRepr::Many { ref errors, .. } => errors
                .first()
                .map(|err| err.kind())
                .unwrap_or(ErrorKind::Unknown),
        }
    }

    /// Returns the [`ErrorCategory`] of [`EtlError::kind`].
    pub fn category(&self) -> ErrorCategory {
        self.kind().category()
    }

    /// Returns all [`ErrorKind`]s present in this error.
    pub fn kinds(&self) -> Vec<ErrorKind> {
        match self.repr {
            ErrorRepr::Single(ref payload) => vec![payload.kind],
            ErrorRepr::Many { ref errors, .. } => {
                errors.iter().flat_map(|err| err.kinds()).collect()
            }
        }
    }

    /// Returns the static description of this error.
    ///
    /// For multiple errors, returns the description of the first one.
    pub fn description(&self) -> &str {
        match self.repr {
            ErrorRepr::Single(ref payload) => &payload.description,
            ErrorRepr::Many { ref errors, .. } => errors
                .first()
                .map(|err| err.description())
                .unwrap_or("no inner errors provided"),
        }
    }

    /// Returns the detailed error information if available.
    ///
    /// For multiple errors, returns the detail of the first error that has one.
    pub fn detail(&self) -> Option<&str> {
        match self.repr {
            ErrorRepr::Single(ref payload) => payload.detail.as_deref(),
            ErrorRepr::Many { ref errors, .. } => errors.iter().find_map(|e| e.detail()),
        }
    }

    /// Returns a one-line summary without location or backtrace, suitable for run logs.
    pub fn summary(&self) -> String {
        match self.detail() {
            Some(detail) => format!("{}: {}", self.description(), detail),
            None => self.description().to_string(),
        }
    }

    pub fn backtrace(&self) -> Option<&Backtrace> {
        match self.repr {
            ErrorRepr::Single(ref payload) => Some(payload.backtrace.as_ref()),
            ErrorRepr::Many { .. } => None,
        }
    }

    pub fn location(&self) -> &'static Location<'static> {
        match self.repr {
            ErrorRepr::Single(ref payload) => payload.location,
            ErrorRepr::Many { location, .. } => location,
        }
    }

    /// Attaches an originating [`error::Error`] to this error and returns the modified instance.
    ///
    /// Has no effect on aggregated errors, which forward their first error as source.
    pub fn with_source<E>(mut self, source: E) -> Self
    where
        E: error::Error + Send + Sync + 'static,
    {
        if let ErrorRepr::Single(ref mut payload) = self.repr {
            payload.source = Some(Arc::new(source));
        }
        self
    }

    #[track_caller]
    fn from_components(
        kind: ErrorKind,
        description: Cow<'static, str>,
        detail: Option<Cow<'static, str>>,
        source: Option<Arc<dyn error::Error + Send + Sync>>,
    ) -> Self {
        EtlError {
            repr: ErrorRepr::Single(ErrorPayload {
                kind,
                description,
                detail,
                source,
                location: Location::caller(),
                backtrace: Arc::new(Backtrace::capture()),
            }),
        }
    }
}

impl PartialEq for EtlError {
    fn eq(&self, other: &EtlError) -> bool {
        match (&self.repr, &other.repr) {
            (ErrorRepr::Single(a), ErrorRepr::Single(b)) => a.kind == b.kind,
            (ErrorRepr::Many { errors: a, .. }, ErrorRepr::Many { errors: b, .. }) => a == b,
            _ => false,
        }
    }
}

impl fmt::Display for EtlError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.repr {
            ErrorRepr::Single(payload) => {
                let location = payload.location;
                write!(
                    f,
                    "[{:?}] {} @ {}:{}:{}",
                    payload.kind,
                    payload.description,
                    location.file(),
                    location.line(),
                    location.column()
                )?;

                write_block("Detail", payload.detail.as_deref(), f)?;

                let backtrace = payload.backtrace.to_string();
                if !backtrace.trim().is_empty() {
                    write_block("Backtrace", Some(&backtrace), f)?;
                }

                Ok(())
            }
            ErrorRepr::Many { errors, location } => {
                let count = errors.len();
                write!(
                    f,
                    "[Many] {} error{} aggregated @ {}:{}:{}",
                    count,
                    if count == 1 { "" } else { "s" },
                    location.file(),
                    location.line(),
                    location.column()
                )?;

                if errors.is_empty() {
                    write!(f, "\n  (no inner errors provided)")?;
                }

                for (index, error) in errors.iter().enumerate() {
                    let rendered = error.to_string();
                    for (line_index, line) in rendered.lines().enumerate() {
                        if line_index == 0 {
                            write!(f, "\n  {}. {line}", index + 1)?;
                        } else {
                            write!(f, "\n     {line}")?;
                        }
                    }
                }

                Ok(())
            }
        }
    }
}

impl error::Error for EtlError {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match &self.repr {
            ErrorRepr::Single(payload) => payload
                .source
                .as_ref()
                .map(|source| source.as_ref() as &(dyn error::Error + 'static)),
            ErrorRepr::Many { errors, .. } => errors
                .first()
                .map(|error| error as &(dyn error::Error + 'static)),
        }
    }
}

/// Writes an indented, titled block of lines.
fn write_block(title: &str, content: Option<&str>, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let Some(content) = content else {
        return Ok(());
    };

    if content.trim().is_empty() {
        return write!(f, "\n  {title}: <empty>");
    }

    write!(f, "\n  {title}:")?;
    for line in content.lines() {
        if line.trim().is_empty() {
            write!(f, "\n    ")?;
        } else {
            write!(f, "\n    {line}")?;
        }
    }

    Ok(())
}

/// Creates an [`EtlError`] from an error kind and static description.
impl From<(ErrorKind, &'static str)> for EtlError {
    #[track_caller]
    fn from((kind, desc): (ErrorKind, &'static str)) -> EtlError {
        EtlError::from_components(kind, Cow::Borrowed(desc), None, None)
    }
}

/// Creates an [`EtlError`] from an error kind, static description, and dynamic detail.
impl<D> From<(ErrorKind, &'static str, D)> for EtlError
where
    D: Into<Cow<'static, str>>,
{
    #[track_caller]
    fn from((kind, desc, detail): (ErrorKind, &'static str, D)) -> EtlError {
        EtlError::from_components(kind, Cow::Borrowed(desc), Some(detail.into()), None)
    }
}

/// Creates an [`EtlError`] from a vector of errors for aggregation.
///
/// A vector holding exactly one error yields that error unwrapped.
impl<E> From<Vec<E>> for EtlError
where
    E: Into<EtlError>,
{
    #[track_caller]
    fn from(errors: Vec<E>) -> EtlError {
        let location = Location::caller();
        let mut errors: Vec<EtlError> = errors.into_iter().map(Into::into).collect();

        if errors.len() == 1 {
            if let Some(error) = errors.pop() {
                return error;
            }
        }

        EtlError {
            repr: ErrorRepr::Many { errors, location },
        }
    }
}

/// Implements a conversion into a single [`EtlError`] of a fixed kind.
macro_rules! impl_from_error {
    ($source:ty, $kind:expr, $description:literal) => {
        impl From<$source> for EtlError {
            #[track_caller]
            fn from(err: $source) -> EtlError {
                let detail = err.to_string();
                EtlError::from_components(
                    $kind,
                    Cow::Borrowed($description),
                    Some(Cow::Owned(detail)),
                    Some(Arc::new(err)),
                )
            }
        }
    };
}

impl_from_error!(std::io::Error, ErrorKind::IoError, "I/O operation failed");
impl_from_error!(
    std::num::ParseIntError,
    ErrorKind::ConversionError,
    "Integer parsing failed"
);
impl_from_error!(
    std::num::ParseFloatError,
    ErrorKind::ConversionError,
    "Float parsing failed"
);
impl_from_error!(
    chrono::ParseError,
    ErrorKind::ConversionError,
    "Date parsing failed"
);
impl_from_error!(
    bigdecimal::ParseBigDecimalError,
    ErrorKind::ConversionError,
    "Decimal parsing failed"
);

/// Converts [`serde_json::Error`] to [`EtlError`], separating I/O from malformed input.
impl From<serde_json::Error> for EtlError {
    #[track_caller]
    fn from(err: serde_json::Error) -> EtlError {
        let (kind, description) = match err.classify() {
            serde_json::error::Category::Io => (ErrorKind::IoError, "JSON I/O operation failed"),
            serde_json::error::Category::Syntax
            | serde_json::error::Category::Data
            | serde_json::error::Category::Eof => {
                (ErrorKind::DeserializationError, "JSON deserialization failed")
            }
        };

        let detail = err.to_string();
        EtlError::from_components(
            kind,
            Cow::Borrowed(description),
            Some(Cow::Owned(detail)),
            Some(Arc::new(err)),
        )
    }
}

/// Converts [`sqlx::Error`] raised against the destination to [`EtlError`].
///
/// Unique violations map to [`ErrorKind::DestinationConstraintViolation`], pool and I/O failures
/// to [`ErrorKind::DestinationConnectionFailed`]. Source reads map their errors explicitly.
impl From<sqlx::Error> for EtlError {
    #[track_caller]
    fn from(err: sqlx::Error) -> EtlError {
        let (kind, description) = match &err {
            sqlx::Error::Database(db_err)
                if db_err.code().as_deref() == Some(scd2_postgres::history::UNIQUE_VIOLATION) =>
            {
                (
                    ErrorKind::DestinationConstraintViolation,
                    "Destination constraint violated",
                )
            }
            sqlx::Error::Database(_) => {
                (ErrorKind::DestinationQueryFailed, "Destination query failed")
            }
            sqlx::Error::Io(_)
            | sqlx::Error::Tls(_)
            | sqlx::Error::PoolClosed
            | sqlx::Error::PoolTimedOut => (
                ErrorKind::DestinationConnectionFailed,
                "Destination connection failed",
            ),
            _ => (ErrorKind::DestinationError, "Destination operation failed"),
        };

        let detail = err.to_string();
        EtlError::from_components(
            kind,
            Cow::Borrowed(description),
            Some(Cow::Owned(detail)),
            Some(Arc::new(err)),
        )
    }
}
