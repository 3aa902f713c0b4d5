use thiserror::Error;

/// Configuration validation errors.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    /// A required name (table, column, pipeline) is empty.
    #[error("`{0}` cannot be empty")]
    EmptyName(String),
    /// Two configured names collide where they must be distinct.
    #[error("`{first}` and `{second}` must name different tables, both are `{name}`")]
    DuplicateTableName {
        first: String,
        second: String,
        name: String,
    },
    /// The duplicate sample must report at least one offending key.
    #[error("`pipeline.duplicate_sample_size` cannot be zero")]
    DuplicateSampleSizeZero,
    /// TLS is enabled but no trusted root certificates are provided.
    #[error("Invalid TLS config: `trusted_root_certs` must be set when `enabled` is true")]
    MissingTrustedRootCerts,
}
