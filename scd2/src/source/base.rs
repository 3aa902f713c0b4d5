use std::future::Future;

use crate::error::EtlResult;
use crate::types::SourceBundle;

/// A system the pipeline extracts its normalized input tables from.
///
/// Providers return whatever tables they find. Checking that the required tables and columns are
/// present is left to [`crate::validator::Validator`].
pub trait SourceProvider {
    /// Returns the name of the source.
    fn name() -> &'static str;

    /// Reads the full batch of input tables.
    fn extract(&self) -> impl Future<Output = EtlResult<SourceBundle>> + Send;
}
