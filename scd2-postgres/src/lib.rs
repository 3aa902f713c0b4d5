//! Postgres building blocks for the SCD2 pipeline.
//!
//! Every function takes an explicit connection or pool so callers decide the transactional
//! scope. Functions return raw [`sqlx::Result`]s; classification into pipeline errors happens in
//! the `scd2` crate.

pub mod audit;
pub mod history;
pub mod schema;
pub mod snapshot;
pub mod source;
#[cfg(feature = "test-utils")]
pub mod test_utils;

/// Maximum number of bind parameters Postgres accepts in one statement.
pub const MAX_BIND_PARAMETERS: usize = u16::MAX as usize;
