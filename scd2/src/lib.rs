//! SCD2 analytics pipeline.
//!
//! A run extracts a normalized batch (a fact table plus dimension lookups) from a
//! [`source::SourceProvider`], checks it with [`validator::Validator`], flattens it with
//! [`denormalize::Denormalizer`], fingerprints every row and classifies it against the current
//! history with [`detect::classify`]. [`merge::apply`] then closes superseded versions and appends
//! new ones inside a single [`destination::HistoryTransaction`]. [`pipeline::Pipeline`] ties the
//! stages together and reports each run to an [`audit::AuditSink`].

pub mod audit;
pub mod conversions;
pub mod denormalize;
pub mod destination;
pub mod detect;
pub mod error;
#[cfg(feature = "failpoints")]
pub mod failpoints;
pub mod fingerprint;
mod macros;
pub mod merge;
pub mod pipeline;
pub mod source;
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
pub mod types;
pub mod validator;
