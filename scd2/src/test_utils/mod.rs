//! Helpers for unit and integration tests.
//!
//! - [`bundle`] builds source bundles with sensible dimension defaults.
//! - [`rows`] builds analytical and fingerprinted rows directly.
//! - [`database`] points tests at a throwaway Postgres database.
//! - [`faulty_destination`] wraps a destination and fails a chosen operation.
//! - [`failpoints`] configures `fail` failpoints for the duration of a test.

pub mod bundle;
pub mod database;
#[cfg(feature = "failpoints")]
pub mod failpoints;
pub mod faulty_destination;
pub mod rows;
