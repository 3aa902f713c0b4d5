//! Tracing setup shared by the pipeline binaries and test suites.

pub mod tracing;

pub use crate::tracing::{LogFlusher, TracingError, init_test_tracing, init_tracing};
