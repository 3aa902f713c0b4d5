//! Sinks recording the start and end of every run.

mod base;
pub mod log;
pub mod memory;
pub mod postgres;

pub use base::AuditSink;
