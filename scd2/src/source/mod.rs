//! Providers of the [`crate::types::SourceBundle`] a run starts from.

mod base;
pub mod json;
pub mod memory;
pub mod postgres;

pub use base::SourceProvider;
