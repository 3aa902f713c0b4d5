//! History stores the merge writer applies SCD2 changes to.
//!
//! A [`HistoryDestination`] hands out [`HistoryTransaction`]s. Everything a run writes goes
//! through one transaction, so a failure at any step leaves the store as it was.

mod base;
pub mod memory;
pub mod postgres;

pub use base::{HistoryDestination, HistoryTransaction};
