//! Common types used throughout the pipeline.
//!
//! Source-side tabular data ([`SourceBundle`], [`TableRow`], [`Cell`]), the flat
//! [`AnalyticalRow`] produced by denormalization, history-side versions and run bookkeeping.

mod analytical;
mod bundle;
mod cell;
mod history;
mod run;

pub use analytical::*;
pub use bundle::*;
pub use cell::*;
pub use history::*;
pub use run::*;
