//! Configuration types and loading for the SCD2 analytics pipeline.
//!
//! The [`shared`] module contains the configuration structures consumed by the pipeline crates,
//! while [`load_config`] assembles them from configuration files and environment overrides.

mod environment;
mod load;
pub mod shared;

pub use environment::Environment;
pub use load::{Config, LoadConfigError, load_config, load_config_from};
