mod audit;
mod base;
mod connection;
mod destination;
mod pipeline;
mod runner;
mod source;
mod telemetry;

pub use audit::*;
pub use base::*;
pub use connection::*;
pub use destination::*;
pub use pipeline::*;
pub use runner::*;
pub use source::*;
pub use telemetry::*;
