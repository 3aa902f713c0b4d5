//! Coercions from source [`crate::types::Cell`]s into the types the pipeline computes with.
//!
//! Every function returns `Ok(None)` for [`crate::types::Cell::Null`] and a
//! [`crate::error::ErrorKind::ConversionError`] for values that cannot be represented. Callers
//! decide whether a null is acceptable.

pub mod date;
pub mod hex;
pub mod integer;
pub mod numeric;
pub mod text;
