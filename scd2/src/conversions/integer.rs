use bigdecimal::{BigDecimal, ToPrimitive};

use crate::bail;
use crate::error::{ErrorKind, EtlResult};
use crate::types::Cell;

/// Coerces a key cell to an `i64`.
///
/// Integral numerics and floats without a fractional part are accepted, as are strings holding
/// an integer. Fractional values are rejected rather than truncated.
pub fn cell_to_i64(cell: &Cell) -> EtlResult<Option<i64>> {
    let value = match cell {
        Cell::Null => return Ok(None),
        Cell::I64(value) => *value,
        Cell::F64(value) => {
            if value.fract() != 0.0 || !value.is_finite() {
                bail!(
                    ErrorKind::ConversionError,
                    "Could not convert value to an integer key",
                    format!("The value {value} is not integral")
                );
            }
            match value.to_i64() {
                Some(value) => value,
                None => bail!(
                    ErrorKind::ConversionError,
                    "Could not convert value to an integer key",
                    format!("The value {value} is out of range")
                ),
            }
        }
        Cell::Numeric(value) => numeric_to_i64(value)?,
        Cell::String(value) => value.trim().parse::<i64>()?,
        Cell::Bool(_) | Cell::Date(_) | Cell::Timestamp(_) => bail!(
            ErrorKind::ConversionError,
            "Could not convert value to an integer key",
            format!("The value {cell} has an unsupported type")
        ),
    };

    Ok(Some(value))
}

fn numeric_to_i64(value: &BigDecimal) -> EtlResult<i64> {
    if !value.is_integer() {
        bail!(
            ErrorKind::ConversionError,
            "Could not convert value to an integer key",
            format!("The value {value} is not integral")
        );
    }

    match value.to_i64() {
        Some(value) => Ok(value),
        None => bail!(
            ErrorKind::ConversionError,
            "Could not convert value to an integer key",
            format!("The value {value} is out of range")
        ),
    }
}
