use bigdecimal::{BigDecimal, RoundingMode};
use std::str::FromStr;

use crate::bail;
use crate::error::{ErrorKind, EtlResult};
use crate::types::Cell;

/// Fractional digits kept for unit prices.
pub const PRICE_SCALE: i64 = 2;

/// Coerces a measure cell to an exact decimal.
///
/// Floats go through their shortest round-trip representation so `0.1` stays `0.1`.
pub fn cell_to_decimal(cell: &Cell) -> EtlResult<Option<BigDecimal>> {
    let value = match cell {
        Cell::Null => return Ok(None),
        Cell::I64(value) => BigDecimal::from(*value),
        Cell::F64(value) => {
            if !value.is_finite() {
                bail!(
                    ErrorKind::ConversionError,
                    "Could not convert value to a decimal",
                    format!("The value {value} is not finite")
                );
            }
            BigDecimal::from_str(&value.to_string())?
        }
        Cell::Numeric(value) => value.clone(),
        Cell::String(value) => BigDecimal::from_str(value.trim())?,
        Cell::Bool(_) | Cell::Date(_) | Cell::Timestamp(_) => bail!(
            ErrorKind::ConversionError,
            "Could not convert value to a decimal",
            format!("The value {cell} has an unsupported type")
        ),
    };

    Ok(Some(value))
}

/// Rounds `value` half-up to [`PRICE_SCALE`] fractional digits.
pub fn round_price(value: &BigDecimal) -> BigDecimal {
    value.with_scale_round(PRICE_SCALE, RoundingMode::HalfUp)
}

/// Computes `amount / quantity` rounded to [`PRICE_SCALE`].
///
/// Fails with [`ErrorKind::ZeroQuantity`] when `quantity` is zero.
pub fn unit_price(amount: &BigDecimal, quantity: &BigDecimal) -> EtlResult<BigDecimal> {
    if quantity == &BigDecimal::from(0) {
        bail!(
            ErrorKind::ZeroQuantity,
            "Unit price is undefined for a zero quantity"
        );
    }

    Ok(round_price(&(amount / quantity)))
}

/// Formats a price with exactly [`PRICE_SCALE`] fractional digits and no exponent.
pub fn format_price(value: &BigDecimal) -> String {
    round_price(value).to_plain_string()
}
