use chrono::{DateTime, NaiveDate, NaiveDateTime};

use crate::bail;
use crate::error::{ErrorKind, EtlResult};
use crate::types::Cell;

const DATE_FORMAT: &str = "%Y-%m-%d";
const DATETIME_FORMATS: [&str; 3] = ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S%.f"];

/// Coerces a cell to a calendar date.
///
/// Accepts native dates and timestamps (the time part is dropped) and strings in ISO date,
/// ISO date-time or RFC 3339 form.
pub fn cell_to_date(cell: &Cell) -> EtlResult<Option<NaiveDate>> {
    let date = match cell {
        Cell::Null => return Ok(None),
        Cell::Date(date) => *date,
        Cell::Timestamp(timestamp) => timestamp.date(),
        Cell::String(value) => parse_date(value.trim())?,
        Cell::Bool(_) | Cell::I64(_) | Cell::F64(_) | Cell::Numeric(_) => bail!(
            ErrorKind::ConversionError,
            "Could not convert value to a date",
            format!("The value {cell} has an unsupported type")
        ),
    };

    Ok(Some(date))
}

fn parse_date(value: &str) -> EtlResult<NaiveDate> {
    if let Ok(date) = NaiveDate::parse_from_str(value, DATE_FORMAT) {
        return Ok(date);
    }

    for format in DATETIME_FORMATS {
        if let Ok(datetime) = NaiveDateTime::parse_from_str(value, format) {
            return Ok(datetime.date());
        }
    }

    Ok(DateTime::parse_from_rfc3339(value)?.date_naive())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn strings_in_common_formats_parse() {
        assert_eq!(cell_to_date(&Cell::from("2024-01-31")).unwrap(), Some(date(2024, 1, 31)));
        assert_eq!(
            cell_to_date(&Cell::from("2024-01-31 13:45:00")).unwrap(),
            Some(date(2024, 1, 31))
        );
        assert_eq!(
            cell_to_date(&Cell::from("2024-01-31T13:45:00+02:00")).unwrap(),
            Some(date(2024, 1, 31))
        );
    }

    #[test]
    fn native_values_pass_through() {
        let timestamp = date(2023, 6, 1).and_hms_opt(23, 59, 59).unwrap();
        assert_eq!(cell_to_date(&Cell::Timestamp(timestamp)).unwrap(), Some(date(2023, 6, 1)));
        assert_eq!(cell_to_date(&Cell::Date(date(2023, 6, 1))).unwrap(), Some(date(2023, 6, 1)));
        assert_eq!(cell_to_date(&Cell::Null).unwrap(), None);
    }

    #[test]
    fn invalid_dates_fail() {
        for value in ["2024-13-01", "yesterday", ""] {
            let err = cell_to_date(&Cell::from(value)).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::ConversionError, "{value}");
        }
        let err = cell_to_date(&Cell::I64(20240101)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ConversionError);
    }
}
