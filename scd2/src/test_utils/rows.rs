use bigdecimal::BigDecimal;
use chrono::{DateTime, Datelike, Duration, NaiveDate, TimeZone, Utc};
use std::str::FromStr;

use crate::fingerprint::fingerprint;
use crate::types::{AnalyticalRow, FingerprintedRow};

/// Builds an analytical row with quantity 1, so `amount == unit_price`.
pub fn analytical_row(entity_id: i64, event_date: &str, unit_price: &str) -> AnalyticalRow {
    let event_date = NaiveDate::parse_from_str(event_date, "%Y-%m-%d").unwrap();
    let unit_price = BigDecimal::from_str(unit_price).unwrap();

    AnalyticalRow {
        entity_id,
        name: Some(format!("Book {entity_id}")),
        author: Some("Author 1".to_string()),
        category: Some("Novel".to_string()),
        language: Some("EN".to_string()),
        event_date,
        year: event_date.year(),
        month: event_date.month(),
        quantity: BigDecimal::from(1),
        amount: unit_price.clone(),
        unit_price,
    }
}

pub fn fingerprinted_row(entity_id: i64, event_date: &str, unit_price: &str) -> FingerprintedRow {
    let row = analytical_row(entity_id, event_date, unit_price);
    FingerprintedRow {
        fingerprint: fingerprint(&row),
        row,
    }
}

/// Returns the run timestamp `day` days after 2024-06-01T12:00:00Z.
pub fn run_ts(day: i64) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap() + Duration::days(day)
}
