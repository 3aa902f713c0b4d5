use bigdecimal::BigDecimal;
use chrono::NaiveDate;

use crate::types::Fingerprint;

/// One denormalized fact row: the fact measures joined with every dimension attribute.
///
/// Unique per `(entity_id, event_date)` within a run.
#[derive(Debug, Clone, PartialEq)]
pub struct AnalyticalRow {
    pub entity_id: i64,
    pub name: Option<String>,
    pub author: Option<String>,
    pub category: Option<String>,
    pub language: Option<String>,
    pub event_date: NaiveDate,
    pub year: i32,
    pub month: u32,
    pub quantity: BigDecimal,
    pub amount: BigDecimal,
    /// `amount / quantity`, rounded half-up to two decimals.
    pub unit_price: BigDecimal,
}

/// An [`AnalyticalRow`] paired with the fingerprint of its tracked attributes.
#[derive(Debug, Clone, PartialEq)]
pub struct FingerprintedRow {
    pub row: AnalyticalRow,
    pub fingerprint: Fingerprint,
}

impl FingerprintedRow {
    pub fn entity_id(&self) -> i64 {
        self.row.entity_id
    }
}
