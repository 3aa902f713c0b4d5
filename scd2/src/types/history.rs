use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use std::fmt;
use std::str::FromStr;

use crate::conversions::hex::{decode_hex, encode_hex};
use crate::error::EtlError;
use crate::types::FingerprintedRow;

/// 128-bit content digest over the tracked attributes of an entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Fingerprint([u8; 16]);

impl Fingerprint {
    pub const fn from_bytes(bytes: [u8; 16]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 16] {
        &self.0
    }
}

/// Formats as 32 lowercase hex digits.
impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&encode_hex(&self.0))
    }
}

impl FromStr for Fingerprint {
    type Err = EtlError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        decode_hex(s).map(Fingerprint)
    }
}

/// The `(entity_id, fingerprint)` pair of a current history version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CurrentVersion {
    pub entity_id: i64,
    pub fingerprint: Fingerprint,
}

/// One row of the SCD2 history table.
///
/// `effective_to` is `None` exactly when `is_current` is true. Closed versions are never
/// modified again.
#[derive(Debug, Clone, PartialEq)]
pub struct VersionedRecord {
    pub entity_id: i64,
    pub name: Option<String>,
    pub author: Option<String>,
    pub category: Option<String>,
    pub language: Option<String>,
    pub unit_price: BigDecimal,
    pub fingerprint: Fingerprint,
    pub effective_from: DateTime<Utc>,
    pub effective_to: Option<DateTime<Utc>>,
    pub is_current: bool,
}

impl VersionedRecord {
    /// Builds the open version of `row` starting at `effective_from`.
    pub fn current(row: &FingerprintedRow, effective_from: DateTime<Utc>) -> Self {
        Self {
            entity_id: row.row.entity_id,
            name: row.row.name.clone(),
            author: row.row.author.clone(),
            category: row.row.category.clone(),
            language: row.row.language.clone(),
            unit_price: row.row.unit_price.clone(),
            fingerprint: row.fingerprint,
            effective_from,
            effective_to: None,
            is_current: true,
        }
    }

    /// Marks this version as superseded at `effective_to`.
    pub fn close(&mut self, effective_to: DateTime<Utc>) {
        self.effective_to = Some(effective_to);
        self.is_current = false;
    }
}
