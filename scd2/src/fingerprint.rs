//! Content fingerprints over the tracked attributes of an analytical row.
//!
//! The tracked attributes are name, author, category, language and unit price, in that order.
//! Nulls hash as the empty string and the price is formatted with a fixed number of decimals, so
//! equal values always hash equally regardless of how the source represented them.

use md5::{Digest, Md5};

use crate::conversions::numeric::format_price;
use crate::types::{AnalyticalRow, Fingerprint, FingerprintedRow};

/// Separator between tracked attributes in the hashed payload.
pub const FIELD_DELIMITER: &str = "||";

/// Returns the string the fingerprint of `row` is computed over.
pub fn fingerprint_payload(row: &AnalyticalRow) -> String {
    let price = format_price(&row.unit_price);
    let fields = [
        row.name.as_deref().unwrap_or(""),
        row.author.as_deref().unwrap_or(""),
        row.category.as_deref().unwrap_or(""),
        row.language.as_deref().unwrap_or(""),
        price.as_str(),
    ];

    fields.join(FIELD_DELIMITER)
}

/// Computes the MD5 fingerprint of the tracked attributes of `row`.
pub fn fingerprint(row: &AnalyticalRow) -> Fingerprint {
    let digest = Md5::digest(fingerprint_payload(row).as_bytes());

    let mut bytes = [0u8; 16];
    bytes.copy_from_slice(&digest);

    Fingerprint::from_bytes(bytes)
}

/// Pairs every row with its fingerprint, keeping input order.
pub fn fingerprint_rows(rows: &[AnalyticalRow]) -> Vec<FingerprintedRow> {
    rows.iter()
        .map(|row| FingerprintedRow {
            fingerprint: fingerprint(row),
            row: row.clone(),
        })
        .collect()
}
