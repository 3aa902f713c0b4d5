//! Classification of fingerprinted rows against the current history versions.
//!
//! Versions are keyed by entity id alone. Several rows of one entity in a batch are classified
//! independently against the same current version; nothing is deduplicated here.

use std::collections::HashMap;

use crate::types::{CurrentVersion, Fingerprint, FingerprintedRow};

/// A partition of a run's rows by how they relate to the current history.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Classification {
    /// Rows whose entity has no current version.
    pub new: Vec<FingerprintedRow>,
    /// Rows whose fingerprint differs from the entity's current version.
    pub changed: Vec<FingerprintedRow>,
    /// Rows matching the entity's current version. Never written.
    pub unchanged: Vec<FingerprintedRow>,
}

impl Classification {
    /// Total number of classified rows.
    pub fn len(&self) -> usize {
        self.new.len() + self.changed.len() + self.unchanged.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Classifies each row as new, changed or unchanged, keeping input order within each class.
pub fn classify(rows: Vec<FingerprintedRow>, current_versions: &[CurrentVersion]) -> Classification {
    let current: HashMap<i64, Fingerprint> = current_versions
        .iter()
        .map(|version| (version.entity_id, version.fingerprint))
        .collect();

    let mut classification = Classification::default();
    for row in rows {
        match current.get(&row.entity_id()) {
            None => classification.new.push(row),
            Some(fingerprint) if *fingerprint != row.fingerprint => {
                classification.changed.push(row)
            }
            Some(_) => classification.unchanged.push(row),
        }
    }

    classification
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::rows::fingerprinted_row;

    fn current(row: &FingerprintedRow) -> CurrentVersion {
        CurrentVersion {
            entity_id: row.entity_id(),
            fingerprint: row.fingerprint,
        }
    }

    #[test]
    fn rows_are_partitioned_by_current_fingerprint() {
        let unchanged = fingerprinted_row(1, "2024-01-01", "10.00");
        let changed = fingerprinted_row(2, "2024-01-01", "12.00");
        let new = fingerprinted_row(3, "2024-01-01", "5.00");

        let current_versions = vec![
            current(&unchanged),
            current(&fingerprinted_row(2, "2024-01-01", "11.00")),
            current(&fingerprinted_row(4, "2024-01-01", "1.00")),
        ];

        let classification = classify(
            vec![unchanged.clone(), changed.clone(), new.clone()],
            &current_versions,
        );

        assert_eq!(classification.new, vec![new]);
        assert_eq!(classification.changed, vec![changed]);
        assert_eq!(classification.unchanged, vec![unchanged]);
        assert_eq!(classification.len(), 3);
    }

    #[test]
    fn empty_history_makes_everything_new() {
        let rows = vec![
            fingerprinted_row(1, "2024-01-01", "1.00"),
            fingerprinted_row(2, "2024-01-01", "2.00"),
        ];

        let classification = classify(rows.clone(), &[]);
        assert_eq!(classification.new, rows);
        assert!(classification.changed.is_empty());
        assert!(classification.unchanged.is_empty());
    }

    #[test]
    fn classification_is_an_exact_partition() {
        let rows: Vec<_> = (0..20)
            .map(|i| fingerprinted_row(i % 7, &format!("2024-01-{:02}", i + 1), &format!("{}.00", i % 3)))
            .collect();
        let current_versions: Vec<_> = rows.iter().step_by(3).map(current).collect();

        let classification = classify(rows.clone(), &current_versions);
        assert_eq!(classification.len(), rows.len());

        let mut seen: Vec<_> = classification
            .new
            .iter()
            .chain(&classification.changed)
            .chain(&classification.unchanged)
            .map(|row| (row.entity_id(), row.row.event_date))
            .collect();
        seen.sort();
        let mut expected: Vec<_> = rows.iter().map(|row| (row.entity_id(), row.row.event_date)).collect();
        expected.sort();
        assert_eq!(seen, expected);
    }

    #[test]
    fn rows_of_one_entity_are_classified_independently() {
        // Entity-keyed versioning: both dates of entity 1 compare against the same version.
        let first = fingerprinted_row(1, "2024-01-01", "10.00");
        let second = fingerprinted_row(1, "2024-02-01", "12.00");

        let classification = classify(vec![first.clone(), second.clone()], &[current(&first)]);
        assert_eq!(classification.unchanged, vec![first]);
        assert_eq!(classification.changed, vec![second]);

        let classification = classify(
            vec![
                fingerprinted_row(5, "2024-01-01", "1.00"),
                fingerprinted_row(5, "2024-02-01", "2.00"),
            ],
            &[],
        );
        assert_eq!(classification.new.len(), 2);
    }
}
