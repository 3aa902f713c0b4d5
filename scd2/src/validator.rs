//! Structural and semantic checks over a [`SourceBundle`] before any transformation.
//!
//! Checks run in a fixed order and stop at the first violation:
//!
//! 1. every required table is present,
//! 2. the entity lookup and the fact table expose their required columns,
//! 3. no fact foreign key is null,
//! 4. no `(entity_id, event_date)` pair repeats in the fact table,
//! 5. no `quantity` or `amount` is negative.
//!
//! Values that cannot be parsed as numbers are not reported here; the denormalizer rejects them
//! during coercion.

use bigdecimal::BigDecimal;
use scd2_config::shared::{PipelineConfig, SourceSchemaConfig};
use std::collections::HashSet;
use tracing::debug;

use crate::bail;
use crate::conversions::numeric::cell_to_decimal;
use crate::error::{ErrorKind, EtlResult};
use crate::types::{Cell, SourceBundle, SourceTable};

/// Number of offending rows quoted in error details.
pub const ROW_SAMPLE_SIZE: usize = 5;

/// Validates source bundles against a [`SourceSchemaConfig`].
#[derive(Debug, Clone)]
pub struct Validator<'a> {
    schema: &'a SourceSchemaConfig,
    duplicate_sample_size: usize,
}

impl<'a> Validator<'a> {
    pub fn new(schema: &'a SourceSchemaConfig) -> Self {
        Self {
            schema,
            duplicate_sample_size: PipelineConfig::DEFAULT_DUPLICATE_SAMPLE_SIZE,
        }
    }

    /// Sets how many duplicated grain keys the duplicate check reports.
    pub fn with_duplicate_sample_size(mut self, duplicate_sample_size: usize) -> Self {
        self.duplicate_sample_size = duplicate_sample_size;
        self
    }

    /// Runs every check in order, failing on the first violation.
    pub fn validate(&self, bundle: &SourceBundle) -> EtlResult<()> {
        self.check_required_tables(bundle)?;

        let fact = required_table(bundle, &self.schema.fact.table)?;
        let entities = required_table(bundle, &self.schema.entities.table)?;

        self.check_required_columns(fact, entities)?;
        self.check_non_null_keys(fact)?;
        self.check_unique_grain(fact)?;
        self.check_non_negative_measures(fact)?;

        debug!(fact_rows = fact.len(), "source bundle passed validation");

        Ok(())
    }

    fn check_required_tables(&self, bundle: &SourceBundle) -> EtlResult<()> {
        for table in self.schema.required_tables() {
            required_table(bundle, table)?;
        }

        Ok(())
    }

    fn check_required_columns(&self, fact: &SourceTable, entities: &SourceTable) -> EtlResult<()> {
        for column in [
            self.schema.entities.key.as_str(),
            self.schema.entities.value.as_str(),
        ] {
            column_index(entities, column)?;
        }

        for column in self.schema.fact.required_columns() {
            column_index(fact, column)?;
        }

        Ok(())
    }

    fn check_non_null_keys(&self, fact: &SourceTable) -> EtlResult<()> {
        for column in self.schema.fact.foreign_key_columns() {
            let index = column_index(fact, column)?;
            let null_rows: Vec<usize> = fact
                .rows
                .iter()
                .enumerate()
                .filter(|(_, row)| row.value(index).is_null())
                .map(|(position, _)| position)
                .collect();

            if !null_rows.is_empty() {
                bail!(
                    ErrorKind::NullForeignKey,
                    "Fact table foreign key contains NULL",
                    format!(
                        "Column `{}.{column}` is NULL in {} row(s), first rows: {:?}",
                        fact.name,
                        null_rows.len(),
                        &null_rows[..null_rows.len().min(ROW_SAMPLE_SIZE)]
                    )
                );
            }
        }

        Ok(())
    }

    fn check_unique_grain(&self, fact: &SourceTable) -> EtlResult<()> {
        let duplicates = find_duplicate_grain(fact, self.schema, self.duplicate_sample_size)?;
        if duplicates.total == 0 {
            return Ok(());
        }

        let sample = duplicates
            .sample
            .iter()
            .map(|(entity_id, event_date)| {
                format!(
                    "{{{}: {entity_id}, {}: {event_date}}}",
                    self.schema.fact.entity_id, self.schema.fact.event_date
                )
            })
            .collect::<Vec<_>>()
            .join(", ");

        bail!(
            ErrorKind::DuplicateGrain,
            "Duplicate fact records found",
            format!(
                "{} duplicated ({}, {}) pair(s) in `{}`, sample: [{sample}]",
                duplicates.total, self.schema.fact.entity_id, self.schema.fact.event_date, fact.name
            )
        );
    }

    fn check_non_negative_measures(&self, fact: &SourceTable) -> EtlResult<()> {
        for column in [
            self.schema.fact.quantity.as_str(),
            self.schema.fact.amount.as_str(),
        ] {
            let index = column_index(fact, column)?;
            let negative_rows: Vec<(usize, &Cell)> = fact
                .rows
                .iter()
                .enumerate()
                .map(|(position, row)| (position, row.value(index)))
                .filter(|(_, cell)| {
                    matches!(cell_to_decimal(cell), Ok(Some(value)) if value < BigDecimal::from(0))
                })
                .collect();

            if !negative_rows.is_empty() {
                let sample = negative_rows
                    .iter()
                    .take(ROW_SAMPLE_SIZE)
                    .map(|(position, cell)| format!("row {position}: {cell}"))
                    .collect::<Vec<_>>()
                    .join(", ");

                bail!(
                    ErrorKind::NegativeMeasure,
                    "Fact table contains negative values",
                    format!(
                        "Column `{}.{column}` is negative in {} row(s), sample: [{sample}]",
                        fact.name,
                        negative_rows.len()
                    )
                );
            }
        }

        Ok(())
    }
}

/// Duplicated grain keys of a fact table.
#[derive(Debug, Clone, PartialEq)]
pub struct DuplicateGrain {
    /// Number of rows repeating a key that appeared earlier.
    pub total: usize,
    /// The first `limit` repeated `(entity_id, event_date)` pairs, in row order.
    pub sample: Vec<(Cell, Cell)>,
}

/// Finds rows whose `(entity_id, event_date)` pair repeats an earlier row.
///
/// Keys are compared on their rendered source values, before any coercion.
pub fn find_duplicate_grain(
    fact: &SourceTable,
    schema: &SourceSchemaConfig,
    limit: usize,
) -> EtlResult<DuplicateGrain> {
    let entity_index = column_index(fact, &schema.fact.entity_id)?;
    let date_index = column_index(fact, &schema.fact.event_date)?;

    let mut seen = HashSet::with_capacity(fact.len());
    let mut duplicates = DuplicateGrain {
        total: 0,
        sample: Vec::new(),
    };

    for row in &fact.rows {
        let entity_id = row.value(entity_index);
        let event_date = row.value(date_index);

        if !seen.insert((entity_id.to_string(), event_date.to_string())) {
            duplicates.total += 1;
            if duplicates.sample.len() < limit {
                duplicates.sample.push((entity_id.clone(), event_date.clone()));
            }
        }
    }

    Ok(duplicates)
}

/// Returns the table named `name` or a [`ErrorKind::MissingTable`] error.
pub(crate) fn required_table<'b>(bundle: &'b SourceBundle, name: &str) -> EtlResult<&'b SourceTable> {
    match bundle.table(name) {
        Some(table) => Ok(table),
        None => bail!(
            ErrorKind::MissingTable,
            "Missing table in extract output",
            format!("Table `{name}` is required")
        ),
    }
}

/// Returns the position of `column` in `table` or a [`ErrorKind::MissingColumn`] error.
pub(crate) fn column_index(table: &SourceTable, column: &str) -> EtlResult<usize> {
    match table.column_index(column) {
        Some(index) => Ok(index),
        None => bail!(
            ErrorKind::MissingColumn,
            "Source table is missing a required column",
            format!("Table `{}` has no column `{column}`", table.name)
        ),
    }
}
