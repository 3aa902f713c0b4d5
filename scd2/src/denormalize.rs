//! Joins fact rows with their dimension lookups into flat [`AnalyticalRow`]s.
//!
//! Coercion is strict: an unparsable date or measure fails the whole batch, and so does a zero
//! quantity since no unit price exists for it. Joins are inner joins: a fact row whose key has
//! no lookup entry is dropped. A lookup with duplicate keys fans rows out, which the final grain
//! check turns into a hard failure.

use bigdecimal::BigDecimal;
use chrono::{Datelike, NaiveDate};
use scd2_config::shared::{LookupTableConfig, SourceSchemaConfig};
use std::collections::{HashMap, HashSet};
use tracing::debug;

use crate::bail;
use crate::conversions::date::cell_to_date;
use crate::conversions::integer::cell_to_i64;
use crate::conversions::numeric::{cell_to_decimal, unit_price};
use crate::conversions::text::cell_to_text;
use crate::error::{ErrorKind, EtlError, EtlResult};
use crate::types::{AnalyticalRow, Cell, SourceBundle, SourceTable};
use crate::validator::{ROW_SAMPLE_SIZE, column_index, required_table};

/// Fact columns after coercion, one entry per source row.
#[derive(Debug)]
struct CoercedFact {
    entity_id: i64,
    author_id: i64,
    category_id: i64,
    language_id: i64,
    event_date: NaiveDate,
    quantity: BigDecimal,
    amount: BigDecimal,
}

/// Dimension values by key. Duplicate keys keep every value.
type Lookup = HashMap<i64, Vec<Option<String>>>;

/// Produces the analytical snapshot of a validated [`SourceBundle`].
#[derive(Debug, Clone)]
pub struct Denormalizer<'a> {
    schema: &'a SourceSchemaConfig,
}

impl<'a> Denormalizer<'a> {
    pub fn new(schema: &'a SourceSchemaConfig) -> Self {
        Self { schema }
    }

    /// Coerces, joins and grain-checks the fact table of `bundle`.
    ///
    /// Output rows keep the fact table's row order.
    pub fn denormalize(&self, bundle: &SourceBundle) -> EtlResult<Vec<AnalyticalRow>> {
        let fact = required_table(bundle, &self.schema.fact.table)?;
        let facts = self.coerce_facts(fact)?;

        let entities = load_lookup(bundle, &self.schema.entities)?;
        let authors = load_lookup(bundle, &self.schema.authors)?;
        let categories = load_lookup(bundle, &self.schema.categories)?;
        let languages = load_lookup(bundle, &self.schema.languages)?;

        let mut rows = Vec::with_capacity(facts.len());
        let mut dropped = 0usize;
        for fact in &facts {
            let joined = join_one(fact, &entities, &authors, &categories, &languages, &mut rows)?;
            if joined == 0 {
                dropped += 1;
            }
        }

        debug!(
            fact_rows = facts.len(),
            analytical_rows = rows.len(),
            dropped_rows = dropped,
            "denormalized fact table"
        );

        check_output_grain(&rows)?;

        Ok(rows)
    }

    fn coerce_facts(&self, fact: &SourceTable) -> EtlResult<Vec<CoercedFact>> {
        let columns = &self.schema.fact;

        let event_dates = coerce_column(fact, &columns.event_date, cell_to_date)?;
        let quantities = coerce_column(fact, &columns.quantity, cell_to_decimal)?;
        let amounts = coerce_column(fact, &columns.amount, cell_to_decimal)?;

        let entity_ids = coerce_column(fact, &columns.entity_id, cell_to_i64)?;
        let author_ids = coerce_column(fact, &columns.author_id, cell_to_i64)?;
        let category_ids = coerce_column(fact, &columns.category_id, cell_to_i64)?;
        let language_ids = coerce_column(fact, &columns.language_id, cell_to_i64)?;

        let zero = BigDecimal::from(0);
        let zero_rows: Vec<usize> = quantities
            .iter()
            .enumerate()
            .filter(|(_, quantity)| **quantity == zero)
            .map(|(position, _)| position)
            .collect();
        if !zero_rows.is_empty() {
            bail!(
                ErrorKind::ZeroQuantity,
                "Unit price is undefined for a zero quantity",
                format!(
                    "Column `{}.{}` is zero in {} row(s), first rows: {:?}",
                    fact.name,
                    columns.quantity,
                    zero_rows.len(),
                    &zero_rows[..zero_rows.len().min(ROW_SAMPLE_SIZE)]
                )
            );
        }

        let mut facts = Vec::with_capacity(fact.len());
        for (position, (quantity, amount)) in quantities.into_iter().zip(amounts).enumerate() {
            facts.push(CoercedFact {
                entity_id: entity_ids[position],
                author_id: author_ids[position],
                category_id: category_ids[position],
                language_id: language_ids[position],
                event_date: event_dates[position],
                quantity,
                amount,
            });
        }

        Ok(facts)
    }
}

/// Coerces every value of `column`, failing with a sample of the rows that could not be.
///
/// Nulls count as invalid: a fact row needs every coerced column.
fn coerce_column<T>(
    table: &SourceTable,
    column: &str,
    convert: impl Fn(&Cell) -> EtlResult<Option<T>>,
) -> EtlResult<Vec<T>> {
    let index = column_index(table, column)?;

    let mut values = Vec::with_capacity(table.len());
    let mut invalid = Vec::new();
    let mut first_error: Option<EtlError> = None;

    for (position, row) in table.rows.iter().enumerate() {
        let cell = row.value(index);
        match convert(cell) {
            Ok(Some(value)) => values.push(value),
            Ok(None) => invalid.push((position, cell)),
            Err(err) => {
                invalid.push((position, cell));
                if first_error.is_none() {
                    first_error = Some(err);
                }
            }
        }
    }

    if invalid.is_empty() {
        return Ok(values);
    }

    let sample = invalid
        .iter()
        .take(ROW_SAMPLE_SIZE)
        .map(|(position, cell)| format!("row {position}: {cell}"))
        .collect::<Vec<_>>()
        .join(", ");
    let detail = format!(
        "Column `{}.{column}` has {} invalid value(s), sample: [{sample}]",
        table.name,
        invalid.len()
    );

    let error = crate::etl_error!(
        ErrorKind::ConversionError,
        "Fact table contains invalid values",
        detail = detail
    );
    match first_error {
        Some(source) => Err(error.with_source(source)),
        None => Err(error),
    }
}

/// Reads a lookup table into a key to values map.
///
/// Rows with a null key can never match a fact row and are skipped.
fn load_lookup(bundle: &SourceBundle, config: &LookupTableConfig) -> EtlResult<Lookup> {
    let table = required_table(bundle, &config.table)?;
    let key_index = column_index(table, &config.key)?;
    let value_index = column_index(table, &config.value)?;

    let mut lookup = Lookup::with_capacity(table.len());
    for row in &table.rows {
        let Some(key) = cell_to_i64(row.value(key_index))? else {
            continue;
        };
        lookup
            .entry(key)
            .or_default()
            .push(cell_to_text(row.value(value_index)));
    }

    Ok(lookup)
}

/// Emits the joined rows of one fact into `out` and returns how many were emitted.
fn join_one(
    fact: &CoercedFact,
    entities: &Lookup,
    authors: &Lookup,
    categories: &Lookup,
    languages: &Lookup,
    out: &mut Vec<AnalyticalRow>,
) -> EtlResult<usize> {
    let (Some(names), Some(author_names), Some(category_names), Some(language_names)) = (
        entities.get(&fact.entity_id),
        authors.get(&fact.author_id),
        categories.get(&fact.category_id),
        languages.get(&fact.language_id),
    ) else {
        return Ok(0);
    };

    let unit_price = unit_price(&fact.amount, &fact.quantity)?;

    let mut emitted = 0;
    for name in names {
        for author in author_names {
            for category in category_names {
                for language in language_names {
                    out.push(AnalyticalRow {
                        entity_id: fact.entity_id,
                        name: name.clone(),
                        author: author.clone(),
                        category: category.clone(),
                        language: language.clone(),
                        event_date: fact.event_date,
                        year: fact.event_date.year(),
                        month: fact.event_date.month(),
                        quantity: fact.quantity.clone(),
                        amount: fact.amount.clone(),
                        unit_price: unit_price.clone(),
                    });
                    emitted += 1;
                }
            }
        }
    }

    Ok(emitted)
}

/// Fails when any `(entity_id, event_date)` pair appears more than once.
fn check_output_grain(rows: &[AnalyticalRow]) -> EtlResult<()> {
    let mut seen = HashSet::with_capacity(rows.len());
    let mut duplicates = Vec::new();
    for row in rows {
        if !seen.insert((row.entity_id, row.event_date)) {
            duplicates.push((row.entity_id, row.event_date));
        }
    }

    if duplicates.is_empty() {
        return Ok(());
    }

    let sample = duplicates
        .iter()
        .take(ROW_SAMPLE_SIZE)
        .map(|(entity_id, event_date)| format!("({entity_id}, {event_date})"))
        .collect::<Vec<_>>()
        .join(", ");

    bail!(
        ErrorKind::PostJoinGrainViolation,
        "Output is not one row per entity and event date",
        format!(
            "{} duplicated row(s) after joining dimensions, sample: [{sample}]",
            duplicates.len()
        )
    );
}
