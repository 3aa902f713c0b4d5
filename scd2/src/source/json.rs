use bigdecimal::BigDecimal;
use serde::Deserialize;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::info;

use crate::error::{ErrorKind, EtlResult};
use crate::source::SourceProvider;
use crate::types::{Cell, SourceBundle, SourceTable};
use crate::{bail, etl_error};

/// On-disk layout: `{"tables": {"<name>": [{"<column>": <value>, ...}, ...]}}`.
#[derive(Debug, Deserialize)]
struct JsonBundle {
    tables: BTreeMap<String, Vec<Map<String, Value>>>,
}

/// Source reading the whole bundle from one JSON file.
///
/// A table's columns are the union of the keys of its rows, in order of first appearance. A row
/// missing a key reads as null there.
#[derive(Debug, Clone)]
pub struct JsonFileSource {
    path: PathBuf,
}

impl JsonFileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SourceProvider for JsonFileSource {
    fn name() -> &'static str {
        "json_file"
    }

    async fn extract(&self) -> EtlResult<SourceBundle> {
        let bytes = tokio::fs::read(&self.path).await.map_err(|err| {
            etl_error!(
                ErrorKind::SourceConnectionFailed,
                "Failed to read source file",
                self.path.display(),
                source: err
            )
        })?;

        let bundle = parse_bundle(&bytes)?;
        info!(
            path = %self.path.display(),
            tables = bundle.table_names().count(),
            rows = bundle.total_rows(),
            "extracted bundle from json file"
        );

        Ok(bundle)
    }
}

/// Parses the JSON bundle layout into a [`SourceBundle`].
pub fn parse_bundle(bytes: &[u8]) -> EtlResult<SourceBundle> {
    let json: JsonBundle = serde_json::from_slice(bytes)?;

    let mut bundle = SourceBundle::new();
    for (name, objects) in json.tables {
        let mut columns: Vec<String> = Vec::new();
        for object in &objects {
            for key in object.keys() {
                if !columns.contains(key) {
                    columns.push(key.clone());
                }
            }
        }

        let mut table = SourceTable::new(name, columns);
        for object in &objects {
            let mut values = Vec::with_capacity(table.columns.len());
            for column in &table.columns {
                values.push(json_to_cell(object.get(column).unwrap_or(&Value::Null))?);
            }
            table.push_row(values);
        }

        bundle.insert(table);
    }

    Ok(bundle)
}

fn json_to_cell(value: &Value) -> EtlResult<Cell> {
    let cell = match value {
        Value::Null => Cell::Null,
        Value::Bool(value) => Cell::Bool(*value),
        Value::Number(number) => match number.as_i64() {
            Some(value) => Cell::I64(value),
            None => Cell::Numeric(BigDecimal::from_str(&number.to_string())?),
        },
        Value::String(value) => Cell::String(value.clone()),
        Value::Array(_) | Value::Object(_) => bail!(
            ErrorKind::DeserializationError,
            "Source values must be scalars",
            format!("Found nested value {value}")
        ),
    };

    Ok(cell)
}
