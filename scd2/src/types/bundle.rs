use std::collections::HashMap;

use crate::types::Cell;

/// A row of a [`SourceTable`], values ordered like the table's columns.
#[derive(Debug, Clone, PartialEq)]
pub struct TableRow {
    values: Vec<Cell>,
}

impl TableRow {
    pub fn new(values: Vec<Cell>) -> Self {
        Self { values }
    }

    /// Returns the row values in table column order.
    pub fn values(&self) -> &[Cell] {
        &self.values
    }

    /// Returns the value at `index`, or [`Cell::Null`] when the row is shorter than the table.
    pub fn value(&self, index: usize) -> &Cell {
        self.values.get(index).unwrap_or(&Cell::Null)
    }
}

/// One named table of source data.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceTable {
    pub name: String,
    pub columns: Vec<String>,
    pub rows: Vec<TableRow>,
}

impl SourceTable {
    pub fn new(name: impl Into<String>, columns: Vec<String>) -> Self {
        Self {
            name: name.into(),
            columns,
            rows: Vec::new(),
        }
    }

    /// Returns the position of `column`, if the table has it.
    pub fn column_index(&self, column: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == column)
    }

    pub fn push_row(&mut self, values: Vec<Cell>) {
        self.rows.push(TableRow::new(values));
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// The named set of tables one run extracts from its source.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SourceBundle {
    tables: HashMap<String, SourceTable>,
}

impl SourceBundle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `table`, replacing any table with the same name.
    pub fn insert(&mut self, table: SourceTable) {
        self.tables.insert(table.name.clone(), table);
    }

    pub fn with_table(mut self, table: SourceTable) -> Self {
        self.insert(table);
        self
    }

    pub fn table(&self, name: &str) -> Option<&SourceTable> {
        self.tables.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tables.contains_key(name)
    }

    pub fn table_names(&self) -> impl Iterator<Item = &str> {
        self.tables.keys().map(String::as_str)
    }

    /// Total number of rows across all tables.
    pub fn total_rows(&self) -> usize {
        self.tables.values().map(SourceTable::len).sum()
    }
}
