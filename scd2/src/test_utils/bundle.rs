use scd2_config::shared::{LookupTableConfig, SourceSchemaConfig};
use serde_json::{Map, Value, json};
use std::collections::HashSet;

use crate::types::{Cell, SourceBundle, SourceTable};

/// A fact table row with public cells, so tests can overwrite any of them.
#[derive(Debug, Clone)]
pub struct FactRow {
    pub entity_id: Cell,
    pub author_id: Cell,
    pub category_id: Cell,
    pub language_id: Cell,
    pub page_count: Cell,
    pub event_date: Cell,
    pub quantity: Cell,
    pub amount: Cell,
}

/// Builds a fact row pointing at author, category and language 1.
pub fn fact_row(entity_id: i64, event_date: &str, quantity: i64, amount: i64) -> FactRow {
    FactRow {
        entity_id: Cell::I64(entity_id),
        author_id: Cell::I64(1),
        category_id: Cell::I64(1),
        language_id: Cell::I64(1),
        page_count: Cell::I64(320),
        event_date: Cell::from(event_date),
        quantity: Cell::I64(quantity),
        amount: Cell::I64(amount),
    }
}

impl FactRow {
    fn into_cells(self) -> Vec<Cell> {
        vec![
            self.entity_id,
            self.author_id,
            self.category_id,
            self.language_id,
            self.page_count,
            self.event_date,
            self.quantity,
            self.amount,
        ]
    }
}

/// Builds a [`SourceBundle`] laid out like the default [`SourceSchemaConfig`].
///
/// Lookups left empty get a single row for key 1 (`Author 1`, `Novel`, `EN`). Every fact entity
/// without an explicit entity row gets the name `Book <id>` unless
/// [`BundleBuilder::without_auto_entities`] is called.
#[derive(Debug, Clone)]
pub struct BundleBuilder {
    schema: SourceSchemaConfig,
    facts: Vec<FactRow>,
    entities: Vec<(Cell, Cell)>,
    authors: Vec<(Cell, Cell)>,
    categories: Vec<(Cell, Cell)>,
    languages: Vec<(Cell, Cell)>,
    auto_entities: bool,
    removed_tables: Vec<String>,
    removed_columns: Vec<(String, String)>,
}

impl Default for BundleBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl BundleBuilder {
    pub fn new() -> Self {
        Self {
            schema: SourceSchemaConfig::default(),
            facts: Vec::new(),
            entities: Vec::new(),
            authors: Vec::new(),
            categories: Vec::new(),
            languages: Vec::new(),
            auto_entities: true,
            removed_tables: Vec::new(),
            removed_columns: Vec::new(),
        }
    }

    pub fn fact(mut self, row: FactRow) -> Self {
        self.facts.push(row);
        self
    }

    pub fn entity(self, id: i64, name: &str) -> Self {
        self.lookup_row("entity_names", Cell::I64(id), Cell::from(name))
    }

    pub fn author(self, id: i64, name: &str) -> Self {
        self.lookup_row("author_names", Cell::I64(id), Cell::from(name))
    }

    pub fn category(self, id: i64, name: &str) -> Self {
        self.lookup_row("categories", Cell::I64(id), Cell::from(name))
    }

    pub fn language(self, id: i64, name: &str) -> Self {
        self.lookup_row("languages", Cell::I64(id), Cell::from(name))
    }

    /// Appends a raw row to the lookup named `table`.
    pub fn lookup_row(mut self, table: &str, key: Cell, value: Cell) -> Self {
        let rows = if table == self.schema.entities.table {
            &mut self.entities
        } else if table == self.schema.authors.table {
            &mut self.authors
        } else if table == self.schema.categories.table {
            &mut self.categories
        } else if table == self.schema.languages.table {
            &mut self.languages
        } else {
            panic!("unknown lookup table {table}");
        };
        rows.push((key, value));
        self
    }

    /// Stops generating entity rows for fact entities, so unnamed entities get dropped by the join.
    pub fn without_auto_entities(mut self) -> Self {
        self.auto_entities = false;
        self
    }

    pub fn without_table(mut self, table: &str) -> Self {
        self.removed_tables.push(table.to_string());
        self
    }

    pub fn without_column(mut self, table: &str, column: &str) -> Self {
        self.removed_columns
            .push((table.to_string(), column.to_string()));
        self
    }

    pub fn build(self) -> SourceBundle {
        let mut entities = self.entities.clone();
        if self.auto_entities {
            let mut named: HashSet<String> = entities.iter().map(|(key, _)| key.to_string()).collect();
            for fact in &self.facts {
                if let Cell::I64(id) = fact.entity_id
                    && named.insert(id.to_string())
                {
                    entities.push((Cell::I64(id), Cell::String(format!("Book {id}"))));
                }
            }
        }

        let or_default = |rows: &Vec<(Cell, Cell)>, value: &str| {
            if rows.is_empty() {
                vec![(Cell::I64(1), Cell::from(value))]
            } else {
                rows.clone()
            }
        };

        let fact_columns = self
            .schema
            .fact
            .required_columns()
            .iter()
            .map(|column| column.to_string())
            .collect();
        let mut fact = SourceTable::new(self.schema.fact.table.clone(), fact_columns);
        for row in self.facts.iter().cloned() {
            fact.push_row(row.into_cells());
        }

        let bundle = SourceBundle::new()
            .with_table(fact)
            .with_table(lookup_table(&self.schema.entities, entities))
            .with_table(lookup_table(
                &self.schema.authors,
                or_default(&self.authors, "Author 1"),
            ))
            .with_table(lookup_table(
                &self.schema.categories,
                or_default(&self.categories, "Novel"),
            ))
            .with_table(lookup_table(
                &self.schema.languages,
                or_default(&self.languages, "EN"),
            ));

        let tables: Vec<String> = bundle.table_names().map(str::to_string).collect();
        let mut rebuilt = SourceBundle::new();
        for name in tables {
            if self.removed_tables.contains(&name) {
                continue;
            }
            let Some(mut table) = bundle.table(&name).cloned() else {
                continue;
            };
            for (removed_table, column) in &self.removed_columns {
                if *removed_table == name {
                    table = drop_column(table, column);
                }
            }
            rebuilt.insert(table);
        }

        rebuilt
    }
}

fn lookup_table(config: &LookupTableConfig, rows: Vec<(Cell, Cell)>) -> SourceTable {
    let mut table = SourceTable::new(
        config.table.clone(),
        vec![config.key.clone(), config.value.clone()],
    );
    for (key, value) in rows {
        table.push_row(vec![key, value]);
    }
    table
}

fn drop_column(table: SourceTable, column: &str) -> SourceTable {
    let Some(index) = table.column_index(column) else {
        return table;
    };

    let mut columns = table.columns.clone();
    columns.remove(index);
    let mut result = SourceTable::new(table.name.clone(), columns);
    for row in &table.rows {
        let mut values = row.values().to_vec();
        values.remove(index);
        result.push_row(values);
    }
    result
}

/// Renders a bundle in the layout read by [`crate::source::json::JsonFileSource`].
pub fn bundle_to_json(bundle: &SourceBundle) -> Value {
    let mut tables = Map::new();
    for name in bundle.table_names() {
        let Some(table) = bundle.table(name) else {
            continue;
        };
        let rows: Vec<Value> = table
            .rows
            .iter()
            .map(|row| {
                let object: Map<String, Value> = table
                    .columns
                    .iter()
                    .zip(row.values())
                    .map(|(column, cell)| (column.clone(), cell_to_json(cell)))
                    .collect();
                Value::Object(object)
            })
            .collect();
        tables.insert(name.to_string(), Value::Array(rows));
    }

    json!({ "tables": tables })
}

fn cell_to_json(cell: &Cell) -> Value {
    match cell {
        Cell::Null => Value::Null,
        Cell::Bool(value) => json!(value),
        Cell::I64(value) => json!(value),
        Cell::F64(value) => json!(value),
        Cell::Numeric(_) | Cell::String(_) | Cell::Date(_) | Cell::Timestamp(_) => {
            Value::String(cell.to_string())
        }
    }
}
