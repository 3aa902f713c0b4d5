use serde::{Deserialize, Serialize};

use crate::shared::ValidationError;

/// Configuration of one SCD2 pipeline.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Name reported to the run-audit sink.
    #[serde(default = "default_pipeline_name")]
    pub name: String,
    /// Destination table holding the versioned history.
    #[serde(default = "default_history_table")]
    pub history_table: String,
    /// Optional flat analytics table fully replaced on every run.
    #[serde(default)]
    pub snapshot_table: Option<String>,
    /// Maximum number of offending keys included in a duplicate-grain error.
    #[serde(default = "default_duplicate_sample_size")]
    pub duplicate_sample_size: usize,
    /// Names of the source tables and columns.
    #[serde(default)]
    pub schema: SourceSchemaConfig,
}

impl PipelineConfig {
    pub const DEFAULT_NAME: &'static str = "book_analytics_scd2";
    pub const DEFAULT_HISTORY_TABLE: &'static str = "book_analytics_scd2";
    pub const DEFAULT_DUPLICATE_SAMPLE_SIZE: usize = 5;

    pub fn validate(&self) -> Result<(), ValidationError> {
        require_name("pipeline.name", &self.name)?;
        require_name("pipeline.history_table", &self.history_table)?;

        if let Some(snapshot_table) = &self.snapshot_table {
            require_name("pipeline.snapshot_table", snapshot_table)?;
            if snapshot_table == &self.history_table {
                return Err(ValidationError::DuplicateTableName {
                    first: "pipeline.history_table".to_string(),
                    second: "pipeline.snapshot_table".to_string(),
                    name: snapshot_table.clone(),
                });
            }
        }

        if self.duplicate_sample_size == 0 {
            return Err(ValidationError::DuplicateSampleSizeZero);
        }

        self.schema.validate()
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            name: default_pipeline_name(),
            history_table: default_history_table(),
            snapshot_table: None,
            duplicate_sample_size: default_duplicate_sample_size(),
            schema: SourceSchemaConfig::default(),
        }
    }
}

fn default_pipeline_name() -> String {
    PipelineConfig::DEFAULT_NAME.to_string()
}

fn default_history_table() -> String {
    PipelineConfig::DEFAULT_HISTORY_TABLE.to_string()
}

const fn default_duplicate_sample_size() -> usize {
    PipelineConfig::DEFAULT_DUPLICATE_SAMPLE_SIZE
}

/// Table and column names of the normalized source bundle.
///
/// The fact table references the entity lookup and the three dimension lookups through foreign
/// keys. Each lookup is keyed by the same column name the fact table uses for it.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct SourceSchemaConfig {
    pub fact: FactTableConfig,
    pub entities: LookupTableConfig,
    pub authors: LookupTableConfig,
    pub categories: LookupTableConfig,
    pub languages: LookupTableConfig,
}

impl SourceSchemaConfig {
    /// Returns the names of every table the bundle must contain.
    pub fn required_tables(&self) -> [&str; 5] {
        [
            self.fact.table.as_str(),
            self.languages.table.as_str(),
            self.entities.table.as_str(),
            self.categories.table.as_str(),
            self.authors.table.as_str(),
        ]
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        self.fact.validate()?;
        for (label, lookup) in [
            ("entities", &self.entities),
            ("authors", &self.authors),
            ("categories", &self.categories),
            ("languages", &self.languages),
        ] {
            lookup.validate(label)?;
        }

        let tables = self.required_tables();
        for (i, first) in tables.iter().enumerate() {
            if let Some(second) = tables[i + 1..].iter().find(|other| *other == first) {
                return Err(ValidationError::DuplicateTableName {
                    first: "schema table".to_string(),
                    second: "schema table".to_string(),
                    name: second.to_string(),
                });
            }
        }

        Ok(())
    }
}

impl Default for SourceSchemaConfig {
    fn default() -> Self {
        Self {
            fact: FactTableConfig::default(),
            entities: LookupTableConfig::new("entity_names", "entity_id", "name"),
            authors: LookupTableConfig::new("author_names", "author_id", "author"),
            categories: LookupTableConfig::new("categories", "category_id", "category"),
            languages: LookupTableConfig::new("languages", "language_id", "language"),
        }
    }
}

/// Column names of the fact table.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct FactTableConfig {
    pub table: String,
    pub entity_id: String,
    pub author_id: String,
    pub category_id: String,
    pub language_id: String,
    pub page_count: String,
    pub event_date: String,
    pub quantity: String,
    pub amount: String,
}

impl FactTableConfig {
    /// Returns every column the fact table must expose.
    pub fn required_columns(&self) -> [&str; 8] {
        [
            self.entity_id.as_str(),
            self.author_id.as_str(),
            self.category_id.as_str(),
            self.language_id.as_str(),
            self.page_count.as_str(),
            self.event_date.as_str(),
            self.quantity.as_str(),
            self.amount.as_str(),
        ]
    }

    /// Returns the foreign key columns that must never be null.
    pub fn foreign_key_columns(&self) -> [&str; 4] {
        [
            self.entity_id.as_str(),
            self.author_id.as_str(),
            self.category_id.as_str(),
            self.language_id.as_str(),
        ]
    }

    fn validate(&self) -> Result<(), ValidationError> {
        require_name("schema.fact.table", &self.table)?;
        for column in self.required_columns() {
            require_name("schema.fact column", column)?;
        }

        Ok(())
    }
}

impl Default for FactTableConfig {
    fn default() -> Self {
        Self {
            table: "fact_table".to_string(),
            entity_id: "entity_id".to_string(),
            author_id: "author_id".to_string(),
            category_id: "category_id".to_string(),
            language_id: "language_id".to_string(),
            page_count: "page_count".to_string(),
            event_date: "event_date".to_string(),
            quantity: "quantity".to_string(),
            amount: "amount".to_string(),
        }
    }
}

/// A dimension lookup table: a key column and the attribute it provides.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct LookupTableConfig {
    pub table: String,
    pub key: String,
    pub value: String,
}

impl LookupTableConfig {
    pub fn new(table: &str, key: &str, value: &str) -> Self {
        Self {
            table: table.to_string(),
            key: key.to_string(),
            value: value.to_string(),
        }
    }

    fn validate(&self, label: &str) -> Result<(), ValidationError> {
        require_name(&format!("schema.{label}.table"), &self.table)?;
        require_name(&format!("schema.{label}.key"), &self.key)?;
        require_name(&format!("schema.{label}.value"), &self.value)
    }
}

fn require_name(field: &str, value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::EmptyName(field.to_string()));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        assert!(PipelineConfig::default().validate().is_ok());
    }

    #[test]
    fn partial_schema_falls_back_to_defaults() {
        let config: PipelineConfig = serde_json::from_str(
            r#"{"schema": {"fact": {"table": "sales"}}, "snapshot_table": "analytics_books"}"#,
        )
        .unwrap();

        assert_eq!(config.name, PipelineConfig::DEFAULT_NAME);
        assert_eq!(config.schema.fact.table, "sales");
        assert_eq!(config.schema.fact.quantity, "quantity");
        assert_eq!(config.schema.languages.table, "languages");
        assert_eq!(config.snapshot_table.as_deref(), Some("analytics_books"));
    }

    #[test]
    fn snapshot_table_must_differ_from_history_table() {
        let config = PipelineConfig {
            snapshot_table: Some(PipelineConfig::DEFAULT_HISTORY_TABLE.to_string()),
            ..Default::default()
        };

        assert!(matches!(
            config.validate(),
            Err(ValidationError::DuplicateTableName { .. })
        ));
    }

    #[test]
    fn lookup_tables_must_be_distinct() {
        let mut config = PipelineConfig::default();
        config.schema.authors.table = config.schema.categories.table.clone();

        assert!(matches!(
            config.validate(),
            Err(ValidationError::DuplicateTableName { .. })
        ));
    }

    #[test]
    fn zero_duplicate_sample_is_rejected() {
        let config = PipelineConfig {
            duplicate_sample_size: 0,
            ..Default::default()
        };

        assert_eq!(
            config.validate(),
            Err(ValidationError::DuplicateSampleSizeZero)
        );
    }
}
