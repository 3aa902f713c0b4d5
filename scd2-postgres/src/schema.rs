use std::fmt;
use std::str::FromStr;

use pg_escape::quote_identifier;

/// Schema used when a table name is not qualified.
pub const DEFAULT_SCHEMA: &str = "public";

/// Schema-qualified Postgres table name.
#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub struct TableName {
    pub schema: String,
    pub name: String,
}

impl TableName {
    pub fn new(schema: impl Into<String>, name: impl Into<String>) -> TableName {
        Self {
            schema: schema.into(),
            name: name.into(),
        }
    }

    /// Returns the name quoted for interpolation into SQL text.
    pub fn as_quoted_identifier(&self) -> String {
        let quoted_schema = quote_identifier(&self.schema);
        let quoted_name = quote_identifier(&self.name);

        format!("{quoted_schema}.{quoted_name}")
    }

    /// Returns a quoted identifier for an object derived from this table, e.g. an index.
    pub fn derived_identifier(&self, suffix: &str) -> String {
        quote_identifier(&format!("{}_{suffix}", self.name)).into_owned()
    }
}

impl FromStr for TableName {
    type Err = std::convert::Infallible;

    /// Parses `table` or `schema.table`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.split_once('.') {
            Some((schema, name)) => TableName::new(schema, name),
            None => TableName::new(DEFAULT_SCHEMA, s),
        })
    }
}

impl fmt::Display for TableName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.schema, self.name)
    }
}
