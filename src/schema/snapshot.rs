//! Build a [`SchemaDescription`] once per session from the live catalog.

use crate::database::{CatalogColumn, Database};
use crate::types::error::{ChatError, Result};

/// One table with its columns in ordinal order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableDescription {
    pub name: String,
    /// (column name, declared type)
    pub columns: Vec<(String, String)>,
}

impl TableDescription {
    /// Render as `table: col type, col type`.
    pub fn render(&self) -> String {
        let columns = self
            .columns
            .iter()
            .map(|(name, ty)| format!("{} {}", name, ty))
            .collect::<Vec<_>>()
            .join(", ");
        format!("{}: {}", self.name, columns)
    }
}

/// Immutable description of the tables visible to the generator.
///
/// Computed once; there is no refresh, so it goes stale if the schema
/// changes mid-session.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SchemaDescription {
    tables: Vec<TableDescription>,
}

impl SchemaDescription {
    /// Group catalog rows into tables.
    ///
    /// Tables stay in the order they first appear; columns within a table
    /// are sorted by ordinal position.
    pub fn from_catalog(columns: Vec<CatalogColumn>) -> Self {
        let mut tables: Vec<(String, Vec<CatalogColumn>)> = Vec::new();

        for column in columns {
            match tables.iter_mut().find(|(name, _)| *name == column.table_name) {
                Some((_, cols)) => cols.push(column),
                None => tables.push((column.table_name.clone(), vec![column])),
            }
        }

        let tables = tables
            .into_iter()
            .map(|(name, mut cols)| {
                cols.sort_by_key(|c| c.ordinal_position);
                TableDescription {
                    name,
                    columns: cols
                        .iter()
                        .map(|c| (c.column_name.clone(), c.display_type()))
                        .collect(),
                }
            })
            .collect();

        Self { tables }
    }

    pub fn tables(&self) -> &[TableDescription] {
        &self.tables
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    pub fn has_table(&self, name: &str) -> bool {
        self.tables.iter().any(|t| t.name.eq_ignore_ascii_case(name))
    }

    /// One line per table.
    pub fn render(&self) -> String {
        self.tables
            .iter()
            .map(TableDescription::render)
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Reads catalog metadata for one schema.
pub struct SchemaSnapshotter {
    schema_name: String,
}

impl SchemaSnapshotter {
    pub fn new(schema_name: impl Into<String>) -> Self {
        Self {
            schema_name: schema_name.into(),
        }
    }

    /// Snapshot every base table of the configured schema.
    ///
    /// # Errors
    ///
    /// Returns `ChatError::SchemaFetch` if the catalog query fails or finds
    /// no tables. There is no retry.
    pub async fn snapshot(&self, db: &dyn Database) -> Result<SchemaDescription> {
        let columns = db.fetch_catalog(&self.schema_name).await.map_err(|e| {
            ChatError::SchemaFetch(format!("catalog query failed: {}", e))
        })?;

        let description = SchemaDescription::from_catalog(columns);
        if description.is_empty() {
            return Err(ChatError::SchemaFetch(format!(
                "no tables found in schema '{}'",
                self.schema_name
            )));
        }

        tracing::info!(
            schema = %self.schema_name,
            tables = description.tables().len(),
            "Schema snapshot taken"
        );
        Ok(description)
    }
}
