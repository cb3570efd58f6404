//! Database collaborator: catalog introspection and raw statement execution.
//!
//! The pipeline only needs two capabilities from the store, expressed by
//! [`Database`]. [`PgDatabase`] is the Postgres binding; tests substitute
//! in-memory implementations.

pub mod postgres;
pub mod row;

pub use postgres::PgDatabase;
pub use row::{describe_rows, ResultRow};

use async_trait::async_trait;

/// One row of the column catalog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogColumn {
    pub table_name: String,
    pub column_name: String,
    /// Declared type as the catalog reports it (`integer`, `text`, `ARRAY`, ...)
    pub data_type: String,
    /// Underlying type name; for arrays the element type prefixed with `_`
    pub udt_name: String,
    /// 1-based position within the table
    pub ordinal_position: i32,
}

impl CatalogColumn {
    /// Type as shown to the model: arrays become `elem[]`.
    pub fn display_type(&self) -> String {
        if self.data_type.eq_ignore_ascii_case("ARRAY") {
            let elem = self.udt_name.strip_prefix('_').unwrap_or(&self.udt_name);
            format!("{}[]", elem)
        } else {
            self.data_type.clone()
        }
    }

    pub fn is_array(&self) -> bool {
        self.data_type.eq_ignore_ascii_case("ARRAY")
    }
}

/// Read-only access to a relational store.
#[async_trait]
pub trait Database: Send + Sync {
    /// Enumerate columns of every base table in `schema`, ordered by table
    /// name then ordinal position.
    async fn fetch_catalog(&self, schema: &str) -> Result<Vec<CatalogColumn>, sqlx::Error>;

    /// Execute one statement verbatim and materialize every row.
    async fn execute(&self, sql: &str) -> Result<Vec<ResultRow>, sqlx::Error>;
}
