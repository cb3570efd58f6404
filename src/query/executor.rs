//! Query Executor: run a generated statement and materialize its rows.

use crate::database::{Database, ResultRow};
use crate::llm::GeneratedQuery;
use crate::telemetry::{db_query_span, record_rows};
use crate::types::error::{ChatError, Result};
use std::sync::Arc;
use tracing::Instrument;

/// Executes statements verbatim against the session's database.
pub struct QueryExecutor {
    db: Arc<dyn Database>,
    namespace: String,
}

impl QueryExecutor {
    pub fn new(db: Arc<dyn Database>, namespace: impl Into<String>) -> Self {
        Self {
            db,
            namespace: namespace.into(),
        }
    }

    /// Run one statement. An empty result is success, not an error.
    ///
    /// # Errors
    ///
    /// Returns `ChatError::Execution` carrying the driver's message verbatim
    /// (syntax errors, unknown tables/columns, type mismatches, permission
    /// errors). No retry and no partial rows.
    pub async fn execute(&self, query: &GeneratedQuery) -> Result<Vec<ResultRow>> {
        let span = db_query_span(query.as_str(), Some(&self.namespace));

        let rows = self
            .db
            .execute(query.as_str())
            .instrument(span.clone())
            .await
            .map_err(|e| {
                tracing::warn!(sql = %query, error = %e, "Query execution failed");
                ChatError::Execution {
                    query: query.to_string(),
                    message: e.to_string(),
                }
            })?;

        record_rows(&span, rows.len());
        tracing::info!(rows = rows.len(), "Query executed");
        Ok(rows)
    }
}
