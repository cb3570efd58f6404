//! Error types for the text-to-SQL pipeline.
//!
//! Every variant names the stage that raised it. Stages catch their own
//! failures and convert them here, so nothing crosses a stage boundary
//! untyped.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, ChatError>;

#[derive(Error, Debug)]
pub enum ChatError {
    /// Catalog introspection failed or returned no tables.
    #[error("Schema fetch error: {0}")]
    SchemaFetch(String),

    /// The completion call for SQL generation failed or returned nothing usable.
    #[error("Generation error: {0}")]
    Generation(String),

    /// Generated SQL rejected by the static guard before execution.
    #[error("Rejected query `{query}`: {reason}")]
    UnsafeQuery { query: String, reason: String },

    /// The database refused the generated statement.
    #[error("Execution error: {message}")]
    Execution { query: String, message: String },

    /// The completion call for answer synthesis failed.
    #[error("Synthesis error: {0}")]
    Synthesis(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Question is empty")]
    EmptyQuestion,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ChatError {
    /// Pipeline stage the error originated in (used as a log field).
    pub fn stage(&self) -> &'static str {
        match self {
            Self::SchemaFetch(_) => "schema",
            Self::Generation(_) => "generation",
            Self::UnsafeQuery { .. } | Self::Execution { .. } => "execution",
            Self::Synthesis(_) => "synthesis",
            Self::Config(_) | Self::Io(_) | Self::Json(_) => "config",
            Self::EmptyQuestion => "input",
        }
    }

    /// SQL text attached to execution-stage errors.
    pub fn query(&self) -> Option<&str> {
        match self {
            Self::UnsafeQuery { query, .. } | Self::Execution { query, .. } => Some(query),
            _ => None,
        }
    }
}
