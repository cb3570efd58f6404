//! sqlchat - conversational text-to-SQL over a legal-firm directory.
//!
//! Each turn runs one pipeline: the question joins the transcript, a
//! schema-grounded prompt is compiled, the model writes one SQL statement
//! deterministically, the statement is checked and executed, and a second
//! completion turns the rows into prose.
//!
//! ```rust,ignore
//! let config = Config::load(None)?;
//! let mut session = ChatSession::connect(&config).await?;
//! let turn = session.handle_turn("How many team members are there in total?").await?;
//! println!("{}\n{}", turn.query, turn.answer);
//! ```

pub mod config;
pub mod conversation;
pub mod database;
pub mod llm;
pub mod prompt;
pub mod query;
pub mod schema;
pub mod session;
pub mod telemetry;
mod types;

pub use config::{Config, EmptyResultPolicy, LlmConfig};
pub use conversation::{ConversationEntry, ConversationState, ConversationTurn};
pub use database::{CatalogColumn, Database, PgDatabase, ResultRow};
pub use llm::{CompletionBackend, CompletionRequest, DecodingParams, GeneratedQuery, LlmClient, LlmError, LlmProvider};
pub use schema::SchemaDescription;
pub use session::{ChatSession, TurnOutcome, TurnPhase};
pub use types::{ChatError, Result};
