//! Chat session: the per-turn state machine over all pipeline stages.
//!
//! ```text
//! Idle -> AwaitingQuery -> QueryGenerated -> Executed -> AnswerGenerated -> Idle
//! ```
//!
//! Any failure returns the session to `Idle` without an answer entry; the
//! question stays in the transcript, flagged as unanswered.

use crate::config::Config;
use crate::conversation::ConversationState;
use crate::database::{Database, PgDatabase, ResultRow};
use crate::llm::{AnswerSynthesizer, CompletionBackend, GeneratedQuery, LlmClient, QueryGenerator};
use crate::prompt::PromptCompiler;
use crate::query::{QueryExecutor, QueryGuard};
use crate::schema::{SchemaDescription, SchemaSnapshotter};
use crate::types::error::{ChatError, Result};
use std::sync::Arc;
use uuid::Uuid;

/// Where the current turn is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnPhase {
    Idle,
    AwaitingQuery,
    QueryGenerated,
    Executed,
    AnswerGenerated,
}

/// Everything a successful turn produced, in display order.
#[derive(Debug, Clone)]
pub struct TurnOutcome {
    pub question: String,
    pub query: GeneratedQuery,
    pub rows: Vec<ResultRow>,
    pub answer: String,
}

/// One user's conversation over one database and one completion backend.
pub struct ChatSession {
    id: Uuid,
    schema: SchemaDescription,
    conversation: ConversationState,
    compiler: PromptCompiler,
    generator: QueryGenerator,
    guard: QueryGuard,
    executor: QueryExecutor,
    synthesizer: AnswerSynthesizer,
    phase: TurnPhase,
}

impl ChatSession {
    /// Connect to Postgres and the configured completion API, then start.
    ///
    /// # Errors
    ///
    /// Returns `ChatError::Config` for incomplete configuration or an
    /// unreachable database, and `ChatError::SchemaFetch` if the schema
    /// snapshot fails
    pub async fn connect(config: &Config) -> Result<Self> {
        config.validate()?;

        let backend = Arc::new(LlmClient::from_config(&config.llm)?);
        let url = config.database_url.as_deref().unwrap_or_default();
        let db = PgDatabase::connect(url)
            .await
            .map_err(|e| ChatError::Config(format!("cannot connect to database: {}", e)))?;

        Self::start(config, backend, Arc::new(db)).await
    }

    /// Snapshot the schema and open a session seeded with the greeting.
    ///
    /// The snapshot is taken exactly once; the session is not created if it
    /// fails or comes back empty.
    pub async fn start(
        config: &Config,
        backend: Arc<dyn CompletionBackend>,
        db: Arc<dyn Database>,
    ) -> Result<Self> {
        let id = Uuid::new_v4();
        let schema = SchemaSnapshotter::new(&config.schema_name)
            .snapshot(db.as_ref())
            .await?;

        for table in &config.permitted_tables {
            if !schema.has_table(table) {
                tracing::warn!(%table, "Permitted table not found in schema snapshot");
            }
        }

        tracing::info!(session_id = %id, model = backend.model(), "Session started");

        Ok(Self {
            id,
            schema,
            conversation: ConversationState::with_greeting(config.greeting.clone()),
            compiler: PromptCompiler::new(config.permitted_tables.clone(), config.history_window),
            generator: QueryGenerator::new(backend.clone(), config.llm.query_max_tokens),
            guard: QueryGuard::new(&config.permitted_tables, &config.schema_name),
            executor: QueryExecutor::new(db, &config.schema_name),
            synthesizer: AnswerSynthesizer::new(
                backend,
                config.llm.answer_temperature,
                config.llm.answer_max_tokens,
            )
            .with_empty_result(config.empty_result),
            phase: TurnPhase::Idle,
        })
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn schema(&self) -> &SchemaDescription {
        &self.schema
    }

    pub fn conversation(&self) -> &ConversationState {
        &self.conversation
    }

    pub fn phase(&self) -> TurnPhase {
        self.phase
    }

    /// Answer one question.
    ///
    /// On success the transcript grows by a question and an answer. On
    /// failure it grows by the question alone, which is flagged as
    /// unanswered, and the stage error is returned. A blank question is
    /// rejected before anything is recorded.
    #[tracing::instrument(skip(self), fields(session_id = %self.id))]
    pub async fn handle_turn(&mut self, question: &str) -> Result<TurnOutcome> {
        let question = question.trim();
        if question.is_empty() {
            return Err(ChatError::EmptyQuestion);
        }

        let index = self.conversation.push_question(question);
        self.phase = TurnPhase::AwaitingQuery;

        match self.run_turn(question).await {
            Ok((query, rows, answer)) => {
                self.conversation.push_answer(answer.clone());
                self.phase = TurnPhase::Idle;
                Ok(TurnOutcome {
                    question: question.to_string(),
                    query,
                    rows,
                    answer,
                })
            }
            Err(err) => {
                tracing::warn!(stage = err.stage(), error = %err, "Turn failed");
                self.conversation.mark_unanswered(index);
                self.phase = TurnPhase::Idle;
                Err(err)
            }
        }
    }

    async fn run_turn(&mut self, question: &str) -> Result<(GeneratedQuery, Vec<ResultRow>, String)> {
        let prompt = self.compiler.compile(question, &self.schema, &self.conversation);
        let query = self.generator.generate(&prompt).await?;
        self.advance(TurnPhase::QueryGenerated);

        self.guard.check(&query)?;
        let rows = self.executor.execute(&query).await?;
        self.advance(TurnPhase::Executed);

        let answer = self.synthesizer.synthesize(question, &rows).await?;
        self.advance(TurnPhase::AnswerGenerated);

        Ok((query, rows, answer))
    }

    fn advance(&mut self, phase: TurnPhase) {
        tracing::debug!(from = ?self.phase, to = ?phase, "Turn phase");
        self.phase = phase;
    }
}
