//! Logging setup and pipeline spans.
//!
//! Span attributes follow the OpenTelemetry semantic conventions so a
//! collector can be bolted on later without renaming fields:
//! - database: https://opentelemetry.io/docs/specs/semconv/database/database-spans/
//! - generation: https://opentelemetry.io/docs/specs/semconv/gen-ai/
//!
//! # Example
//!
//! ```rust,ignore
//! let span = db_query_span("SELECT COUNT(*) FROM teams;", Some("public"));
//! let rows = db.execute(sql).instrument(span.clone()).await?;
//! record_rows(&span, rows.len());
//! ```

use std::str::FromStr;
use tracing::{field, span, Level, Span};
use tracing_subscriber::EnvFilter;

/// Default filter when `RUST_LOG` is unset.
const DEFAULT_FILTER: &str = "sqlchat=info,warn";

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "text" | "pretty" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            other => Err(format!("unknown log format '{}' (expected text or json)", other)),
        }
    }
}

/// Install the global subscriber. Logs go to stderr.
///
/// Safe to call more than once; later calls are no-ops.
pub fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| DEFAULT_FILTER.into());
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false);

    let result = match format {
        LogFormat::Text => builder.try_init(),
        LogFormat::Json => builder.json().try_init(),
    };

    if result.is_ok() {
        tracing::debug!(?format, "logging initialized");
    }
}

/// Which completion call a generation span covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GenerationStage {
    /// Question -> SQL
    Query,
    /// Rows -> prose
    Answer,
}

impl GenerationStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Query => "query",
            Self::Answer => "answer",
        }
    }
}

/// Create span for one completion request.
pub fn llm_span(stage: GenerationStage, model: &str, temperature: f32) -> Span {
    span!(
        Level::INFO,
        "llm",
        otel.name = %format!("text_completion {}", model),
        otel.kind = "client",
        gen_ai.operation.name = "text_completion",
        gen_ai.request.model = model,
        gen_ai.request.temperature = f64::from(temperature),
        sqlchat.stage = stage.as_str(),
        gen_ai.response.chars = field::Empty,
    )
}

/// Create span for the SQL execution of one turn.
///
/// # Arguments
///
/// * `query_text` - Statement as sent to the database
/// * `namespace` - Catalog schema (optional)
pub fn db_query_span(query_text: &str, namespace: Option<&str>) -> Span {
    let span = span!(
        Level::INFO,
        "db.query",
        otel.name = "query",
        otel.kind = "client",
        db.system.name = "postgresql",
        db.operation.name = "query",
        db.query.text = query_text,
        db.namespace = field::Empty,
        db.response.returned_rows = field::Empty,
    );

    if let Some(ns) = namespace {
        span.record("db.namespace", ns);
    }

    span
}

/// Record returned row count on a query span.
pub fn record_rows(span: &Span, rows_returned: usize) {
    span.record("db.response.returned_rows", rows_returned);
}

/// Record completion length on a generation span.
pub fn record_completion(span: &Span, chars: usize) {
    span.record("gen_ai.response.chars", chars);
}
