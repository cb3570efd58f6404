//! Query Generator: compiled prompt -> one SQL statement.

use super::client::{CompletionBackend, CompletionRequest, DecodingParams};
use crate::telemetry::{llm_span, record_completion, GenerationStage};
use crate::types::error::{ChatError, Result};
use std::fmt;
use std::sync::Arc;
use tracing::Instrument;

/// A single generated SQL statement terminated by `;`.
///
/// The terminator is guaranteed by construction; that the text is valid
/// SQL is not. See [`crate::query::QueryGuard`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedQuery(String);

impl GeneratedQuery {
    /// Normalize raw completion text.
    ///
    /// Strips a markdown code fence, trims whitespace and a leading `SQL:`
    /// label, cuts after the first `;` (for backends that ignore the stop
    /// sequence) and appends the terminator when the stop sequence
    /// swallowed it.
    ///
    /// Returns `None` if nothing is left.
    pub fn from_completion(raw: &str) -> Option<Self> {
        let mut text = strip_code_fence(raw);
        if let Some(rest) = text.strip_prefix("SQL:") {
            text = rest.trim_start();
        }
        if let Some(end) = text.find(';') {
            text = &text[..end];
        }

        let text = text.trim();
        if text.is_empty() {
            return None;
        }
        Some(Self(format!("{};", text)))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

/// Inner text of a markdown code fence, with or without a language tag.
/// The closing fence is optional; the stop sequence usually cuts it off.
fn strip_code_fence(text: &str) -> &str {
    let text = text.trim();
    let Some(fenced) = text.strip_prefix("```") else {
        return text;
    };

    let inner = fenced.find('\n').map_or("", |i| &fenced[i + 1..]);
    let end = inner.rfind("```").unwrap_or(inner.len());
    inner[..end].trim()
}

impl fmt::Display for GeneratedQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for GeneratedQuery {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Calls the completion backend with deterministic decoding.
pub struct QueryGenerator {
    backend: Arc<dyn CompletionBackend>,
    max_tokens: u32,
}

impl QueryGenerator {
    pub fn new(backend: Arc<dyn CompletionBackend>, max_tokens: u32) -> Self {
        Self {
            backend,
            max_tokens,
        }
    }

    /// Decoding used for every SQL completion: temperature 0, top-p 1,
    /// stop at `;`.
    pub fn params(&self) -> DecodingParams {
        DecodingParams::deterministic(self.max_tokens)
    }

    /// Generate one SQL statement.
    ///
    /// # Errors
    ///
    /// Returns `ChatError::Generation` if the completion call fails or
    /// yields no text. No retry, no fallback model.
    pub async fn generate(&self, prompt: &str) -> Result<GeneratedQuery> {
        let request = CompletionRequest {
            prompt: prompt.to_string(),
            params: self.params(),
        };
        let span = llm_span(GenerationStage::Query, self.backend.model(), request.params.temperature);

        let raw = self
            .backend
            .complete(&request)
            .instrument(span.clone())
            .await
            .map_err(|e| ChatError::Generation(e.to_string()))?;
        record_completion(&span, raw.len());

        let query = GeneratedQuery::from_completion(&raw).ok_or_else(|| {
            ChatError::Generation("completion contained no SQL statement".to_string())
        })?;

        tracing::info!(sql = %query, "Query generated");
        Ok(query)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::LlmError;
    use async_trait::async_trait;
    use std::sync::Mutex;

    struct FixedBackend {
        reply: std::result::Result<String, String>,
        seen: Mutex<Vec<CompletionRequest>>,
    }

    impl FixedBackend {
        fn replying(reply: &str) -> Arc<Self> {
            Arc::new(Self {
                reply: Ok(reply.to_string()),
                seen: Mutex::new(Vec::new()),
            })
        }

        fn failing(message: &str) -> Arc<Self> {
            Arc::new(Self {
                reply: Err(message.to_string()),
                seen: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl CompletionBackend for FixedBackend {
        fn model(&self) -> &str {
            "fixed"
        }

        async fn complete(&self, request: &CompletionRequest) -> std::result::Result<String, LlmError> {
            self.seen.lock().unwrap().push(request.clone());
            self.reply.clone().map_err(LlmError::Transport)
        }
    }

    #[test]
    fn test_appends_missing_semicolon() {
        let q = GeneratedQuery::from_completion("  SELECT COUNT(*) FROM teams  \n").unwrap();
        assert_eq!(q.as_str(), "SELECT COUNT(*) FROM teams;");
    }

    #[test]
    fn test_keeps_existing_semicolon() {
        let q = GeneratedQuery::from_completion("SELECT 1;").unwrap();
        assert_eq!(q.as_str(), "SELECT 1;");
    }

    #[test]
    fn test_cuts_after_first_statement() {
        let q = GeneratedQuery::from_completion("SELECT 1; DROP TABLE teams;").unwrap();
        assert_eq!(q.as_str(), "SELECT 1;");
    }

    #[test]
    fn test_strips_label() {
        let q = GeneratedQuery::from_completion("SQL: SELECT name FROM teams").unwrap();
        assert_eq!(q.to_string(), "SELECT name FROM teams;");
    }

    #[test]
    fn test_strips_code_fence() {
        let q = GeneratedQuery::from_completion("```sql\nSELECT 1\n```").unwrap();
        assert_eq!(q.as_str(), "SELECT 1;");

        let q = GeneratedQuery::from_completion("```\nSELECT name FROM teams").unwrap();
        assert_eq!(q.as_str(), "SELECT name FROM teams;");
    }

    #[test]
    fn test_empty_completion() {
        assert!(GeneratedQuery::from_completion("   ").is_none());
        assert!(GeneratedQuery::from_completion(";").is_none());
        assert!(GeneratedQuery::from_completion("```sql\n```").is_none());
    }

    #[tokio::test]
    async fn test_generate_is_deterministic() {
        let backend = FixedBackend::replying(" SELECT COUNT(*) FROM teams");
        let generator = QueryGenerator::new(backend.clone(), 200);

        let first = generator.generate("prompt").await.unwrap();
        let second = generator.generate("prompt").await.unwrap();
        assert_eq!(first, second);
        assert_eq!(first.as_str(), "SELECT COUNT(*) FROM teams;");

        let seen = backend.seen.lock().unwrap();
        assert_eq!(seen[0], seen[1]);
        assert_eq!(seen[0].params.temperature, 0.0);
        assert_eq!(seen[0].params.top_p, 1.0);
        assert_eq!(seen[0].params.stop.as_deref(), Some(";"));
        assert_eq!(seen[0].params.max_tokens, 200);
    }

    #[tokio::test]
    async fn test_backend_failure_is_generation_error() {
        let generator = QueryGenerator::new(FixedBackend::failing("connection reset"), 200);
        let err = generator.generate("prompt").await.unwrap_err();
        match err {
            ChatError::Generation(msg) => assert!(msg.contains("connection reset")),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_blank_completion_is_generation_error() {
        let generator = QueryGenerator::new(FixedBackend::replying("\n\n"), 200);
        assert!(matches!(
            generator.generate("prompt").await,
            Err(ChatError::Generation(_))
        ));
    }
}
