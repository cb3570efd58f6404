//! Answer Synthesizer: question + rows -> prose.

use super::client::{CompletionBackend, CompletionRequest, DecodingParams};
use crate::config::EmptyResultPolicy;
use crate::database::ResultRow;
use crate::prompt::AnswerPrompt;
use crate::telemetry::{llm_span, record_completion, GenerationStage};
use crate::types::error::{ChatError, Result};
use std::sync::Arc;
use tracing::Instrument;

/// Reply used by [`EmptyResultPolicy::Canned`].
pub const NO_RESULTS_ANSWER: &str = "I couldn't find any matching records for that question.";

/// Calls the completion backend with mildly stochastic decoding.
pub struct AnswerSynthesizer {
    backend: Arc<dyn CompletionBackend>,
    temperature: f32,
    max_tokens: u32,
    empty_result: EmptyResultPolicy,
}

impl AnswerSynthesizer {
    pub fn new(backend: Arc<dyn CompletionBackend>, temperature: f32, max_tokens: u32) -> Self {
        Self {
            backend,
            temperature,
            max_tokens,
            empty_result: EmptyResultPolicy::default(),
        }
    }

    pub fn with_empty_result(mut self, policy: EmptyResultPolicy) -> Self {
        self.empty_result = policy;
        self
    }

    /// Produce the answer for one turn.
    ///
    /// # Errors
    ///
    /// Returns `ChatError::Synthesis` if the completion call fails or
    /// returns only whitespace.
    pub async fn synthesize(&self, question: &str, rows: &[ResultRow]) -> Result<String> {
        if rows.is_empty() && self.empty_result == EmptyResultPolicy::Canned {
            tracing::debug!("Empty result, using canned answer");
            return Ok(NO_RESULTS_ANSWER.to_string());
        }

        let request = CompletionRequest {
            prompt: AnswerPrompt::compile(question, rows),
            params: DecodingParams::sampled(self.temperature, self.max_tokens),
        };
        let span = llm_span(GenerationStage::Answer, self.backend.model(), self.temperature);

        let raw = self
            .backend
            .complete(&request)
            .instrument(span.clone())
            .await
            .map_err(|e| ChatError::Synthesis(e.to_string()))?;
        record_completion(&span, raw.len());

        let answer = raw.trim();
        if answer.is_empty() {
            return Err(ChatError::Synthesis("completion was empty".to_string()));
        }
        Ok(answer.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::LlmError;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::Mutex;

    struct EchoBackend {
        reply: String,
        seen: Mutex<Vec<CompletionRequest>>,
    }

    impl EchoBackend {
        fn new(reply: &str) -> Arc<Self> {
            Arc::new(Self {
                reply: reply.to_string(),
                seen: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl CompletionBackend for EchoBackend {
        fn model(&self) -> &str {
            "echo"
        }

        async fn complete(&self, request: &CompletionRequest) -> std::result::Result<String, LlmError> {
            self.seen.lock().unwrap().push(request.clone());
            Ok(self.reply.clone())
        }
    }

    #[tokio::test]
    async fn test_sampled_decoding() {
        let backend = EchoBackend::new("  There are 12 team members.\n");
        let synth = AnswerSynthesizer::new(backend.clone(), 0.5, 300);
        let rows = vec![ResultRow::new().with("count", json!(12))];

        let answer = synth.synthesize("How many team members?", &rows).await.unwrap();
        assert_eq!(answer, "There are 12 team members.");

        let seen = backend.seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].params.temperature, 0.5);
        assert_eq!(seen[0].params.stop, None);
        assert!(seen[0].prompt.contains("count: 12"));
    }

    #[tokio::test]
    async fn test_canned_skips_backend() {
        let backend = EchoBackend::new("unused");
        let synth = AnswerSynthesizer::new(backend.clone(), 0.5, 300)
            .with_empty_result(EmptyResultPolicy::Canned);

        let answer = synth.synthesize("Who founded Rupp Pfalzgraf?", &[]).await.unwrap();
        assert_eq!(answer, NO_RESULTS_ANSWER);
        assert!(backend.seen.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_empty_result_still_synthesized_by_default() {
        let backend = EchoBackend::new("No records were found.");
        let synth = AnswerSynthesizer::new(backend.clone(), 0.5, 300);

        synth.synthesize("Who founded Rupp Pfalzgraf?", &[]).await.unwrap();
        assert_eq!(backend.seen.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_fenced_answer_kept_whole() {
        let reply = "```\nname: Jane Doe\n```\nJane Doe is the only match.";
        let synth = AnswerSynthesizer::new(EchoBackend::new(reply), 0.5, 300);
        let rows = vec![ResultRow::new().with("name", json!("Jane Doe"))];

        let answer = synth.synthesize("Who matches?", &rows).await.unwrap();
        assert_eq!(answer, reply);
    }

    #[tokio::test]
    async fn test_blank_completion_fails() {
        let synth = AnswerSynthesizer::new(EchoBackend::new("   "), 0.5, 300);
        let err = synth.synthesize("q", &[]).await.unwrap_err();
        assert!(matches!(err, ChatError::Synthesis(_)));
    }
}
