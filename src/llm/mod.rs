//! The two completion-backed stages and the client they share.

pub mod client;
pub mod generator;
pub mod synthesizer;

pub use client::{CompletionBackend, CompletionRequest, DecodingParams, LlmClient, LlmError, LlmProvider};
pub use generator::{GeneratedQuery, QueryGenerator};
pub use synthesizer::{AnswerSynthesizer, NO_RESULTS_ANSWER};
