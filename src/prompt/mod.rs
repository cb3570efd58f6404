//! Prompt construction for the two completion calls.
//!
//! The SQL prompt is built from the schema, exemplars and transcript; the
//! answer prompt only from the question and the returned rows.

pub mod answer;
pub mod compiler;
pub mod exemplars;

pub use answer::AnswerPrompt;
pub use compiler::{PromptCompiler, SQL_RULES};
pub use exemplars::{find_exemplar, Exemplar, QueryShape, EXEMPLARS, EXEMPLAR_LIBRARY_VERSION};
