//! Answer-synthesis prompt.

use crate::database::{describe_rows, ResultRow};

/// Compiles the second, answer-style prompt from a question and its rows.
pub struct AnswerPrompt;

impl AnswerPrompt {
    /// Build the prompt. Rows are flattened verbatim; an empty result set
    /// yields an empty data block that the instructions tell the model how
    /// to read.
    pub fn compile(question: &str, rows: &[ResultRow]) -> String {
        format!(
            "You are a friendly assistant for a legal-services directory. \
             Answer the user's question in a warm, conversational tone using only the data below. \
             Do not invent names, numbers or any facts that are not in the data. \
             If the data block is empty, say that no matching records were found.\n\n\
             Question: {question}\n\n\
             Data ({count} {noun}):\n{data}\n\n\
             Answer:",
            question = question.trim(),
            count = rows.len(),
            noun = if rows.len() == 1 { "row" } else { "rows" },
            data = describe_rows(rows),
        )
    }
}
