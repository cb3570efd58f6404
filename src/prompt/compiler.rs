//! SQL-generation prompt.

use super::exemplars::{render_exemplars, Exemplar, EXEMPLARS, EXEMPLAR_LIBRARY_VERSION};
use crate::conversation::ConversationState;
use crate::schema::SchemaDescription;

/// Output and style rules, in the order they are shown to the model.
pub const SQL_RULES: &[&str] = &[
    "Compare text columns case-insensitively with ILIKE and '%' wildcards, e.g. name ILIKE '%smith%'.",
    "Column names are case-sensitive: use them exactly as they appear in the schema.",
    "Never apply LOWER, UPPER or ILIKE to numeric, date or range columns; compare them with =, <, >, <=, >= or BETWEEN.",
    "Filter role and position columns by substring containment, e.g. position ILIKE '%partner%'.",
    "Use unnest() only on array-typed columns (shown with [] in the schema).",
    "When the question names a firm or organization, always filter on the firm column.",
    "Return exactly one SQL statement on a single line, with no explanation and no markdown.",
    "End the statement with a semicolon.",
];

/// Compiles (question, schema, history) into the generation prompt.
///
/// Pure: the same inputs always give the same prompt, which together with
/// temperature 0 decoding keeps SQL generation repeatable.
#[derive(Debug, Clone)]
pub struct PromptCompiler {
    permitted_tables: Vec<String>,
    history_window: Option<usize>,
    exemplars: &'static [Exemplar],
}

impl PromptCompiler {
    pub fn new(permitted_tables: Vec<String>, history_window: Option<usize>) -> Self {
        Self {
            permitted_tables,
            history_window,
            exemplars: EXEMPLARS,
        }
    }

    /// Replace the exemplar table (tests, experiments).
    pub fn with_exemplars(mut self, exemplars: &'static [Exemplar]) -> Self {
        self.exemplars = exemplars;
        self
    }

    pub fn permitted_tables(&self) -> &[String] {
        &self.permitted_tables
    }

    /// Build the prompt.
    ///
    /// Sections, in fixed order: role, rules, examples, schema,
    /// conversation, question.
    pub fn compile(
        &self,
        question: &str,
        schema: &SchemaDescription,
        conversation: &ConversationState,
    ) -> String {
        let rules = SQL_RULES
            .iter()
            .enumerate()
            .map(|(i, rule)| format!("{}. {}", i + 1, rule))
            .collect::<Vec<_>>()
            .join("\n");

        format!(
            "{role}\n\n\
             Rules:\n{rules}\n\n\
             Examples (library v{version}):\n\n{examples}\n\n\
             Schema:\n{schema}\n\n\
             Conversation so far:\n{history}\n\n\
             Question: {question}\n\
             SQL:",
            role = self.role_statement(),
            rules = rules,
            version = EXEMPLAR_LIBRARY_VERSION,
            examples = render_exemplars(self.exemplars),
            schema = schema.render(),
            history = conversation.serialize_for_prompt(self.history_window),
            question = question.trim(),
        )
    }

    fn role_statement(&self) -> String {
        format!(
            "You are a PostgreSQL expert for a legal-services directory. \
             You may only query the following {} tables: {}. \
             Do not use any outside or world knowledge; every answer must come from these tables.",
            self.permitted_tables.len(),
            join_names(&self.permitted_tables),
        )
    }
}

/// `a`, `a and b`, `a, b and c`
fn join_names(names: &[String]) -> String {
    match names {
        [] => String::new(),
        [only] => only.clone(),
        [init @ .., last] => format!("{} and {}", init.join(", "), last),
    }
}
