//! Conversation state: the append-only transcript of a session.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeSet;

/// One transcript entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "role", content = "text", rename_all = "lowercase")]
pub enum ConversationTurn {
    Question(String),
    Answer(String),
}

impl ConversationTurn {
    pub fn text(&self) -> &str {
        match self {
            Self::Question(text) | Self::Answer(text) => text,
        }
    }

    pub fn is_question(&self) -> bool {
        matches!(self, Self::Question(_))
    }
}

/// Transcript entry with its append time.
#[derive(Debug, Clone, Serialize)]
pub struct ConversationEntry {
    #[serde(flatten)]
    pub turn: ConversationTurn,
    pub at: DateTime<Utc>,
    /// Question whose turn failed before an answer was produced
    pub unanswered: bool,
}

/// Ordered, append-only history of a session.
///
/// Entries are never removed or rewritten. Failed turns are recorded by
/// index in a side set so the prompt can label them without touching the
/// entry itself.
#[derive(Debug, Clone, Default)]
pub struct ConversationState {
    turns: Vec<(ConversationTurn, DateTime<Utc>)>,
    unanswered: BTreeSet<usize>,
}

impl ConversationState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a transcript seeded with the assistant's greeting.
    pub fn with_greeting(greeting: impl Into<String>) -> Self {
        let mut state = Self::new();
        state.push_answer(greeting);
        state
    }

    /// Append a question, returning its index.
    pub fn push_question(&mut self, text: impl Into<String>) -> usize {
        self.push(ConversationTurn::Question(text.into()))
    }

    /// Append an answer, returning its index.
    pub fn push_answer(&mut self, text: impl Into<String>) -> usize {
        self.push(ConversationTurn::Answer(text.into()))
    }

    fn push(&mut self, turn: ConversationTurn) -> usize {
        self.turns.push((turn, Utc::now()));
        self.turns.len() - 1
    }

    /// Flag the question at `index` as left without an answer.
    ///
    /// Ignored for indices that are out of range or not questions.
    pub fn mark_unanswered(&mut self, index: usize) {
        if self.turns.get(index).is_some_and(|(turn, _)| turn.is_question()) {
            self.unanswered.insert(index);
        }
    }

    pub fn is_unanswered(&self, index: usize) -> bool {
        self.unanswered.contains(&index)
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    pub fn turns(&self) -> impl Iterator<Item = &ConversationTurn> {
        self.turns.iter().map(|(turn, _)| turn)
    }

    pub fn last(&self) -> Option<&ConversationTurn> {
        self.turns.last().map(|(turn, _)| turn)
    }

    /// Snapshot of every entry for display or export.
    pub fn entries(&self) -> Vec<ConversationEntry> {
        self.turns
            .iter()
            .enumerate()
            .map(|(idx, (turn, at))| ConversationEntry {
                turn: turn.clone(),
                at: *at,
                unanswered: self.is_unanswered(idx),
            })
            .collect()
    }

    /// Render history as labeled lines for the SQL prompt.
    ///
    /// With `window = Some(n)` only the last `n` entries are rendered; the
    /// stored log is unaffected.
    pub fn serialize_for_prompt(&self, window: Option<usize>) -> String {
        let start = window.map_or(0, |n| self.turns.len().saturating_sub(n));

        self.turns
            .iter()
            .enumerate()
            .skip(start)
            .map(|(idx, (turn, _))| match turn {
                ConversationTurn::Question(text) if self.is_unanswered(idx) => {
                    format!("User (unanswered): {}", text)
                }
                ConversationTurn::Question(text) => format!("User: {}", text),
                ConversationTurn::Answer(text) => format!("Assistant: {}", text),
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// JSON transcript of the session.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(&self.entries())
    }
}
