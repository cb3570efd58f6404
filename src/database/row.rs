//! Materialized result rows and their flat text rendering.

use serde::Serialize;
use serde_json::Value as JsonValue;

/// One result row: column name -> value, in result order.
///
/// Column names are unique within a row; inserting an existing name
/// replaces the value in place.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ResultRow {
    fields: Vec<(String, JsonValue)>,
}

impl ResultRow {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            fields: Vec::with_capacity(capacity),
        }
    }

    /// Builder-style insert, handy for fixtures.
    pub fn with(mut self, name: impl Into<String>, value: impl Into<JsonValue>) -> Self {
        self.insert(name, value);
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<JsonValue>) {
        let name = name.into();
        let value = value.into();
        match self.fields.iter_mut().find(|(n, _)| *n == name) {
            Some((_, slot)) => *slot = value,
            None => self.fields.push((name, value)),
        }
    }

    pub fn get(&self, name: &str) -> Option<&JsonValue> {
        self.fields.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &JsonValue)> {
        self.fields.iter().map(|(n, v)| (n.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Flatten to `field: value, field: value`.
    pub fn describe(&self) -> String {
        self.fields
            .iter()
            .map(|(name, value)| format!("{}: {}", name, render_value(value)))
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// Flatten a result set, one described row per line.
///
/// An empty result set renders as an empty string.
pub fn describe_rows(rows: &[ResultRow]) -> String {
    rows.iter()
        .map(ResultRow::describe)
        .collect::<Vec<_>>()
        .join("\n")
}

fn render_value(value: &JsonValue) -> String {
    match value {
        JsonValue::Null => "NULL".to_string(),
        JsonValue::String(s) => s.clone(),
        JsonValue::Array(items) => format!(
            "[{}]",
            items.iter().map(render_value).collect::<Vec<_>>().join(", ")
        ),
        other => other.to_string(),
    }
}
