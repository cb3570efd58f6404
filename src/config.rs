//! Session configuration: JSON file, environment overrides, validation.

use crate::llm::LlmProvider;
use crate::types::error::{ChatError, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Tables the generated SQL may reference.
pub const DEFAULT_PERMITTED_TABLES: [&str; 4] = ["teams", "careers", "articles", "practice_areas"];

/// What to do when a query returns no rows.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmptyResultPolicy {
    /// Send the empty data block to the answer model anyway
    #[default]
    Synthesize,
    /// Reply with a fixed "nothing found" message, skipping the second call
    Canned,
}

/// Completion model settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// Model identifier (e.g. "gpt-3.5-turbo-instruct", "claude-3-5-haiku-latest")
    pub model: String,

    /// Explicit provider; detected from the model name when unset
    pub provider: Option<LlmProvider>,

    /// Override for the provider's API root (proxies, local gateways)
    pub base_url: Option<String>,

    /// API key, never written back to disk
    #[serde(skip_serializing)]
    pub api_key: Option<String>,

    /// Token budget for the SQL completion
    pub query_max_tokens: u32,

    /// Token budget for the answer completion
    pub answer_max_tokens: u32,

    /// Sampling temperature for the answer completion
    pub answer_temperature: f32,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            model: "gpt-3.5-turbo-instruct".to_string(),
            provider: None,
            base_url: None,
            api_key: None,
            query_max_tokens: 200,
            answer_max_tokens: 300,
            answer_temperature: 0.5,
        }
    }
}

impl LlmConfig {
    /// Provider in effect: explicit setting, else detected from the model name.
    pub fn resolved_provider(&self) -> LlmProvider {
        self.provider
            .unwrap_or_else(|| LlmProvider::detect(&self.model))
    }
}

/// Top-level configuration for one chat session.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Postgres connection string
    pub database_url: Option<String>,

    /// Catalog schema to snapshot
    pub schema_name: String,

    /// Tables the prompt names and the guard allows
    pub permitted_tables: Vec<String>,

    pub llm: LlmConfig,

    /// Number of most recent conversation entries fed to the SQL prompt
    /// (`None` keeps the whole history)
    pub history_window: Option<usize>,

    pub empty_result: EmptyResultPolicy,

    /// Seed entry of every conversation
    pub greeting: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_url: None,
            schema_name: "public".to_string(),
            permitted_tables: DEFAULT_PERMITTED_TABLES.iter().map(|t| t.to_string()).collect(),
            llm: LlmConfig::default(),
            history_window: Some(20),
            empty_result: EmptyResultPolicy::default(),
            greeting: "How may I help you?".to_string(),
        }
    }
}

impl Config {
    /// Get default config directory (~/.sqlchat/).
    pub fn config_dir() -> Result<PathBuf> {
        let home = std::env::var("HOME")
            .map_err(|_| ChatError::Config("HOME not set".to_string()))?;
        Ok(PathBuf::from(home).join(".sqlchat"))
    }

    /// Get default config file path (~/.sqlchat/config.json).
    pub fn config_file() -> Result<PathBuf> {
        Ok(Self::config_dir()?.join("config.json"))
    }

    /// Load configuration from a file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        serde_json::from_str(&content)
            .map_err(|e| ChatError::Config(format!("Invalid config {}: {}", path.display(), e)))
    }

    /// Load configuration and apply environment overrides.
    ///
    /// An explicit path must exist. Without one, `~/.sqlchat/config.json`
    /// is used when present and defaults otherwise.
    pub fn load(path: Option<&str>) -> Result<Self> {
        let mut config = match path {
            Some(p) => {
                let expanded = PathBuf::from(shellexpand::tilde(p).into_owned());
                Self::from_file(&expanded)?
            }
            None => match Self::config_file() {
                Ok(default_file) if default_file.exists() => Self::from_file(&default_file)?,
                _ => Self::default(),
            },
        };

        config.apply_env();
        Ok(config)
    }

    /// Apply environment variable overrides.
    ///
    /// The API key variable depends on the provider: `ANTHROPIC_API_KEY`
    /// for Claude models, `OPENAI_API_KEY` otherwise.
    pub fn apply_env(&mut self) {
        self.apply_env_from(|key| std::env::var(key).ok());
    }

    fn apply_env_from(&mut self, get: impl Fn(&str) -> Option<String>) {
        if let Some(url) = get("DATABASE_URL") {
            self.database_url = Some(url);
        }
        if let Some(model) = get("SQLCHAT_MODEL") {
            self.llm.model = model;
        }
        if let Some(base_url) = get("SQLCHAT_LLM_BASE_URL") {
            self.llm.base_url = Some(base_url);
        }
        if let Some(window) = get("SQLCHAT_HISTORY_WINDOW") {
            match window.trim() {
                "" | "none" | "unbounded" => self.history_window = None,
                n => match n.parse::<usize>() {
                    Ok(n) => self.history_window = Some(n),
                    Err(_) => tracing::warn!(value = %window, "Ignoring invalid SQLCHAT_HISTORY_WINDOW"),
                },
            }
        }
        if self.llm.api_key.is_none() {
            self.llm.api_key = get(self.llm.resolved_provider().api_key_var());
        }
    }

    /// Switch the completion model.
    ///
    /// If the switch changes the provider, the previous key is dropped and
    /// the new provider's key variable is read instead, so an old key is
    /// never sent to a different API.
    pub fn set_model(&mut self, model: impl Into<String>) {
        self.set_model_from(model, |key| std::env::var(key).ok());
    }

    fn set_model_from(&mut self, model: impl Into<String>, get: impl Fn(&str) -> Option<String>) {
        let before = self.llm.resolved_provider();
        self.llm.model = model.into();
        let after = self.llm.resolved_provider();

        if after != before {
            self.llm.api_key = None;
        }
        if self.llm.api_key.is_none() {
            self.llm.api_key = get(after.api_key_var());
        }
    }

    /// Check the configuration is complete enough to start a session.
    pub fn validate(&self) -> Result<()> {
        if self.database_url.as_deref().map_or(true, str::is_empty) {
            return Err(ChatError::Config(
                "database URL not set (use --database-url or DATABASE_URL)".to_string(),
            ));
        }
        if self.llm.api_key.as_deref().map_or(true, str::is_empty) {
            return Err(ChatError::Config(format!(
                "{} environment variable not set",
                self.llm.resolved_provider().api_key_var()
            )));
        }
        if self.permitted_tables.is_empty() {
            return Err(ChatError::Config("permitted_tables must not be empty".to_string()));
        }
        if self.history_window == Some(0) {
            return Err(ChatError::Config(
                "history_window must be at least 1 (omit it for unbounded history)".to_string(),
            ));
        }
        if !(0.0..=2.0).contains(&self.llm.answer_temperature) {
            return Err(ChatError::Config(format!(
                "answer_temperature {} out of range 0.0-2.0",
                self.llm.answer_temperature
            )));
        }
        Ok(())
    }
}
