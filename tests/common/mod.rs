//! Shared test doubles: a scripted completion backend and an in-memory store.

#![allow(dead_code)]

use async_trait::async_trait;
use serde_json::json;
use sqlchat::{CatalogColumn, CompletionBackend, CompletionRequest, Config, Database, LlmError, ResultRow};
use std::sync::{Arc, Mutex};

type Reply = dyn Fn(&CompletionRequest) -> Result<String, LlmError> + Send + Sync;

/// Completion backend driven by a closure, recording every request.
pub struct ScriptedBackend {
    reply: Box<Reply>,
    requests: Mutex<Vec<CompletionRequest>>,
}

impl ScriptedBackend {
    pub fn new<F>(reply: F) -> Arc<Self>
    where
        F: Fn(&CompletionRequest) -> Result<String, LlmError> + Send + Sync + 'static,
    {
        Arc::new(Self {
            reply: Box::new(reply),
            requests: Mutex::new(Vec::new()),
        })
    }

    /// Fixed SQL for the query stage, fixed prose for the answer stage.
    pub fn fixed(sql: &str, answer: &str) -> Arc<Self> {
        let sql = sql.to_string();
        let answer = answer.to_string();
        Self::new(move |request| {
            if is_sql_request(request) {
                Ok(sql.clone())
            } else {
                Ok(answer.clone())
            }
        })
    }

    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn sql_requests(&self) -> Vec<CompletionRequest> {
        self.requests().into_iter().filter(is_sql_request).collect()
    }

    pub fn answer_requests(&self) -> Vec<CompletionRequest> {
        self.requests().into_iter().filter(|r| !is_sql_request(r)).collect()
    }
}

#[async_trait]
impl CompletionBackend for ScriptedBackend {
    fn model(&self) -> &str {
        "scripted"
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<String, LlmError> {
        self.requests.lock().unwrap().push(request.clone());
        (self.reply)(request)
    }
}

/// SQL completions are the ones that stop at `;`.
pub fn is_sql_request(request: &CompletionRequest) -> bool {
    request.params.stop.as_deref() == Some(";")
}

/// The question the prompt ends with.
pub fn trailing_question(prompt: &str) -> Option<&str> {
    let start = prompt.rfind("Question: ")? + "Question: ".len();
    let rest = &prompt[start..];
    rest.strip_suffix("\nSQL:").map(str::trim)
}

type Handler = dyn Fn(&str) -> Result<Vec<ResultRow>, sqlx::Error> + Send + Sync;

/// Store with a fixed catalog and a closure standing in for execution.
pub struct MemoryDatabase {
    catalog: Result<Vec<CatalogColumn>, String>,
    handler: Box<Handler>,
    executed: Mutex<Vec<String>>,
}

impl MemoryDatabase {
    pub fn new<F>(catalog: Vec<CatalogColumn>, handler: F) -> Arc<Self>
    where
        F: Fn(&str) -> Result<Vec<ResultRow>, sqlx::Error> + Send + Sync + 'static,
    {
        Arc::new(Self {
            catalog: Ok(catalog),
            handler: Box::new(handler),
            executed: Mutex::new(Vec::new()),
        })
    }

    /// Firm catalog; every statement returns `rows`.
    pub fn returning(rows: Vec<ResultRow>) -> Arc<Self> {
        Self::new(firm_catalog(), move |_| Ok(rows.clone()))
    }

    /// Catalog lookup fails with `message`.
    pub fn unreachable(message: &str) -> Arc<Self> {
        Arc::new(Self {
            catalog: Err(message.to_string()),
            handler: Box::new(|_| Ok(Vec::new())),
            executed: Mutex::new(Vec::new()),
        })
    }

    pub fn executed(&self) -> Vec<String> {
        self.executed.lock().unwrap().clone()
    }
}

#[async_trait]
impl Database for MemoryDatabase {
    async fn fetch_catalog(&self, _schema: &str) -> Result<Vec<CatalogColumn>, sqlx::Error> {
        self.catalog.clone().map_err(sqlx::Error::Protocol)
    }

    async fn execute(&self, sql: &str) -> Result<Vec<ResultRow>, sqlx::Error> {
        self.executed.lock().unwrap().push(sql.to_string());
        (self.handler)(sql)
    }
}

fn column(table: &str, name: &str, data_type: &str, udt: &str, position: i32) -> CatalogColumn {
    CatalogColumn {
        table_name: table.to_string(),
        column_name: name.to_string(),
        data_type: data_type.to_string(),
        udt_name: udt.to_string(),
        ordinal_position: position,
    }
}

/// Catalog of the four firm directory tables.
pub fn firm_catalog() -> Vec<CatalogColumn> {
    vec![
        column("teams", "id", "integer", "int4", 1),
        column("teams", "name", "text", "text", 2),
        column("teams", "position", "text", "text", 3),
        column("teams", "firm", "text", "text", 4),
        column("teams", "location", "text", "text", 5),
        column("teams", "email", "text", "text", 6),
        column("teams", "practice_areas", "ARRAY", "_text", 7),
        column("teams", "education", "ARRAY", "_text", 8),
        column("teams", "bar_admissions", "ARRAY", "_text", 9),
        column("careers", "id", "integer", "int4", 1),
        column("careers", "title", "text", "text", 2),
        column("careers", "firm", "text", "text", 3),
        column("careers", "department", "text", "text", 4),
        column("careers", "location", "text", "text", 5),
        column("careers", "employment_type", "text", "text", 6),
        column("careers", "experience_years", "integer", "int4", 7),
        column("careers", "salary_min", "integer", "int4", 8),
        column("careers", "salary_max", "integer", "int4", 9),
        column("careers", "posted_date", "date", "date", 10),
        column("articles", "id", "integer", "int4", 1),
        column("articles", "title", "text", "text", 2),
        column("articles", "author", "text", "text", 3),
        column("articles", "firm", "text", "text", 4),
        column("articles", "published_date", "date", "date", 5),
        column("articles", "tags", "ARRAY", "_text", 6),
        column("practice_areas", "id", "integer", "int4", 1),
        column("practice_areas", "name", "text", "text", 2),
        column("practice_areas", "firm", "text", "text", 3),
        column("practice_areas", "lead_partner", "text", "text", 4),
        column("practice_areas", "attorney_count", "integer", "int4", 5),
    ]
}

pub fn count_row(count: i64) -> ResultRow {
    ResultRow::new().with("count", json!(count))
}

/// Config that needs no environment.
pub fn test_config() -> Config {
    let mut config = Config::default();
    config.database_url = Some("postgres://localhost/test".to_string());
    config.llm.api_key = Some("test-key".to_string());
    config
}
