//! Stubs and helpers shared by unit tests.

use crate::application::use_cases::embedding_service::Embedder;
use crate::application::use_cases::prompt_engine::SqlScope;
use crate::application::use_cases::query_executor::QueryEndpoint;
use crate::application::use_cases::retrieval_service::RetrievalProvider;
use crate::domain::error::{AppError, Result};
use crate::domain::llm_config::LLMConfig;
use crate::domain::qa::Row;
use crate::domain::retrieval::RetrievedDocument;
use crate::infrastructure::llm_clients::LLMClient;
use actix_web::{web, App, HttpServer};
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

/// Start an actix server on an ephemeral port and return its base URL.
/// Must be called from inside an actix system (`#[actix_web::test]`).
pub fn spawn_server<F>(configure: F) -> String
where
    F: Fn(&mut web::ServiceConfig) + Send + Clone + 'static,
{
    let server = HttpServer::new(move || App::new().configure(configure.clone()))
        .workers(1)
        .disable_signals()
        .bind(("127.0.0.1", 0))
        .unwrap();
    let addr = server.addrs()[0];
    actix_web::rt::spawn(server.run());
    format!("http://{}", addr)
}

pub fn test_scope() -> SqlScope {
    SqlScope {
        schema: "public".to_string(),
        table: "allowed_table".to_string(),
        allowed_columns: vec![
            "delivery_note_number".to_string(),
            "delivery_note_status".to_string(),
            "shipped_time_actual".to_string(),
        ],
        default_limit: 20,
    }
}

pub fn row(column: &str, value: impl Into<serde_json::Value>) -> Row {
    let mut row = Row::new();
    row.insert(column.to_string(), value.into());
    row
}

/// Replies with a fixed text (or error) and records every user prompt.
pub struct RecordingLlm {
    reply: std::result::Result<String, String>,
    prompts: Mutex<Vec<String>>,
}

impl RecordingLlm {
    pub fn replying(text: &str) -> Self {
        Self {
            reply: Ok(text.to_string()),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn failing(message: &str) -> Self {
        Self {
            reply: Err(message.to_string()),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl LLMClient for RecordingLlm {
    async fn generate(&self, _config: &LLMConfig, _system: &str, user: &str) -> Result<String> {
        self.prompts.lock().unwrap().push(user.to_string());
        self.reply.clone().map_err(AppError::LLMError)
    }
}

pub struct StubRetrieval {
    texts: Vec<String>,
    failure: Option<String>,
    last_k: Mutex<Option<usize>>,
}

impl StubRetrieval {
    pub fn with_texts(texts: &[&str]) -> Self {
        Self {
            texts: texts.iter().map(|t| t.to_string()).collect(),
            failure: None,
            last_k: Mutex::new(None),
        }
    }

    pub fn failing(message: &str) -> Self {
        Self {
            texts: Vec::new(),
            failure: Some(message.to_string()),
            last_k: Mutex::new(None),
        }
    }

    pub fn last_k(&self) -> Option<usize> {
        *self.last_k.lock().unwrap()
    }
}

#[async_trait]
impl RetrievalProvider for StubRetrieval {
    async fn search(&self, _query: &str, k: usize) -> Result<Vec<RetrievedDocument>> {
        *self.last_k.lock().unwrap() = Some(k);
        if let Some(message) = &self.failure {
            return Err(AppError::RetrievalError(message.clone()));
        }
        Ok(self
            .texts
            .iter()
            .take(k)
            .map(|t| RetrievedDocument::new(t.clone()))
            .collect())
    }
}

/// Returns fixed rows (or error) and records `(sql, token)` per call.
pub struct RecordingEndpoint {
    rows: Vec<Row>,
    failure: Option<String>,
    calls: Mutex<Vec<(String, String)>>,
}

impl RecordingEndpoint {
    pub fn returning(rows: Vec<Row>) -> Self {
        Self {
            rows,
            failure: None,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn failing(message: &str) -> Self {
        Self {
            rows: Vec::new(),
            failure: Some(message.to_string()),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> Vec<(String, String)> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl QueryEndpoint for RecordingEndpoint {
    async fn run_sql(&self, sql: &str, caller_token: &str) -> Result<Vec<Row>> {
        self.calls
            .lock()
            .unwrap()
            .push((sql.to_string(), caller_token.to_string()));
        match &self.failure {
            Some(message) => Err(AppError::DatabaseError(message.clone())),
            None => Ok(self.rows.clone()),
        }
    }
}

/// Deterministic embedding: letter frequencies over a..z.
pub struct LetterEmbedder;

impl LetterEmbedder {
    pub fn vector(text: &str) -> Vec<f32> {
        let mut counts = vec![0.0f32; 26];
        for c in text.chars().filter(|c| c.is_ascii_alphabetic()) {
            counts[(c.to_ascii_lowercase() as u8 - b'a') as usize] += 1.0;
        }
        counts
    }
}

#[async_trait]
impl Embedder for LetterEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        Ok(Self::vector(text))
    }
}

#[derive(Default)]
pub struct RecordingEmbedder {
    calls: AtomicUsize,
}

impl RecordingEmbedder {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Embedder for RecordingEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(LetterEmbedder::vector(text))
    }
}
