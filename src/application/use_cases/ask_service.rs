//! Question answering pipeline.
//!
//! - Generate SQL from the question (retrieval + prompt + model + extraction)
//! - Vet and execute it under the caller's token
//! - Fold every failure into a note on a uniform response

use crate::application::use_cases::query_executor::QueryExecutor;
use crate::application::use_cases::sql_generator::SqlGenerator;
use crate::domain::error::AppError;
use crate::domain::qa::{AskResponse, NOTE_NO_SQL};
use tracing::{info, warn, Instrument};
use uuid::Uuid;

const LOGGED_QUESTION_CHARS: usize = 80;

pub struct AskUseCase {
    generator: SqlGenerator,
    executor: QueryExecutor,
}

impl AskUseCase {
    pub fn new(generator: SqlGenerator, executor: QueryExecutor) -> Self {
        Self {
            generator,
            executor,
        }
    }

    pub async fn ask(&self, question: &str, caller_token: Option<&str>) -> AskResponse {
        let request_id = Uuid::new_v4();
        let span = tracing::info_span!("ask", %request_id);
        self.ask_inner(question, caller_token).instrument(span).await
    }

    async fn ask_inner(&self, question: &str, caller_token: Option<&str>) -> AskResponse {
        let logged: String = question.chars().take(LOGGED_QUESTION_CHARS).collect();
        info!(question = %logged, has_token = caller_token.is_some(), "Question received");

        let sql = match self.generator.generate(question).await {
            Ok(sql) => sql,
            Err(AppError::IndexUnavailable(reason)) => {
                warn!(error = %reason, "Retrieval index unavailable");
                return empty_response(question, format!("Retrieval index unavailable: {}", reason));
            }
            Err(err) => {
                warn!(error = %err, "SQL generation failed");
                return empty_response(question, format!("SQL generation failed: {}", err));
            }
        };

        if sql.trim().is_empty() {
            info!("Model produced no SQL");
            return empty_response(question, NOTE_NO_SQL.to_string());
        }

        let outcome = self.executor.execute(&sql, caller_token).await;
        info!(status = outcome.status.as_str(), rows = outcome.rows.len(), "Question answered");

        AskResponse {
            question: question.to_string(),
            sql: outcome.sql.unwrap_or_default(),
            rows: outcome.rows,
            note: Some(outcome.note),
        }
    }
}

fn empty_response(question: &str, note: String) -> AskResponse {
    AskResponse {
        question: question.to_string(),
        sql: String::new(),
        rows: Vec::new(),
        note: Some(note),
    }
}
