use crate::application::use_cases::prompt_engine::{PromptEngine, SqlScope};
use crate::application::use_cases::retrieval_service::{retrieve_context, RetrievalProvider};
use crate::domain::error::Result;
use crate::domain::llm_config::LLMConfig;
use crate::infrastructure::llm_clients::LLMClient;
use crate::infrastructure::response::clean_llm_response;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use std::sync::Arc;
use tracing::debug;

static CODE_FENCE_PATTERN: Lazy<Regex> = Lazy::new(|| Regex::new(r"```(?:json)?").unwrap());

static SELECT_STATEMENT_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)(select\b.*?;)").unwrap());

/// Outcome of one extraction tier.
#[derive(Debug, Clone, PartialEq)]
pub enum ParsedSql {
    Parsed(String),
    Unparseable,
}

/// Primary tier: the response is a JSON object, possibly fenced, with an
/// `sql` string field. A JSON object without the field parses as empty.
pub fn parse_json_sql(response: &str) -> ParsedSql {
    let stripped = CODE_FENCE_PATTERN.replace_all(response, "");
    let body = stripped.trim_matches(|c| c == '`' || c == ' ' || c == '\n');

    match serde_json::from_str::<Value>(body) {
        Ok(Value::Object(map)) => match map.get("sql") {
            None => ParsedSql::Parsed(String::new()),
            Some(Value::String(sql)) => ParsedSql::Parsed(sql.trim().to_string()),
            Some(_) => ParsedSql::Unparseable,
        },
        _ => ParsedSql::Unparseable,
    }
}

/// Fallback tier: first `select ... ;` span in the raw text.
pub fn scan_select_statement(response: &str) -> ParsedSql {
    SELECT_STATEMENT_PATTERN
        .captures(response)
        .and_then(|caps| caps.get(1))
        .map(|m| ParsedSql::Parsed(m.as_str().trim().to_string()))
        .unwrap_or(ParsedSql::Unparseable)
}

/// Extract one SQL statement from model output. Empty means no usable SQL.
pub fn extract_sql(response: &str) -> String {
    if let ParsedSql::Parsed(sql) = parse_json_sql(response) {
        return sql;
    }
    match scan_select_statement(response) {
        ParsedSql::Parsed(sql) => sql,
        ParsedSql::Unparseable => String::new(),
    }
}

pub struct SqlGenerator {
    retrieval: Arc<dyn RetrievalProvider>,
    llm: Arc<dyn LLMClient>,
    llm_config: LLMConfig,
    scope: SqlScope,
    top_k: usize,
    max_context_chars: usize,
}

impl SqlGenerator {
    pub fn new(
        retrieval: Arc<dyn RetrievalProvider>,
        llm: Arc<dyn LLMClient>,
        llm_config: LLMConfig,
        scope: SqlScope,
        top_k: usize,
        max_context_chars: usize,
    ) -> Self {
        Self {
            retrieval,
            llm,
            llm_config,
            scope,
            top_k,
            max_context_chars,
        }
    }

    /// Retrieve context, prompt the model and extract its statement.
    ///
    /// Retrieval and model failures propagate; malformed model output never
    /// does and yields an empty string instead.
    pub async fn generate(&self, question: &str) -> Result<String> {
        let context = retrieve_context(
            self.retrieval.as_ref(),
            question,
            self.top_k,
            self.max_context_chars,
        )
        .await?;
        debug!(context_chars = context.chars().count(), "Retrieved context");

        let prompt = PromptEngine::render(question, &context, &self.scope);
        let raw = self.llm.generate(&self.llm_config, "", &prompt).await?;
        let sql = extract_sql(&clean_llm_response(&raw));

        debug!(sql = %sql, "Extracted SQL");
        Ok(sql)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::error::AppError;
    use crate::test_support::{test_scope, RecordingLlm, StubRetrieval};

    #[test]
    fn test_extract_fenced_json() {
        let response = "```json\n{\"sql\": \"SELECT 1;\"}\n```";
        assert_eq!(parse_json_sql(response), ParsedSql::Parsed("SELECT 1;".to_string()));
        assert_eq!(extract_sql(response), "SELECT 1;");
    }

    #[test]
    fn test_extract_plain_json_trims_sql() {
        assert_eq!(extract_sql("{\"sql\": \"  SELECT id FROM t;  \"}"), "SELECT id FROM t;");
    }

    #[test]
    fn test_extract_empty_sql_field() {
        assert_eq!(extract_sql("{\"sql\": \"\"}"), "");
    }

    #[test]
    fn test_json_object_without_sql_key_is_empty() {
        assert_eq!(parse_json_sql("{\"answer\": \"SELECT 1;\"}"), ParsedSql::Parsed(String::new()));
    }

    #[test]
    fn test_non_object_json_is_unparseable() {
        assert_eq!(parse_json_sql("[\"SELECT 1;\"]"), ParsedSql::Unparseable);
        assert_eq!(parse_json_sql("{\"sql\": 42}"), ParsedSql::Unparseable);
    }

    #[test]
    fn test_fallback_scans_prose() {
        let response = "Sure! SELECT id FROM t;";
        assert_eq!(parse_json_sql(response), ParsedSql::Unparseable);
        assert_eq!(extract_sql(response), "SELECT id FROM t;");
    }

    #[test]
    fn test_fallback_is_case_insensitive_and_multiline() {
        let response = "Here you go:\nselect count(*)\nfrom t\nwhere x = 1; and more text; ";
        assert_eq!(extract_sql(response), "select count(*)\nfrom t\nwhere x = 1;");
    }

    #[test]
    fn test_fallback_requires_terminator() {
        assert_eq!(scan_select_statement("SELECT id FROM t"), ParsedSql::Unparseable);
        assert_eq!(extract_sql("SELECT id FROM t"), "");
    }

    #[test]
    fn test_truncated_json_falls_back() {
        let response = "{\"sql\": \"SELECT id FROM t;";
        assert_eq!(extract_sql(response), "SELECT id FROM t;");
    }

    #[test]
    fn test_selected_word_does_not_start_statement() {
        assert_eq!(extract_sql("the selected rows; nothing else"), "");
    }

    fn generator(llm: Arc<RecordingLlm>, retrieval: Arc<StubRetrieval>) -> SqlGenerator {
        SqlGenerator::new(retrieval, llm, LLMConfig::default(), test_scope(), 1, 1500)
    }

    #[tokio::test]
    async fn test_generate_renders_context_and_extracts() {
        let llm = Arc::new(RecordingLlm::replying("{\"sql\": \"SELECT COUNT(*) FROM t\"}"));
        let retrieval = Arc::new(StubRetrieval::with_texts(&["pod_document holds the POD link"]));

        let sql = generator(llm.clone(), retrieval.clone())
            .generate("How many orders shipped last week?")
            .await
            .unwrap();

        assert_eq!(sql, "SELECT COUNT(*) FROM t");
        assert_eq!(retrieval.last_k(), Some(1));
        let prompts = llm.prompts();
        assert_eq!(prompts.len(), 1);
        assert!(prompts[0].contains("How many orders shipped last week?"));
        assert!(prompts[0].contains("pod_document holds the POD link"));
    }

    #[tokio::test]
    async fn test_generate_ignores_reasoning_block() {
        let llm = Arc::new(RecordingLlm::replying(
            "<think>SELECT * FROM secrets;</think>{\"sql\": \"\"}",
        ));
        let retrieval = Arc::new(StubRetrieval::with_texts(&["ctx"]));
        let sql = generator(llm, retrieval).generate("q").await.unwrap();
        assert_eq!(sql, "");
    }

    #[tokio::test]
    async fn test_generate_propagates_retrieval_failure() {
        let llm = Arc::new(RecordingLlm::replying("{\"sql\": \"SELECT 1;\"}"));
        let retrieval = Arc::new(StubRetrieval::failing("index offline"));
        let err = generator(llm.clone(), retrieval).generate("q").await.unwrap_err();
        assert!(matches!(err, AppError::RetrievalError(_)));
        assert!(llm.prompts().is_empty());
    }

    #[tokio::test]
    async fn test_generate_propagates_model_failure() {
        let llm = Arc::new(RecordingLlm::failing("rate limited"));
        let retrieval = Arc::new(StubRetrieval::with_texts(&["ctx"]));
        let err = generator(llm, retrieval).generate("q").await.unwrap_err();
        assert!(err.to_string().contains("rate limited"));
    }
}
