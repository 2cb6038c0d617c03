//! Prompt Builder for SQL generation
//!
//! Renders the fixed instruction template with the user question, the
//! retrieved documentation context and the configured allow-list. The
//! allow-list always comes from process configuration, never from the request.

use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};

static PLACEHOLDER_PATTERN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\{([a-z_]+)\}").unwrap());

pub const GENERATE_SQL_QUERY_PROMPT: &str = r#"
User Question:
{question}

You are a PostgreSQL query assistant for Supabase (Postgres).
Your ONLY job is to convert the user's natural-language question into EXACTLY ONE executable SQL SELECT statement.

Retrieved Context:
{context}

HARD RULES (read carefully):
1. You are ONLY allowed to query data from the following table (including schema):
   - "{schema}"."{table}"
2. Use ONLY these columns (case-sensitive); never invent fields.
   Allowed columns:
   - {allowed_columns}
3. You must not execute any data modification or management statements such as INSERT, UPDATE, DELETE, MERGE, CREATE, DROP, ALTER, TRUNCATE, or EXEC.
4. ONLY generate standard PostgreSQL SELECT statements that conform to Postgres syntax.
5. You must explicitly use the full name when querying:
   - "{schema}"."{table}"
6. If the user does not specify a limit, use LIMIT {default_top} to restrict the number of results.
7. Based on the question's semantics, appropriately add WHERE, ORDER BY, or GROUP BY clauses to improve relevance.
8. Allowed aggregations are: COUNT, SUM, AVG, MIN, and MAX.
9. Keep the queries simple and avoid overly complex or nested statements.

OUTPUT FORMAT:
Return ONLY a single JSON object with exactly one key "sql", whose value is the final SQL statement ending with a semicolon.
Example (for style reference only):
{"sql": "SELECT \"delivery_note_number\", \"pod_document\" FROM \"{schema}\".\"{table}\" WHERE \"delivery_note_number\" = '5A9125A1H1' ORDER BY \"shipped_time_actual\" DESC LIMIT {default_top};"}
If the question cannot be answered using ONLY the allowed columns from "{schema}"."{table}", return:
{"sql": ""}
"#;

/// The schema-qualified table and columns generated SQL is restricted to.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SqlScope {
    pub schema: String,
    pub table: String,
    pub allowed_columns: Vec<String>,
    pub default_limit: u32,
}

pub struct PromptEngine;

impl PromptEngine {
    /// Render the SQL generation prompt.
    ///
    /// Substitution is a single pass over the template, so placeholder-looking
    /// text inside the question or context is copied through verbatim.
    pub fn render(question: &str, context: &str, scope: &SqlScope) -> String {
        let allowed_columns = scope.allowed_columns.join(", ");
        let default_top = scope.default_limit.to_string();

        PLACEHOLDER_PATTERN
            .replace_all(GENERATE_SQL_QUERY_PROMPT, |caps: &Captures| {
                match &caps[1] {
                    "question" => question.to_string(),
                    "context" => context.to_string(),
                    "schema" => scope.schema.clone(),
                    "table" => scope.table.clone(),
                    "allowed_columns" => allowed_columns.clone(),
                    "default_top" => default_top.clone(),
                    _ => caps[0].to_string(),
                }
            })
            .into_owned()
    }
}
