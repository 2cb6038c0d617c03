use crate::application::use_cases::query_executor::QueryEndpoint;
use crate::domain::error::{AppError, Result};
use crate::domain::qa::Row;
use async_trait::async_trait;
use serde_json::{json, Value};
use url::Url;

/// PostgREST RPC client. Each call is authorised with the caller's own token,
/// so row-level security applies to whoever asked the question.
pub struct SupabaseRpcClient {
    client: reqwest::Client,
    rpc_url: Url,
    anon_key: String,
}

impl SupabaseRpcClient {
    pub fn new(base_url: &str, anon_key: &str, function: &str) -> Result<Self> {
        let mut base = Url::parse(base_url)
            .map_err(|e| AppError::ConfigError(format!("Invalid Supabase URL {}: {}", base_url, e)))?;
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }

        let rpc_url = base
            .join(&format!("rest/v1/rpc/{}", function))
            .map_err(|e| AppError::ConfigError(format!("Invalid RPC function {}: {}", function, e)))?;

        Ok(Self {
            client: reqwest::Client::new(),
            rpc_url,
            anon_key: anon_key.to_string(),
        })
    }

    pub fn rpc_url(&self) -> &str {
        self.rpc_url.as_str()
    }
}

fn rows_from_body(body: Value) -> Result<Vec<Row>> {
    match body {
        Value::Null => Ok(Vec::new()),
        Value::Object(row) => Ok(vec![row]),
        Value::Array(items) => items
            .into_iter()
            .map(|item| match item {
                Value::Object(row) => Ok(row),
                other => Err(AppError::DatabaseError(format!(
                    "Unexpected row shape from RPC: {}",
                    other
                ))),
            })
            .collect(),
        other => Err(AppError::DatabaseError(format!(
            "Unexpected RPC response: {}",
            other
        ))),
    }
}

#[async_trait]
impl QueryEndpoint for SupabaseRpcClient {
    async fn run_sql(&self, sql: &str, caller_token: &str) -> Result<Vec<Row>> {
        let response = self
            .client
            .post(self.rpc_url.clone())
            .header("apikey", &self.anon_key)
            .bearer_auth(caller_token)
            .json(&json!({ "sql_text": sql }))
            .send()
            .await
            .map_err(|e| AppError::DatabaseError(format!("RPC request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(AppError::DatabaseError(format!(
                "RPC returned {}: {}",
                status, text
            )));
        }

        let text = response
            .text()
            .await
            .map_err(|e| AppError::DatabaseError(format!("Failed to read RPC response: {}", e)))?;
        if text.trim().is_empty() {
            return Ok(Vec::new());
        }

        let body: Value = serde_json::from_str(&text)
            .map_err(|e| AppError::ParseError(format!("Failed to parse RPC response: {}", e)))?;
        rows_from_body(body)
    }
}
