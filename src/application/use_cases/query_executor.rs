use crate::application::use_cases::sql_safety_gate::SqlSafetyGate;
use crate::domain::error::Result;
use crate::domain::qa::{ExecutionOutcome, Row};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Remote SQL execution scoped by the caller's identity.
#[async_trait]
pub trait QueryEndpoint: Send + Sync {
    async fn run_sql(&self, sql: &str, caller_token: &str) -> Result<Vec<Row>>;
}

/// Runs generated SQL through the safety gate and the execution endpoint.
pub struct QueryExecutor {
    endpoint: Arc<dyn QueryEndpoint>,
    gate: SqlSafetyGate,
}

impl QueryExecutor {
    pub fn new(endpoint: Arc<dyn QueryEndpoint>, gate: SqlSafetyGate) -> Self {
        Self { endpoint, gate }
    }

    /// Never fails: every problem is reported through the outcome's note.
    pub async fn execute(&self, sql: &str, caller_token: Option<&str>) -> ExecutionOutcome {
        let token = match caller_token.map(str::trim).filter(|t| !t.is_empty()) {
            Some(token) => token,
            None => {
                info!("Execution skipped, caller has no credential");
                return ExecutionOutcome::missing_credential(sql);
            }
        };

        let safe_sql = match self.gate.vet(sql) {
            Ok(safe_sql) => safe_sql,
            Err(violation) => {
                warn!(reason = violation.code(), "SQL rejected by safety gate");
                return ExecutionOutcome::rejected();
            }
        };

        debug!(sql = safe_sql.as_str(), "Submitting vetted SQL");
        match self
            .endpoint
            .run_sql(safe_sql.without_terminator(), token)
            .await
        {
            Ok(rows) => {
                info!(row_count = rows.len(), "Query executed");
                ExecutionOutcome::from_rows(safe_sql.into_inner(), rows)
            }
            Err(err) => {
                warn!(error = %err, "Query execution failed");
                ExecutionOutcome::remote_error(safe_sql.into_inner(), &err.to_string())
            }
        }
    }
}
