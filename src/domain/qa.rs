use serde::{Deserialize, Serialize};
use validator::Validate;

/// One result row: column name -> value, as returned by the execution endpoint.
pub type Row = serde_json::Map<String, serde_json::Value>;

pub const NOTE_NO_SQL: &str = "No sql generated";
pub const NOTE_MISSING_CREDENTIAL: &str = "Missing user JWT. Please login first.";
pub const NOTE_REJECTED: &str = "SQL rejected by safety check.";
pub const NOTE_NO_RECORDS: &str = "No matching records were found in the current result.";
pub const NOTE_EXECUTED: &str = "SQL executed successfully.";

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct AskRequest {
    #[validate(length(min = 1, message = "question must not be empty"))]
    pub question: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AskResponse {
    pub question: String,
    pub sql: String,
    #[serde(default)]
    pub rows: Vec<Row>,
    pub note: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionStatus {
    MissingCredential,
    Rejected,
    RemoteError,
    NoRecords,
    Success,
}

impl ExecutionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExecutionStatus::MissingCredential => "missing_credential",
            ExecutionStatus::Rejected => "rejected",
            ExecutionStatus::RemoteError => "remote_error",
            ExecutionStatus::NoRecords => "no_records",
            ExecutionStatus::Success => "success",
        }
    }
}

/// What the executor did with a generated statement.
///
/// `sql` is the statement to surface to the caller: the vetted statement when
/// execution was attempted, the untouched input when the caller had no
/// credential, and `None` when the gate rejected it.
#[derive(Debug, Clone, PartialEq)]
pub struct ExecutionOutcome {
    pub status: ExecutionStatus,
    pub sql: Option<String>,
    pub rows: Vec<Row>,
    pub note: String,
}

impl ExecutionOutcome {
    pub fn missing_credential(sql: &str) -> Self {
        Self {
            status: ExecutionStatus::MissingCredential,
            sql: Some(sql.to_string()),
            rows: Vec::new(),
            note: NOTE_MISSING_CREDENTIAL.to_string(),
        }
    }

    pub fn rejected() -> Self {
        Self {
            status: ExecutionStatus::Rejected,
            sql: None,
            rows: Vec::new(),
            note: NOTE_REJECTED.to_string(),
        }
    }

    pub fn remote_error(sql: String, cause: &str) -> Self {
        Self {
            status: ExecutionStatus::RemoteError,
            sql: Some(sql),
            rows: Vec::new(),
            note: format!("Query execution error: {}", cause),
        }
    }

    pub fn from_rows(sql: String, rows: Vec<Row>) -> Self {
        if rows.is_empty() {
            Self {
                status: ExecutionStatus::NoRecords,
                sql: Some(sql),
                rows,
                note: NOTE_NO_RECORDS.to_string(),
            }
        } else {
            Self {
                status: ExecutionStatus::Success,
                sql: Some(sql),
                rows,
                note: NOTE_EXECUTED.to_string(),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_ask_request_rejects_empty_question() {
        let request = AskRequest {
            question: String::new(),
        };
        assert!(request.validate().is_err());

        let request = AskRequest {
            question: "Where is order 5A9125A1H1?".to_string(),
        };
        assert!(request.validate().is_ok());
    }

    #[test]
    fn test_empty_rows_are_paired_with_no_records_note() {
        let outcome = ExecutionOutcome::from_rows("SELECT 1 LIMIT 20;".to_string(), vec![]);
        assert_eq!(outcome.status, ExecutionStatus::NoRecords);
        assert_eq!(outcome.note, NOTE_NO_RECORDS);
    }

    #[test]
    fn test_rows_are_paired_with_success_note() {
        let row = json!({"count": 5}).as_object().unwrap().clone();
        let outcome = ExecutionOutcome::from_rows("SELECT 1 LIMIT 20;".to_string(), vec![row]);
        assert_eq!(outcome.status, ExecutionStatus::Success);
        assert_eq!(outcome.note, NOTE_EXECUTED);
        assert_eq!(outcome.rows.len(), 1);
    }

    #[test]
    fn test_rejected_outcome_carries_no_sql() {
        let outcome = ExecutionOutcome::rejected();
        assert!(outcome.sql.is_none());
        assert!(outcome.rows.is_empty());
    }

    #[test]
    fn test_response_serializes_uniform_shape() {
        let response = AskResponse {
            question: "q".to_string(),
            sql: String::new(),
            rows: vec![],
            note: Some(NOTE_NO_SQL.to_string()),
        };
        let value = serde_json::to_value(&response).unwrap();
        assert_eq!(
            value,
            json!({"question": "q", "sql": "", "rows": [], "note": "No sql generated"})
        );
    }
}
