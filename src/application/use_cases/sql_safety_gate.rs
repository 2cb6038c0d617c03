//! SQL Safety Gate
//!
//! The only enforcement point between model output and the execution endpoint:
//! - normalization (code fences and leading prose removed)
//! - leading SELECT requirement
//! - forbidden keyword blocking (substring match, case-insensitive)
//! - row limit enforcement
//!
//! This is a textual gate, not a parser. Table and column scope is constrained
//! by the prompt and is not re-verified here.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;

/// Statements that may not appear anywhere in a query.
pub const FORBIDDEN_STATEMENTS: [&str; 10] = [
    "INSERT", "UPDATE", "DELETE", "MERGE", "ALTER", "DROP", "TRUNCATE", "CREATE", "EXEC",
    "EXECUTE",
];

pub const DEFAULT_ROW_LIMIT: u32 = 20;

static SELECT_KEYWORD_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\bSELECT\b").unwrap());

static LIMIT_CLAUSE_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\bLIMIT\s+\d+\b").unwrap());

/// Why a statement was refused.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum SafetyViolation {
    NotSelect,
    ForbiddenStatement(String),
}

impl SafetyViolation {
    pub fn code(&self) -> &'static str {
        match self {
            SafetyViolation::NotSelect => "NOT_SELECT",
            SafetyViolation::ForbiddenStatement(_) => "FORBIDDEN_STATEMENT",
        }
    }
}

/// A statement that passed the gate and carries a LIMIT clause.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SafeSql(String);

impl SafeSql {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The statement without its terminator, as submitted to the RPC endpoint.
    pub fn without_terminator(&self) -> &str {
        self.0.trim().trim_end_matches(';').trim_end()
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

#[derive(Debug, Clone)]
pub struct SqlSafetyGate {
    default_limit: u32,
}

impl Default for SqlSafetyGate {
    fn default() -> Self {
        Self {
            default_limit: DEFAULT_ROW_LIMIT,
        }
    }
}

impl SqlSafetyGate {
    pub fn new(default_limit: u32) -> Self {
        Self { default_limit }
    }

    /// Trim, strip a surrounding Markdown code fence, and drop anything before
    /// the first SELECT keyword.
    pub fn normalize(sql: &str) -> String {
        let mut sql = sql.trim().to_string();

        if sql.starts_with("```") {
            let mut lines: Vec<&str> = sql.lines().collect();
            if lines.first().map_or(false, |l| l.starts_with("```")) {
                lines.remove(0);
            }
            if lines.last().map_or(false, |l| l.starts_with("```")) {
                lines.pop();
            }
            sql = lines.join("\n").trim().to_string();
        }

        if let Some(m) = SELECT_KEYWORD_PATTERN.find(&sql) {
            sql = sql[m.start()..].to_string();
        }

        sql.trim().to_string()
    }

    /// Check a statement, reporting the first rule it breaks.
    pub fn check(sql: &str) -> std::result::Result<(), SafetyViolation> {
        let upper_query = Self::normalize(sql).to_uppercase();

        if !upper_query.starts_with("SELECT") {
            return Err(SafetyViolation::NotSelect);
        }

        for statement in FORBIDDEN_STATEMENTS {
            if upper_query.contains(statement) {
                return Err(SafetyViolation::ForbiddenStatement(statement.to_string()));
            }
        }

        Ok(())
    }

    pub fn is_safe(sql: &str) -> bool {
        Self::check(sql).is_ok()
    }

    /// Guarantee a LIMIT clause; existing limits are left as they are.
    pub fn ensure_limit(&self, sql: &str) -> String {
        let s = sql.trim().trim_end_matches(';');
        if LIMIT_CLAUSE_PATTERN.is_match(s) {
            return format!("{};", s);
        }
        format!("{} LIMIT {};", s, self.default_limit)
    }

    /// normalize -> check -> ensure_limit
    pub fn vet(&self, sql: &str) -> std::result::Result<SafeSql, SafetyViolation> {
        let normalized = Self::normalize(sql);
        Self::check(&normalized)?;
        Ok(SafeSql(self.ensure_limit(&normalized)))
    }
}
