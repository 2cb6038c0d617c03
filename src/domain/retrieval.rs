use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A document excerpt returned by a retrieval provider.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RetrievedDocument {
    pub text: String,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

impl RetrievedDocument {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            metadata: HashMap::new(),
        }
    }
}

/// A chunk as stored in the on-disk index.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexedChunk {
    pub id: String,
    pub path: String,
    pub heading_path: String,
    pub content: String,
    pub embedding: Vec<f32>,
}

impl IndexedChunk {
    pub fn to_document(&self) -> RetrievedDocument {
        let mut metadata = HashMap::new();
        metadata.insert("path".to_string(), self.path.clone());
        metadata.insert("source_heading_path".to_string(), self.heading_path.clone());
        RetrievedDocument {
            text: self.content.clone(),
            metadata,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IndexState {
    Building,
    Ready,
    Failed,
}

/// Readiness report for the retrieval index, exposed on `/ready`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexStatus {
    pub state: IndexState,
    pub chunk_count: usize,
    pub built_at: Option<DateTime<Utc>>,
    pub error: Option<String>,
}
