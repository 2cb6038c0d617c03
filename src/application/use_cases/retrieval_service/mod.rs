//! Retrieval of documentation context for SQL generation.
//!
//! - `RetrievalProvider` is the seam the generator depends on.
//! - `IndexHandle` is the shipped provider: an in-memory vector index built
//!   from the on-disk chunk store at startup and swapped atomically on rebuild.

use crate::application::use_cases::embedding_service::{cosine_similarity, Embedder};
use crate::domain::error::{AppError, Result};
use crate::domain::retrieval::{IndexState, IndexStatus, IndexedChunk, RetrievedDocument};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::future::Future;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tracing::{info, warn};

pub const CONTEXT_SEPARATOR: &str = "\n\n---\n\n";

#[async_trait]
pub trait RetrievalProvider: Send + Sync {
    async fn search(&self, query: &str, k: usize) -> Result<Vec<RetrievedDocument>>;
}

/// Search `k` documents and join their text, capped at `max_chars` characters.
pub async fn retrieve_context(
    provider: &dyn RetrievalProvider,
    question: &str,
    k: usize,
    max_chars: usize,
) -> Result<String> {
    let documents = provider.search(question, k).await?;
    let joined = documents
        .iter()
        .map(|doc| doc.text.as_str())
        .collect::<Vec<_>>()
        .join(CONTEXT_SEPARATOR);

    Ok(truncate_chars(&joined, max_chars))
}

fn truncate_chars(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => text[..byte_idx].to_string(),
        None => text.to_string(),
    }
}

/// Immutable set of embedded chunks.
pub struct VectorIndex {
    chunks: Vec<IndexedChunk>,
}

impl VectorIndex {
    pub fn new(chunks: Vec<IndexedChunk>) -> Self {
        Self { chunks }
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    /// Best `k` chunks by cosine similarity; ties keep index order.
    pub fn top_k(&self, query_embedding: &[f32], k: usize) -> Vec<RetrievedDocument> {
        let mut scored: Vec<(f32, &IndexedChunk)> = self
            .chunks
            .iter()
            .map(|chunk| (cosine_similarity(query_embedding, &chunk.embedding), chunk))
            .collect();

        scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));

        scored
            .into_iter()
            .take(k)
            .map(|(score, chunk)| {
                let mut doc = chunk.to_document();
                doc.metadata.insert("score".to_string(), format!("{:.4}", score));
                doc
            })
            .collect()
    }
}

enum IndexSlot {
    Building,
    Ready {
        index: Arc<VectorIndex>,
        built_at: DateTime<Utc>,
    },
    Failed(String),
}

/// Process-wide handle to the retrieval index and its readiness.
pub struct IndexHandle {
    embedder: Arc<dyn Embedder>,
    slot: RwLock<IndexSlot>,
    rebuild_lock: Mutex<()>,
}

impl IndexHandle {
    pub fn new(embedder: Arc<dyn Embedder>) -> Self {
        Self {
            embedder,
            slot: RwLock::new(IndexSlot::Building),
            rebuild_lock: Mutex::new(()),
        }
    }

    pub async fn status(&self) -> IndexStatus {
        match &*self.slot.read().await {
            IndexSlot::Building => IndexStatus {
                state: IndexState::Building,
                chunk_count: 0,
                built_at: None,
                error: None,
            },
            IndexSlot::Ready { index, built_at } => IndexStatus {
                state: IndexState::Ready,
                chunk_count: index.len(),
                built_at: Some(*built_at),
                error: None,
            },
            IndexSlot::Failed(reason) => IndexStatus {
                state: IndexState::Failed,
                chunk_count: 0,
                built_at: None,
                error: Some(reason.clone()),
            },
        }
    }

    pub async fn is_ready(&self) -> bool {
        matches!(&*self.slot.read().await, IndexSlot::Ready { .. })
    }

    /// Replace the served index with `chunks`.
    pub async fn publish(&self, chunks: Vec<IndexedChunk>) -> IndexStatus {
        let index = Arc::new(VectorIndex::new(chunks));
        let built_at = Utc::now();
        info!(chunk_count = index.len(), "Retrieval index ready");
        *self.slot.write().await = IndexSlot::Ready { index, built_at };
        self.status().await
    }

    pub async fn mark_failed(&self, reason: impl Into<String>) {
        let reason = reason.into();
        warn!(error = %reason, "Retrieval index unavailable");
        *self.slot.write().await = IndexSlot::Failed(reason);
    }

    /// Run `build` and publish its chunks. Concurrent rebuilds are serialised;
    /// readers keep using the previous index until the new one is swapped in.
    /// A failed rebuild leaves a previously ready index in place.
    pub async fn rebuild<F>(&self, build: F) -> Result<IndexStatus>
    where
        F: Future<Output = Result<Vec<IndexedChunk>>>,
    {
        let _guard = self.rebuild_lock.lock().await;

        match build.await {
            Ok(chunks) => Ok(self.publish(chunks).await),
            Err(err) => {
                if self.is_ready().await {
                    warn!(error = %err, "Index rebuild failed, keeping previous index");
                } else {
                    self.mark_failed(err.to_string()).await;
                }
                Err(err)
            }
        }
    }

    async fn ready_index(&self) -> Result<Arc<VectorIndex>> {
        match &*self.slot.read().await {
            IndexSlot::Ready { index, .. } => Ok(index.clone()),
            IndexSlot::Building => Err(AppError::IndexUnavailable(
                "index is still building".to_string(),
            )),
            IndexSlot::Failed(reason) => Err(AppError::IndexUnavailable(reason.clone())),
        }
    }
}

#[async_trait]
impl RetrievalProvider for IndexHandle {
    async fn search(&self, query: &str, k: usize) -> Result<Vec<RetrievedDocument>> {
        let index = self.ready_index().await?;
        if k == 0 || index.is_empty() {
            return Ok(Vec::new());
        }

        let query_embedding = self.embedder.embed(query).await?;
        Ok(index.top_k(&query_embedding, k))
    }
}
