use crate::application::use_cases::chunking::{ChunkConfig, ChunkEngine};
use crate::application::use_cases::embedding_service::Embedder;
use crate::domain::error::Result;
use crate::domain::retrieval::IndexedChunk;
use crate::infrastructure::db::IndexStore;
use sha2::{Digest, Sha256};
use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Stable chunk id: the same text at the same path always hashes to the same row.
pub fn chunk_id(path: &str, content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(format!("{}::{}", path, content).as_bytes());
    hex::encode(hasher.finalize())
}

/// Reads the documentation files, embeds new chunks and syncs the chunk store.
pub struct IndexBuilder {
    store: Arc<IndexStore>,
    embedder: Arc<dyn Embedder>,
    chunker: ChunkEngine,
    doc_paths: Vec<PathBuf>,
}

impl IndexBuilder {
    pub fn new(
        store: Arc<IndexStore>,
        embedder: Arc<dyn Embedder>,
        chunk_config: ChunkConfig,
        doc_paths: Vec<PathBuf>,
    ) -> Self {
        Self {
            store,
            embedder,
            chunker: ChunkEngine::new(chunk_config),
            doc_paths,
        }
    }

    /// Index every configured document and return the chunks to serve.
    ///
    /// Missing documents are skipped. Chunks already stored under the same id
    /// are not re-embedded.
    pub async fn build(&self) -> Result<Vec<IndexedChunk>> {
        let mut indexed_paths = HashSet::new();

        for doc_path in &self.doc_paths {
            if !doc_path.exists() {
                warn!(path = %doc_path.display(), "Documentation file not found, skipping");
                continue;
            }

            let path = doc_path.to_string_lossy().to_string();
            let markdown = tokio::fs::read_to_string(doc_path).await?;
            self.index_document(&path, &markdown).await?;
            indexed_paths.insert(path);
        }

        let chunks: Vec<IndexedChunk> = self
            .store
            .load_all()
            .await?
            .into_iter()
            .filter(|chunk| indexed_paths.contains(&chunk.path))
            .collect();

        info!(
            documents = indexed_paths.len(),
            chunks = chunks.len(),
            "Documentation index built"
        );
        Ok(chunks)
    }

    async fn index_document(&self, path: &str, markdown: &str) -> Result<()> {
        let existing = self.store.chunk_ids_for_path(path).await?;
        let mut current = HashSet::new();
        let mut fresh = Vec::new();

        for chunk in self.chunker.split_markdown(markdown) {
            let id = chunk_id(path, &chunk.content);
            if !current.insert(id.clone()) || existing.contains(&id) {
                continue;
            }

            let embedding = self.embedder.embed(&chunk.content).await?;
            fresh.push(IndexedChunk {
                id,
                path: path.to_string(),
                heading_path: chunk.heading_path,
                content: chunk.content,
                embedding,
            });
        }

        let written = self.store.upsert_chunks(&fresh).await?;
        let removed = self.store.remove_stale(path, &current).await?;
        debug!(path, total = current.len(), written, removed, "Document synced");
        Ok(())
    }
}
