use crate::domain::error::{AppError, Result};
use crate::domain::retrieval::IndexedChunk;
use sqlx::sqlite::{
    SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions, SqliteSynchronous,
};
use std::collections::HashSet;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

const INDEX_SCHEMA: &str = "CREATE TABLE IF NOT EXISTS rag_chunks (
    id TEXT PRIMARY KEY,
    path TEXT NOT NULL,
    heading_path TEXT NOT NULL DEFAULT '',
    content TEXT NOT NULL,
    embedding BLOB NOT NULL,
    indexed_at TEXT NOT NULL
)";

const INDEX_PATH_INDEX: &str = "CREATE INDEX IF NOT EXISTS idx_rag_chunks_path ON rag_chunks(path)";

#[derive(sqlx::FromRow)]
struct IndexedChunkEntity {
    id: String,
    path: String,
    heading_path: String,
    content: String,
    embedding: Vec<u8>,
}

impl TryFrom<IndexedChunkEntity> for IndexedChunk {
    type Error = AppError;

    fn try_from(entity: IndexedChunkEntity) -> Result<Self> {
        Ok(Self {
            embedding: bytes_to_embedding(&entity.embedding)?,
            id: entity.id,
            path: entity.path,
            heading_path: entity.heading_path,
            content: entity.content,
        })
    }
}

/// SQLite persistence for embedded documentation chunks.
pub struct IndexStore {
    pool: SqlitePool,
}

impl IndexStore {
    pub async fn connect(db_path: &Path) -> Result<Self> {
        if let Some(parent) = db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let db_url = db_path_to_url(db_path)?;
        let options = SqliteConnectOptions::from_str(&db_url)
            .map_err(|e| AppError::DatabaseError(format!("Failed to parse index DB URL: {}", e)))?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .busy_timeout(Duration::from_secs(5));

        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .acquire_timeout(Duration::from_secs(5))
            .connect_with(options)
            .await
            .map_err(|e| AppError::DatabaseError(format!("Failed to connect index DB: {}", e)))?;

        let store = Self { pool };
        store.apply_schema().await?;
        Ok(store)
    }

    /// A private in-memory store; one connection so every query sees the same database.
    pub async fn in_memory() -> Result<Self> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")
            .map_err(|e| AppError::DatabaseError(format!("Failed to parse index DB URL: {}", e)))?;

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await
            .map_err(|e| AppError::DatabaseError(format!("Failed to open in-memory index: {}", e)))?;

        let store = Self { pool };
        store.apply_schema().await?;
        Ok(store)
    }

    async fn apply_schema(&self) -> Result<()> {
        sqlx::query(INDEX_SCHEMA)
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(format!("Failed to create rag_chunks: {}", e)))?;
        sqlx::query(INDEX_PATH_INDEX)
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(format!("Failed to index rag_chunks: {}", e)))?;
        Ok(())
    }

    /// Insert or replace chunks by id. Returns the number of rows written.
    pub async fn upsert_chunks(&self, chunks: &[IndexedChunk]) -> Result<usize> {
        let indexed_at = chrono::Utc::now().to_rfc3339();
        let mut tx = self.pool.begin().await?;

        for chunk in chunks {
            sqlx::query(
                "INSERT INTO rag_chunks (id, path, heading_path, content, embedding, indexed_at)
                 VALUES (?, ?, ?, ?, ?, ?)
                 ON CONFLICT(id) DO UPDATE SET
                    path = excluded.path,
                    heading_path = excluded.heading_path,
                    content = excluded.content,
                    embedding = excluded.embedding,
                    indexed_at = excluded.indexed_at",
            )
            .bind(&chunk.id)
            .bind(&chunk.path)
            .bind(&chunk.heading_path)
            .bind(&chunk.content)
            .bind(embedding_to_bytes(&chunk.embedding))
            .bind(&indexed_at)
            .execute(&mut *tx)
            .await
            .map_err(|e| AppError::DatabaseError(format!("Failed to upsert chunk: {}", e)))?;
        }

        tx.commit().await?;
        Ok(chunks.len())
    }

    /// Ids already stored for a document path.
    pub async fn chunk_ids_for_path(&self, path: &str) -> Result<HashSet<String>> {
        let ids: Vec<String> = sqlx::query_scalar("SELECT id FROM rag_chunks WHERE path = ?")
            .bind(path)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(format!("Failed to list chunk ids: {}", e)))?;
        Ok(ids.into_iter().collect())
    }

    /// Drop chunks of `path` that are not in `keep`, e.g. after the document was edited.
    pub async fn remove_stale(&self, path: &str, keep: &HashSet<String>) -> Result<u64> {
        let mut removed = 0;
        for id in self.chunk_ids_for_path(path).await? {
            if keep.contains(&id) {
                continue;
            }
            let result = sqlx::query("DELETE FROM rag_chunks WHERE id = ?")
                .bind(&id)
                .execute(&self.pool)
                .await
                .map_err(|e| AppError::DatabaseError(format!("Failed to delete chunk: {}", e)))?;
            removed += result.rows_affected();
        }
        Ok(removed)
    }

    pub async fn load_all(&self) -> Result<Vec<IndexedChunk>> {
        let entities = sqlx::query_as::<_, IndexedChunkEntity>(
            "SELECT id, path, heading_path, content, embedding FROM rag_chunks ORDER BY path, id",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(format!("Failed to load chunks: {}", e)))?;

        entities.into_iter().map(IndexedChunk::try_from).collect()
    }
}

fn db_path_to_url(db_path: &Path) -> Result<String> {
    let db_path_str = db_path.to_str().ok_or_else(|| {
        AppError::DatabaseError("Index database path is not valid UTF-8".to_string())
    })?;
    Ok(format!("sqlite://{}", db_path_str.replace("\\", "/")))
}

pub fn embedding_to_bytes(embedding: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(embedding.len() * 4);
    for &val in embedding {
        bytes.extend_from_slice(&val.to_le_bytes());
    }
    bytes
}

pub fn bytes_to_embedding(bytes: &[u8]) -> Result<Vec<f32>> {
    if bytes.len() % 4 != 0 {
        return Err(AppError::ParseError(
            "Invalid embedding bytes length".to_string(),
        ));
    }

    Ok(bytes
        .chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect())
}
