use crate::domain::error::{AppError, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

#[async_trait]
pub trait Embedder: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;
}

#[derive(Debug, Serialize)]
struct OllamaEmbeddingRequest {
    model: String,
    prompt: String,
}

#[derive(Debug, Deserialize)]
struct OllamaEmbeddingResponse {
    embedding: Vec<f32>,
}

/// Embeddings from an Ollama server (`nomic-embed-text` by default).
pub struct OllamaEmbedder {
    client: Client,
    base_url: String,
    model: String,
}

impl OllamaEmbedder {
    pub fn new(base_url: &str, model: &str) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.to_string(),
            model: model.to_string(),
        }
    }

    fn embeddings_url(&self) -> String {
        let mut url = self.base_url.trim_end_matches('/').to_string();
        if url.ends_with("/v1") {
            url = url.trim_end_matches("/v1").to_string();
        }
        format!("{}/api/embeddings", url)
    }
}

#[async_trait]
impl Embedder for OllamaEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let url = self.embeddings_url();
        let request = OllamaEmbeddingRequest {
            model: self.model.clone(),
            prompt: text.to_string(),
        };

        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                AppError::RetrievalError(format!("Failed to call embedding API ({}): {}", url, e))
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(AppError::RetrievalError(format!(
                "Embedding API returned error {} (URL: {}): {}",
                status, url, error_text
            )));
        }

        let embedding_response: OllamaEmbeddingResponse = response.json().await.map_err(|e| {
            AppError::RetrievalError(format!("Failed to parse embedding response: {}", e))
        })?;

        if embedding_response.embedding.is_empty() {
            return Err(AppError::RetrievalError(
                "Empty embedding response".to_string(),
            ));
        }

        Ok(embedding_response.embedding)
    }
}

pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }

    let dot_product: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        dot_product / (norm_a * norm_b)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::spawn_server;
    use actix_web::{web, HttpResponse};
    use serde_json::json;

    #[test]
    fn test_cosine_similarity() {
        let a = vec![1.0, 0.0];
        let b = vec![1.0, 0.0];
        assert!((cosine_similarity(&a, &b) - 1.0).abs() < 0.001);

        let c = vec![0.0, 1.0];
        assert!(cosine_similarity(&a, &c).abs() < 0.001);

        assert_eq!(cosine_similarity(&a, &[1.0]), 0.0);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &a), 0.0);
    }

    #[test]
    fn test_embeddings_url_drops_openai_suffix() {
        let embedder = OllamaEmbedder::new("http://localhost:11434/v1/", "nomic-embed-text");
        assert_eq!(embedder.embeddings_url(), "http://localhost:11434/api/embeddings");
    }

    async fn embeddings(body: web::Json<serde_json::Value>) -> HttpResponse {
        let len = body["prompt"].as_str().unwrap_or_default().len() as f32;
        HttpResponse::Ok().json(json!({ "embedding": [len, 1.0] }))
    }

    #[actix_web::test]
    async fn test_embed_reads_vector() {
        let base = spawn_server(|cfg: &mut web::ServiceConfig| {
            cfg.route("/api/embeddings", web::post().to(embeddings));
        });
        let embedder = OllamaEmbedder::new(&base, "nomic-embed-text");
        assert_eq!(embedder.embed("abc").await.unwrap(), vec![3.0, 1.0]);
    }
}
