use super::{chat_messages, LLMClient};
use crate::domain::error::{AppError, Result};
use crate::domain::llm_config::LLMConfig;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

const DEFAULT_NUM_PREDICT: u32 = 200;
const TOP_P: f32 = 0.9;
const NUM_CTX: u32 = 2048;

#[derive(Serialize)]
struct OllamaChatRequest {
    model: String,
    messages: Vec<serde_json::Value>,
    stream: bool,
    format: String,
    options: OllamaOptions,
}

#[derive(Serialize)]
struct OllamaOptions {
    temperature: f32,
    num_predict: u32,
    top_p: f32,
    num_ctx: u32,
}

#[derive(Deserialize)]
struct OllamaChatResponse {
    message: OllamaMessage,
}

#[derive(Deserialize)]
struct OllamaMessage {
    content: String,
}

/// Ollama `/api/chat` client constrained to JSON output.
pub struct OllamaClient {
    client: reqwest::Client,
}

impl OllamaClient {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }
}

impl Default for OllamaClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LLMClient for OllamaClient {
    async fn generate(&self, config: &LLMConfig, system: &str, user: &str) -> Result<String> {
        let url = config.endpoint("api/chat");

        let request = OllamaChatRequest {
            model: config.model.clone(),
            messages: chat_messages(system, user),
            stream: false,
            format: "json".to_string(),
            options: OllamaOptions {
                temperature: config.temperature.unwrap_or(0.0),
                num_predict: config.max_tokens.unwrap_or(DEFAULT_NUM_PREDICT),
                top_p: TOP_P,
                num_ctx: NUM_CTX,
            },
        };

        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| AppError::LLMError(format!("Request failed ({}): {}", url, e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(AppError::LLMError(format!(
                "API error ({}): {}",
                status, text
            )));
        }

        let chat: OllamaChatResponse = response
            .json()
            .await
            .map_err(|e| AppError::LLMError(format!("Failed to parse JSON: {}", e)))?;

        Ok(chat.message.content.trim().to_string())
    }
}
