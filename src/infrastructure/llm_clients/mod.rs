pub mod ollama;
pub mod openai;

use crate::domain::error::Result;
use crate::domain::llm_config::LLMConfig;
use crate::domain::llm_config::LLMProvider;
use async_trait::async_trait;
use ollama::OllamaClient;
use openai::OpenAIClient;

#[async_trait]
pub trait LLMClient: Send + Sync {
    /// Send one prompt and return the raw response text. An empty `system`
    /// sends the prompt as a single user message.
    async fn generate(&self, config: &LLMConfig, system: &str, user: &str) -> Result<String>;
}

pub struct RouterClient {
    openai: OpenAIClient,
    ollama: OllamaClient,
}

impl RouterClient {
    pub fn new() -> Self {
        Self {
            openai: OpenAIClient::new(),
            ollama: OllamaClient::new(),
        }
    }
}

impl Default for RouterClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LLMClient for RouterClient {
    async fn generate(&self, config: &LLMConfig, system: &str, user: &str) -> Result<String> {
        match config.provider {
            LLMProvider::Ollama => self.ollama.generate(config, system, user).await,
            LLMProvider::DeepSeek => self.openai.generate(config, system, user).await,
        }
    }
}

fn chat_messages(system: &str, user: &str) -> Vec<serde_json::Value> {
    let mut messages = Vec::with_capacity(2);
    if !system.trim().is_empty() {
        messages.push(serde_json::json!({ "role": "system", "content": system }));
    }
    messages.push(serde_json::json!({ "role": "user", "content": user }));
    messages
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::error::AppError;

    #[test]
    fn test_chat_messages_skip_empty_system() {
        let messages = chat_messages("", "prompt");
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0]["role"], "user");

        let messages = chat_messages("rules", "prompt");
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0]["role"], "system");
        assert_eq!(messages[1]["content"], "prompt");
    }

    #[tokio::test]
    async fn test_default_router_sends_deepseek_to_openai_client() {
        let err = RouterClient::default()
            .generate(&LLMConfig::default(), "", "prompt")
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::LLMError(ref msg) if msg.contains("Missing API key")));
    }
}
