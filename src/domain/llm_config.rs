use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LLMProvider {
    /// Any OpenAI-compatible chat completions API (DeepSeek by default).
    #[serde(alias = "openai")]
    DeepSeek,
    Ollama,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct LLMConfig {
    pub provider: LLMProvider,
    pub base_url: String,
    pub model: String,
    pub api_key: Option<String>,
    pub max_tokens: Option<u32>,
    pub temperature: Option<f32>,
}

impl Default for LLMConfig {
    fn default() -> Self {
        Self {
            provider: LLMProvider::DeepSeek,
            base_url: "https://api.deepseek.com/v1".to_string(),
            model: "deepseek-chat".to_string(),
            api_key: None,
            max_tokens: Some(512),
            temperature: Some(0.0),
        }
    }
}

impl LLMConfig {
    /// Joins `path` onto the base URL without doubling the slash.
    pub fn endpoint(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_joins_single_slash() {
        let mut config = LLMConfig::default();
        config.base_url = "http://localhost:11434/".to_string();
        assert_eq!(config.endpoint("/api/chat"), "http://localhost:11434/api/chat");
        config.base_url = "http://localhost:11434".to_string();
        assert_eq!(config.endpoint("api/chat"), "http://localhost:11434/api/chat");
    }

    #[test]
    fn test_provider_accepts_openai_alias() {
        let provider: LLMProvider = serde_json::from_str("\"openai\"").unwrap();
        assert_eq!(provider, LLMProvider::DeepSeek);
        let provider: LLMProvider = serde_json::from_str("\"ollama\"").unwrap();
        assert_eq!(provider, LLMProvider::Ollama);
    }
}
