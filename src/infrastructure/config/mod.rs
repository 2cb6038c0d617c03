//! Process configuration.
//!
//! Sources, later ones winning:
//! - compiled defaults
//! - `delivery-qa.toml` in the working directory (optional)
//! - environment variables named after the fields, upper-cased (`SUPABASE_URL`, ...);
//!   a `.env` file is loaded into the environment first

use crate::application::use_cases::chunking::ChunkConfig;
use crate::application::use_cases::prompt_engine::SqlScope;
use crate::domain::error::{AppError, Result};
use crate::domain::llm_config::{LLMConfig, LLMProvider};
use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use validator::{Validate, ValidationError};

pub const CONFIG_FILE: &str = "delivery-qa.toml";

const DEFAULT_ALLOWED_COLUMNS: [&str; 35] = [
    "delivery_note_number",
    "tracking_number",
    "delivery_note_status",
    "pod_document",
    "invoice_number",
    "customer_parent_name",
    "customer_branch_name",
    "customer_number",
    "order_type",
    "destination_country",
    "country_code",
    "destination_city",
    "postal_code",
    "address_street",
    "consignee_company_name",
    "consignee_person_name",
    "contact_number",
    "contact_email",
    "unique_lines",
    "total_delivery_note_qty",
    "total_picklist_qty",
    "total_net_amount",
    "total_vat_amount",
    "total_amount_including_tax",
    "total_net_weight_actual",
    "total_gross_weight_actual",
    "total_cbm_actual",
    "incoterm",
    "shipped_time_actual",
    "delivered_time_actual",
    "invoice_issued_time",
    "picklist_time",
    "notified_time",
    "created_time",
    "last_updated_time",
];

const ENV_KEYS: [&str; 25] = [
    "supabase_url",
    "supabase_anon_key",
    "supabase_rpc_function",
    "llm_provider",
    "deepseek_api_key",
    "deepseek_base_url",
    "deepseek_model",
    "ollama_base_url",
    "ollama_model",
    "llm_max_tokens",
    "embedding_base_url",
    "embedding_model",
    "schema_name",
    "table_name",
    "allowed_columns",
    "retrieval_top_k",
    "retrieval_max_chars",
    "default_row_limit",
    "doc_paths",
    "index_path",
    "chunk_size",
    "chunk_overlap",
    "http_host",
    "http_port",
    "log_filter",
];

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[validate(schema(function = "validate_chunking"))]
pub struct Settings {
    #[validate(url)]
    pub supabase_url: String,
    #[validate(length(min = 1, message = "SUPABASE_ANON_KEY is required"))]
    pub supabase_anon_key: String,
    #[validate(length(min = 1))]
    pub supabase_rpc_function: String,

    pub llm_provider: LLMProvider,
    pub deepseek_api_key: Option<String>,
    #[validate(url)]
    pub deepseek_base_url: String,
    pub deepseek_model: String,
    #[validate(url)]
    pub ollama_base_url: String,
    pub ollama_model: String,
    pub llm_max_tokens: Option<u32>,

    #[validate(url)]
    pub embedding_base_url: String,
    pub embedding_model: String,

    #[validate(length(min = 1))]
    pub schema_name: String,
    #[validate(length(min = 1))]
    pub table_name: String,
    #[validate(length(min = 1, message = "allowed_columns must not be empty"))]
    pub allowed_columns: Vec<String>,

    #[validate(range(min = 1))]
    pub retrieval_top_k: usize,
    #[validate(range(min = 1))]
    pub retrieval_max_chars: usize,
    #[validate(range(min = 1))]
    pub default_row_limit: u32,

    pub doc_paths: Vec<PathBuf>,
    pub index_path: PathBuf,
    #[validate(range(min = 1))]
    pub chunk_size: usize,
    pub chunk_overlap: usize,

    pub http_host: String,
    pub http_port: u16,
    pub log_filter: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            supabase_url: "http://localhost:54321".to_string(),
            supabase_anon_key: String::new(),
            supabase_rpc_function: "execute_sql_query".to_string(),
            llm_provider: LLMProvider::DeepSeek,
            deepseek_api_key: None,
            deepseek_base_url: "https://api.deepseek.com/v1".to_string(),
            deepseek_model: "deepseek-chat".to_string(),
            ollama_base_url: "http://localhost:11434".to_string(),
            ollama_model: "qwen2.5:7b".to_string(),
            llm_max_tokens: None,
            embedding_base_url: "http://localhost:11434".to_string(),
            embedding_model: "nomic-embed-text".to_string(),
            schema_name: "public".to_string(),
            table_name: "delivery_notes".to_string(),
            allowed_columns: DEFAULT_ALLOWED_COLUMNS.iter().map(|c| c.to_string()).collect(),
            retrieval_top_k: 1,
            retrieval_max_chars: 1500,
            default_row_limit: 20,
            doc_paths: vec![PathBuf::from("docs/index.md")],
            index_path: PathBuf::from("data/rag_index.sqlite"),
            chunk_size: 500,
            chunk_overlap: 100,
            http_host: "127.0.0.1".to_string(),
            http_port: 8000,
            log_filter: "info".to_string(),
        }
    }
}

fn validate_chunking(settings: &Settings) -> std::result::Result<(), ValidationError> {
    if settings.chunk_overlap >= settings.chunk_size {
        return Err(ValidationError::new("chunk_overlap_exceeds_chunk_size"));
    }
    Ok(())
}

impl Settings {
    /// Load `.env`, merge every source and validate.
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_figment(Self::figment())
    }

    pub fn figment() -> Figment {
        Figment::from(Serialized::defaults(Settings::default()))
            .merge(Toml::file(CONFIG_FILE))
            .merge(Env::raw().only(&ENV_KEYS))
    }

    pub fn from_figment(figment: Figment) -> Result<Self> {
        let settings: Settings = figment
            .extract()
            .map_err(|e| AppError::ConfigError(format!("Failed to load configuration: {}", e)))?;
        settings
            .validate()
            .map_err(|e| AppError::ConfigError(format!("Invalid configuration: {}", e)))?;
        Ok(settings)
    }

    pub fn to_llm_config(&self) -> LLMConfig {
        match self.llm_provider {
            LLMProvider::DeepSeek => LLMConfig {
                provider: LLMProvider::DeepSeek,
                base_url: self.deepseek_base_url.clone(),
                model: self.deepseek_model.clone(),
                api_key: self.deepseek_api_key.clone(),
                max_tokens: Some(self.llm_max_tokens.unwrap_or(512)),
                temperature: Some(0.0),
            },
            LLMProvider::Ollama => LLMConfig {
                provider: LLMProvider::Ollama,
                base_url: self.ollama_base_url.clone(),
                model: self.ollama_model.clone(),
                api_key: None,
                max_tokens: self.llm_max_tokens,
                temperature: Some(0.0),
            },
        }
    }

    pub fn sql_scope(&self) -> SqlScope {
        SqlScope {
            schema: self.schema_name.clone(),
            table: self.table_name.clone(),
            allowed_columns: self.allowed_columns.clone(),
            default_limit: self.default_row_limit,
        }
    }

    pub fn chunk_config(&self) -> ChunkConfig {
        ChunkConfig {
            chunk_size: self.chunk_size,
            overlap: self.chunk_overlap,
        }
    }

    pub fn bind_addr(&self) -> (String, u16) {
        (self.http_host.clone(), self.http_port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use figment::Jail;

    fn with_key(figment: Figment) -> Figment {
        figment.merge(Serialized::default("supabase_anon_key", "anon"))
    }

    #[test]
    fn test_defaults_match_dataset() {
        let settings = Settings::from_figment(with_key(Figment::from(Serialized::defaults(
            Settings::default(),
        ))))
        .unwrap();

        assert_eq!(settings.allowed_columns.len(), 35);
        assert_eq!(settings.retrieval_top_k, 1);
        assert_eq!(settings.retrieval_max_chars, 1500);
        assert_eq!(settings.default_row_limit, 20);
        assert_eq!(settings.supabase_rpc_function, "execute_sql_query");
        assert_eq!(settings.embedding_model, "nomic-embed-text");
    }

    #[test]
    fn test_missing_anon_key_is_rejected() {
        let err = Settings::from_figment(Figment::from(Serialized::defaults(Settings::default())))
            .unwrap_err();
        assert!(matches!(err, AppError::ConfigError(_)));
    }

    #[test]
    fn test_toml_overrides_defaults() {
        let figment = Figment::from(Serialized::defaults(Settings::default())).merge(Toml::string(
            r#"
            supabase_anon_key = "anon"
            table_name = "shipments"
            allowed_columns = ["tracking_number"]
            default_row_limit = 50
            "#,
        ));
        let settings = Settings::from_figment(figment).unwrap();
        let scope = settings.sql_scope();
        assert_eq!(scope.table, "shipments");
        assert_eq!(scope.allowed_columns, vec!["tracking_number".to_string()]);
        assert_eq!(scope.default_limit, 50);
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        for overrides in [
            r#"supabase_url = "not a url""#,
            "allowed_columns = []",
            "chunk_overlap = 600",
            "retrieval_top_k = 0",
        ] {
            let figment = with_key(Figment::from(Serialized::defaults(Settings::default())))
                .merge(Toml::string(overrides));
            assert!(Settings::from_figment(figment).is_err(), "{} accepted", overrides);
        }
    }

    #[test]
    fn test_environment_uses_plain_names() {
        Jail::expect_with(|jail| {
            jail.set_env("SUPABASE_URL", "https://project.supabase.co");
            jail.set_env("SUPABASE_ANON_KEY", "anon");
            jail.set_env("DEEPSEEK_API_KEY", "sk-live");
            jail.set_env("LLM_PROVIDER", "ollama");
            jail.set_env("OLLAMA_MODEL", "llama3");
            jail.set_env("HOME_DIRECTORY_UNRELATED", "ignored");

            let settings = Settings::from_figment(Settings::figment()).unwrap();
            assert_eq!(settings.supabase_url, "https://project.supabase.co");

            let llm = settings.to_llm_config();
            assert_eq!(llm.provider, LLMProvider::Ollama);
            assert_eq!(llm.model, "llama3");
            assert!(llm.api_key.is_none());
            Ok(())
        });
    }

    #[test]
    fn test_deepseek_config_carries_key() {
        let mut settings = Settings::default();
        settings.deepseek_api_key = Some("sk-live".to_string());
        let llm = settings.to_llm_config();
        assert_eq!(llm.provider, LLMProvider::DeepSeek);
        assert_eq!(llm.api_key.as_deref(), Some("sk-live"));
        assert_eq!(llm.max_tokens, Some(512));
    }
}
