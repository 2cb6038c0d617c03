pub mod error;
pub mod llm_config;
pub mod qa;
pub mod retrieval;
