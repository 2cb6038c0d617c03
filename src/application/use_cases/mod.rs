pub mod ask_service;
pub mod chunking;
pub mod embedding_service;
pub mod index_builder;
pub mod prompt_engine;
pub mod query_executor;
pub mod retrieval_service;
pub mod sql_generator;
pub mod sql_safety_gate;
