use std::sync::Arc;

use tracing::{error, info, warn};

use crate::application::use_cases::ask_service::AskUseCase;
use crate::application::use_cases::embedding_service::{Embedder, OllamaEmbedder};
use crate::application::use_cases::index_builder::IndexBuilder;
use crate::application::use_cases::query_executor::QueryExecutor;
use crate::application::use_cases::retrieval_service::IndexHandle;
use crate::application::use_cases::sql_generator::SqlGenerator;
use crate::application::use_cases::sql_safety_gate::SqlSafetyGate;
use crate::domain::error::Result;
use crate::domain::llm_config::LLMProvider;
use crate::infrastructure::config::Settings;
use crate::infrastructure::db::IndexStore;
use crate::infrastructure::llm_clients::{LLMClient, RouterClient};
use crate::infrastructure::supabase::SupabaseRpcClient;

/// Process-wide services, built once before the server binds and read-only afterwards.
pub struct AppState {
    pub settings: Arc<Settings>,
    pub ask: AskUseCase,
    pub index: Arc<IndexHandle>,
}

/// Wire every service and build the retrieval index.
///
/// An index build failure does not abort startup: the handle records the
/// failure, `/ready` reports it and questions get an "index unavailable" note.
pub async fn bootstrap(settings: Settings) -> Result<Arc<AppState>> {
    let settings = Arc::new(settings);

    if settings.llm_provider == LLMProvider::DeepSeek && settings.deepseek_api_key.is_none() {
        warn!("DEEPSEEK_API_KEY is not set; SQL generation will fail until it is configured");
    }

    let embedder: Arc<dyn Embedder> = Arc::new(OllamaEmbedder::new(
        &settings.embedding_base_url,
        &settings.embedding_model,
    ));
    let index = Arc::new(IndexHandle::new(embedder.clone()));

    let store = Arc::new(IndexStore::connect(&settings.index_path).await?);
    let builder = IndexBuilder::new(
        store,
        embedder,
        settings.chunk_config(),
        settings.doc_paths.clone(),
    );

    info!(index_path = %settings.index_path.display(), "Building retrieval index");
    if let Err(err) = index.rebuild(builder.build()).await {
        error!(error = %err, "Failed to build retrieval index");
    }

    let endpoint = Arc::new(SupabaseRpcClient::new(
        &settings.supabase_url,
        &settings.supabase_anon_key,
        &settings.supabase_rpc_function,
    )?);
    let llm: Arc<dyn LLMClient> = Arc::new(RouterClient::new());

    let generator = SqlGenerator::new(
        index.clone(),
        llm,
        settings.to_llm_config(),
        settings.sql_scope(),
        settings.retrieval_top_k,
        settings.retrieval_max_chars,
    );
    let executor = QueryExecutor::new(endpoint, SqlSafetyGate::new(settings.default_row_limit));

    Ok(Arc::new(AppState {
        settings,
        ask: AskUseCase::new(generator, executor),
        index,
    }))
}
