pub mod application;
pub mod domain;
pub mod infrastructure;
pub mod interfaces;
#[cfg(test)]
mod test_support;

pub use crate::application::AskUseCase;
pub use crate::domain::error::{AppError, Result};
pub use crate::domain::qa::{AskRequest, AskResponse};
pub use crate::infrastructure::config::Settings;

use crate::infrastructure::bootstrap::bootstrap;
use crate::interfaces::http::start_server;
use tracing::info;
use tracing_subscriber::EnvFilter;

fn init_tracing(default_filter: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}

/// Load configuration, build the retrieval index and serve HTTP until shutdown.
pub async fn run() -> Result<()> {
    let settings = Settings::load()?;
    init_tracing(&settings.log_filter);
    info!(provider = ?settings.llm_provider, table = %settings.table_name, "Starting delivery-qa");

    let state = bootstrap(settings).await?;
    start_server(state)?.await?;
    Ok(())
}
