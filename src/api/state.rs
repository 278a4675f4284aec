use std::sync::Arc;

use crate::{
    config::Config,
    db::{Catalog, InteractionLogs},
    error::AppResult,
    services::{GroqProvider, LlmProvider, VariantAssignment},
};

/// Shared application state
///
/// Everything here is either immutable (the catalog) or owns its own
/// synchronisation (the log writers), so handlers never take a lock.
#[derive(Clone)]
pub struct AppState {
    pub catalog: Arc<Catalog>,
    pub logs: InteractionLogs,
    pub llm: Arc<dyn LlmProvider>,
    pub variant_assignment: VariantAssignment,
}

impl AppState {
    pub fn new(
        catalog: Catalog,
        logs: InteractionLogs,
        llm: Arc<dyn LlmProvider>,
        variant_assignment: VariantAssignment,
    ) -> Self {
        Self {
            catalog: Arc::new(catalog),
            logs,
            llm,
            variant_assignment,
        }
    }

    /// Loads the catalog, starts the log writers and builds the LLM client
    ///
    /// Fails if the dataset cannot be loaded; the service does not start without it.
    pub fn from_config(config: &Config) -> AppResult<Self> {
        let catalog = Catalog::load(&config.data_dir)?;
        let logs = InteractionLogs::open(&config.log_dir);
        let llm = Arc::new(GroqProvider::from_config(config)?);

        Ok(Self::new(catalog, logs, llm, config.variant_assignment))
    }
}
