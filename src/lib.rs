pub mod config;
pub mod error;
pub mod model;
pub mod relay;
pub mod web;

use config::RelayConfig;
use error::RelayResult;
use model::{ModelCatalog, OllamaClient};

/// Shared, read-mostly state handed to every request handler.
pub struct AppState {
    pub config: RelayConfig,
    pub backend: OllamaClient,
    pub catalog: ModelCatalog,
}

impl AppState {
    pub fn new(config: RelayConfig) -> RelayResult<Self> {
        let backend = OllamaClient::new(&config)?;
        Ok(Self {
            config,
            backend,
            catalog: ModelCatalog::new(),
        })
    }
}
