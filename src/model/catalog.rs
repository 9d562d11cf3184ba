use std::collections::HashSet;
use std::sync::RwLock;

use log::{info, warn};

use crate::error::{RelayError, RelayResult};
use crate::model::OllamaClient;
use crate::web::models::ModelInfo;

/// Last known set of model names offered by the backend.
///
/// `None` until the first successful listing.
#[derive(Debug, Default)]
pub struct ModelCatalog {
    known: RwLock<Option<HashSet<String>>>,
}

impl ModelCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the known set with a fresh listing.
    pub fn record(&self, models: &[ModelInfo]) {
        let names: HashSet<String> = models.iter().map(|m| m.name.clone()).collect();
        info!("Model catalog refreshed: {} models available", names.len());
        match self.known.write() {
            Ok(mut guard) => *guard = Some(names),
            Err(poisoned) => *poisoned.into_inner() = Some(names),
        }
    }

    pub fn is_loaded(&self) -> bool {
        match self.known.read() {
            Ok(guard) => guard.is_some(),
            Err(poisoned) => poisoned.into_inner().is_some(),
        }
    }

    /// Check a model against the last listing without contacting the backend.
    pub fn validate(&self, model: &str) -> RelayResult<()> {
        if model.trim().is_empty() {
            return Err(RelayError::InvalidModel("no model selected".to_string()));
        }

        let guard = match self.known.read() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        match guard.as_ref() {
            Some(names) if names.contains(model) => Ok(()),
            Some(_) => Err(RelayError::InvalidModel(format!(
                "model '{model}' is not available on the backend"
            ))),
            None => Err(RelayError::InvalidModel(format!(
                "model '{model}' cannot be checked: no model listing yet"
            ))),
        }
    }

    /// Validate a model, fetching the first listing if none has been seen yet.
    pub async fn ensure_valid(&self, model: &str, backend: &OllamaClient) -> RelayResult<()> {
        if model.trim().is_empty() {
            return Err(RelayError::InvalidModel("no model selected".to_string()));
        }
        if !self.is_loaded() {
            warn!("No model listing cached yet, fetching one before validating '{}'", model);
            let models = backend.list_models().await?;
            self.record(&models);
        }
        self.validate(model)
    }
}
