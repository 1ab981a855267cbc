use std::sync::Arc;

use vee_core::Config;
use vee_rules::{Store, ValidationPipeline};

/// Shared application state handed to every handler.
pub struct AppState {
    pub config: Config,
    pub store: Arc<dyn Store>,
    pub pipeline: ValidationPipeline,
    /// `"postgres"` or `"memory"`, reported by `/health`.
    pub backend: &'static str,
}

impl AppState {
    pub fn new(config: Config, store: Arc<dyn Store>, backend: &'static str) -> Self {
        let pipeline = ValidationPipeline::from_config(&config.engine);
        Self {
            config,
            store,
            pipeline,
            backend,
        }
    }
}
