//! Application state: the generator configuration and the optional generation backend.
//!
//! Both are built once at startup and shared read-only across requests.
//! Without OPENAI_API_KEY the server still starts; generation requests answer 503.

use std::sync::Arc;

use tracing::{info, instrument, warn};

use crate::config::{load_generator_config_from_env, GeneratorConfig};
use crate::generation::GenerationClient;
use crate::openai::OpenAI;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<GeneratorConfig>,
    pub client: Option<GenerationClient>,
}

impl AppState {
    /// Build state from env: load the TOML config (or defaults) and init OpenAI.
    #[instrument(level = "info", skip_all)]
    pub fn new() -> Self {
        let config = load_generator_config_from_env();
        info!(
            target: "mcq_bank_backend",
            question_workers = config.pipeline.question_workers,
            max_attempts = config.pipeline.max_attempts,
            retry_backoff_ms = config.pipeline.retry_backoff_ms,
            "Pipeline settings"
        );

        let client = match OpenAI::from_env() {
            Some(oa) => {
                info!(target: "mcq_bank_backend", base_url = %oa.base_url, model = %oa.model, reasoning_effort = ?oa.reasoning_effort, timeout = ?oa.timeout, "OpenAI enabled.");
                Some(GenerationClient::new(Arc::new(oa)))
            }
            None => {
                warn!(target: "mcq_bank_backend", "OpenAI disabled (no OPENAI_API_KEY). Question generation will answer 503.");
                None
            }
        };

        Self::with_client(config, client)
    }

    pub fn with_client(config: GeneratorConfig, client: Option<GenerationClient>) -> Self {
        Self { config: Arc::new(config), client }
    }

    pub fn generation_enabled(&self) -> bool {
        self.client.is_some()
    }
}
