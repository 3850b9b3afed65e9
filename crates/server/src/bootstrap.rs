use std::sync::Arc;

use deedcraft_agent::llm::{HttpLlmClient, LlmError};
use deedcraft_agent::pipeline::{AgentPipeline, DraftingPipeline};
use deedcraft_core::config::{AppConfig, ConfigError, LoadOptions};
use deedcraft_core::session::{SessionId, SessionStore};
use thiserror::Error;
use tracing::info;

pub struct Application {
    pub config: AppConfig,
    pub store: SessionStore,
    pub session_id: SessionId,
    pub pipeline: Arc<dyn AgentPipeline>,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("llm client construction failed: {0}")]
    Llm(#[from] LlmError),
}

pub async fn bootstrap(options: LoadOptions) -> Result<Application, BootstrapError> {
    let config = AppConfig::load(options)?;
    bootstrap_with_config(config).await
}

pub async fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    info!(
        event_name = "system.bootstrap.start",
        session_id = "unassigned",
        "starting application bootstrap"
    );

    let llm = Arc::new(HttpLlmClient::from_config(&config.llm)?);
    let store = SessionStore::new();
    let pipeline: Arc<dyn AgentPipeline> = Arc::new(DraftingPipeline::new(llm, store.clone()));

    // Single-session design: one conversation lives for the process lifetime.
    let session_id = store.create();
    info!(
        event_name = "system.bootstrap.session_created",
        session_id = %session_id,
        "drafting session created"
    );

    Ok(Application { config, store, session_id, pipeline })
}

#[cfg(test)]
mod tests {
    use deedcraft_core::config::{ConfigOverrides, LlmProvider, LoadOptions};

    use crate::bootstrap::bootstrap;

    #[tokio::test]
    async fn bootstrap_fails_fast_without_provider_credentials() {
        let result = bootstrap(LoadOptions {
            overrides: ConfigOverrides {
                llm_provider: Some(LlmProvider::Ollama),
                ..ConfigOverrides::default()
            },
            ..LoadOptions::default()
        })
        .await;

        assert!(result.is_err());
        let message = result.err().expect("error").to_string();
        assert!(message.contains("llm.base_url"));
    }

    #[tokio::test]
    async fn bootstrap_creates_the_single_drafting_session() {
        let app = bootstrap(LoadOptions {
            overrides: ConfigOverrides {
                llm_provider: Some(LlmProvider::Ollama),
                llm_base_url: Some("http://localhost:11434".to_string()),
                llm_model: Some("llama3.1".to_string()),
                ..ConfigOverrides::default()
            },
            ..LoadOptions::default()
        })
        .await
        .expect("bootstrap should succeed with valid overrides");

        assert_eq!(app.store.len(), 1);
        let state = app.store.snapshot(&app.session_id).expect("session should exist");
        assert!(state.interaction_history.is_empty());
    }
}
