use std::sync::Arc;

use anyhow::{Context, Result};
use leadflow_agent::{
    ConversationStore, HttpLlmClient, HttpWebhookTransport, SessionOrchestrator,
    TextPreviewAnalyzer, WebhookTransport,
};
use leadflow_core::config::AppConfig;
use secrecy::ExposeSecret;

use crate::routes::AppState;

pub struct App {
    pub config: AppConfig,
    pub state: AppState,
}

/// Wires the real collaborators into the orchestrator. Route handlers only
/// ever see the trait objects, so tests swap in stubs at the same seams.
pub fn bootstrap_with_config(config: AppConfig) -> Result<App> {
    let llm = HttpLlmClient::new(config.llm.clone()).context("could not build llm client")?;
    let webhook: Arc<dyn WebhookTransport> = Arc::new(
        HttpWebhookTransport::new(&config.webhook).context("could not build webhook transport")?,
    );

    let orchestrator = SessionOrchestrator::new(
        ConversationStore::new(),
        Arc::new(llm),
        webhook.clone(),
        Arc::new(TextPreviewAnalyzer),
    );

    let api_key = config.auth.api_key.as_ref().map(|key| key.expose_secret().to_string());
    let state = AppState {
        orchestrator: Arc::new(orchestrator),
        webhook,
        webhook_url: config.webhook.url.clone(),
        api_key,
    };

    tracing::info!(
        event_name = "system.bootstrap.completed",
        llm_provider = ?config.llm.provider,
        llm_model = %config.llm.model,
        auth_enabled = state.api_key.is_some(),
        "collaborators wired"
    );

    Ok(App { config, state })
}
