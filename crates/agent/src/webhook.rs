use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use leadflow_core::config::WebhookConfig;
use leadflow_core::{plan_dispatch, ConversationState, LeadPayload, WebhookKind};
use thiserror::Error;
use tracing::{info, warn};

#[derive(Debug, Error)]
pub enum WebhookError {
    #[error("webhook request failed: {0}")]
    Transport(String),
    #[error("webhook returned status {0}")]
    Status(u16),
}

/// Outbound seam to the external lead-capture endpoint. Implementations
/// attempt delivery once; retry policy lives with the caller (and the
/// caller's policy is: none).
#[async_trait]
pub trait WebhookTransport: Send + Sync {
    async fn send(&self, payload: &LeadPayload) -> Result<(), WebhookError>;
}

/// GET-with-query transport matching the lead endpoint's existing wire
/// contract: `lead_info` (JSON), `timestamp` (RFC 3339), `source`.
pub struct HttpWebhookTransport {
    client: reqwest::Client,
    url: String,
    source: String,
}

impl HttpWebhookTransport {
    pub fn new(config: &WebhookConfig) -> Result<Self, WebhookError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|error| WebhookError::Transport(error.to_string()))?;
        Ok(Self { client, url: config.url.clone(), source: config.source.clone() })
    }
}

#[async_trait]
impl WebhookTransport for HttpWebhookTransport {
    async fn send(&self, payload: &LeadPayload) -> Result<(), WebhookError> {
        let params = [
            ("lead_info", payload.lead_info_json().to_string()),
            ("timestamp", Utc::now().to_rfc3339()),
            ("source", self.source.clone()),
        ];

        let response = self
            .client
            .get(&self.url)
            .query(&params)
            .send()
            .await
            .map_err(|error| WebhookError::Transport(error.to_string()))?;

        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            Err(WebhookError::Status(status.as_u16()))
        }
    }
}

/// Runs the dispatcher for one turn: plan, attempt at most once, and mark
/// the threshold as spent whatever the transport said. Fire-and-forget by
/// design; a failed send is logged and recorded in the state, never
/// retried and never surfaced to the end user.
///
/// Returns the kind attempted this turn, if any.
pub async fn dispatch_pending(
    convo_id: &str,
    state: &mut ConversationState,
    transport: &dyn WebhookTransport,
) -> Option<WebhookKind> {
    let payload = plan_dispatch(state)?;
    let kind = payload.kind;

    let outcome = match transport.send(&payload).await {
        Ok(()) => {
            info!(
                event_name = "webhook.dispatch.sent",
                convo_id,
                kind = kind.tag(),
                "lead webhook delivered"
            );
            format!("{}: sent", kind.tag())
        }
        Err(error) => {
            warn!(
                event_name = "webhook.dispatch.failed",
                convo_id,
                kind = kind.tag(),
                error = %error,
                "lead webhook delivery failed, not retrying"
            );
            format!("{}: send failed: {error}", kind.tag())
        }
    };

    state.mark_webhook_attempt(kind, outcome);
    Some(kind)
}
