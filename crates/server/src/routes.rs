//! HTTP surface for the conversational lead-capture agent.
//!
//! Endpoints:
//! - `GET  /`                                 — service info and stage script
//! - `GET  /health`                           — liveness probe
//! - `POST /webhook`                          — process one user message
//! - `GET  /conversations`                    — list conversation summaries
//! - `GET  /conversations/{convo_id}`         — full state of one conversation
//! - `POST /conversations/{convo_id}/reset`   — wipe one conversation
//! - `POST /test-webhook`                     — fire a fixture lead payload
//!
//! When `auth.api_key` is configured, every endpoint except `/` and
//! `/health` requires a matching `x-api-key` header.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::Json,
    routing::{get, post},
    Router,
};
use leadflow_agent::{SessionOrchestrator, WebhookTransport};
use leadflow_core::{
    plan_dispatch, ApplicationError, ConversationState, Field, InterfaceError, Stage,
    LAST_DISCOVERY_INDEX,
};
use serde::{Deserialize, Serialize};
use tracing::{error, info};
use uuid::Uuid;

#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<SessionOrchestrator>,
    pub webhook: Arc<dyn WebhookTransport>,
    pub webhook_url: String,
    pub api_key: Option<String>,
}

// ---------------------------------------------------------------------------
// Request / Response types
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct MessageRequest {
    pub message: String,
    pub convo_id: Option<String>,
    /// Base64-encoded attachments, analyzed into context notes.
    #[serde(default)]
    pub files: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub reply: String,
    pub convo_id: String,
    pub stage: &'static str,
    pub next_question: String,
    pub context: ConversationState,
}

#[derive(Debug, Serialize)]
pub struct ConversationSummary {
    pub convo_id: String,
    pub stage: &'static str,
    pub contact_name: Option<String>,
    /// Filled slots out of the ten the script collects.
    pub progress: usize,
    pub questions_asked: usize,
    pub webhook_basic_sent: bool,
    pub webhook_discovery_sent: bool,
    pub last_updated: String,
}

#[derive(Debug, Serialize)]
pub struct ActionResponse {
    pub success: bool,
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
    pub correlation_id: String,
}

#[derive(Debug, Serialize)]
pub struct ServiceInfo {
    pub service: &'static str,
    pub version: &'static str,
    pub capabilities: [&'static str; 3],
    pub stages: Vec<&'static str>,
}

type ErrorResponse = (StatusCode, Json<ErrorBody>);

// ---------------------------------------------------------------------------
// Router
// ---------------------------------------------------------------------------

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(service_info))
        .route("/health", get(health))
        .route("/webhook", post(process_message))
        .route("/conversations", get(list_conversations))
        .route("/conversations/{convo_id}", get(get_conversation))
        .route("/conversations/{convo_id}/reset", post(reset_conversation))
        .route("/test-webhook", post(test_webhook))
        .with_state(state)
}

fn authorize(state: &AppState, headers: &HeaderMap) -> Result<(), ErrorResponse> {
    let Some(expected) = state.api_key.as_deref() else {
        return Ok(());
    };
    let provided = headers.get("x-api-key").and_then(|value| value.to_str().ok());
    if provided == Some(expected) {
        return Ok(());
    }

    let correlation_id = Uuid::new_v4().to_string();
    info!(event_name = "http.auth.rejected", correlation_id, "request with bad or missing api key");
    Err((
        StatusCode::UNAUTHORIZED,
        Json(ErrorBody {
            error: "Invalid or missing api key.".to_string(),
            correlation_id,
        }),
    ))
}

fn interface_error(error: ApplicationError) -> ErrorResponse {
    let correlation_id = Uuid::new_v4().to_string();
    error!(
        event_name = "http.request.failed",
        correlation_id,
        error = %error,
        "turn processing failed"
    );

    let interface = error.into_interface(correlation_id);
    let status = match interface {
        InterfaceError::BadRequest { .. } => StatusCode::BAD_REQUEST,
        InterfaceError::ServiceUnavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
        InterfaceError::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
    };
    let body = ErrorBody {
        error: interface.user_message().to_string(),
        correlation_id: interface.correlation_id().to_string(),
    };
    (status, Json(body))
}

fn not_found(convo_id: &str) -> ErrorResponse {
    (
        StatusCode::NOT_FOUND,
        Json(ErrorBody {
            error: format!("conversation `{convo_id}` not found"),
            correlation_id: Uuid::new_v4().to_string(),
        }),
    )
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

async fn service_info() -> Json<ServiceInfo> {
    let stages =
        (0..=LAST_DISCOVERY_INDEX + 1).map(|count| Stage::resolve(count).as_str()).collect();
    Json(ServiceInfo {
        service: "leadflow-server",
        version: env!("CARGO_PKG_VERSION"),
        capabilities: ["lead_capture", "document_analysis", "webhook_dispatch"],
        stages,
    })
}

async fn health(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "webhook_configured": !state.webhook_url.is_empty(),
        "webhook_url": state.webhook_url,
    }))
}

async fn process_message(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<MessageRequest>,
) -> Result<Json<MessageResponse>, ErrorResponse> {
    authorize(&state, &headers)?;

    let convo_id = request.convo_id.unwrap_or_else(|| "default".to_string());
    let outcome = state
        .orchestrator
        .process(&convo_id, &request.message, &request.files)
        .await
        .map_err(interface_error)?;

    Ok(Json(MessageResponse {
        reply: outcome.reply,
        convo_id,
        stage: outcome.stage.as_str(),
        next_question: outcome.next_question,
        context: outcome.context,
    }))
}

async fn list_conversations(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<Vec<ConversationSummary>>, ErrorResponse> {
    authorize(&state, &headers)?;

    let mut summaries: Vec<ConversationSummary> = state
        .orchestrator
        .store()
        .snapshot_all()
        .await
        .into_iter()
        .map(|(convo_id, snapshot)| summarize(convo_id, &snapshot))
        .collect();
    summaries.sort_by(|a, b| a.convo_id.cmp(&b.convo_id));

    Ok(Json(summaries))
}

fn summarize(convo_id: String, snapshot: &ConversationState) -> ConversationSummary {
    ConversationSummary {
        convo_id,
        stage: snapshot.stage.as_str(),
        contact_name: snapshot.field(Field::ContactName).map(str::to_string),
        progress: snapshot.progress(),
        questions_asked: snapshot.questions_asked(),
        webhook_basic_sent: snapshot.webhook_basic_sent,
        webhook_discovery_sent: snapshot.webhook_discovery_sent,
        last_updated: snapshot.last_updated.to_rfc3339(),
    }
}

async fn get_conversation(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(convo_id): Path<String>,
) -> Result<Json<ConversationState>, ErrorResponse> {
    authorize(&state, &headers)?;

    match state.orchestrator.store().snapshot(&convo_id).await {
        Some(snapshot) => Ok(Json(snapshot)),
        None => Err(not_found(&convo_id)),
    }
}

async fn reset_conversation(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(convo_id): Path<String>,
) -> Result<Json<ActionResponse>, ErrorResponse> {
    authorize(&state, &headers)?;

    if state.orchestrator.store().reset(&convo_id).await {
        info!(event_name = "http.conversation.reset", convo_id, "conversation wiped");
        Ok(Json(ActionResponse {
            success: true,
            message: format!("conversation `{convo_id}` reset"),
        }))
    } else {
        Err(not_found(&convo_id))
    }
}

/// Fires a canned basic-lead payload at the configured webhook endpoint, so
/// operators can verify connectivity without a full conversation.
async fn test_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<ActionResponse>, ErrorResponse> {
    authorize(&state, &headers)?;

    let mut fixture = ConversationState::new();
    fixture.set_field(Field::ContactName, "Juan Pérez");
    fixture.set_field(Field::Role, "Gerente de Operaciones");
    fixture.set_field(Field::CompanyName, "Empresa Test");
    fixture.set_field(Field::Country, "México");
    fixture.set_field(Field::Email, "juan.perez@empresatest.com");
    fixture.set_field(Field::Phone, "+52 555 123 4567");

    let payload = plan_dispatch(&fixture)
        .ok_or_else(|| interface_error(ApplicationError::Webhook("fixture produced no payload".to_string())))?;

    match state.webhook.send(&payload).await {
        Ok(()) => {
            info!(event_name = "http.test_webhook.sent", "test lead payload delivered");
            Ok(Json(ActionResponse {
                success: true,
                message: "test payload delivered".to_string(),
            }))
        }
        Err(error) => Err(interface_error(ApplicationError::Webhook(error.to_string()))),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use anyhow::Result;
    use async_trait::async_trait;
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use leadflow_agent::{
        ConversationStore, LlmClient, SessionOrchestrator, TextPreviewAnalyzer, WebhookError,
        WebhookTransport,
    };
    use leadflow_core::LeadPayload;
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use super::{router, AppState};

    struct FixedLlm;

    #[async_trait]
    impl LlmClient for FixedLlm {
        async fn complete(&self, _prompt: &str) -> Result<String> {
            Ok("entendido".to_string())
        }
    }

    #[derive(Default)]
    struct CountingTransport {
        calls: AtomicUsize,
        fail: bool,
    }

    #[async_trait]
    impl WebhookTransport for CountingTransport {
        async fn send(&self, _payload: &LeadPayload) -> Result<(), WebhookError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                Err(WebhookError::Status(500))
            } else {
                Ok(())
            }
        }
    }

    fn app_state(api_key: Option<&str>) -> (AppState, Arc<CountingTransport>) {
        let transport = Arc::new(CountingTransport::default());
        let orchestrator = SessionOrchestrator::new(
            ConversationStore::new(),
            Arc::new(FixedLlm),
            transport.clone(),
            Arc::new(TextPreviewAnalyzer),
        );
        let state = AppState {
            orchestrator: Arc::new(orchestrator),
            webhook: transport.clone(),
            webhook_url: "https://hooks.example.com/lead".to_string(),
            api_key: api_key.map(str::to_string),
        };
        (state, transport)
    }

    fn message_request(convo_id: &str, message: &str) -> Request<Body> {
        let body = json!({ "message": message, "convo_id": convo_id });
        Request::builder()
            .method("POST")
            .uri("/webhook")
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .expect("request should build")
    }

    async fn json_body(body: Body) -> Value {
        let bytes = to_bytes(body, usize::MAX).await.expect("body should be readable");
        serde_json::from_slice(&bytes).expect("body should be json")
    }

    #[tokio::test]
    async fn health_endpoint_reports_ok() {
        let (state, _) = app_state(None);
        let response = router(state)
            .oneshot(Request::builder().uri("/health").body(Body::empty()).expect("request"))
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response.into_body()).await;
        assert_eq!(body["status"], "ok");
    }

    #[tokio::test]
    async fn service_info_lists_the_stage_script_in_order() {
        let (state, _) = app_state(None);
        let response = router(state)
            .oneshot(Request::builder().uri("/").body(Body::empty()).expect("request"))
            .await
            .expect("response");

        let body = json_body(response.into_body()).await;
        assert_eq!(body["service"], "leadflow-server");
        assert_eq!(body["stages"][0], "initial_greeting");
        assert_eq!(body["stages"][11], "providing_recommendations");
    }

    #[tokio::test]
    async fn message_turn_returns_reply_and_stage() {
        let (state, _) = app_state(None);
        let app = router(state);

        let response =
            app.clone().oneshot(message_request("c1", "Hola")).await.expect("response");
        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response.into_body()).await;
        assert_eq!(body["reply"], "entendido");
        assert_eq!(body["stage"], "initial_greeting");
        assert!(body["next_question"].as_str().unwrap_or_default().contains("nombre completo"));

        let response =
            app.oneshot(message_request("c1", "Juan Pérez")).await.expect("response");
        let body = json_body(response.into_body()).await;
        assert_eq!(body["stage"], "collecting_name");
        assert_eq!(body["context"]["fields"]["contact_name"], "Juan Pérez");
    }

    #[tokio::test]
    async fn blank_convo_id_is_a_bad_request() {
        let (state, _) = app_state(None);
        let response = router(state)
            .oneshot(message_request("   ", "Hola"))
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = json_body(response.into_body()).await;
        assert!(!body["correlation_id"].as_str().unwrap_or_default().is_empty());
    }

    #[tokio::test]
    async fn api_key_guard_rejects_missing_and_wrong_keys() {
        let (state, _) = app_state(Some("sekret"));
        let app = router(state);

        let response =
            app.clone().oneshot(message_request("c1", "Hola")).await.expect("response");
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let wrong = Request::builder()
            .method("POST")
            .uri("/webhook")
            .header("content-type", "application/json")
            .header("x-api-key", "nope")
            .body(Body::from(json!({ "message": "Hola" }).to_string()))
            .expect("request");
        let response = app.clone().oneshot(wrong).await.expect("response");
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let right = Request::builder()
            .method("POST")
            .uri("/webhook")
            .header("content-type", "application/json")
            .header("x-api-key", "sekret")
            .body(Body::from(json!({ "message": "Hola" }).to_string()))
            .expect("request");
        let response = app.oneshot(right).await.expect("response");
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn health_stays_open_when_auth_is_configured() {
        let (state, _) = app_state(Some("sekret"));
        let response = router(state)
            .oneshot(Request::builder().uri("/health").body(Body::empty()).expect("request"))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn conversations_are_listed_and_fetchable() {
        let (state, _) = app_state(None);
        let app = router(state);

        app.clone().oneshot(message_request("b", "Hola")).await.expect("response");
        app.clone().oneshot(message_request("a", "Hola")).await.expect("response");
        app.clone().oneshot(message_request("a", "Ana García")).await.expect("response");

        let response = app
            .clone()
            .oneshot(Request::builder().uri("/conversations").body(Body::empty()).expect("request"))
            .await
            .expect("response");
        let body = json_body(response.into_body()).await;
        let summaries = body.as_array().expect("summary list");
        assert_eq!(summaries.len(), 2);
        assert_eq!(summaries[0]["convo_id"], "a");
        assert_eq!(summaries[0]["contact_name"], "Ana García");
        assert_eq!(summaries[0]["questions_asked"], 2);
        assert_eq!(summaries[1]["convo_id"], "b");

        let response = app
            .oneshot(Request::builder().uri("/conversations/a").body(Body::empty()).expect("request"))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response.into_body()).await;
        assert_eq!(body["fields"]["contact_name"], "Ana García");
    }

    #[tokio::test]
    async fn unknown_conversation_is_not_found() {
        let (state, _) = app_state(None);
        let response = router(state)
            .oneshot(
                Request::builder().uri("/conversations/ghost").body(Body::empty()).expect("request"),
            )
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn reset_wipes_a_known_conversation_and_404s_an_unknown_one() {
        let (state, _) = app_state(None);
        let app = router(state);

        app.clone().oneshot(message_request("c1", "Hola")).await.expect("response");

        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/conversations/c1/reset")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response.into_body()).await;
        assert_eq!(body["success"], true);

        let response = app
            .clone()
            .oneshot(
                Request::builder().uri("/conversations/c1").body(Body::empty()).expect("request"),
            )
            .await
            .expect("response");
        let body = json_body(response.into_body()).await;
        assert_eq!(body["stage"], "initial_greeting");

        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/conversations/ghost/reset")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_webhook_fires_the_fixture_payload() {
        let (state, transport) = app_state(None);
        let response = router(state)
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/test-webhook")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(transport.calls.load(Ordering::SeqCst), 1);
        let body = json_body(response.into_body()).await;
        assert_eq!(body["success"], true);
    }

    #[tokio::test]
    async fn failed_test_webhook_maps_to_service_unavailable() {
        let transport = Arc::new(CountingTransport { calls: AtomicUsize::new(0), fail: true });
        let orchestrator = SessionOrchestrator::new(
            ConversationStore::new(),
            Arc::new(FixedLlm),
            transport.clone(),
            Arc::new(TextPreviewAnalyzer),
        );
        let state = AppState {
            orchestrator: Arc::new(orchestrator),
            webhook: transport,
            webhook_url: "https://hooks.example.com/lead".to_string(),
            api_key: None,
        };

        let response = router(state)
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/test-webhook")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }
}
