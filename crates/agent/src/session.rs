use std::sync::Arc;

use leadflow_core::{
    extract, ApplicationError, ConversationState, Stage, LAST_DISCOVERY_INDEX,
    RECOMMENDATIONS_OFFER,
};
use serde::Serialize;
use tracing::info;

use crate::analyzer::DocumentAnalyzer;
use crate::llm::LlmClient;
use crate::store::ConversationStore;
use crate::webhook::{dispatch_pending, WebhookTransport};

/// Result of one processed message.
#[derive(Clone, Debug, Serialize)]
pub struct TurnOutcome {
    pub reply: String,
    pub stage: Stage,
    pub next_question: String,
    /// Full conversation state after the turn, returned for operational
    /// debugging (webhook outcomes are visible here, never to the user).
    pub context: ConversationState,
}

/// Ties the conversation engine to its collaborators and runs one turn at
/// a time per conversation: extract → resolve stage → reply → maybe
/// dispatch webhook → pick next question → commit.
pub struct SessionOrchestrator {
    store: ConversationStore,
    llm: Arc<dyn LlmClient>,
    webhook: Arc<dyn WebhookTransport>,
    analyzer: Arc<dyn DocumentAnalyzer>,
}

impl SessionOrchestrator {
    pub fn new(
        store: ConversationStore,
        llm: Arc<dyn LlmClient>,
        webhook: Arc<dyn WebhookTransport>,
        analyzer: Arc<dyn DocumentAnalyzer>,
    ) -> Self {
        Self { store, llm, webhook, analyzer }
    }

    pub fn store(&self) -> &ConversationStore {
        &self.store
    }

    pub fn webhook_transport(&self) -> Arc<dyn WebhookTransport> {
        self.webhook.clone()
    }

    /// Processes one user message for `convo_id`.
    ///
    /// State is committed only after every local step succeeds; an LLM
    /// failure leaves the stored conversation exactly as it was, so a
    /// client retry does not advance the stage. Webhook failures do not
    /// fail the turn.
    pub async fn process(
        &self,
        convo_id: &str,
        message: &str,
        attachments: &[String],
    ) -> Result<TurnOutcome, ApplicationError> {
        if convo_id.trim().is_empty() {
            return Err(ApplicationError::InvalidRequest("convo_id must not be empty".to_string()));
        }

        let entry = self.store.entry(convo_id).await;
        let mut guard = entry.lock().await;

        // Work on a copy; `guard` is only overwritten on full success.
        let mut working = extract(message, &guard);

        // The count before this turn's question is appended: the stage the
        // user was answering.
        let questions_asked = working.questions_asked();
        let stage = Stage::resolve(questions_asked);

        for attachment in attachments {
            let note = self.analyzer.analyze(attachment).await;
            working.file_notes.push(note);
        }

        let prompt = turn_prompt(message, stage, &working);
        let reply = self
            .llm
            .complete(&prompt)
            .await
            .map_err(|error| ApplicationError::Llm(error.to_string()))?;

        dispatch_pending(convo_id, &mut working, self.webhook.as_ref()).await;

        // One-off transition rule on top of the pure stage mapping: the
        // moment the last discovery slot has been asked about, offer
        // recommendations instead of the scripted question for this count.
        let next_question = if questions_asked == LAST_DISCOVERY_INDEX {
            RECOMMENDATIONS_OFFER
        } else {
            stage.question()
        };

        working.record_turn(stage, next_question);
        *guard = working.clone();

        info!(
            event_name = "session.turn.completed",
            convo_id,
            stage = stage.as_str(),
            questions_asked = working.questions_asked(),
            basic_sent = working.webhook_basic_sent,
            discovery_sent = working.webhook_discovery_sent,
            "turn processed"
        );

        Ok(TurnOutcome { reply, stage, next_question: next_question.to_string(), context: working })
    }
}

/// Context block handed to the language model alongside the raw message.
/// The model sees where the script stands; it never drives it.
fn turn_prompt(message: &str, stage: Stage, state: &ConversationState) -> String {
    let collected = serde_json::to_string_pretty(&state.fields).unwrap_or_else(|_| "{}".to_string());
    let file_notes = if state.file_notes.is_empty() {
        String::new()
    } else {
        format!("\nArchivos analizados:\n{}\n", state.file_notes.join("\n"))
    };

    format!(
        "Mensaje del usuario: {message}\n\n\
         Contexto actual:\n\
         - Etapa: {stage}\n\
         - Preguntas hechas: {asked}/10 (6 básicas + 4 de discovery)\n\
         - Información recopilada: {collected}\n\
         {file_notes}\n\
         INSTRUCCIONES:\n\
         - Responde de forma breve y directa (máximo 2-3 líneas)\n\
         - Haz UNA SOLA pregunta a la vez y no repitas preguntas ya hechas\n\
         - Mantén el enfoque en procesos y automatizaciones\n",
        asked = state.questions_asked(),
    )
}
