//! Leadflow agent runtime: the effectful half of the conversation engine.
//!
//! `leadflow-core` decides; this crate acts. It owns the seams to the
//! external collaborators (language model, lead webhook, attachment
//! analyzer), the per-conversation store, and the session orchestrator
//! that runs one full turn.

pub mod analyzer;
pub mod llm;
pub mod session;
pub mod store;
pub mod webhook;

pub use analyzer::{DocumentAnalyzer, TextPreviewAnalyzer};
pub use llm::{HttpLlmClient, LlmClient};
pub use session::{SessionOrchestrator, TurnOutcome};
pub use store::ConversationStore;
pub use webhook::{dispatch_pending, HttpWebhookTransport, WebhookError, WebhookTransport};
