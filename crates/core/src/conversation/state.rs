use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::conversation::dispatch::WebhookKind;
use crate::conversation::stage::Stage;

/// A named slot the conversation script fills from free-text answers.
///
/// The set is closed per agent variant; the webhook payload keys keep the
/// Spanish names the external lead endpoint expects.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Field {
    ContactName,
    Role,
    CompanyName,
    Country,
    Email,
    Phone,
    CompanyInfo,
    ProcessInfo,
    GoalsProblems,
    SystemsInfo,
}

/// Contact fields that must all be present before the first webhook fires.
pub const BASIC_FIELDS: [Field; 6] = [
    Field::ContactName,
    Field::Role,
    Field::CompanyName,
    Field::Country,
    Field::Email,
    Field::Phone,
];

/// Open-ended discovery fields; any one of them arms the second webhook.
pub const DISCOVERY_FIELDS: [Field; 4] =
    [Field::CompanyInfo, Field::ProcessInfo, Field::GoalsProblems, Field::SystemsInfo];

impl Field {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ContactName => "contact_name",
            Self::Role => "role",
            Self::CompanyName => "company_name",
            Self::Country => "country",
            Self::Email => "email",
            Self::Phone => "phone",
            Self::CompanyInfo => "company_info",
            Self::ProcessInfo => "process_info",
            Self::GoalsProblems => "goals_problems",
            Self::SystemsInfo => "systems_info",
        }
    }

    /// Key used in the lead webhook payload. Basic fields only.
    pub fn payload_key(&self) -> Option<&'static str> {
        match self {
            Self::ContactName => Some("nombre"),
            Self::Role => Some("puesto"),
            Self::CompanyName => Some("empresa"),
            Self::Country => Some("pais"),
            Self::Email => Some("email"),
            Self::Phone => Some("telefono"),
            _ => None,
        }
    }

    /// Label prefixing the field value inside `informacion_adicional`.
    /// Discovery fields only.
    pub fn additional_label(&self) -> Option<&'static str> {
        match self {
            Self::CompanyInfo => Some("Info Empresa"),
            Self::ProcessInfo => Some("Info Proceso"),
            Self::GoalsProblems => Some("Objetivos/Problemas"),
            Self::SystemsInfo => Some("Info Sistemas"),
            _ => None,
        }
    }
}

impl std::fmt::Display for Field {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Accumulated state for one conversation identifier.
///
/// `asked_questions` is append-only and its length is the sole driver of
/// stage progression. The cached `stage` is for display; it is recomputed
/// from the count every turn.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ConversationState {
    pub fields: BTreeMap<Field, String>,
    pub asked_questions: Vec<String>,
    pub user_responses: Vec<String>,
    pub file_notes: Vec<String>,
    pub stage: Stage,
    pub webhook_basic_sent: bool,
    pub webhook_discovery_sent: bool,
    pub last_webhook_outcome: Option<String>,
    pub last_updated: DateTime<Utc>,
}

impl ConversationState {
    pub fn new() -> Self {
        Self {
            fields: BTreeMap::new(),
            asked_questions: Vec::new(),
            user_responses: Vec::new(),
            file_notes: Vec::new(),
            stage: Stage::InitialGreeting,
            webhook_basic_sent: false,
            webhook_discovery_sent: false,
            last_webhook_outcome: None,
            last_updated: Utc::now(),
        }
    }

    pub fn questions_asked(&self) -> usize {
        self.asked_questions.len()
    }

    pub fn field(&self, field: Field) -> Option<&str> {
        self.fields.get(&field).map(String::as_str)
    }

    /// True when the slot holds a non-empty value.
    pub fn has_field(&self, field: Field) -> bool {
        self.field(field).is_some_and(|value| !value.trim().is_empty())
    }

    pub fn set_field(&mut self, field: Field, value: &str) {
        self.fields.insert(field, value.trim().to_string());
    }

    /// Keyword-cue assignment: fills the slot only if the positional rule
    /// (or an earlier cue) has not already claimed it.
    pub fn set_field_if_unset(&mut self, field: Field, value: &str) {
        if !self.has_field(field) {
            self.set_field(field, value);
        }
    }

    /// Count of filled basic + discovery slots, for operator summaries.
    pub fn progress(&self) -> usize {
        BASIC_FIELDS
            .iter()
            .chain(DISCOVERY_FIELDS.iter())
            .filter(|field| self.has_field(**field))
            .count()
    }

    /// Appends the question chosen for this turn and refreshes the cached
    /// stage and timestamp. Exactly one call per processed message.
    pub fn record_turn(&mut self, stage: Stage, next_question: &str) {
        self.asked_questions.push(next_question.to_string());
        self.stage = stage;
        self.last_updated = Utc::now();
    }

    /// Marks the webhook attempt for `kind` as spent, success or not.
    /// Sent-flags are monotonic; only [`reset`](Self::reset) clears them.
    pub fn mark_webhook_attempt(&mut self, kind: WebhookKind, outcome: impl Into<String>) {
        match kind {
            WebhookKind::Basic => self.webhook_basic_sent = true,
            WebhookKind::Discovery => self.webhook_discovery_sent = true,
        }
        self.last_webhook_outcome = Some(outcome.into());
        self.last_updated = Utc::now();
    }

    pub fn reset(&mut self) {
        *self = Self::new();
    }
}

impl Default for ConversationState {
    fn default() -> Self {
        Self::new()
    }
}
