use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::conversation::gate::{is_basic_complete, is_discovery_present};
use crate::conversation::state::{ConversationState, BASIC_FIELDS, DISCOVERY_FIELDS};

/// Sentinel for a required field that is unexpectedly empty at send time.
/// The gate makes this unreachable, but the payload must never omit a
/// required key.
pub const MISSING_VALUE: &str = "No especificado";

/// Which threshold crossing a payload belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WebhookKind {
    Basic,
    Discovery,
}

impl WebhookKind {
    /// `tipo_envio` tag the lead endpoint filters on.
    pub fn tag(&self) -> &'static str {
        match self {
            Self::Basic => "informacion_basica",
            Self::Discovery => "informacion_discovery",
        }
    }
}

/// The exact lead data for one webhook attempt. Building it is pure; the
/// agent crate owns the single transport attempt and the sent-flag update.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct LeadPayload {
    pub kind: WebhookKind,
    /// Ordered (payload key, value) pairs for the required contact fields.
    pub contact: Vec<(&'static str, String)>,
    /// One labelled line per discovery field that is set. Empty for basic.
    pub additional_info: Vec<String>,
}

impl LeadPayload {
    /// JSON object sent as the `lead_info` query parameter, matching the
    /// wire shape the lead endpoint already consumes.
    pub fn lead_info_json(&self) -> Value {
        let mut object = serde_json::Map::new();
        for (key, value) in &self.contact {
            object.insert((*key).to_string(), json!(value));
        }
        if !self.additional_info.is_empty() {
            object.insert("informacion_adicional".to_string(), json!(self.additional_info));
        }
        object.insert("tipo_envio".to_string(), json!(self.kind.tag()));
        Value::Object(object)
    }
}

/// Decides whether this turn crosses a webhook threshold and, if so, builds
/// the payload. Priority order per turn, mutually exclusive:
///
/// 1. basic info complete and the basic webhook not yet attempted;
/// 2. otherwise, basic already attempted, discovery info present, and the
///    discovery webhook not yet attempted.
///
/// Returns at most one payload per call. Pure: the sent-flags are only
/// consulted here, never set.
pub fn plan_dispatch(state: &ConversationState) -> Option<LeadPayload> {
    if is_basic_complete(&state.fields) && !state.webhook_basic_sent {
        Some(build_payload(WebhookKind::Basic, state))
    } else if state.webhook_basic_sent
        && is_discovery_present(&state.fields)
        && !state.webhook_discovery_sent
    {
        Some(build_payload(WebhookKind::Discovery, state))
    } else {
        None
    }
}

fn build_payload(kind: WebhookKind, state: &ConversationState) -> LeadPayload {
    let contact = BASIC_FIELDS
        .iter()
        .map(|field| {
            let key = field.payload_key().unwrap_or(field.as_str());
            let value = state
                .field(*field)
                .filter(|value| !value.trim().is_empty())
                .unwrap_or(MISSING_VALUE)
                .to_string();
            (key, value)
        })
        .collect();

    let additional_info = match kind {
        WebhookKind::Basic => Vec::new(),
        WebhookKind::Discovery => DISCOVERY_FIELDS
            .iter()
            .filter(|field| state.has_field(**field))
            .map(|field| {
                let label = field.additional_label().unwrap_or(field.as_str());
                format!("{label}: {}", state.field(*field).unwrap_or_default())
            })
            .collect(),
    };

    LeadPayload { kind, contact, additional_info }
}

#[cfg(test)]
mod tests {
    use super::{plan_dispatch, WebhookKind, MISSING_VALUE};
    use crate::conversation::state::{ConversationState, Field, BASIC_FIELDS};

    fn state_with_basic() -> ConversationState {
        let mut state = ConversationState::new();
        state.set_field(Field::ContactName, "Juan Pérez");
        state.set_field(Field::Role, "Gerente");
        state.set_field(Field::CompanyName, "Empresa Test");
        state.set_field(Field::Country, "México");
        state.set_field(Field::Email, "juan.perez@empresa.com");
        state.set_field(Field::Phone, "123456789");
        state
    }

    #[test]
    fn no_plan_while_basic_info_is_incomplete() {
        let mut state = ConversationState::new();
        state.set_field(Field::ContactName, "Juan");
        assert_eq!(plan_dispatch(&state), None);
    }

    #[test]
    fn basic_threshold_produces_basic_payload() {
        let state = state_with_basic();
        let payload = plan_dispatch(&state).expect("basic payload expected");

        assert_eq!(payload.kind, WebhookKind::Basic);
        assert!(payload.additional_info.is_empty());
        assert_eq!(payload.contact.len(), BASIC_FIELDS.len());

        let lead_info = payload.lead_info_json();
        assert_eq!(lead_info["nombre"], "Juan Pérez");
        assert_eq!(lead_info["telefono"], "123456789");
        assert_eq!(lead_info["tipo_envio"], "informacion_basica");
        assert!(lead_info.get("informacion_adicional").is_none());
    }

    #[test]
    fn basic_plan_is_suppressed_once_attempted() {
        let mut state = state_with_basic();
        state.mark_webhook_attempt(WebhookKind::Basic, "sent");
        assert_eq!(plan_dispatch(&state), None);
    }

    #[test]
    fn discovery_waits_for_basic_attempt() {
        let mut state = state_with_basic();
        state.set_field(Field::CompanyInfo, "distribuidora de alimentos");

        // Basic has priority on the same turn; never both.
        let payload = plan_dispatch(&state).expect("payload expected");
        assert_eq!(payload.kind, WebhookKind::Basic);

        state.mark_webhook_attempt(WebhookKind::Basic, "sent");
        let payload = plan_dispatch(&state).expect("discovery payload expected");
        assert_eq!(payload.kind, WebhookKind::Discovery);
        assert_eq!(payload.additional_info, vec!["Info Empresa: distribuidora de alimentos"]);

        let lead_info = payload.lead_info_json();
        assert_eq!(lead_info["tipo_envio"], "informacion_discovery");
        assert_eq!(lead_info["informacion_adicional"][0], "Info Empresa: distribuidora de alimentos");
    }

    #[test]
    fn discovery_plan_is_suppressed_once_attempted() {
        let mut state = state_with_basic();
        state.set_field(Field::ProcessInfo, "facturación manual");
        state.mark_webhook_attempt(WebhookKind::Basic, "sent");
        state.mark_webhook_attempt(WebhookKind::Discovery, "sent");
        assert_eq!(plan_dispatch(&state), None);
    }

    #[test]
    fn discovery_payload_lists_each_set_field_with_its_label() {
        let mut state = state_with_basic();
        state.set_field(Field::ProcessInfo, "facturación manual");
        state.set_field(Field::SystemsInfo, "excel y un erp viejo");
        state.mark_webhook_attempt(WebhookKind::Basic, "sent");

        let payload = plan_dispatch(&state).expect("discovery payload expected");
        assert_eq!(
            payload.additional_info,
            vec![
                "Info Proceso: facturación manual".to_string(),
                "Info Sistemas: excel y un erp viejo".to_string(),
            ]
        );
    }

    #[test]
    fn missing_required_value_gets_sentinel_not_omission() {
        let mut state = state_with_basic();
        state.set_field(Field::CompanyInfo, "algo");
        state.mark_webhook_attempt(WebhookKind::Basic, "sent");
        // Simulate an unexpectedly cleared slot at send time.
        state.fields.remove(&Field::Phone);

        let payload = plan_dispatch(&state).expect("discovery payload expected");
        let lead_info = payload.lead_info_json();
        assert_eq!(lead_info["telefono"], MISSING_VALUE);
    }

    #[test]
    fn plan_is_idempotent_without_state_changes() {
        let state = state_with_basic();
        assert_eq!(plan_dispatch(&state), plan_dispatch(&state));
    }
}
