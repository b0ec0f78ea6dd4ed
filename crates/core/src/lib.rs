pub mod config;
pub mod conversation;
pub mod errors;

pub use conversation::dispatch::{plan_dispatch, LeadPayload, WebhookKind, MISSING_VALUE};
pub use conversation::extract::{extract, position_field};
pub use conversation::gate::{is_basic_complete, is_discovery_present};
pub use conversation::stage::{Stage, DEFAULT_QUESTION, LAST_DISCOVERY_INDEX, RECOMMENDATIONS_OFFER};
pub use conversation::state::{ConversationState, Field, BASIC_FIELDS, DISCOVERY_FIELDS};
pub use errors::{ApplicationError, InterfaceError};
