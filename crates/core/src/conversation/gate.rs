use std::collections::BTreeMap;

use crate::conversation::state::{Field, BASIC_FIELDS, DISCOVERY_FIELDS};

fn has_value(fields: &BTreeMap<Field, String>, field: Field) -> bool {
    fields.get(&field).is_some_and(|value| !value.trim().is_empty())
}

/// True iff every required contact field is present and non-empty. Gates
/// the first (basic) webhook dispatch.
pub fn is_basic_complete(fields: &BTreeMap<Field, String>) -> bool {
    BASIC_FIELDS.iter().all(|field| has_value(fields, *field))
}

/// True iff any discovery field is present and non-empty. Deliberately an
/// "any", not an "all": one substantive discovery answer is enough to
/// enrich the lead. Gates the second (discovery) webhook dispatch.
pub fn is_discovery_present(fields: &BTreeMap<Field, String>) -> bool {
    DISCOVERY_FIELDS.iter().any(|field| has_value(fields, *field))
}
