use crate::conversation::state::{ConversationState, Field};

/// Position → field table: slot `n` is the answer to question `n` of the
/// linear script (position 0 is the greeting, which asks nothing). Kept as
/// one explicit table so tests can enumerate it exhaustively.
const POSITION_FIELDS: [(usize, Field); 10] = [
    (1, Field::ContactName),
    (2, Field::Role),
    (3, Field::CompanyName),
    (4, Field::Country),
    (5, Field::Email),
    (6, Field::Phone),
    (7, Field::CompanyInfo),
    (8, Field::ProcessInfo),
    (9, Field::GoalsProblems),
    (10, Field::SystemsInfo),
];

/// Keyword cues for the best-effort fallback pass. Substring containment
/// on the lowercased message; assigns the whole message to the field.
const KEYWORD_CUES: [(Field, &[&str]); 4] = [
    (Field::CompanyInfo, &["empresa", "compañía", "company", "sector", "industria", "trabajo"]),
    (Field::ProcessInfo, &["proceso", "flujo", "tarea", "workflow", "auditar"]),
    (Field::GoalsProblems, &["objetivo", "problema", "mejorar", "automatizar", "ahorrar"]),
    (Field::SystemsInfo, &["sistema", "herramienta", "software", "excel", "erp", "crm"]),
];

/// The field answered at `position` (the asked-question count before this
/// turn's question is appended), if the position is inside the script.
pub fn position_field(position: usize) -> Option<Field> {
    POSITION_FIELDS
        .iter()
        .find(|(slot, _)| *slot == position)
        .map(|(_, field)| *field)
}

/// Assigns the incoming message to conversation slots and returns the
/// updated copy. The input state is untouched; the caller decides whether
/// to commit the result.
///
/// The positional rule is authoritative and unconditional for its slot.
/// The keyword pass afterwards only fills slots that are still empty, so a
/// positional assignment is never overwritten. Total over any message,
/// including the empty string.
pub fn extract(message: &str, state: &ConversationState) -> ConversationState {
    let mut updated = state.clone();
    updated.user_responses.push(message.to_string());

    // The question being answered is the one asked last turn, so the slot
    // index is the count before this turn's question is appended.
    let position = state.questions_asked();
    if let Some(field) = position_field(position) {
        updated.set_field(field, message);
    }

    apply_keyword_cues(message, &mut updated);
    updated
}

fn apply_keyword_cues(message: &str, updated: &mut ConversationState) {
    if message.trim().is_empty() {
        return;
    }

    if let Some(name) = name_after_cue(message) {
        updated.set_field_if_unset(Field::ContactName, &name);
    }

    let lowered = message.to_lowercase();
    for (field, cues) in KEYWORD_CUES {
        if cues.iter().any(|cue| lowered.contains(cue)) {
            updated.set_field_if_unset(field, message);
        }
    }
}

/// Loose lexical name cue: the word following "me llamo"/"soy"/"mi nombre
/// es". Only `es` preceded by `nombre` counts, to avoid grabbing the word
/// after any copula.
fn name_after_cue(message: &str) -> Option<String> {
    let words: Vec<&str> = message.split_whitespace().collect();
    for (index, word) in words.iter().enumerate() {
        let lowered = word.to_lowercase();
        let is_cue = match lowered.as_str() {
            "llamo" | "soy" => true,
            "es" => index > 0 && words[index - 1].to_lowercase() == "nombre",
            _ => false,
        };
        if is_cue {
            if let Some(next) = words.get(index + 1) {
                let name = next.trim_matches(|c: char| c.is_ascii_punctuation());
                if !name.is_empty() {
                    return Some(name.to_string());
                }
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::{extract, position_field, POSITION_FIELDS};
    use crate::conversation::stage::Stage;
    use crate::conversation::state::{ConversationState, Field};

    fn state_with_questions(count: usize) -> ConversationState {
        let mut state = ConversationState::new();
        for index in 0..count {
            let stage = Stage::resolve(index);
            state.record_turn(stage, stage.question());
        }
        state
    }

    #[test]
    fn position_table_covers_every_scripted_slot() {
        assert_eq!(position_field(0), None);
        for (slot, field) in POSITION_FIELDS {
            assert_eq!(position_field(slot), Some(field));
        }
        assert_eq!(position_field(11), None);
    }

    #[test]
    fn first_answer_fills_contact_name() {
        let state = state_with_questions(1);
        let updated = extract("Juan Pérez", &state);
        assert_eq!(updated.field(Field::ContactName), Some("Juan Pérez"));
        assert_eq!(updated.user_responses, vec!["Juan Pérez".to_string()]);
    }

    #[test]
    fn positional_assignment_trims_whitespace() {
        let state = state_with_questions(5);
        let updated = extract("  ana@example.com \n", &state);
        assert_eq!(updated.field(Field::Email), Some("ana@example.com"));
    }

    #[test]
    fn discovery_positions_fill_discovery_slots() {
        let state = state_with_questions(7);
        let updated = extract("Somos una distribuidora de alimentos con 40 personas", &state);
        assert_eq!(
            updated.field(Field::CompanyInfo),
            Some("Somos una distribuidora de alimentos con 40 personas")
        );
    }

    #[test]
    fn keyword_cue_fills_unset_field_only() {
        let mut state = state_with_questions(2);
        state.set_field(Field::ProcessInfo, "ya registrado");

        let updated = extract("el proceso de facturación usa un sistema viejo", &state);

        // Positional rule claims Role; the process cue must not overwrite.
        assert_eq!(updated.field(Field::Role), Some("el proceso de facturación usa un sistema viejo"));
        assert_eq!(updated.field(Field::ProcessInfo), Some("ya registrado"));
        assert_eq!(
            updated.field(Field::SystemsInfo),
            Some("el proceso de facturación usa un sistema viejo")
        );
    }

    #[test]
    fn keyword_cue_never_overwrites_positional_value() {
        let state = state_with_questions(3);
        let updated = extract("Acme", &state);
        assert_eq!(updated.field(Field::CompanyName), Some("Acme"));

        // A later keyword-bearing message must leave CompanyName alone.
        let mut later = updated;
        later.record_turn(Stage::resolve(3), Stage::resolve(3).question());
        let after = extract("mi empresa se llama Acme y quiero mejorar", &later);
        assert_eq!(after.field(Field::CompanyName), Some("Acme"));
        assert!(after.has_field(Field::CompanyInfo));
        assert!(after.has_field(Field::GoalsProblems));
    }

    #[test]
    fn name_cue_captures_following_word() {
        let state = state_with_questions(0);
        let updated = extract("Hola, me llamo Marta, vengo por una auditoría", &state);
        assert_eq!(updated.field(Field::ContactName), Some("Marta"));
    }

    #[test]
    fn bare_es_is_not_a_name_cue() {
        let state = state_with_questions(0);
        let updated = extract("la meta es crecer", &state);
        assert_eq!(updated.field(Field::ContactName), None);
    }

    #[test]
    fn out_of_table_position_only_runs_keyword_pass() {
        let state = state_with_questions(12);
        let updated = extract("seguimos usando excel para todo", &state);
        assert_eq!(updated.fields.len(), 1);
        assert_eq!(updated.field(Field::SystemsInfo), Some("seguimos usando excel para todo"));
    }

    #[test]
    fn empty_message_is_accepted_and_stored() {
        let state = state_with_questions(1);
        let updated = extract("", &state);
        assert_eq!(updated.user_responses.len(), 1);
        assert!(!updated.has_field(Field::ContactName));
    }

    #[test]
    fn input_state_is_not_mutated() {
        let state = state_with_questions(1);
        let _ = extract("Juan", &state);
        assert!(state.fields.is_empty());
        assert!(state.user_responses.is_empty());
    }

    #[test]
    fn positional_value_survives_subsequent_turns() {
        let mut state = state_with_questions(1);
        state = extract("Juan Pérez", &state);
        for count in 1..6 {
            let stage = Stage::resolve(count);
            state.record_turn(stage, stage.question());
            state = extract("respuesta cualquiera", &state);
        }
        assert_eq!(state.field(Field::ContactName), Some("Juan Pérez"));
    }
}
