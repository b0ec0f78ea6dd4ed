use serde::{Deserialize, Serialize};

/// Index of the last scripted discovery question. Once the asked-question
/// count reaches this index the orchestrator forces the recommendations
/// offer instead of the scripted question for that count.
pub const LAST_DISCOVERY_INDEX: usize = 10;

/// Defensive fallback for a stage missing from the question table. The
/// resolver is total, so this should be unreachable, but a lookup miss must
/// never crash a turn.
pub const DEFAULT_QUESTION: &str = "¿Puedes proporcionarme más detalles sobre tu proceso?";

/// The one-off transition question layered on top of the stage script: once
/// enough discovery material exists, offer recommendations or more digging.
pub const RECOMMENDATIONS_OFFER: &str = "Perfecto, ya tengo suficiente información. Tengo \
     algunas recomendaciones específicas para tu caso. ¿Te gustaría que te las comparta ahora, \
     o prefieres que exploremos más a fondo algún aspecto específico de tus necesidades?";

/// A point in the fixed linear question script. Determined solely by how
/// many questions have been asked; never by message content.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    InitialGreeting,
    CollectingName,
    CollectingRole,
    CollectingCompany,
    CollectingCountry,
    CollectingEmail,
    CollectingPhone,
    #[serde(rename = "question_1_company_info")]
    Question1CompanyInfo,
    #[serde(rename = "question_2_process_details")]
    Question2ProcessDetails,
    #[serde(rename = "question_3_automation_opportunities")]
    Question3AutomationOpportunities,
    #[serde(rename = "question_4_goals_constraints")]
    Question4GoalsConstraints,
    ProvidingRecommendations,
}

/// Stage-to-question table. One literal per stage; any stage absent here
/// falls back to [`DEFAULT_QUESTION`].
const QUESTION_BANK: [(Stage, &str); 12] = [
    (
        Stage::InitialGreeting,
        "¡Hola! Soy tu auditor de procesos especializado en transformación digital. \
         Para comenzar, ¿cuál es tu nombre completo?",
    ),
    (Stage::CollectingName, "¿Cuál es tu cargo o rol en la empresa?"),
    (Stage::CollectingRole, "¿En qué empresa trabajas?"),
    (Stage::CollectingCompany, "¿En qué país opera tu empresa?"),
    (Stage::CollectingCountry, "¿Cuál es tu correo electrónico?"),
    (Stage::CollectingEmail, "¿Cuál es tu número de teléfono para contactarte?"),
    (
        Stage::CollectingPhone,
        "Perfecto. Ahora dime TODO lo que puedas sobre tu empresa: sector, tamaño, \
         procesos principales, problemas actuales, objetivos de mejora, sistemas que usan, \
         y cualquier otra información relevante.",
    ),
    (
        Stage::Question1CompanyInfo,
        "Cuéntame en detalle sobre el proceso específico que quieres mejorar: flujo completo, \
         tiempo que toma, errores frecuentes, personas involucradas, sistemas utilizados, \
         y cuellos de botella que identificas.",
    ),
    (
        Stage::Question2ProcessDetails,
        "¿Qué tareas repetitivas, manuales o que consumen mucho tiempo realizan en este \
         proceso? ¿Qué reportes generan manualmente? ¿Qué integraciones entre sistemas \
         necesitan?",
    ),
    (
        Stage::Question3AutomationOpportunities,
        "¿Cuál es tu objetivo específico de mejora? ¿Qué beneficios buscas (ahorro de tiempo, \
         reducción de errores, mejor experiencia del cliente, etc.)? ¿Tienes algún presupuesto \
         o restricción?",
    ),
    (Stage::Question4GoalsConstraints, RECOMMENDATIONS_OFFER),
    (
        Stage::ProvidingRecommendations,
        "Basándome en tu información, puedo sugerir algunas automatizaciones. \
         ¿Te interesa conocerlas?",
    ),
];

impl Stage {
    /// Maps an asked-question count to its stage. Total over all counts;
    /// anything past the script is the terminal recommendations stage.
    pub fn resolve(questions_asked: usize) -> Self {
        match questions_asked {
            0 => Self::InitialGreeting,
            1 => Self::CollectingName,
            2 => Self::CollectingRole,
            3 => Self::CollectingCompany,
            4 => Self::CollectingCountry,
            5 => Self::CollectingEmail,
            6 => Self::CollectingPhone,
            7 => Self::Question1CompanyInfo,
            8 => Self::Question2ProcessDetails,
            9 => Self::Question3AutomationOpportunities,
            10 => Self::Question4GoalsConstraints,
            _ => Self::ProvidingRecommendations,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InitialGreeting => "initial_greeting",
            Self::CollectingName => "collecting_name",
            Self::CollectingRole => "collecting_role",
            Self::CollectingCompany => "collecting_company",
            Self::CollectingCountry => "collecting_country",
            Self::CollectingEmail => "collecting_email",
            Self::CollectingPhone => "collecting_phone",
            Self::Question1CompanyInfo => "question_1_company_info",
            Self::Question2ProcessDetails => "question_2_process_details",
            Self::Question3AutomationOpportunities => "question_3_automation_opportunities",
            Self::Question4GoalsConstraints => "question_4_goals_constraints",
            Self::ProvidingRecommendations => "providing_recommendations",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::ProvidingRecommendations)
    }

    /// The literal question to present for this stage.
    pub fn question(&self) -> &'static str {
        QUESTION_BANK
            .iter()
            .find(|(stage, _)| stage == self)
            .map(|(_, question)| *question)
            .unwrap_or(DEFAULT_QUESTION)
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
