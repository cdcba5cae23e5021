/// Navigation decision: map a classified reply to what the caller shows next.
///
/// Rules are evaluated in a fixed priority order and the first match wins:
///
/// 1. knowledge-base save (with or without accompanying analysis)
/// 2. generated questions only
/// 3. summary combined with research, questions or other tools
/// 4. summary alone
/// 5. research without a summary
/// 6. anything else, including tools this client does not know yet
use schemars::JsonSchema;
use serde::Serialize;
use serde_json::Value;
use tracing::info;

use crate::classify::{classify, OutcomePayload};
use crate::error::ClassificationError;
use crate::intake::Priority;

/// Caller-side metadata about the case being analysed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CaseMeta {
    pub title_hint: String,
    pub client_name: String,
    pub priority: Priority,
}

/// Which routing rule fired.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeCategory {
    KnowledgeBaseWithAnalysis,
    KnowledgeBaseOnly,
    QuestionsOnly,
    CombinedAnalysis,
    SummaryOnly,
    ResearchOnly,
    Unrecognized,
}

/// Instruction for the presentation layer.
#[derive(Debug, Clone, PartialEq, Serialize, JsonSchema)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Directive {
    /// Several outcomes compete; the user picks one of two options.
    ShowChoice {
        title: String,
        message: String,
        primary: ChoiceOption,
        secondary: ChoiceOption,
    },
    Navigate { destination: Destination },
    /// Confirmation only. Acknowledging it leads to `destination`.
    ShowTerminalMessage {
        title: String,
        message: String,
        destination: Destination,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, JsonSchema)]
pub struct ChoiceOption {
    pub label: String,
    /// Rendered as the dismissive option.
    pub cancel: bool,
    pub destination: Destination,
}

#[derive(Debug, Clone, PartialEq, Serialize, JsonSchema)]
#[serde(tag = "screen", content = "params", rename_all = "snake_case")]
pub enum Destination {
    /// Acknowledge the knowledge-base save and return to the caller.
    KnowledgeBaseSaved,
    QuestionsView(ViewPayload),
    AnalysisResultView(ViewPayload),
    /// Close the prompt and return to the caller.
    Dismiss,
}

#[derive(Debug, Clone, PartialEq, Serialize, JsonSchema)]
pub struct ViewPayload {
    pub case_id: String,
    /// The reply exactly as received, when the caller still has it.
    pub analysis_data: Option<Value>,
    pub case_title: String,
    pub client_name: String,
    pub priority: Priority,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub questions: Option<Value>,
}

/// A decided route together with the rule that produced it.
#[derive(Debug, Clone, PartialEq, Serialize, JsonSchema)]
pub struct Routed {
    pub category: OutcomeCategory,
    pub directive: Directive,
}

pub fn categorize(payload: &OutcomePayload) -> OutcomeCategory {
    let f = payload.flags;
    let count = payload.result_count;

    if f.kb {
        return if f.has_analysis() {
            OutcomeCategory::KnowledgeBaseWithAnalysis
        } else {
            OutcomeCategory::KnowledgeBaseOnly
        };
    }
    if f.questions && !f.summary && !f.statutes && !f.precedents {
        return OutcomeCategory::QuestionsOnly;
    }
    if f.summary && (f.statutes || f.precedents || f.questions || count >= 2) {
        return OutcomeCategory::CombinedAnalysis;
    }
    if f.summary && count == 1 {
        return OutcomeCategory::SummaryOnly;
    }
    if (f.statutes || f.precedents) && !f.summary {
        return OutcomeCategory::ResearchOnly;
    }
    OutcomeCategory::Unrecognized
}

pub fn decide(payload: &OutcomePayload, meta: &CaseMeta, raw: Option<&Value>) -> Directive {
    let category = categorize(payload);
    let analysis = || Destination::AnalysisResultView(view_payload(payload, meta, raw));

    let directive = match category {
        OutcomeCategory::KnowledgeBaseWithAnalysis => Directive::ShowChoice {
            title: "\u{2713} Case Saved to Knowledge Base".to_string(),
            message: format!(
                "Successfully saved!\nTotal cases: {}\n\nWould you like to view the detailed analysis?",
                kb_entries(payload)
            ),
            primary: ChoiceOption {
                label: "View Analysis".to_string(),
                cancel: false,
                destination: analysis(),
            },
            secondary: ChoiceOption {
                label: "Done".to_string(),
                cancel: true,
                destination: Destination::KnowledgeBaseSaved,
            },
        },
        OutcomeCategory::KnowledgeBaseOnly => Directive::ShowTerminalMessage {
            title: "\u{2713} Saved to Knowledge Base".to_string(),
            message: format!(
                "Your case has been saved successfully.\n\nTotal cases: {}",
                kb_entries(payload)
            ),
            destination: Destination::KnowledgeBaseSaved,
        },
        OutcomeCategory::QuestionsOnly => {
            let mut view = view_payload(payload, meta, raw);
            view.questions = Some(payload.questions.clone().unwrap_or(Value::Null));
            Directive::Navigate {
                destination: Destination::QuestionsView(view),
            }
        }
        OutcomeCategory::CombinedAnalysis
        | OutcomeCategory::SummaryOnly
        | OutcomeCategory::ResearchOnly => Directive::Navigate {
            destination: analysis(),
        },
        OutcomeCategory::Unrecognized => Directive::ShowChoice {
            title: "Analysis Complete".to_string(),
            message: format!(
                "AI successfully analyzed your case using {} tool(s).\n\nTools: {}",
                payload.result_count,
                payload.tool_names.join(", ")
            ),
            primary: ChoiceOption {
                label: "View Results".to_string(),
                cancel: false,
                destination: analysis(),
            },
            secondary: ChoiceOption {
                label: "Close".to_string(),
                cancel: true,
                destination: Destination::Dismiss,
            },
        },
    };

    info!(
        category = ?category,
        case_id = %payload.case_id,
        tools = payload.result_count,
        "navigation decided"
    );
    directive
}

/// Classify a raw reply and decide where it leads.
pub fn route(response: &Value, meta: &CaseMeta) -> Result<Routed, ClassificationError> {
    let payload = classify(response, &meta.title_hint)?;
    Ok(Routed {
        category: categorize(&payload),
        directive: decide(&payload, meta, Some(response)),
    })
}

fn view_payload(payload: &OutcomePayload, meta: &CaseMeta, raw: Option<&Value>) -> ViewPayload {
    ViewPayload {
        case_id: payload.case_id.clone(),
        analysis_data: raw.cloned(),
        case_title: payload.display_title.clone(),
        client_name: meta.client_name.clone(),
        priority: meta.priority,
        questions: None,
    }
}

fn kb_entries(payload: &OutcomePayload) -> String {
    payload
        .kb_update
        .as_ref()
        .map(|kb| kb.entries_label())
        .unwrap_or_else(|| "N/A".to_string())
}
