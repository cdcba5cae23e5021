/// Response classifier: reduce an orchestrator reply to the facts the navigation
/// decision needs.
use std::collections::HashMap;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use crate::error::ClassificationError;
use crate::model::{
    AnalysisResponse, CaseSummary, KbUpdate, ToolOutput, CORE_SUMMARY, FAMILY_PRECEDENTS,
    FAMILY_QUESTIONS, FAMILY_STATUTES, SUMMARIZE, UPDATE_KB,
};

pub const FALLBACK_TITLE: &str = "Case Analysis";

/// Which known tools appear in a reply.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ToolFlags {
    pub kb: bool,
    /// `summarize` or `core_summary`.
    pub summary: bool,
    pub statutes: bool,
    pub precedents: bool,
    pub questions: bool,
}

impl ToolFlags {
    /// True when anything beyond the knowledge-base save is present.
    pub fn has_analysis(&self) -> bool {
        self.summary || self.statutes || self.precedents || self.questions
    }
}

/// Everything the navigation decision reads from one reply.
#[derive(Debug, Clone, PartialEq)]
pub struct OutcomePayload {
    pub flags: ToolFlags,
    /// `summarize` output if present, else `core_summary`.
    pub summary: Option<CaseSummary>,
    pub display_title: String,
    /// The reply's timestamp, or "now" when it carried none.
    pub case_id: String,
    /// Raw `results` length, duplicates included.
    pub result_count: usize,
    pub tool_names: Vec<String>,
    pub kb_update: Option<KbUpdate>,
    pub questions: Option<Value>,
}

/// Classify a raw reply, stamping it with the current time if it carries no timestamp.
pub fn classify(response: &Value, title_hint: &str) -> Result<OutcomePayload, ClassificationError> {
    classify_at(response, title_hint, Utc::now())
}

pub fn classify_at(
    response: &Value,
    title_hint: &str,
    now: DateTime<Utc>,
) -> Result<OutcomePayload, ClassificationError> {
    let decoded = AnalysisResponse::from_value(response)
        .inspect_err(|e| debug!(error = %e, "rejecting orchestrator reply"))?;
    Ok(classify_response(&decoded, title_hint, now))
}

/// Classify an already-decoded reply. Infallible: every decoded reply has an outcome.
pub fn classify_response(
    response: &AnalysisResponse,
    title_hint: &str,
    now: DateTime<Utc>,
) -> OutcomePayload {
    let tools = tool_map(&response.results);

    let flags = ToolFlags {
        kb: tools.contains_key(UPDATE_KB),
        summary: tools.contains_key(SUMMARIZE) || tools.contains_key(CORE_SUMMARY),
        statutes: tools.contains_key(FAMILY_STATUTES),
        precedents: tools.contains_key(FAMILY_PRECEDENTS),
        questions: tools.contains_key(FAMILY_QUESTIONS),
    };

    let summary = [SUMMARIZE, CORE_SUMMARY]
        .into_iter()
        .find_map(|name| match tools.get(name) {
            Some(ToolOutput::Summarize(s) | ToolOutput::CoreSummary(s)) => Some(s.clone()),
            _ => None,
        });

    let kb_update = match tools.get(UPDATE_KB) {
        Some(ToolOutput::UpdateKb(kb)) => Some(kb.clone()),
        _ => None,
    };

    let questions = match tools.get(FAMILY_QUESTIONS) {
        Some(ToolOutput::FamilyQuestions(q)) => Some(q.clone()),
        _ => None,
    };

    let display_title = display_title(summary.as_ref(), title_hint);
    let case_id = response
        .timestamp
        .clone()
        .unwrap_or_else(|| now.to_rfc3339_opts(SecondsFormat::Millis, true));
    let tool_names = response.tool_names();

    debug!(
        results = response.results.len(),
        tools = %tool_names.join(", "),
        has_kb = flags.kb,
        has_summary = flags.summary,
        has_statutes = flags.statutes,
        has_precedents = flags.precedents,
        has_questions = flags.questions,
        "classified orchestrator reply"
    );

    OutcomePayload {
        flags,
        summary,
        display_title,
        case_id,
        result_count: response.results.len(),
        tool_names,
        kb_update,
        questions,
    }
}

/// Single forward pass; a later entry for the same tool replaces the earlier one.
fn tool_map(results: &[ToolOutput]) -> HashMap<&str, &ToolOutput> {
    let mut map = HashMap::with_capacity(results.len());
    for result in results {
        map.insert(result.tool_name(), result);
    }
    map
}

fn display_title(summary: Option<&CaseSummary>, title_hint: &str) -> String {
    if let Some(title) = summary.and_then(|s| s.title.as_deref()) {
        return title.to_string();
    }
    let hint = title_hint.trim();
    if hint.is_empty() {
        FALLBACK_TITLE.to_string()
    } else {
        hint.to_string()
    }
}
