use serde::{Deserialize, Serialize};
use serde_json::{Number, Value};

use crate::error::{ClassificationError, ResultsDefect};

pub const UPDATE_KB: &str = "update_kb";
pub const SUMMARIZE: &str = "summarize";
pub const CORE_SUMMARY: &str = "core_summary";
pub const FAMILY_STATUTES: &str = "family_statutes";
pub const FAMILY_PRECEDENTS: &str = "family_precedents";
pub const FAMILY_QUESTIONS: &str = "family_questions";

/// A successful orchestrator reply, decoded at the boundary.
///
/// Only replies with `success == true` and a well-formed `results` array decode; see
/// [`AnalysisResponse::from_value`].
#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisResponse {
    /// Tool outputs in the order the orchestrator reported them, duplicates included.
    pub results: Vec<ToolOutput>,
    /// Correlation id; `None` when absent or empty.
    pub timestamp: Option<String>,
}

impl AnalysisResponse {
    /// Decode an untrusted JSON reply. Decoding is all-or-nothing: a single malformed
    /// entry rejects the whole reply.
    pub fn from_value(value: &Value) -> Result<Self, ClassificationError> {
        let Some(object) = value.as_object() else {
            return Err(ClassificationError::InvalidResponse);
        };

        if object.get("success") != Some(&Value::Bool(true)) {
            return Err(ClassificationError::InvalidResponse);
        }

        let entries = match object.get("results") {
            None | Some(Value::Null) => {
                return Err(ClassificationError::MissingResults(ResultsDefect::Absent))
            }
            Some(Value::Array(entries)) => entries,
            Some(_) => {
                return Err(ClassificationError::MissingResults(
                    ResultsDefect::NotASequence,
                ))
            }
        };

        let results = entries
            .iter()
            .enumerate()
            .map(|(index, entry)| ToolOutput::decode_entry(index, entry))
            .collect::<Result<Vec<_>, _>>()?;

        let timestamp = non_blank_str(object.get("timestamp")).map(str::to_string);

        Ok(Self { results, timestamp })
    }

    /// Tool names in response order, duplicates included.
    pub fn tool_names(&self) -> Vec<String> {
        self.results
            .iter()
            .map(|r| r.tool_name().to_string())
            .collect()
    }
}

/// One `results[]` entry, typed by its `tool` name.
#[derive(Debug, Clone, PartialEq)]
pub enum ToolOutput {
    UpdateKb(KbUpdate),
    Summarize(CaseSummary),
    CoreSummary(CaseSummary),
    FamilyStatutes(Value),
    FamilyPrecedents(Value),
    FamilyQuestions(Value),
    /// A tool this client does not know yet. The output is kept verbatim.
    Unrecognized { tool: String, output: Value },
}

impl ToolOutput {
    fn decode_entry(index: usize, entry: &Value) -> Result<Self, ClassificationError> {
        let Some(object) = entry.as_object() else {
            return Err(ClassificationError::MissingResults(
                ResultsDefect::EntryNotObject { index },
            ));
        };
        let Some(tool) = object.get("tool").and_then(Value::as_str) else {
            return Err(ClassificationError::MissingResults(
                ResultsDefect::ToolNotString { index },
            ));
        };
        // An absent output still marks the tool as present.
        let output = object.get("output").cloned().unwrap_or(Value::Null);
        Ok(Self::decode(tool, output))
    }

    /// Dispatch on the tool name. Known tools with unexpected output shapes still
    /// decode; their typed fields are simply empty.
    pub fn decode(tool: &str, output: Value) -> Self {
        match tool {
            UPDATE_KB => Self::UpdateKb(KbUpdate::from_output(&output)),
            SUMMARIZE => Self::Summarize(CaseSummary::from_output(&output)),
            CORE_SUMMARY => Self::CoreSummary(CaseSummary::from_output(&output)),
            FAMILY_STATUTES => Self::FamilyStatutes(output),
            FAMILY_PRECEDENTS => Self::FamilyPrecedents(output),
            FAMILY_QUESTIONS => Self::FamilyQuestions(output),
            other => Self::Unrecognized {
                tool: other.to_string(),
                output,
            },
        }
    }

    pub fn tool_name(&self) -> &str {
        match self {
            Self::UpdateKb(_) => UPDATE_KB,
            Self::Summarize(_) => SUMMARIZE,
            Self::CoreSummary(_) => CORE_SUMMARY,
            Self::FamilyStatutes(_) => FAMILY_STATUTES,
            Self::FamilyPrecedents(_) => FAMILY_PRECEDENTS,
            Self::FamilyQuestions(_) => FAMILY_QUESTIONS,
            Self::Unrecognized { tool, .. } => tool,
        }
    }
}

/// `update_kb` output: `{ total_entries?: number, message?: string }`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct KbUpdate {
    pub total_entries: Option<Number>,
    pub message: Option<String>,
}

impl KbUpdate {
    fn from_output(output: &Value) -> Self {
        let total_entries = match output.get("total_entries") {
            Some(Value::Number(n)) => Some(n.clone()),
            _ => None,
        };
        Self {
            total_entries,
            message: non_blank_str(output.get("message")).map(str::to_string),
        }
    }

    /// Text shown as the knowledge-base size: a non-zero entry count, else the server
    /// message, else `N/A`.
    pub fn entries_label(&self) -> String {
        if let Some(n) = self.total_entries.as_ref().filter(|n| !is_zero(n)) {
            return n.to_string();
        }
        self.message.clone().unwrap_or_else(|| "N/A".to_string())
    }
}

/// `summarize` / `core_summary` output.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CaseSummary {
    pub title: Option<String>,
    #[serde(rename = "type")]
    pub case_type: Option<String>,
    pub description: Option<String>,
    pub parties: Option<Value>,
    pub recommended_actions: Option<Value>,
}

impl CaseSummary {
    fn from_output(output: &Value) -> Self {
        Self {
            title: non_blank_str(output.get("title")).map(str::to_string),
            case_type: non_blank_str(output.get("type")).map(str::to_string),
            description: non_blank_str(output.get("description")).map(str::to_string),
            parties: output.get("parties").filter(|v| !v.is_null()).cloned(),
            recommended_actions: output
                .get("recommendedActions")
                .filter(|v| !v.is_null())
                .cloned(),
        }
    }
}

fn non_blank_str(value: Option<&Value>) -> Option<&str> {
    value
        .and_then(Value::as_str)
        .filter(|s| !s.trim().is_empty())
}

fn is_zero(n: &Number) -> bool {
    n.as_f64().is_some_and(|f| f == 0.0)
}
