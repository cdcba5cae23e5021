use std::fmt;
use std::str::FromStr;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::decide::CaseMeta;
use crate::error::IntakeError;

#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema,
)]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
}

impl Priority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "Low",
            Self::Medium => "Medium",
            Self::High => "High",
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Priority {
    type Err = IntakeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "low" => Ok(Self::Low),
            "medium" => Ok(Self::Medium),
            "high" => Ok(Self::High),
            _ => Err(IntakeError::UnknownPriority(s.to_string())),
        }
    }
}

/// The "new case" form as filled in by the user.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NewCase {
    pub title: String,
    pub client_name: String,
    pub priority: Priority,
    pub description: String,
    pub custom_prompt: String,
}

impl NewCase {
    /// Checks run before a document upload is attempted.
    pub fn validate_upload(&self, has_document: bool) -> Result<(), IntakeError> {
        if !has_document {
            return Err(IntakeError::NoDocument);
        }
        if self.title.trim().is_empty() || self.client_name.trim().is_empty() {
            return Err(IntakeError::MissingTitleOrClient);
        }
        Ok(())
    }

    /// Instruction sent along with the document. A non-blank custom prompt is used as is.
    pub fn analysis_prompt(&self) -> String {
        let custom = self.custom_prompt.trim();
        if !custom.is_empty() {
            return custom.to_string();
        }
        format!(
            "Analyze this {} divorce case for {}. Identify relevant Sri Lankan family law \
statutes, find similar precedents, generate client intake questions, and provide \
comprehensive summary. Priority: {}.",
            self.title, self.client_name, self.priority
        )
    }

    /// Text for the quick, document-less analysis.
    pub fn quick_analysis_text(&self) -> Result<&str, IntakeError> {
        let text = self.description.trim();
        if text.is_empty() {
            return Err(IntakeError::MissingDescription);
        }
        Ok(text)
    }

    pub fn meta(&self) -> CaseMeta {
        CaseMeta {
            title_hint: self.title.clone(),
            client_name: self.client_name.clone(),
            priority: self.priority,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn form() -> NewCase {
        NewCase {
            title: "Divorce - Malicious Desertion".to_string(),
            client_name: "K. Silva".to_string(),
            ..NewCase::default()
        }
    }

    #[test]
    fn upload_requires_document_then_title_and_client() {
        assert_eq!(form().validate_upload(false), Err(IntakeError::NoDocument));
        assert_eq!(form().validate_upload(true), Ok(()));

        let blank_client = NewCase {
            client_name: "  ".to_string(),
            ..form()
        };
        assert_eq!(
            blank_client.validate_upload(true),
            Err(IntakeError::MissingTitleOrClient)
        );
    }

    #[test]
    fn default_prompt_mentions_case_client_and_priority() {
        assert_eq!(
            form().analysis_prompt(),
            "Analyze this Divorce - Malicious Desertion divorce case for K. Silva. Identify \
relevant Sri Lankan family law statutes, find similar precedents, generate client intake \
questions, and provide comprehensive summary. Priority: Medium."
        );
    }

    #[test]
    fn custom_prompt_is_trimmed_and_used() {
        let case = NewCase {
            custom_prompt: "  Only list statutes.  ".to_string(),
            ..form()
        };
        assert_eq!(case.analysis_prompt(), "Only list statutes.");
    }

    #[test]
    fn quick_analysis_needs_description() {
        assert_eq!(form().quick_analysis_text(), Err(IntakeError::MissingDescription));
        let case = NewCase {
            description: " Husband left in 2019. ".to_string(),
            ..form()
        };
        assert_eq!(case.quick_analysis_text(), Ok("Husband left in 2019."));
    }

    #[test]
    fn priority_parses_case_insensitively() {
        assert_eq!("HIGH".parse::<Priority>(), Ok(Priority::High));
        assert_eq!(" low ".parse::<Priority>(), Ok(Priority::Low));
        assert_eq!(
            "urgent".parse::<Priority>(),
            Err(IntakeError::UnknownPriority("urgent".to_string()))
        );
        assert_eq!(Priority::default(), Priority::Medium);
    }

    #[test]
    fn meta_carries_form_fields() {
        let meta = NewCase {
            priority: Priority::Low,
            ..form()
        }
        .meta();
        assert_eq!(meta.title_hint, "Divorce - Malicious Desertion");
        assert_eq!(meta.client_name, "K. Silva");
        assert_eq!(meta.priority, Priority::Low);
    }
}
