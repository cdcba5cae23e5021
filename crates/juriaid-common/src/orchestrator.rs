/// Client for the orchestrator API, which runs the AI analysis tools over uploaded case
/// documents. Replies are returned as raw JSON; interpreting them is the routing core's job.
use std::sync::Arc;

use reqwest::multipart::{Form, Part};
use serde::Serialize;
use serde_json::Value;
use tracing::info;

use crate::credentials::CredentialStore;
use crate::http::{ServiceClient, ServiceConfig, ServiceError};

pub const DEFAULT_DOCUMENT_NAME: &str = "document.pdf";
pub const DEFAULT_DOCUMENT_MIME: &str = "application/pdf";

/// A case document ready for upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaseDocument {
    pub name: String,
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

impl CaseDocument {
    /// Missing or blank name and MIME type fall back to `document.pdf` / `application/pdf`.
    pub fn new(name: Option<&str>, mime_type: Option<&str>, bytes: Vec<u8>) -> Self {
        let pick = |value: Option<&str>, default: &str| {
            value
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .unwrap_or(default)
                .to_string()
        };
        Self {
            name: pick(name, DEFAULT_DOCUMENT_NAME),
            mime_type: pick(mime_type, DEFAULT_DOCUMENT_MIME),
            bytes,
        }
    }

    fn part(&self) -> Result<Part, ServiceError> {
        Ok(Part::bytes(self.bytes.clone())
            .file_name(self.name.clone())
            .mime_str(&self.mime_type)?)
    }
}

#[derive(Debug, Serialize)]
struct AnalyzeTextRequest<'a> {
    text: &'a str,
}

#[derive(Clone)]
pub struct OrchestratorClient {
    base: ServiceClient,
}

impl OrchestratorClient {
    pub fn new(
        config: ServiceConfig,
        credentials: Arc<dyn CredentialStore>,
    ) -> Result<Self, ServiceError> {
        Ok(Self {
            base: ServiceClient::new("orchestrator", config, credentials)?,
        })
    }

    pub fn base(&self) -> &ServiceClient {
        &self.base
    }

    pub async fn health_check(&self) -> Result<Value, ServiceError> {
        self.base.get_json("/").await
    }

    /// Quick analysis of free text. Public endpoint.
    pub async fn analyze_text(&self, text: &str) -> Result<Value, ServiceError> {
        self.base
            .post_json("/api/analyze-text", &AnalyzeTextRequest { text })
            .await
    }

    pub async fn upload_case(&self, document: &CaseDocument) -> Result<Value, ServiceError> {
        self.upload("/api/upload-case", document, None).await
    }

    pub async fn upload_case_with_prompt(
        &self,
        document: &CaseDocument,
        prompt: &str,
    ) -> Result<Value, ServiceError> {
        self.upload("/api/upload-case-with-prompt", document, Some(prompt))
            .await
    }

    /// Let the orchestrator plan which tools to run for `prompt`, run them over the document
    /// and return their combined results.
    pub async fn agent_plan_run(
        &self,
        document: &CaseDocument,
        prompt: &str,
    ) -> Result<Value, ServiceError> {
        self.upload("/api/agent/plan-run", document, Some(prompt))
            .await
    }

    async fn upload(
        &self,
        path: &str,
        document: &CaseDocument,
        prompt: Option<&str>,
    ) -> Result<Value, ServiceError> {
        info!(
            path,
            file = %document.name,
            bytes = document.bytes.len(),
            with_prompt = prompt.is_some(),
            "uploading case document"
        );
        let form = upload_form(document, prompt)?;
        self.base.post_multipart(path, form).await
    }
}

fn upload_form(document: &CaseDocument, prompt: Option<&str>) -> Result<Form, ServiceError> {
    let form = Form::new().part("file", document.part()?);
    Ok(match prompt {
        Some(prompt) => form.text("prompt", prompt.to_string()),
        None => form,
    })
}
