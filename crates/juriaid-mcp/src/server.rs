/// MCP server exposing the JuriAid case-intake flow.
///
/// `submit_case` runs the whole upload path: form validation, document upload to the
/// orchestrator, classification of the reply and the navigation decision. `route_analysis`
/// runs only the last two steps on a reply the caller already has.
use std::path::Path;
use std::sync::Arc;

use rmcp::{
    Json, ServerHandler,
    handler::server::router::tool::ToolRouter,
    handler::server::wrapper::Parameters,
    model::*,
    tool, tool_handler, tool_router,
};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, warn};

use case_router::decide::route;
use case_router::{NewCase, Priority, Routed};
use juriaid_common::auth::{AuthClient, Session, SignupRequest};
use juriaid_common::credentials::UserProfile;
use juriaid_common::orchestrator::OrchestratorClient;

use crate::document;
use crate::error::AppError;

#[derive(Clone)]
pub struct JuriAidServer {
    orchestrator: Arc<OrchestratorClient>,
    auth: Arc<AuthClient>,
    max_document_bytes: u64,
    tool_router: ToolRouter<JuriAidServer>,
}

impl JuriAidServer {
    pub fn new(
        orchestrator: Arc<OrchestratorClient>,
        auth: Arc<AuthClient>,
        max_document_bytes: u64,
    ) -> Self {
        Self {
            orchestrator,
            auth,
            max_document_bytes,
            tool_router: Self::tool_router(),
        }
    }

    async fn run_submission(&self, params: SubmitCaseParams) -> Result<Routed, AppError> {
        let case = NewCase {
            title: params.case_title,
            client_name: params.client_name,
            priority: parse_priority(params.priority.as_deref())?,
            description: String::new(),
            custom_prompt: params.custom_prompt.unwrap_or_default(),
        };
        let file_path = params.file_path.trim();
        case.validate_upload(!file_path.is_empty())?;

        let document = document::load(
            Path::new(file_path),
            params.mime_type.as_deref(),
            self.max_document_bytes,
        )
        .await?;
        let prompt = case.analysis_prompt();
        info!(
            file = %document.name,
            case_title = %case.title,
            client = %case.client_name,
            priority = %case.priority,
            custom_prompt = !case.custom_prompt.trim().is_empty(),
            "submitting case for analysis"
        );

        let reply = self.orchestrator.agent_plan_run(&document, &prompt).await?;
        let routed = route(&reply, &case.meta())
            .inspect_err(|e| warn!(error = %e, "orchestrator reply could not be routed"))?;
        Ok(routed)
    }
}

fn parse_priority(raw: Option<&str>) -> Result<Priority, AppError> {
    Ok(raw
        .filter(|p| !p.trim().is_empty())
        .map(str::parse::<Priority>)
        .transpose()?
        .unwrap_or_default())
}

/// Map an error to the message shown to the user. Server-provided details win over the
/// generic fallback.
fn user_message(err: &AppError, fallback: &str) -> String {
    match err {
        AppError::Service(e) => e.user_message(fallback),
        AppError::Classification(e) => e.to_string(),
        other => other.to_string(),
    }
}

#[derive(Debug, Deserialize, JsonSchema)]
struct SignupParams {
    email: String,
    password: String,
    full_name: String,
    phone: Option<String>,
}

#[derive(Debug, Deserialize, JsonSchema)]
struct LoginParams {
    email: String,
    password: String,
}

#[derive(Debug, Deserialize, JsonSchema)]
struct AnalyzeTextParams {
    /// Free-text case description.
    text: String,
}

#[derive(Debug, Deserialize, JsonSchema)]
struct SubmitCaseParams {
    /// Path to a PDF or plain-text case document.
    file_path: String,
    case_title: String,
    client_name: String,
    /// "Low", "Medium" or "High" (default: "Medium").
    priority: Option<String>,
    /// Replaces the default analysis instruction when non-blank.
    custom_prompt: Option<String>,
    /// Overrides the MIME type inferred from the file extension.
    mime_type: Option<String>,
}

#[derive(Debug, Deserialize, JsonSchema)]
struct RouteAnalysisParams {
    /// The orchestrator reply exactly as received.
    response: Value,
    case_title: Option<String>,
    client_name: Option<String>,
    priority: Option<String>,
}

#[derive(Debug, Serialize, JsonSchema)]
struct ReplyResponse {
    reply: Value,
}

#[derive(Debug, Serialize, JsonSchema)]
struct AuthStatusResponse {
    authenticated: bool,
    profile: Option<UserProfile>,
}

#[derive(Debug, Serialize, JsonSchema)]
struct OkResponse {
    ok: bool,
}

#[tool_router]
impl JuriAidServer {
    #[tool(description = "Check that the orchestrator API is reachable (GET /).")]
    async fn health_check(&self) -> Result<Json<ReplyResponse>, String> {
        let reply = self
            .orchestrator
            .health_check()
            .await
            .map_err(|e| e.user_message("Health check failed"))?;
        Ok(Json(ReplyResponse { reply }))
    }

    #[tool(description = "Create a JuriAid account.")]
    async fn signup(
        &self,
        Parameters(params): Parameters<SignupParams>,
    ) -> Result<Json<ReplyResponse>, String> {
        let request = SignupRequest {
            email: params.email.trim().to_string(),
            password: params.password,
            full_name: params.full_name.trim().to_string(),
            phone: params.phone.filter(|p| !p.trim().is_empty()),
        };
        let reply = self
            .auth
            .signup(&request)
            .await
            .map_err(|e| e.user_message("Signup failed"))?;
        Ok(Json(ReplyResponse { reply }))
    }

    #[tool(description = "Log in, store the access token for later requests and return the user's profile.")]
    async fn login(
        &self,
        Parameters(params): Parameters<LoginParams>,
    ) -> Result<Json<Session>, String> {
        let session = self
            .auth
            .login_session(params.email.trim(), &params.password)
            .await
            .map_err(|e| e.user_message("Login failed"))?;
        Ok(Json(session))
    }

    #[tool(description = "Forget the stored access token and cached profile.")]
    async fn logout(&self) -> Result<Json<OkResponse>, String> {
        self.auth
            .logout()
            .await
            .map_err(|e| format!("logout failed: {e}"))?;
        Ok(Json(OkResponse { ok: true }))
    }

    #[tool(description = "Fetch the logged-in user's profile from the auth service (GET /auth/me).")]
    async fn get_profile(&self) -> Result<Json<UserProfile>, String> {
        let profile = self
            .auth
            .get_profile()
            .await
            .map_err(|e| e.user_message("Failed to fetch profile"))?;
        Ok(Json(profile))
    }

    #[tool(description = "Report whether an access token is stored, with the cached profile if any. Makes no network calls.")]
    async fn auth_status(&self) -> Result<Json<AuthStatusResponse>, String> {
        let authenticated = self.auth.is_authenticated().await;
        let profile = if authenticated {
            self.auth.stored_profile().await
        } else {
            None
        };
        Ok(Json(AuthStatusResponse {
            authenticated,
            profile,
        }))
    }

    #[tool(description = "Quick AI analysis of a free-text case description, without a document.")]
    async fn analyze_text(
        &self,
        Parameters(params): Parameters<AnalyzeTextParams>,
    ) -> Result<Json<ReplyResponse>, String> {
        let case = NewCase {
            description: params.text,
            ..NewCase::default()
        };
        let text = case.quick_analysis_text().map_err(|e| e.to_string())?;
        let reply = self
            .orchestrator
            .analyze_text(text)
            .await
            .map_err(|e| e.user_message("Failed to analyze text"))?;
        Ok(Json(ReplyResponse { reply }))
    }

    #[tool(description = "Upload a case document for AI analysis and return the directive for what to show next: navigate to a screen, offer a choice, or show a confirmation.")]
    async fn submit_case(
        &self,
        Parameters(params): Parameters<SubmitCaseParams>,
    ) -> Result<Json<Routed>, String> {
        let routed = self
            .run_submission(params)
            .await
            .map_err(|e| user_message(&e, "Failed to run AI analysis"))?;
        Ok(Json(routed))
    }

    #[tool(description = "Decide what to show next for an orchestrator analysis reply the caller already holds. Makes no network calls.")]
    async fn route_analysis(
        &self,
        Parameters(params): Parameters<RouteAnalysisParams>,
    ) -> Result<Json<Routed>, String> {
        let priority = parse_priority(params.priority.as_deref()).map_err(|e| e.to_string())?;
        let case = NewCase {
            title: params.case_title.unwrap_or_default(),
            client_name: params.client_name.unwrap_or_default(),
            priority,
            ..NewCase::default()
        };
        let routed = route(&params.response, &case.meta()).map_err(|e| e.to_string())?;
        Ok(Json(routed))
    }
}

#[tool_handler]
impl ServerHandler for JuriAidServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: ProtocolVersion::V_2025_06_18,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: Implementation {
                name: "juriaid".to_string(),
                version: env!("CARGO_PKG_VERSION").to_string(),
                title: None,
                icons: None,
                website_url: None,
            },
            instructions: Some(
                "JuriAid case intake. Log in with login, then call submit_case with a case \
document and form fields; the result's directive says which screen to open (questions view or \
analysis result view), which choice to offer, or which confirmation to show. route_analysis \
applies the same decision to a reply obtained elsewhere."
                    .to_string(),
            ),
        }
    }
}
