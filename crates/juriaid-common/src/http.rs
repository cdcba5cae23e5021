use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use reqwest::{RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use crate::credentials::CredentialStore;
use crate::error::CommonError;

/// Connection settings for one remote service.
#[derive(Clone, Debug)]
pub struct ServiceConfig {
    pub base_url: String,
    pub timeout: Duration,
    pub max_retries: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
    pub max_error_body_bytes: usize,
}

impl ServiceConfig {
    /// Orchestrator settings from `ORCHESTRATOR_*` variables.
    pub fn orchestrator_from_env() -> Self {
        Self::from_env("ORCHESTRATOR", "http://10.0.2.2:8000", Duration::from_secs(30))
    }

    /// Auth service settings from `AUTH_*` variables.
    pub fn auth_from_env() -> Self {
        Self::from_env("AUTH", "http://10.0.2.2:8001", Duration::from_secs(15))
    }

    /// Reads `{prefix}_BASE_URL`, `{prefix}_TIMEOUT_SECS`, `{prefix}_MAX_RETRIES`,
    /// `{prefix}_RETRY_INITIAL_MS`, `{prefix}_RETRY_MAX_MS` and
    /// `{prefix}_MAX_ERROR_BODY_BYTES`, falling back to the given defaults.
    pub fn from_env(prefix: &str, default_base_url: &str, default_timeout: Duration) -> Self {
        let var = |name: &str| std::env::var(format!("{prefix}_{name}")).ok();

        let base_url = var("BASE_URL").unwrap_or_else(|| default_base_url.to_string());

        let timeout = var("TIMEOUT_SECS")
            .and_then(|s| s.parse::<u64>().ok())
            .map(Duration::from_secs)
            .unwrap_or(default_timeout);

        let max_retries = var("MAX_RETRIES")
            .and_then(|s| s.parse::<u32>().ok())
            .unwrap_or(2);

        let initial_backoff = var("RETRY_INITIAL_MS")
            .and_then(|s| s.parse::<u64>().ok())
            .map(Duration::from_millis)
            .unwrap_or_else(|| Duration::from_millis(200));

        let max_backoff = var("RETRY_MAX_MS")
            .and_then(|s| s.parse::<u64>().ok())
            .map(Duration::from_millis)
            .unwrap_or_else(|| Duration::from_millis(5_000));

        let max_error_body_bytes = var("MAX_ERROR_BODY_BYTES")
            .and_then(|s| s.parse::<usize>().ok())
            .unwrap_or(8 * 1024);

        Self::new(base_url, timeout)
            .with_retries(max_retries, initial_backoff, max_backoff)
            .with_max_error_body_bytes(max_error_body_bytes)
    }

    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            timeout,
            max_retries: 2,
            initial_backoff: Duration::from_millis(200),
            max_backoff: Duration::from_millis(5_000),
            max_error_body_bytes: 8 * 1024,
        }
    }

    pub fn with_retries(mut self, max_retries: u32, initial: Duration, max: Duration) -> Self {
        self.max_retries = max_retries;
        self.initial_backoff = initial;
        self.max_backoff = max;
        self
    }

    pub fn with_max_error_body_bytes(mut self, bytes: usize) -> Self {
        self.max_error_body_bytes = bytes;
        self
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("invalid response JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),

    #[error("unauthorized: {message}")]
    Unauthorized { message: String },

    #[error("upstream returned error: status={status} message={message}")]
    Upstream { status: StatusCode, message: String },

    #[error("upstream returned non-JSON error: status={status} body={body}")]
    UpstreamBody { status: StatusCode, body: String },

    #[error(transparent)]
    Credentials(#[from] CommonError),
}

impl ServiceError {
    /// The message a user should see: the server's `detail` when it sent one.
    pub fn user_message(&self, fallback: &str) -> String {
        match self {
            Self::Unauthorized { message } | Self::Upstream { message, .. } => message.clone(),
            _ => fallback.to_string(),
        }
    }
}

/// Base client for one JuriAid service.
///
/// Attaches `Authorization: Bearer <token>` whenever the credential store holds a token, and
/// clears the store when the service answers 401.
#[derive(Clone)]
pub struct ServiceClient {
    name: &'static str,
    config: ServiceConfig,
    http: reqwest::Client,
    credentials: Arc<dyn CredentialStore>,
}

impl ServiceClient {
    pub fn new(
        name: &'static str,
        config: ServiceConfig,
        credentials: Arc<dyn CredentialStore>,
    ) -> Result<Self, ServiceError> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("juriaid/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            name,
            config,
            http,
            credentials,
        })
    }

    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    pub fn credentials(&self) -> &Arc<dyn CredentialStore> {
        &self.credentials
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}/{}", self.config.base_url, path.trim_start_matches('/'))
    }

    /// GET with retry on transient failures.
    pub async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, ServiceError> {
        let url = self.url(path);
        self.request_with_retry(|| async {
            let req = self.authorize(self.http.get(&url)).await;
            let resp = req.timeout(self.config.timeout).send().await?;
            self.parse_json_response(resp).await
        })
        .await
    }

    /// POST a JSON body. Sent once.
    pub async fn post_json<B, T>(&self, path: &str, body: &B) -> Result<T, ServiceError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let req = self.authorize(self.http.post(self.url(path))).await;
        let resp = req
            .timeout(self.config.timeout)
            .json(body)
            .send()
            .await?;
        self.parse_json_response(resp).await
    }

    /// POST a multipart form. Sent once; uploads are never replayed.
    pub async fn post_multipart<T: DeserializeOwned>(
        &self,
        path: &str,
        form: reqwest::multipart::Form,
    ) -> Result<T, ServiceError> {
        let req = self.authorize(self.http.post(self.url(path))).await;
        let resp = req
            .timeout(self.config.timeout)
            .multipart(form)
            .send()
            .await?;
        self.parse_json_response(resp).await
    }

    async fn authorize(&self, req: RequestBuilder) -> RequestBuilder {
        match self.credentials.token().await {
            Some(token) => req.bearer_auth(token),
            None => req,
        }
    }

    async fn parse_json_response<T: DeserializeOwned>(
        &self,
        resp: reqwest::Response,
    ) -> Result<T, ServiceError> {
        let status = resp.status();
        if status.is_success() {
            let bytes = resp.bytes().await?;
            return Ok(serde_json::from_slice(&bytes)?);
        }

        let body = read_limited_text(resp, self.config.max_error_body_bytes).await;
        if status == StatusCode::UNAUTHORIZED {
            warn!(service = self.name, "token rejected, clearing stored credentials");
            if let Err(e) = self.credentials.clear().await {
                warn!(error = %e, "failed to clear credentials after 401");
            }
            let message = error_detail(&body).unwrap_or_else(|| "unauthorized".to_string());
            return Err(ServiceError::Unauthorized { message });
        }
        Err(upstream_error(status, body))
    }

    async fn request_with_retry<T, Fut, F>(&self, mut f: F) -> Result<T, ServiceError>
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = Result<T, ServiceError>>,
    {
        let mut attempt: u32 = 0;
        loop {
            attempt += 1;
            match f().await {
                Ok(v) => return Ok(v),
                Err(e) => {
                    if attempt > self.config.max_retries || !should_retry(&e) {
                        return Err(e);
                    }
                    let delay = backoff_delay(
                        self.config.initial_backoff,
                        self.config.max_backoff,
                        attempt - 1,
                    );
                    warn!(
                        service = self.name,
                        attempt,
                        delay_ms = delay.as_millis(),
                        error = %e,
                        "request failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }
}

/// FastAPI-style error envelope: `{"detail": "..."}` or `{"detail": [...]}`.
#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    detail: Value,
}

fn error_detail(body: &str) -> Option<String> {
    let envelope = serde_json::from_str::<ErrorEnvelope>(body).ok()?;
    match envelope.detail {
        Value::Null => None,
        Value::String(s) => Some(s),
        other => Some(other.to_string()),
    }
}

fn upstream_error(status: StatusCode, body: String) -> ServiceError {
    match error_detail(&body) {
        Some(message) => ServiceError::Upstream { status, message },
        None => {
            debug!(%status, "upstream error without detail");
            ServiceError::UpstreamBody { status, body }
        }
    }
}

fn should_retry(err: &ServiceError) -> bool {
    match err {
        ServiceError::Request(e) => e.is_timeout() || e.is_connect(),
        ServiceError::Upstream { status, .. } | ServiceError::UpstreamBody { status, .. } => {
            *status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
        }
        ServiceError::InvalidJson(_)
        | ServiceError::Unauthorized { .. }
        | ServiceError::Credentials(_) => false,
    }
}

fn backoff_delay(initial: Duration, max: Duration, exponent: u32) -> Duration {
    let mult = 1u128.checked_shl(exponent).unwrap_or(u128::MAX);
    let base_ms = initial.as_millis().saturating_mul(mult);
    let capped_ms = std::cmp::min(base_ms, max.as_millis()) as u64;
    let jitter_cap = std::cmp::max(1, capped_ms / 4);
    let jitter_ms = pseudo_jitter_ms(jitter_cap);
    Duration::from_millis(capped_ms.saturating_add(jitter_ms))
}

fn pseudo_jitter_ms(max_inclusive: u64) -> u64 {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_else(|_| Duration::from_secs(0));
    let nanos = now.subsec_nanos() as u64;
    nanos % (max_inclusive + 1)
}

async fn read_limited_text(resp: reqwest::Response, max_bytes: usize) -> String {
    match resp.bytes().await {
        Ok(mut b) => {
            if b.len() > max_bytes {
                b.truncate(max_bytes);
            }
            String::from_utf8_lossy(&b).to_string()
        }
        Err(e) => {
            warn!(error = %e, "failed to read upstream error body");
            "<failed to read error body>".to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credentials::MemoryCredentialStore;
    use pretty_assertions::assert_eq;

    #[test]
    fn detail_string_and_structured() {
        assert_eq!(
            error_detail(r#"{"detail":"Incorrect email or password"}"#).as_deref(),
            Some("Incorrect email or password")
        );
        assert_eq!(
            error_detail(r#"{"detail":[{"loc":["body","email"],"msg":"field required"}]}"#)
                .as_deref(),
            Some(r#"[{"loc":["body","email"],"msg":"field required"}]"#)
        );
        assert_eq!(error_detail("<html>bad gateway</html>"), None);
        assert_eq!(error_detail(r#"{"error":"x"}"#), None);
    }

    #[test]
    fn upstream_error_prefers_detail() {
        let err = upstream_error(StatusCode::BAD_REQUEST, r#"{"detail":"No file"}"#.to_string());
        assert_eq!(err.user_message("Failed to upload case"), "No file");

        let err = upstream_error(StatusCode::BAD_GATEWAY, "oops".to_string());
        assert!(matches!(err, ServiceError::UpstreamBody { .. }));
        assert_eq!(err.user_message("Failed to upload case"), "Failed to upload case");
    }

    #[test]
    fn retries_only_transient_statuses() {
        let status_err = |status| ServiceError::Upstream {
            status,
            message: String::new(),
        };
        assert!(should_retry(&status_err(StatusCode::SERVICE_UNAVAILABLE)));
        assert!(should_retry(&status_err(StatusCode::TOO_MANY_REQUESTS)));
        assert!(!should_retry(&status_err(StatusCode::NOT_FOUND)));
        assert!(!should_retry(&ServiceError::Unauthorized {
            message: String::new()
        }));
    }

    #[test]
    fn backoff_is_capped_with_bounded_jitter() {
        let initial = Duration::from_millis(100);
        let max = Duration::from_millis(1_000);
        for exponent in 0..40 {
            let delay = backoff_delay(initial, max, exponent);
            assert!(delay >= std::cmp::min(initial * 2u32.saturating_pow(exponent.min(20)), max));
            assert!(delay <= max + max / 4);
        }
    }

    #[test]
    fn urls_join_without_double_slashes() {
        let client = ServiceClient::new(
            "test",
            ServiceConfig::new("http://localhost:8000/", Duration::from_secs(1)),
            Arc::new(MemoryCredentialStore::new()),
        )
        .unwrap();
        assert_eq!(client.url("/api/upload-case"), "http://localhost:8000/api/upload-case");
        assert_eq!(client.url("auth/me"), "http://localhost:8000/auth/me");
    }
}
