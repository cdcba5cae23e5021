use juriaid_common::http::ServiceConfig;

use crate::error::AppError;

const DEFAULT_MAX_DOCUMENT_BYTES: u64 = 20 * 1024 * 1024;

/// Application configuration loaded explicitly from environment variables.
///
/// Redis URL is optional; if absent, credentials live in process memory only.
#[derive(Debug, Clone)]
pub struct Config {
    pub orchestrator: ServiceConfig,
    pub auth: ServiceConfig,
    /// Redis connection URL (e.g. "redis://127.0.0.1:6379"). `None` keeps credentials in memory.
    pub redis_url: Option<String>,
    /// Key namespace for credentials stored in Redis.
    pub credentials_namespace: String,
    /// Expiry for credentials stored in Redis. `None` keeps them until logout or a 401.
    pub credentials_ttl_secs: Option<u64>,
    /// Documents larger than this are refused before upload.
    pub max_document_bytes: u64,
}

impl Config {
    /// Optional:
    /// - `ORCHESTRATOR_BASE_URL`, `AUTH_BASE_URL` and the other `ServiceConfig` variables
    /// - `REDIS_URL`: Redis connection string
    /// - `CREDENTIALS_NAMESPACE`: defaults to `default`
    /// - `CREDENTIALS_TTL_SECS`: positive integer
    /// - `MAX_DOCUMENT_BYTES`: defaults to 20 MiB
    pub fn from_env() -> Result<Self, AppError> {
        let orchestrator = ServiceConfig::orchestrator_from_env();
        let auth = ServiceConfig::auth_from_env();
        for (name, service) in [("ORCHESTRATOR_BASE_URL", &orchestrator), ("AUTH_BASE_URL", &auth)] {
            validate_base_url(name, &service.base_url)?;
        }

        let credentials_ttl_secs = match std::env::var("CREDENTIALS_TTL_SECS") {
            Ok(raw) => Some(parse_positive("CREDENTIALS_TTL_SECS", &raw)?),
            Err(_) => None,
        };

        let max_document_bytes = match std::env::var("MAX_DOCUMENT_BYTES") {
            Ok(raw) => parse_positive("MAX_DOCUMENT_BYTES", &raw)?,
            Err(_) => DEFAULT_MAX_DOCUMENT_BYTES,
        };

        Ok(Self {
            orchestrator,
            auth,
            redis_url: std::env::var("REDIS_URL").ok().filter(|u| !u.is_empty()),
            credentials_namespace: std::env::var("CREDENTIALS_NAMESPACE")
                .ok()
                .filter(|n| !n.is_empty())
                .unwrap_or_else(|| "default".to_string()),
            credentials_ttl_secs,
            max_document_bytes,
        })
    }
}

fn validate_base_url(name: &str, url: &str) -> Result<(), AppError> {
    if url.starts_with("http://") || url.starts_with("https://") {
        Ok(())
    } else {
        Err(AppError::Config(format!(
            "{name} must start with http:// or https://, got {url:?}"
        )))
    }
}

fn parse_positive(name: &str, raw: &str) -> Result<u64, AppError> {
    raw.trim()
        .parse::<u64>()
        .ok()
        .filter(|&n| n > 0)
        .ok_or_else(|| AppError::Config(format!("{name} must be a positive integer, got {raw:?}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_urls_need_a_scheme() {
        assert!(validate_base_url("AUTH_BASE_URL", "http://10.0.2.2:8001").is_ok());
        assert!(validate_base_url("AUTH_BASE_URL", "https://auth.juriaid.lk").is_ok());
        assert!(matches!(
            validate_base_url("AUTH_BASE_URL", "10.0.2.2:8001"),
            Err(AppError::Config(_))
        ));
    }

    #[test]
    fn positive_integers_only() {
        assert_eq!(parse_positive("X", " 3600 ").unwrap(), 3600);
        assert!(parse_positive("X", "0").is_err());
        assert!(parse_positive("X", "-5").is_err());
        assert!(parse_positive("X", "soon").is_err());
    }
}
