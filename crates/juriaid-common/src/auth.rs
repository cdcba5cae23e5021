use std::sync::Arc;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::info;

use crate::credentials::{CredentialStore, UserProfile};
use crate::error::CommonError;
use crate::http::{ServiceClient, ServiceConfig, ServiceError};

#[derive(Debug, Clone, Serialize)]
pub struct SignupRequest {
    pub email: String,
    pub password: String,
    pub full_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
}

#[derive(Debug, Serialize)]
struct LoginRequest<'a> {
    email: &'a str,
    password: &'a str,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct LoginResponse {
    #[serde(default)]
    pub access_token: Option<String>,
    #[serde(default)]
    pub token_type: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A logged-in session: the login reply plus the freshly fetched profile.
#[derive(Debug, Clone, PartialEq, Serialize, JsonSchema)]
pub struct Session {
    pub login: LoginResponse,
    pub user: UserProfile,
}

#[derive(Clone)]
pub struct AuthClient {
    base: ServiceClient,
}

impl AuthClient {
    pub fn new(
        config: ServiceConfig,
        credentials: Arc<dyn CredentialStore>,
    ) -> Result<Self, ServiceError> {
        Ok(Self {
            base: ServiceClient::new("auth", config, credentials)?,
        })
    }

    fn store(&self) -> &Arc<dyn CredentialStore> {
        self.base.credentials()
    }

    pub async fn signup(&self, request: &SignupRequest) -> Result<Value, ServiceError> {
        self.base.post_json("/auth/signup", request).await
    }

    /// Log in and remember the returned access token.
    pub async fn login(&self, email: &str, password: &str) -> Result<LoginResponse, ServiceError> {
        let response: LoginResponse = self
            .base
            .post_json("/auth/login", &LoginRequest { email, password })
            .await?;
        if let Some(token) = response.access_token.as_deref().filter(|t| !t.is_empty()) {
            self.store().set_token(token).await?;
            info!("access token stored");
        }
        Ok(response)
    }

    /// Fetch the current user's profile and cache it.
    pub async fn get_profile(&self) -> Result<UserProfile, ServiceError> {
        let profile: UserProfile = self.base.get_json("/auth/me").await?;
        self.store().set_profile(&profile).await?;
        Ok(profile)
    }

    /// Log in, then fetch the profile.
    pub async fn login_session(&self, email: &str, password: &str) -> Result<Session, ServiceError> {
        let login = self.login(email, password).await?;
        let user = self.get_profile().await?;
        Ok(Session { login, user })
    }

    pub async fn logout(&self) -> Result<(), CommonError> {
        self.store().clear().await
    }

    pub async fn is_authenticated(&self) -> bool {
        self.store().token().await.is_some()
    }

    pub async fn token(&self) -> Option<String> {
        self.store().token().await
    }

    pub async fn stored_profile(&self) -> Option<UserProfile> {
        self.store().profile().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn signup_body_omits_missing_phone() {
        let request = SignupRequest {
            email: "a@b.lk".to_string(),
            password: "secret".to_string(),
            full_name: "Amara Perera".to_string(),
            phone: None,
        };
        assert_eq!(
            serde_json::to_value(&request).unwrap(),
            json!({ "email": "a@b.lk", "password": "secret", "full_name": "Amara Perera" })
        );
    }

    #[test]
    fn login_response_tolerates_missing_token() {
        let response: LoginResponse = serde_json::from_value(json!({ "message": "pending" })).unwrap();
        assert_eq!(response.access_token, None);
        assert_eq!(response.extra.get("message"), Some(&json!("pending")));
    }
}
