/// Storage for the bearer token and the cached user profile.
///
/// Reads degrade gracefully: a backend failure is logged and reported as "no credentials", so
/// requests simply go out unauthenticated. Writes surface their errors to the caller.
use async_trait::async_trait;
use redis::AsyncCommands;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tokio::sync::RwLock;
use tracing::warn;

use crate::error::CommonError;

const KEY_PREFIX: &str = "juriaid:v1:";

/// Profile returned by `GET /auth/me`. Fields the client does not model are kept in `extra`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct UserProfile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub full_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[async_trait]
pub trait CredentialStore: Send + Sync {
    async fn token(&self) -> Option<String>;
    async fn set_token(&self, token: &str) -> Result<(), CommonError>;
    async fn profile(&self) -> Option<UserProfile>;
    async fn set_profile(&self, profile: &UserProfile) -> Result<(), CommonError>;
    /// Forget both the token and the profile.
    async fn clear(&self) -> Result<(), CommonError>;
}

#[derive(Debug, Default)]
struct Stored {
    token: Option<String>,
    profile: Option<UserProfile>,
}

/// Process-local store. Credentials are lost on restart.
#[derive(Debug, Default)]
pub struct MemoryCredentialStore {
    inner: RwLock<Stored>,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CredentialStore for MemoryCredentialStore {
    async fn token(&self) -> Option<String> {
        self.inner.read().await.token.clone()
    }

    async fn set_token(&self, token: &str) -> Result<(), CommonError> {
        self.inner.write().await.token = Some(token.to_string());
        Ok(())
    }

    async fn profile(&self) -> Option<UserProfile> {
        self.inner.read().await.profile.clone()
    }

    async fn set_profile(&self, profile: &UserProfile) -> Result<(), CommonError> {
        self.inner.write().await.profile = Some(profile.clone());
        Ok(())
    }

    async fn clear(&self) -> Result<(), CommonError> {
        *self.inner.write().await = Stored::default();
        Ok(())
    }
}

/// Redis-backed store shared between processes.
///
/// Key schema:
/// - `juriaid:v1:{namespace}:auth_token`: raw bearer token
/// - `juriaid:v1:{namespace}:user_profile`: JSON-serialized [`UserProfile`]
///
/// Both keys expire after `ttl_secs` when a TTL is configured.
pub struct RedisCredentialStore {
    client: Option<redis::Client>,
    namespace: String,
    ttl_secs: Option<u64>,
}

impl RedisCredentialStore {
    /// If the URL is `None` or invalid, every read reports no credentials and every write
    /// fails with [`CommonError::RedisUnavailable`].
    pub fn new(url: Option<&str>, namespace: &str, ttl_secs: Option<u64>) -> Self {
        let client = url.and_then(|u| {
            redis::Client::open(u)
                .inspect_err(|e| warn!(error = %e, url = u, "failed to create redis client, credentials disabled"))
                .ok()
        });
        Self {
            client,
            namespace: namespace.to_string(),
            ttl_secs,
        }
    }

    /// Sends a PING. Returns `true` if Redis is reachable.
    pub async fn is_available(&self) -> bool {
        let Ok(mut conn) = self.connection().await else {
            return false;
        };
        let result: Result<String, _> = redis::cmd("PING").query_async(&mut conn).await;
        result.is_ok()
    }

    fn key(&self, name: &str) -> String {
        format!("{KEY_PREFIX}{}:{name}", self.namespace)
    }

    async fn connection(&self) -> Result<redis::aio::MultiplexedConnection, CommonError> {
        let client = self.client.as_ref().ok_or(CommonError::RedisUnavailable)?;
        Ok(client.get_multiplexed_async_connection().await?)
    }

    async fn read(&self, name: &str) -> Option<String> {
        let key = self.key(name);
        let mut conn = self
            .connection()
            .await
            .inspect_err(|e| warn!(error = %e, "redis connection failed"))
            .ok()?;
        let value: Option<String> = conn
            .get(&key)
            .await
            .inspect_err(|e| warn!(error = %e, key, "redis GET failed"))
            .ok()?;
        value
    }

    async fn write(&self, name: &str, value: &str) -> Result<(), CommonError> {
        let key = self.key(name);
        let mut conn = self.connection().await?;
        match self.ttl_secs {
            Some(ttl) => conn.set_ex::<_, _, ()>(&key, value, ttl).await?,
            None => conn.set::<_, _, ()>(&key, value).await?,
        }
        Ok(())
    }
}

#[async_trait]
impl CredentialStore for RedisCredentialStore {
    async fn token(&self) -> Option<String> {
        self.read("auth_token").await.filter(|t| !t.is_empty())
    }

    async fn set_token(&self, token: &str) -> Result<(), CommonError> {
        self.write("auth_token", token).await
    }

    async fn profile(&self) -> Option<UserProfile> {
        let raw = self.read("user_profile").await?;
        serde_json::from_str(&raw)
            .inspect_err(|e| warn!(error = %e, "cached profile deserialization failed"))
            .ok()
    }

    async fn set_profile(&self, profile: &UserProfile) -> Result<(), CommonError> {
        let raw = serde_json::to_string(profile)?;
        self.write("user_profile", &raw).await
    }

    async fn clear(&self) -> Result<(), CommonError> {
        let keys = vec![self.key("auth_token"), self.key("user_profile")];
        let mut conn = self.connection().await?;
        conn.del::<_, ()>(&keys).await?;
        Ok(())
    }
}
