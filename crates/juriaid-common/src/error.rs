/// Error types shared by the JuriAid service clients.
///
/// These cover the local collaborators (credential storage, serialization). Failures talking
/// to a remote service are reported as [`crate::http::ServiceError`], which wraps
/// `CommonError` via `#[from]`.

#[derive(Debug, thiserror::Error)]
pub enum CommonError {
    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("redis unavailable, credentials not persisted")]
    RedisUnavailable,

    #[error("credential serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}
