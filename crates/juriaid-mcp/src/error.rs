use std::path::PathBuf;

use case_router::{ClassificationError, IntakeError};
use juriaid_common::error::CommonError;
use juriaid_common::http::ServiceError;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error(transparent)]
    Common(#[from] CommonError),

    #[error(transparent)]
    Service(#[from] ServiceError),

    #[error(transparent)]
    Classification(#[from] ClassificationError),

    #[error(transparent)]
    Intake(#[from] IntakeError),

    #[error("cannot read document {path}: {source}")]
    Document {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("document {path} is {size} bytes, limit is {limit}")]
    DocumentTooLarge { path: PathBuf, size: u64, limit: u64 },

    #[error("config error: {0}")]
    Config(String),
}
