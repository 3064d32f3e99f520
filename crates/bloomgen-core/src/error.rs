//! Error types for bloomgen-core

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Generation error: {0}")]
    Generation(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Backend error: {0}")]
    Backend(String),

    #[error("Generation cancelled")]
    Cancelled,
}

pub type Result<T> = std::result::Result<T, CoreError>;
