//! Session error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Config error: {0}")]
    Config(String),

    #[error("Token refresh refused: {0}")]
    TokenRefused(String),

    #[error("Approval key request refused: {0}")]
    ApprovalRefused(String),

    #[error("Seal error: {0}")]
    Seal(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

pub type SessionResult<T> = Result<T, SessionError>;
