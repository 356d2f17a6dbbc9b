//! Broker REST error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum BrokerError {
    /// Transport-level failure (connect, timeout, TLS).
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// HTTP status outside 2xx.
    #[error("API returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    /// Transport succeeded but the brokerage refused the request.
    #[error("Broker rejected [{code}]: {message}")]
    Rejected { code: String, message: String },

    /// Response parsed but a required field was absent.
    #[error("Response missing field: {0}")]
    MissingField(String),

    #[error("Response parse error: {0}")]
    Parse(String),

    #[error(transparent)]
    Session(#[from] kis_session::SessionError),
}

pub type BrokerResult<T> = Result<T, BrokerError>;
