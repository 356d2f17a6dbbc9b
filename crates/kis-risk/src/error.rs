//! Risk engine error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum RiskError {
    #[error(transparent)]
    Broker(#[from] kis_broker::BrokerError),

    #[error(transparent)]
    Store(#[from] kis_persistence::StoreError),

    #[error("Not enough candle data for {0}")]
    InsufficientData(String),

    #[error("Malformed record: {0}")]
    MalformedRecord(String),
}

pub type RiskResult<T> = Result<T, RiskError>;
