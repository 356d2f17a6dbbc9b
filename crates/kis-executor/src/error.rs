//! Executor error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ExecutorError {
    #[error(transparent)]
    Validation(#[from] kis_core::CoreError),

    #[error(transparent)]
    Broker(#[from] kis_broker::BrokerError),

    #[error(transparent)]
    Store(#[from] kis_persistence::StoreError),

    #[error(transparent)]
    Risk(#[from] kis_risk::RiskError),

    #[error("Intake queue closed")]
    QueueClosed,
}

pub type ExecutorResult<T> = Result<T, ExecutorError>;
