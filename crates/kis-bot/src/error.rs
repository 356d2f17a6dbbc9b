//! Application error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Config error: {0}")]
    Config(String),

    #[error(transparent)]
    Session(#[from] kis_session::SessionError),

    #[error(transparent)]
    Broker(#[from] kis_broker::BrokerError),

    #[error(transparent)]
    Risk(#[from] kis_risk::RiskError),

    #[error(transparent)]
    Store(#[from] kis_persistence::StoreError),

    #[error(transparent)]
    Executor(#[from] kis_executor::ExecutorError),
}

pub type AppResult<T> = Result<T, AppError>;
