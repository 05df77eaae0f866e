//! Engine-level error type

use thiserror::Error;

use crate::services::gateway::GatewayError;

pub type EngineResult<T> = Result<T, EngineError>;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("gateway error: {0}")]
    Gateway(#[from] GatewayError),

    #[error("scheduler error: {0}")]
    Scheduler(String),

    #[error("metrics error: {0}")]
    Metrics(#[from] prometheus::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}
