use crate::{
    aggregation::error::AggregationError, execution::error::ExecutionError,
    market_data::error::MarketDataError, portfolio::error::PortfolioError,
};
use thiserror::Error;

/// Top-level error composed from every component's error taxonomy.
///
/// Each component only catches what it can act on locally (retries, backoff,
/// circuit breaker); everything else surfaces here with enough context to
/// diagnose, per the propagation policy.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("configuration: {0}")]
    Configuration(String),

    #[error("market data: {0}")]
    MarketData(#[from] MarketDataError),

    #[error("portfolio: {0}")]
    Portfolio(#[from] PortfolioError),

    #[error("aggregation: {0}")]
    Aggregation(#[from] AggregationError),

    #[error("execution: {0}")]
    Execution(#[from] ExecutionError),

    #[error("command not implemented: {0}")]
    CommandNotImplemented(&'static str),

    #[error("channel closed: {0} dropped its receiver")]
    ChannelClosed(&'static str),
}

impl From<tokio::task::JoinError> for EngineError {
    fn from(value: tokio::task::JoinError) -> Self {
        Self::Configuration(format!("task join failed: {value:?}"))
    }
}
