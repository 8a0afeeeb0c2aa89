use crate::symbol::Symbol;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum MarketDataError {
    #[error("stream connect failed after exhausting retry budget: {0}")]
    ConnectRetriesExhausted(String),

    #[error("circuit breaker open, cooldown until {until}")]
    CircuitOpen { until: chrono::DateTime<chrono::Utc> },

    #[error("malformed wire message: {0}")]
    MalformedMessage(String),

    #[error("stream task dropped its event channel")]
    StreamTaskGone,

    #[error("no quote available for {0} within the bounded wait")]
    QuoteUnavailable(Symbol),
}
