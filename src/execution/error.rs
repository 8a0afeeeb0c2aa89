use crate::symbol::Symbol;
use rust_decimal::Decimal;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ExecutionError {
    #[error("order for {symbol} rejected: {reason}")]
    Rejected { symbol: Symbol, reason: String },

    #[error("cancel confirmation for order {order_id} timed out")]
    CancelTimeout { order_id: String },

    #[error("order for {symbol} exhausted its re-peg budget ({max_repegs})")]
    RepegExhausted { symbol: Symbol, max_repegs: u32 },

    #[error("no live quote for {0} within the bounded wait")]
    QuoteUnavailable(Symbol),

    #[error("liquidity validation failed for {symbol}: {reason}")]
    ValidationFailed { symbol: Symbol, reason: String },

    #[error("broker error: {0}")]
    Broker(String),

    #[error("illegal order state transition from {from:?} to {to:?}")]
    IllegalTransition {
        from: crate::execution::order::OrderState,
        to: crate::execution::order::OrderState,
    },

    #[error("order expired with {filled_qty} of {requested_qty} filled")]
    Expired {
        filled_qty: Decimal,
        requested_qty: Decimal,
    },
}
