use rust_decimal::Decimal;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum LiquidityError {
    #[error("insufficient volume at {side}: {available} < {required}")]
    InsufficientVolume {
        side: &'static str,
        available: Decimal,
        required: Decimal,
    },

    #[error("order size {order_size} is more than 2x available volume {available} at {side}")]
    OrderTooLargeForLiquidity {
        side: &'static str,
        order_size: Decimal,
        available: Decimal,
    },

    #[error("spread too wide: {spread_pct}% > 5%")]
    SpreadTooWide { spread_pct: Decimal },
}
