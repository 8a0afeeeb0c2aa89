use crate::symbol::Symbol;
use rust_decimal::Decimal;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PortfolioError {
    #[error("position {0} has no matching price entry")]
    MissingPrice(Symbol),

    #[error("total_value cannot be negative: {0}")]
    NegativeTotalValue(Decimal),

    #[error("position quantity cannot be negative for {symbol}: {quantity}")]
    NegativeQuantity { symbol: Symbol, quantity: Decimal },

    #[error("price must be positive for {symbol}: {price}")]
    NonPositivePrice { symbol: Symbol, price: Decimal },

    #[error("total_value {declared} does not match positions + cash {computed} within tolerance {tolerance}")]
    TotalValueMismatch {
        declared: Decimal,
        computed: Decimal,
        tolerance: Decimal,
    },

    #[error("target weights sum to {sum}, exceeding 1 + epsilon")]
    WeightsExceedOne { sum: Decimal },

    #[error("target weight for {symbol} is out of [0, 1]: {weight}")]
    WeightOutOfRange { symbol: Symbol, weight: Decimal },

    #[error("missing price for held position {0}, cannot plan this cycle")]
    MissingPriceForPlanning(Symbol),
}
