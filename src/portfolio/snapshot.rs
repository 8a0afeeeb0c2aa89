use crate::{portfolio::error::PortfolioError, symbol::Symbol};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::collections::HashMap;

/// Margin-related account information for leverage-aware capital management.
///
/// Every field is optional: margin is not available for all account types, and
/// a missing field degrades derived properties to `None` rather than a guess.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MarginInfo {
    pub buying_power: Option<Decimal>,
    pub initial_margin: Option<Decimal>,
    pub maintenance_margin: Option<Decimal>,
    pub equity: Option<Decimal>,
}

impl MarginInfo {
    pub fn margin_available(&self) -> Option<Decimal> {
        Some(self.buying_power? - self.initial_margin?)
    }

    pub fn margin_utilization_pct(&self) -> Option<Decimal> {
        let equity = self.equity?;
        if equity <= Decimal::ZERO {
            return None;
        }
        Some((self.initial_margin? / equity) * dec!(100))
    }

    pub fn maintenance_margin_buffer_pct(&self) -> Option<Decimal> {
        let maintenance_margin = self.maintenance_margin?;
        if maintenance_margin <= Decimal::ZERO {
            return None;
        }
        let equity = self.equity?;
        Some(((equity - maintenance_margin) / maintenance_margin) * dec!(100))
    }

    pub fn is_margin_available(&self) -> bool {
        self.buying_power.is_some()
    }
}

/// Immutable snapshot of portfolio state used for one rebalance planning call.
///
/// Grounded on `original_source/the_alchemiser/portfolio_v2/models/portfolio_snapshot.py`.
#[derive(Debug, Clone, PartialEq)]
pub struct PortfolioSnapshot {
    positions: HashMap<Symbol, Decimal>,
    prices: HashMap<Symbol, Decimal>,
    cash: Decimal,
    total_value: Decimal,
    margin: MarginInfo,
}

impl PortfolioSnapshot {
    /// Validating constructor. Mirrors the `__post_init__` checks of the
    /// source dataclass: every position must have a price, total_value and
    /// quantities must be non-negative, and prices must be strictly positive.
    pub fn try_new(
        positions: HashMap<Symbol, Decimal>,
        prices: HashMap<Symbol, Decimal>,
        cash: Decimal,
        total_value: Decimal,
        margin: MarginInfo,
    ) -> Result<Self, PortfolioError> {
        for symbol in positions.keys() {
            if !prices.contains_key(symbol) {
                return Err(PortfolioError::MissingPrice(symbol.clone()));
            }
        }

        if total_value < Decimal::ZERO {
            return Err(PortfolioError::NegativeTotalValue(total_value));
        }

        for (symbol, quantity) in &positions {
            if *quantity < Decimal::ZERO {
                return Err(PortfolioError::NegativeQuantity {
                    symbol: symbol.clone(),
                    quantity: *quantity,
                });
            }
        }

        for (symbol, price) in &prices {
            if *price <= Decimal::ZERO {
                return Err(PortfolioError::NonPositivePrice {
                    symbol: symbol.clone(),
                    price: *price,
                });
            }
        }

        Ok(Self {
            positions,
            prices,
            cash,
            total_value,
            margin,
        })
    }

    pub fn positions(&self) -> &HashMap<Symbol, Decimal> {
        &self.positions
    }

    pub fn prices(&self) -> &HashMap<Symbol, Decimal> {
        &self.prices
    }

    pub fn price_of(&self, symbol: &Symbol) -> Option<Decimal> {
        self.prices.get(symbol).copied()
    }

    pub fn quantity_of(&self, symbol: &Symbol) -> Decimal {
        self.positions.get(symbol).copied().unwrap_or(Decimal::ZERO)
    }

    pub fn cash(&self) -> Decimal {
        self.cash
    }

    pub fn total_value(&self) -> Decimal {
        self.total_value
    }

    pub fn margin(&self) -> &MarginInfo {
        &self.margin
    }

    pub fn get_position_value(&self, symbol: &Symbol) -> Option<Decimal> {
        let quantity = self.positions.get(symbol)?;
        let price = self.prices.get(symbol)?;
        Some(*quantity * *price)
    }

    pub fn get_all_position_values(&self) -> HashMap<Symbol, Decimal> {
        self.positions
            .keys()
            .filter_map(|symbol| {
                self.get_position_value(symbol)
                    .map(|value| (symbol.clone(), value))
            })
            .collect()
    }

    pub fn get_total_position_value(&self) -> Decimal {
        self.get_all_position_values()
            .values()
            .fold(Decimal::ZERO, |acc, value| acc + value)
    }

    /// Checks `total_value == positions + cash` within `tolerance`.
    pub fn validate_total_value(&self, tolerance: Decimal) -> bool {
        let calculated = self.get_total_position_value() + self.cash;
        (self.total_value - calculated).abs() <= tolerance
    }
}
