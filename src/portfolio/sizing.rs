use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

/// How a raw dollar trade_amount is rounded and gated against a minimum.
///
/// Grounded on `original_source/the_alchemiser/portfolio_v2/models/sizing_policy.py`.
/// The source's `WHOLE_SHARES`/`LOT_SIZE` modes fall back to dollar rounding
/// pending price-aware sizing in the calculator; that limitation is carried
/// forward unchanged here.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SizingMode {
    DollarAmount,
    WholeShares,
    LotSize,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SizingPolicy {
    pub min_trade_amount: Decimal,
    pub sizing_mode: SizingMode,
    pub lot_size: u32,
    pub rounding_precision: u32,
}

/// Action a sized trade_amount resolves to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TradeAction {
    Buy,
    Sell,
    Hold,
}

impl Default for SizingPolicy {
    fn default() -> Self {
        Self {
            min_trade_amount: dec!(25.00),
            sizing_mode: SizingMode::DollarAmount,
            lot_size: 100,
            rounding_precision: 2,
        }
    }
}

impl SizingPolicy {
    pub fn should_trade(&self, trade_amount: Decimal) -> bool {
        trade_amount.abs() >= self.min_trade_amount
    }

    pub fn round_trade_amount(&self, trade_amount: Decimal) -> Decimal {
        trade_amount.round_dp(self.rounding_precision)
    }

    /// Round, then gate against the minimum, returning the final signed amount
    /// and the action it implies.
    pub fn apply_sizing_rules(&self, trade_amount: Decimal) -> (Decimal, TradeAction) {
        let rounded = self.round_trade_amount(trade_amount);

        if !self.should_trade(rounded) {
            return (Decimal::ZERO, TradeAction::Hold);
        }

        if rounded > Decimal::ZERO {
            (rounded, TradeAction::Buy)
        } else if rounded < Decimal::ZERO {
            (rounded, TradeAction::Sell)
        } else {
            (Decimal::ZERO, TradeAction::Hold)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn holds_when_below_minimum() {
        let policy = SizingPolicy::default();
        assert_eq!(
            policy.apply_sizing_rules(dec!(10.00)),
            (Decimal::ZERO, TradeAction::Hold)
        );
    }

    #[test]
    fn buys_above_minimum() {
        let policy = SizingPolicy::default();
        assert_eq!(
            policy.apply_sizing_rules(dec!(100.004)),
            (dec!(100.00), TradeAction::Buy)
        );
    }

    #[test]
    fn sells_when_negative_and_above_minimum_magnitude() {
        let policy = SizingPolicy::default();
        assert_eq!(
            policy.apply_sizing_rules(dec!(-50.00)),
            (dec!(-50.00), TradeAction::Sell)
        );
    }
}
