use crate::{portfolio::sizing::TradeAction, symbol::Symbol};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One symbol's contribution to a `RebalancePlan`.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct RebalancePlanItem {
    pub symbol: Symbol,
    pub action: TradeAction,
    /// Signed dollars: positive for BUY, negative for SELL, zero for HOLD.
    pub trade_amount: Decimal,
    pub current_weight: Decimal,
    pub target_weight: Decimal,
    pub current_value: Decimal,
    pub target_value: Decimal,
    pub estimated_quantity: Decimal,
}

/// A deterministic, threshold-respecting set of trades moving a portfolio
/// toward its target weights.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct RebalancePlan {
    pub plan_id: Uuid,
    pub correlation_id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub items: Vec<RebalancePlanItem>,
    pub total_trade_value: Decimal,
}

impl RebalancePlan {
    pub fn non_hold_items(&self) -> impl Iterator<Item = &RebalancePlanItem> {
        self.items
            .iter()
            .filter(|item| item.action != TradeAction::Hold)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn round_trips_through_the_wire_format() {
        let plan = RebalancePlan {
            plan_id: Uuid::new_v4(),
            correlation_id: Uuid::new_v4(),
            timestamp: Utc::now(),
            items: vec![RebalancePlanItem {
                symbol: Symbol::new("AAPL").unwrap(),
                action: TradeAction::Sell,
                trade_amount: dec!(-505.00),
                current_weight: dec!(0.101),
                target_weight: dec!(0.05),
                current_value: dec!(1000.00),
                target_value: dec!(495.00),
                estimated_quantity: dec!(5.05),
            }],
            total_trade_value: dec!(505.00),
        };

        let wire = serde_json::to_string(&plan).unwrap();
        let decoded: RebalancePlan = serde_json::from_str(&wire).unwrap();
        assert_eq!(decoded, plan);
        assert!(wire.contains("\"SELL\""));
        assert!(wire.contains("\"-505.00\"") || wire.contains("\"-505\""));
    }
}
