use crate::{portfolio::error::PortfolioError, symbol::Symbol};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::collections::HashMap;
use uuid::Uuid;

const WEIGHT_EPSILON: Decimal = dec!(0.000000001);

/// Consolidated target portfolio weights produced by aggregation and consumed
/// by the Rebalance Planner.
#[derive(Debug, Clone, PartialEq)]
pub struct TargetAllocation {
    weights: HashMap<Symbol, Decimal>,
    pub correlation_id: Uuid,
    pub as_of: DateTime<Utc>,
    pub constraints: Vec<String>,
}

impl TargetAllocation {
    pub fn try_new(
        weights: HashMap<Symbol, Decimal>,
        correlation_id: Uuid,
        as_of: DateTime<Utc>,
        constraints: Vec<String>,
    ) -> Result<Self, PortfolioError> {
        let mut sum = Decimal::ZERO;
        for (symbol, weight) in &weights {
            if *weight < Decimal::ZERO || *weight > Decimal::ONE {
                return Err(PortfolioError::WeightOutOfRange {
                    symbol: symbol.clone(),
                    weight: *weight,
                });
            }
            sum += *weight;
        }

        if sum > Decimal::ONE + WEIGHT_EPSILON {
            return Err(PortfolioError::WeightsExceedOne { sum });
        }

        Ok(Self {
            weights,
            correlation_id,
            as_of,
            constraints,
        })
    }

    pub fn weight_of(&self, symbol: &Symbol) -> Decimal {
        self.weights.get(symbol).copied().unwrap_or(Decimal::ZERO)
    }

    pub fn symbols(&self) -> impl Iterator<Item = &Symbol> {
        self.weights.keys()
    }

    pub fn weights(&self) -> &HashMap<Symbol, Decimal> {
        &self.weights
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_weights_summing_above_one() {
        let weights = HashMap::from([
            (Symbol::new("AAPL").unwrap(), dec!(0.6)),
            (Symbol::new("MSFT").unwrap(), dec!(0.6)),
        ]);
        let result = TargetAllocation::try_new(weights, Uuid::nil(), Utc::now(), vec![]);
        assert!(matches!(
            result,
            Err(PortfolioError::WeightsExceedOne { .. })
        ));
    }

    #[test]
    fn rejects_out_of_range_weight() {
        let weights = HashMap::from([(Symbol::new("AAPL").unwrap(), dec!(1.5))]);
        let result = TargetAllocation::try_new(weights, Uuid::nil(), Utc::now(), vec![]);
        assert!(matches!(
            result,
            Err(PortfolioError::WeightOutOfRange { .. })
        ));
    }

    #[test]
    fn accepts_weights_within_epsilon_of_one() {
        let weights = HashMap::from([
            (Symbol::new("AAPL").unwrap(), dec!(0.5)),
            (Symbol::new("MSFT").unwrap(), dec!(0.5)),
        ]);
        assert!(TargetAllocation::try_new(weights, Uuid::nil(), Utc::now(), vec![]).is_ok());
    }
}
