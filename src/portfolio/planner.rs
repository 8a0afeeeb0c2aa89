use crate::{
    portfolio::{
        allocation::TargetAllocation,
        error::PortfolioError,
        plan::{RebalancePlan, RebalancePlanItem},
        sizing::{SizingPolicy, TradeAction},
        snapshot::PortfolioSnapshot,
    },
    symbol::Symbol,
};
use chrono::{DateTime, Utc};
use itertools::Itertools;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::collections::HashSet;
use uuid::Uuid;

/// Tunables for one planning call, separate from the immutable snapshot.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RebalanceConfig {
    pub cash_reserve_pct: Decimal,
    pub leverage_enabled: bool,
    pub leverage_factor: Decimal,
    pub sizing: SizingPolicy,
}

impl Default for RebalanceConfig {
    fn default() -> Self {
        Self {
            cash_reserve_pct: dec!(0.01),
            leverage_enabled: false,
            leverage_factor: Decimal::ONE,
            sizing: SizingPolicy::default(),
        }
    }
}

fn action_rank(action: TradeAction) -> u8 {
    match action {
        TradeAction::Sell => 0,
        TradeAction::Buy => 1,
        TradeAction::Hold => 2,
    }
}

/// Transforms target weights and a portfolio snapshot into a minimal,
/// threshold-respecting set of trades.
///
/// Grounded on `spec.md` §4.3's deterministic algorithm; capital management
/// (cash as primary source, margin only under explicit leverage) follows
/// `portfolio_snapshot.py`'s documented convention.
#[derive(Debug, Clone, Copy, Default)]
pub struct RebalancePlanner {
    pub config: RebalanceConfig,
}

impl RebalancePlanner {
    pub fn new(config: RebalanceConfig) -> Self {
        Self { config }
    }

    pub fn plan(
        &self,
        snapshot: &PortfolioSnapshot,
        allocation: &TargetAllocation,
        non_fractionable: &HashSet<Symbol>,
        correlation_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<RebalancePlan, PortfolioError> {
        let effective_capital = self.effective_capital(snapshot);

        let symbols: Vec<Symbol> = snapshot
            .positions()
            .keys()
            .cloned()
            .chain(allocation.symbols().cloned())
            .collect::<HashSet<_>>()
            .into_iter()
            .sorted_by(|a, b| a.as_str().cmp(b.as_str()))
            .collect();

        let mut items = Vec::with_capacity(symbols.len());
        for symbol in symbols {
            let current_quantity = snapshot.quantity_of(&symbol);
            let target_weight = allocation.weight_of(&symbol);

            let price = snapshot.price_of(&symbol).ok_or_else(|| {
                PortfolioError::MissingPriceForPlanning(symbol.clone())
            })?;

            let current_value = current_quantity * price;
            let target_value = effective_capital * target_weight;
            let trade_amount = target_value - current_value;
            let current_weight = if snapshot.total_value() > Decimal::ZERO {
                current_value / snapshot.total_value()
            } else {
                Decimal::ZERO
            };

            let (sized_amount, action) = self.config.sizing.apply_sizing_rules(trade_amount);

            let mut estimated_quantity = if price > Decimal::ZERO {
                sized_amount / price
            } else {
                Decimal::ZERO
            };
            if non_fractionable.contains(&symbol) {
                estimated_quantity = estimated_quantity.trunc();
            }

            items.push(RebalancePlanItem {
                symbol,
                action,
                trade_amount: sized_amount,
                current_weight,
                target_weight,
                current_value,
                target_value,
                estimated_quantity,
            });
        }

        items.sort_by(|a, b| {
            action_rank(a.action)
                .cmp(&action_rank(b.action))
                .then_with(|| a.symbol.as_str().cmp(b.symbol.as_str()))
        });

        let total_trade_value = items
            .iter()
            .filter(|item| item.action != TradeAction::Hold)
            .fold(Decimal::ZERO, |acc, item| acc + item.trade_amount.abs());

        Ok(RebalancePlan {
            plan_id: Uuid::new_v4(),
            correlation_id,
            timestamp: now,
            items,
            total_trade_value,
        })
    }

    fn effective_capital(&self, snapshot: &PortfolioSnapshot) -> Decimal {
        if self.config.leverage_enabled {
            if let Some(buying_power) = snapshot.margin().buying_power {
                return buying_power.min(snapshot.total_value() * self.config.leverage_factor);
            }
        }
        snapshot.total_value() * (Decimal::ONE - self.config.cash_reserve_pct)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::portfolio::snapshot::MarginInfo;
    use std::collections::HashMap;

    fn sym(s: &str) -> Symbol {
        Symbol::new(s).unwrap()
    }

    fn snapshot(
        positions: &[(&str, Decimal)],
        prices: &[(&str, Decimal)],
        cash: Decimal,
        total_value: Decimal,
    ) -> PortfolioSnapshot {
        PortfolioSnapshot::try_new(
            positions
                .iter()
                .map(|(s, q)| (sym(s), *q))
                .collect::<HashMap<_, _>>(),
            prices
                .iter()
                .map(|(s, p)| (sym(s), *p))
                .collect::<HashMap<_, _>>(),
            cash,
            total_value,
            MarginInfo::default(),
        )
        .unwrap()
    }

    fn allocation(weights: &[(&str, Decimal)]) -> TargetAllocation {
        TargetAllocation::try_new(
            weights.iter().map(|(s, w)| (sym(s), *w)).collect(),
            Uuid::nil(),
            Utc::now(),
            vec![],
        )
        .unwrap()
    }

    #[test]
    fn buys_from_empty_portfolio() {
        let snap = snapshot(&[], &[("AAPL", dec!(100.00))], dec!(1000), dec!(1000));
        let alloc = allocation(&[("AAPL", dec!(1.0))]);
        let planner = RebalancePlanner::default();
        let plan = planner
            .plan(&snap, &alloc, &HashSet::new(), Uuid::nil(), Utc::now())
            .unwrap();

        let item = plan.items.iter().find(|i| i.symbol == sym("AAPL")).unwrap();
        assert_eq!(item.action, TradeAction::Buy);
        assert_eq!(item.trade_amount, dec!(990.00));
    }

    #[test]
    fn full_liquidation_when_target_weight_is_zero() {
        let snap = snapshot(
            &[("AAPL", dec!(10))],
            &[("AAPL", dec!(100.00))],
            dec!(0),
            dec!(1000),
        );
        let alloc = allocation(&[]);
        let planner = RebalancePlanner::default();
        let plan = planner
            .plan(&snap, &alloc, &HashSet::new(), Uuid::nil(), Utc::now())
            .unwrap();

        let item = plan.items.iter().find(|i| i.symbol == sym("AAPL")).unwrap();
        assert_eq!(item.action, TradeAction::Sell);
        assert_eq!(item.trade_amount, dec!(-1000.00));
        assert_eq!(item.current_value, dec!(1000.00));
    }

    #[test]
    fn holds_when_trade_amount_below_minimum() {
        let snap = snapshot(
            &[("AAPL", dec!(9.9))],
            &[("AAPL", dec!(100.00))],
            dec!(10),
            dec!(1000),
        );
        let alloc = allocation(&[("AAPL", dec!(0.99))]);
        let planner = RebalancePlanner::default();
        let plan = planner
            .plan(&snap, &alloc, &HashSet::new(), Uuid::nil(), Utc::now())
            .unwrap();

        let item = plan.items.iter().find(|i| i.symbol == sym("AAPL")).unwrap();
        assert_eq!(item.action, TradeAction::Hold);
        assert_eq!(item.trade_amount, Decimal::ZERO);
    }

    #[test]
    fn sells_are_ordered_before_buys() {
        let snap = snapshot(
            &[("AAPL", dec!(10))],
            &[("AAPL", dec!(100.00)), ("MSFT", dec!(50.00))],
            dec!(0),
            dec!(1000),
        );
        let alloc = allocation(&[("MSFT", dec!(1.0))]);
        let planner = RebalancePlanner::default();
        let plan = planner
            .plan(&snap, &alloc, &HashSet::new(), Uuid::nil(), Utc::now())
            .unwrap();

        let actions: Vec<TradeAction> = plan.items.iter().map(|i| i.action).collect();
        assert_eq!(actions, vec![TradeAction::Sell, TradeAction::Buy]);
    }

    #[test]
    fn missing_price_for_held_position_is_fatal() {
        let positions = HashMap::from([(sym("AAPL"), dec!(10))]);
        let prices = HashMap::from([(sym("AAPL"), dec!(100.00))]);
        let snap = PortfolioSnapshot::try_new(
            positions,
            prices,
            dec!(0),
            dec!(1000),
            MarginInfo::default(),
        )
        .unwrap();
        // Target weights reference a symbol with no price entry at all.
        let alloc = allocation(&[("GOOG", dec!(1.0))]);
        let planner = RebalancePlanner::default();
        let result = planner.plan(&snap, &alloc, &HashSet::new(), Uuid::nil(), Utc::now());
        assert_eq!(
            result,
            Err(PortfolioError::MissingPriceForPlanning(sym("GOOG")))
        );
    }

    #[test]
    fn non_fractionable_symbol_truncates_estimated_quantity() {
        let snap = snapshot(&[], &[("AAPL", dec!(30.00))], dec!(1000), dec!(1000));
        let alloc = allocation(&[("AAPL", dec!(1.0))]);
        let planner = RebalancePlanner::default();
        let non_fractionable = HashSet::from([sym("AAPL")]);
        let plan = planner
            .plan(&snap, &alloc, &non_fractionable, Uuid::nil(), Utc::now())
            .unwrap();

        let item = plan.items.iter().find(|i| i.symbol == sym("AAPL")).unwrap();
        assert_eq!(item.estimated_quantity, item.estimated_quantity.trunc());
    }
}
