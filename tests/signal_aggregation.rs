use async_trait::async_trait;
use equity_trader::aggregation::{
    AggregationConfig, SessionStore, StrategyConfig, StrategyEvaluation, StrategyEvaluator,
    run_session,
};
use equity_trader::symbol::Symbol;
use chrono::{Duration, Utc};
use rust_decimal_macros::dec;
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

fn sym(s: &str) -> Symbol {
    Symbol::new(s).unwrap()
}

struct ThreeStrategyEvaluator;

#[async_trait]
impl StrategyEvaluator for ThreeStrategyEvaluator {
    async fn evaluate(&self, strategy_id: &str) -> Result<StrategyEvaluation, String> {
        let portfolio = match strategy_id {
            "momentum" => HashMap::from([(sym("AAPL"), dec!(1.0))]),
            "mean_reversion" => HashMap::from([(sym("MSFT"), dec!(0.5)), (sym("GOOG"), dec!(0.5))]),
            "pairs" => HashMap::from([(sym("GOOG"), dec!(1.0))]),
            other => return Err(format!("unknown strategy {other}")),
        };
        Ok(StrategyEvaluation {
            consolidated_portfolio: portfolio,
            signal_count: 3,
        })
    }
}

/// A three-strategy roster fans out concurrently and consolidates into one
/// blended target allocation, weighted by each strategy's allocation share.
#[tokio::test]
async fn three_strategies_consolidate_into_one_blended_allocation() {
    let store = SessionStore::new();
    let strategies = vec![
        StrategyConfig {
            strategy_id: "momentum".to_string(),
            allocation_weight: dec!(0.5),
        },
        StrategyConfig {
            strategy_id: "mean_reversion".to_string(),
            allocation_weight: dec!(0.3),
        },
        StrategyConfig {
            strategy_id: "pairs".to_string(),
            allocation_weight: dec!(0.2),
        },
    ];

    let result = run_session(
        &store,
        Arc::new(ThreeStrategyEvaluator),
        strategies,
        Uuid::new_v4(),
        Duration::seconds(5),
        AggregationConfig::default(),
        Utc::now(),
    )
    .await
    .unwrap();

    assert_eq!(result[&sym("AAPL")], dec!(0.5));
    assert_eq!(result[&sym("MSFT")], dec!(0.15));
    // GOOG receives contributions from both mean_reversion and pairs.
    assert_eq!(result[&sym("GOOG")], dec!(0.15) + dec!(0.2));
}

/// A strategy id absent from the evaluator's roster fails the whole session
/// rather than silently dropping its share of the blend.
#[tokio::test]
async fn unknown_strategy_fails_the_whole_session() {
    let store = SessionStore::new();
    let strategies = vec![StrategyConfig {
        strategy_id: "nonexistent".to_string(),
        allocation_weight: dec!(1.0),
    }];

    let result = run_session(
        &store,
        Arc::new(ThreeStrategyEvaluator),
        strategies,
        Uuid::new_v4(),
        Duration::seconds(5),
        AggregationConfig::default(),
        Utc::now(),
    )
    .await;

    assert!(result.is_err());
}
