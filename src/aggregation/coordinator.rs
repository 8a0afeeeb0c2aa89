use crate::{
    aggregation::{error::AggregationError, session::SessionStatus, signal::PartialSignal, store::SessionStore},
    symbol::Symbol,
};
use chrono::{DateTime, Utc};
use futures::stream::{FuturesUnordered, StreamExt};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::{collections::HashMap, sync::Arc};
use uuid::Uuid;

const ALLOCATION_WEIGHT_EPSILON: Decimal = dec!(0.000000001);

/// One strategy's participation weight in a session, fixed for its lifetime.
///
/// Grounded on `original_source/the_alchemiser/coordinator_v2/services/
/// aggregation_session_service.py`'s `StrategyConfig`; the DSL/AST evaluator
/// that produces a strategy's portfolio weights is out of scope (`spec.md`
/// §1), so only this contract — id plus its share of the blend — crosses the
/// boundary.
#[derive(Debug, Clone, PartialEq)]
pub struct StrategyConfig {
    pub strategy_id: String,
    pub allocation_weight: Decimal,
}

/// What one strategy worker reports back: its own target portfolio weights
/// and how many signals it consulted to produce them.
#[derive(Debug, Clone, PartialEq)]
pub struct StrategyEvaluation {
    pub consolidated_portfolio: HashMap<Symbol, Decimal>,
    pub signal_count: u32,
}

/// The strategy evaluator this session fans out to, consumed generically.
///
/// Out of scope per `spec.md` §1: only the signal contract a strategy emits
/// is specified here, not the DSL language or its AST evaluator.
#[async_trait::async_trait]
pub trait StrategyEvaluator: Send + Sync + 'static {
    async fn evaluate(&self, strategy_id: &str) -> Result<StrategyEvaluation, String>;
}

/// Whether a session that times out with some (but not all) strategies
/// reported should still emit a consolidated allocation from what arrived.
///
/// Grounded on `spec.md` §7 error kind 5: "downstream planner is invoked on
/// whatever partials did arrive only if a 'partial-consolidation' policy is
/// enabled; otherwise cycle is FAILURE." Defaults to disabled, the
/// conservative reading of that conditional language.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AggregationConfig {
    pub partial_consolidation_enabled: bool,
}

impl Default for AggregationConfig {
    fn default() -> Self {
        Self {
            partial_consolidation_enabled: false,
        }
    }
}

/// Fan a strategy roster out to `N` concurrent evaluations, fan their partial
/// signals back in exactly once each, and return one consolidated target
/// allocation — the Signal Aggregation Session of `spec.md` §4.4, wired
/// end-to-end rather than exercised one atomic operation at a time.
///
/// Grounded on the teacher's `ExecutionClient::cancel_orders`/`open_orders`
/// shape (`barter-execution/src/client/mod.rs`): a `FuturesUnordered` driving
/// every in-flight call concurrently, raced here against the session
/// deadline with `tokio::select!` rather than awaited to completion.
pub async fn run_session<E>(
    store: &SessionStore,
    evaluator: Arc<E>,
    strategies: Vec<StrategyConfig>,
    correlation_id: Uuid,
    timeout: chrono::Duration,
    config: AggregationConfig,
    now: DateTime<Utc>,
) -> Result<HashMap<Symbol, Decimal>, AggregationError>
where
    E: StrategyEvaluator,
{
    let allocation_sum = strategies
        .iter()
        .fold(Decimal::ZERO, |acc, s| acc + s.allocation_weight);
    if (allocation_sum - Decimal::ONE).abs() > ALLOCATION_WEIGHT_EPSILON {
        return Err(AggregationError::AllocationWeightsInvalid(allocation_sum));
    }

    let session_id = Uuid::new_v4();
    store.create_session(session_id, correlation_id, strategies.len() as u32, timeout, now);

    let mut in_flight = FuturesUnordered::new();
    for strategy in &strategies {
        let evaluator = Arc::clone(&evaluator);
        let strategy_id = strategy.strategy_id.clone();
        let allocation_weight = strategy.allocation_weight;
        in_flight.push(async move {
            let result = evaluator.evaluate(&strategy_id).await;
            (strategy_id, allocation_weight, result)
        });
    }

    let sleep = tokio::time::sleep(timeout.to_std().unwrap_or(std::time::Duration::ZERO));
    tokio::pin!(sleep);

    loop {
        if store
            .get_session(session_id)
            .map(|session| session.is_complete())
            .unwrap_or(false)
        {
            break;
        }

        tokio::select! {
            () = &mut sleep => {
                let _ = store.update_session_status(session_id, SessionStatus::Timeout);
                if config.partial_consolidation_enabled {
                    return store.consolidate_lenient(session_id);
                }
                return Err(AggregationError::SessionTimedOut(session_id));
            }
            next = in_flight.next(), if !in_flight.is_empty() => {
                match next {
                    Some((strategy_id, allocation_weight, Ok(evaluation))) => {
                        let signal = PartialSignal {
                            strategy_id,
                            allocation_weight,
                            consolidated_portfolio: evaluation.consolidated_portfolio,
                            signal_count: evaluation.signal_count,
                            completed_at: Utc::now(),
                        };
                        let _ = store.store_partial_signal(session_id, signal);
                    }
                    Some((strategy_id, _, Err(reason))) => {
                        let _ = store.update_session_status(session_id, SessionStatus::Failed);
                        return Err(AggregationError::StrategyEvaluationFailed { strategy_id, reason });
                    }
                    None => {}
                }
            }
        }
    }

    let consolidated = store.consolidate(session_id)?;
    let _ = store.update_session_status(session_id, SessionStatus::Completed);
    Ok(consolidated)
}
