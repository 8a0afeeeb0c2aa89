use crate::{
    aggregation::{AggregationConfig, SessionStore, StrategyConfig, StrategyEvaluator},
    config::{Config, TradingMode},
    error::EngineError,
    execution::{BrokerClient, ExecutionConfig, ExecutionEngine, ExecutionSummary, TradeResult, TradeStatus},
    market_data::MarketDataStream,
    portfolio::{PortfolioSnapshot, RebalanceConfig, RebalancePlan, RebalancePlanner, SizingPolicy, TargetAllocation},
    symbol::Symbol,
};
use chrono::{DateTime, Utc};
use std::{collections::HashSet, sync::Arc};
use tracing::{error, info};
use uuid::Uuid;

/// The three ways this process can be invoked (`spec.md` §6).
pub enum Command {
    /// Plan and execute against live broker state.
    Trade,
    /// Plan only; never reaches the broker.
    SignalOnly,
    /// Profit-and-loss reporting. Not part of this specification's scope.
    Pnl,
}

/// Everything one trading cycle needs, gathered so `run` has a single,
/// testable entry point rather than reading global state.
pub struct CycleInputs {
    pub target_allocation: TargetAllocation,
    pub snapshot: PortfolioSnapshot,
    pub non_fractionable: HashSet<Symbol>,
    pub correlation_id: Uuid,
}

/// Runs one trading cycle end to end: plan, then (for `Trade`) execute.
///
/// Grounded on the teacher's `system::Engine::run`/`cycle` shape — a single
/// top-level orchestration function wiring the already-constructed
/// components together and producing one terminal record — adapted to this
/// domain's plan-then-execute pipeline instead of an event-driven trading loop.
pub async fn run<B>(
    command: Command,
    config: &Config,
    inputs: CycleInputs,
    market_data: Arc<MarketDataStream>,
    broker: Arc<B>,
) -> TradeResult
where
    B: BrokerClient,
{
    let started_at = Utc::now();

    match command {
        Command::Pnl => {
            return failure_result(
                started_at,
                config.trading_mode,
                inputs.correlation_id,
                EngineError::CommandNotImplemented("pnl").to_string(),
            );
        }
        Command::SignalOnly => {
            return match build_plan(config, &inputs, started_at) {
                Ok(plan) => {
                    info!(
                        correlation_id = %inputs.correlation_id,
                        items = plan.items.len(),
                        "signal-only plan computed"
                    );
                    planned_only_result(plan, started_at, config.trading_mode, inputs.correlation_id)
                }
                Err(error) => failure_result(
                    started_at,
                    config.trading_mode,
                    inputs.correlation_id,
                    error.to_string(),
                ),
            };
        }
        Command::Trade => {}
    }

    let plan = match build_plan(config, &inputs, started_at) {
        Ok(plan) => plan,
        Err(error) => {
            error!(correlation_id = %inputs.correlation_id, %error, "rebalance planning failed");
            return failure_result(
                started_at,
                config.trading_mode,
                inputs.correlation_id,
                error.to_string(),
            );
        }
    };

    let execution_config = ExecutionConfig {
        repeg_interval: std::time::Duration::from_secs(config.repeg_interval_seconds),
        max_repegs_per_order: config.max_repegs_per_order,
        tick_size: config.tick_size,
        ..ExecutionConfig::default()
    };
    let engine = ExecutionEngine::new(
        broker,
        market_data,
        crate::liquidity::LiquidityAnalyzer::default(),
        execution_config,
    );

    let orders = engine.execute_plan(&plan.items, inputs.correlation_id).await;
    let completed_at = Utc::now();
    let execution_summary = ExecutionSummary::compute(
        &orders,
        (completed_at - started_at).num_milliseconds() as f64 / 1000.0,
    );
    let status = TradeStatus::from_summary(&execution_summary);

    TradeResult {
        status,
        success: status.is_success(),
        trading_mode: config.trading_mode,
        started_at,
        completed_at,
        correlation_id: inputs.correlation_id,
        execution_summary,
        orders,
        warnings: Vec::new(),
    }
}

/// Runs the Signal Aggregation Session to consolidate a strategy roster into
/// target weights, then hands the result to [`run`] — the full five-component
/// pipeline from `spec.md` §2's data-flow diagram, rather than `run` alone
/// (which takes an already-consolidated [`TargetAllocation`] as given, e.g.
/// for a `signal-only` replay of a previously emitted allocation).
pub async fn run_aggregated<B, E>(
    command: Command,
    config: &Config,
    store: &SessionStore,
    evaluator: Arc<E>,
    strategies: Vec<StrategyConfig>,
    snapshot: PortfolioSnapshot,
    non_fractionable: HashSet<Symbol>,
    correlation_id: Uuid,
    market_data: Arc<MarketDataStream>,
    broker: Arc<B>,
) -> TradeResult
where
    B: BrokerClient,
    E: StrategyEvaluator,
{
    let started_at = Utc::now();
    let timeout = chrono::Duration::seconds(config.aggregation_timeout_seconds as i64);

    let weights = match crate::aggregation::run_session(
        store,
        evaluator,
        strategies,
        correlation_id,
        timeout,
        AggregationConfig::default(),
        started_at,
    )
    .await
    {
        Ok(weights) => weights,
        Err(error) => {
            error!(correlation_id = %correlation_id, %error, "signal aggregation failed");
            return failure_result(started_at, config.trading_mode, correlation_id, error.to_string());
        }
    };

    let allocation = match TargetAllocation::try_new(weights, correlation_id, started_at, Vec::new()) {
        Ok(allocation) => allocation,
        Err(error) => {
            return failure_result(started_at, config.trading_mode, correlation_id, error.to_string());
        }
    };

    let inputs = CycleInputs {
        target_allocation: allocation,
        snapshot,
        non_fractionable,
        correlation_id,
    };

    run(command, config, inputs, market_data, broker).await
}

fn build_plan(
    config: &Config,
    inputs: &CycleInputs,
    now: DateTime<Utc>,
) -> Result<RebalancePlan, EngineError> {
    let planner = RebalancePlanner::new(RebalanceConfig {
        cash_reserve_pct: config.cash_reserve_pct,
        leverage_enabled: false,
        leverage_factor: rust_decimal::Decimal::ONE,
        sizing: SizingPolicy {
            min_trade_amount: config.min_trade_amount,
            ..SizingPolicy::default()
        },
    });
    planner
        .plan(
            &inputs.snapshot,
            &inputs.target_allocation,
            &inputs.non_fractionable,
            inputs.correlation_id,
            now,
        )
        .map_err(EngineError::from)
}

fn planned_only_result(
    plan: RebalancePlan,
    started_at: DateTime<Utc>,
    trading_mode: TradingMode,
    correlation_id: Uuid,
) -> TradeResult {
    let completed_at = Utc::now();
    TradeResult {
        status: TradeStatus::Success,
        success: true,
        trading_mode,
        started_at,
        completed_at,
        correlation_id,
        execution_summary: ExecutionSummary {
            orders_total: 0,
            orders_succeeded: 0,
            orders_failed: 0,
            total_value: plan.total_trade_value,
            success_rate: 1.0,
            execution_duration_seconds: (completed_at - started_at).num_milliseconds() as f64 / 1000.0,
        },
        orders: Vec::new(),
        warnings: Vec::new(),
    }
}

fn failure_result(
    started_at: DateTime<Utc>,
    trading_mode: TradingMode,
    correlation_id: Uuid,
    message: String,
) -> TradeResult {
    let completed_at = Utc::now();
    TradeResult {
        status: TradeStatus::Failure,
        success: false,
        trading_mode,
        started_at,
        completed_at,
        correlation_id,
        execution_summary: ExecutionSummary {
            orders_total: 0,
            orders_succeeded: 0,
            orders_failed: 0,
            total_value: rust_decimal::Decimal::ZERO,
            success_rate: 0.0,
            execution_duration_seconds: (completed_at - started_at).num_milliseconds() as f64 / 1000.0,
        },
        orders: Vec::new(),
        warnings: vec![message],
    }
}
