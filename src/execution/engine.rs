use crate::{
    execution::{
        broker::{BrokerClient, PlaceOrderRequest, TimeInForce},
        error::ExecutionError,
        order::{ExecutionOrder, OrderState},
        summary::OrderResultSummary,
    },
    liquidity::{ExecutionStrategyHint, LiquidityAnalyzer, Side},
    market_data::MarketDataStream,
    portfolio::{RebalancePlanItem, TradeAction},
    symbol::Symbol,
};
use chrono::Utc;
use parking_lot::Mutex;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::{collections::HashMap, sync::Arc, time::Duration};
use tokio::sync::oneshot;
use tracing::warn;
use uuid::Uuid;

/// Priority at which an order-placement subscription is requested — the
/// highest tier, so it always displaces background watchlist symbols.
pub const ORDER_PLACEMENT_PRIORITY: f64 = 2000.0;

#[derive(Debug, Clone, Copy)]
pub struct ExecutionConfig {
    pub repeg_interval: Duration,
    pub max_repegs_per_order: u32,
    pub repeg_threshold_ticks: u32,
    pub tick_size: Decimal,
    pub subscribe_timeout: Duration,
    pub subscribe_poll_interval: Duration,
    pub monitor_poll_interval: Duration,
    pub max_order_lifetime: Duration,
    pub min_volume_threshold: Decimal,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            repeg_interval: Duration::from_secs(30),
            max_repegs_per_order: 5,
            repeg_threshold_ticks: 2,
            tick_size: dec!(0.01),
            subscribe_timeout: Duration::from_secs(2),
            subscribe_poll_interval: Duration::from_millis(100),
            monitor_poll_interval: Duration::from_secs(1),
            max_order_lifetime: Duration::from_secs(23400),
            min_volume_threshold: dec!(100),
        }
    }
}

/// Reference-counted subscription set: an order subscribes for its own
/// lifetime, and the symbol is only unsubscribed once no order references it.
#[derive(Default)]
struct SubscriptionRefs {
    counts: Mutex<HashMap<Symbol, usize>>,
}

impl SubscriptionRefs {
    fn acquire(&self, symbol: &Symbol) -> bool {
        let mut counts = self.counts.lock();
        let first = !counts.contains_key(symbol);
        *counts.entry(symbol.clone()).or_insert(0) += 1;
        first
    }

    fn release(&self, symbol: &Symbol) -> bool {
        let mut counts = self.counts.lock();
        match counts.get_mut(symbol) {
            Some(count) if *count > 1 => {
                *count -= 1;
                false
            }
            Some(_) => {
                counts.remove(symbol);
                true
            }
            None => false,
        }
    }
}

/// Executes every non-HOLD item of a `RebalancePlan` via liquidity-aware
/// limit orders, re-pegging on drift or timeout.
///
/// Grounded on the teacher's `execution::manager::ExecutionManager::run`
/// pattern (one task in flight per request, reconciled through a shared
/// collection) adapted to a per-order monitor loop instead of a single
/// multiplexed request stream, since each order here owns its own re-peg
/// timer and cancellation window.
pub struct ExecutionEngine<B> {
    broker: Arc<B>,
    market_data: Arc<MarketDataStream>,
    analyzer: LiquidityAnalyzer,
    config: ExecutionConfig,
    subscriptions: Arc<SubscriptionRefs>,
}

impl<B> Clone for ExecutionEngine<B> {
    fn clone(&self) -> Self {
        Self {
            broker: Arc::clone(&self.broker),
            market_data: Arc::clone(&self.market_data),
            analyzer: self.analyzer,
            config: self.config,
            subscriptions: Arc::clone(&self.subscriptions),
        }
    }
}

impl<B> ExecutionEngine<B>
where
    B: BrokerClient,
{
    pub fn new(
        broker: Arc<B>,
        market_data: Arc<MarketDataStream>,
        analyzer: LiquidityAnalyzer,
        config: ExecutionConfig,
    ) -> Self {
        Self {
            broker,
            market_data,
            analyzer,
            config,
            subscriptions: Arc::new(SubscriptionRefs::default()),
        }
    }

    /// Execute a full plan. SELL items are submitted (accepted or rejected)
    /// before any BUY item is submitted, per `spec.md` §5's ordering
    /// guarantee; monitoring and re-peg of already-submitted orders proceeds
    /// concurrently once that barrier clears.
    pub async fn execute_plan(
        &self,
        items: &[RebalancePlanItem],
        correlation_id: Uuid,
    ) -> Vec<OrderResultSummary> {
        let (sells, buys): (Vec<_>, Vec<_>) = items
            .iter()
            .filter(|item| item.action != TradeAction::Hold)
            .cloned()
            .partition(|item| item.action == TradeAction::Sell);

        let mut handles = Vec::new();
        let mut placed_signals = Vec::new();

        for item in sells {
            let (placed_tx, placed_rx) = oneshot::channel();
            placed_signals.push(placed_rx);
            let engine = self.clone();
            handles.push(tokio::spawn(async move {
                engine
                    .execute_item(item, correlation_id, Some(placed_tx))
                    .await
            }));
        }

        for placed_rx in placed_signals {
            let _ = placed_rx.await;
        }

        for item in buys {
            let engine = self.clone();
            handles.push(tokio::spawn(
                async move { engine.execute_item(item, correlation_id, None).await },
            ));
        }

        let mut results = Vec::with_capacity(handles.len());
        for handle in handles {
            match handle.await {
                Ok(result) => results.push(result),
                Err(join_error) => warn!(?join_error, "order task panicked"),
            }
        }
        results
    }

    async fn execute_item(
        &self,
        item: RebalancePlanItem,
        correlation_id: Uuid,
        mut placed_tx: Option<oneshot::Sender<()>>,
    ) -> OrderResultSummary {
        let started_at = Utc::now();
        let side = match item.action {
            TradeAction::Buy => Side::Buy,
            TradeAction::Sell => Side::Sell,
            TradeAction::Hold => unreachable!("HOLD items are filtered before execution"),
        };

        let order_size = item.estimated_quantity.abs();

        let quote = match self.await_quote(&item.symbol).await {
            Ok(quote) => quote,
            Err(error) => {
                if let Some(tx) = placed_tx {
                    let _ = tx.send(());
                }
                return self.rejected_summary(&item, side, started_at, error.to_string(), correlation_id);
            }
        };

        let analysis = self.analyzer.analyze(&quote, order_size, side);

        if let Err(error) = self.analyzer.validate_for_order(&quote, side, order_size) {
            if let Some(tx) = placed_tx {
                let _ = tx.send(());
            }
            return self.rejected_summary(&item, side, started_at, error.to_string(), correlation_id);
        }

        let hint = self.analyzer.strategy_hint(&analysis, side, order_size);
        let child_sizes = if hint == ExecutionStrategyHint::Split {
            let relevant_volume = match side {
                Side::Buy => analysis.total_ask_volume,
                Side::Sell => analysis.total_bid_volume,
            };
            split_order_size(order_size, relevant_volume.max(Decimal::ONE))
        } else {
            vec![order_size]
        };

        let limit_price = analysis.recommended_price;

        let mut filled_qty = Decimal::ZERO;
        let mut filled_notional = Decimal::ZERO;
        let mut broker_order_id = None;
        let mut final_status = "FILLED";
        let mut error_message = None;

        for child_size in child_sizes {
            let mut order = ExecutionOrder::new(
                item.symbol.clone(),
                side,
                child_size,
                limit_price,
                correlation_id,
                Utc::now(),
            );
            order.transition(OrderState::Ready, Utc::now()).ok();

            match self.place_order(&mut order).await {
                Ok(()) => {
                    broker_order_id = order.broker_order_id.clone();
                }
                Err(error) => {
                    final_status = "REJECTED";
                    error_message = Some(error.to_string());
                    break;
                }
            }

            // A SELL's submission is accepted the moment the broker acknowledges
            // placement; release any BUY waiting on this barrier right here, not
            // after the order reaches a terminal state (`spec.md` §5).
            if let Some(tx) = placed_tx.take() {
                let _ = tx.send(());
            }

            match self.monitor_order(&mut order, &quote.symbol).await {
                Ok(()) => {}
                Err(error) => {
                    error_message = Some(error.to_string());
                }
            }

            filled_qty += order.filled_qty;
            if let Some(avg) = order.filled_avg_price {
                filled_notional += order.filled_qty * avg;
            }
            if !order.status.is_terminal() || order.status == OrderState::Rejected {
                final_status = "REJECTED";
            } else if order.filled_qty < child_size {
                final_status = "EXPIRED";
            }
        }

        let success = filled_qty > Decimal::ZERO && error_message.is_none();
        let filled_avg_price = if filled_qty > Decimal::ZERO {
            Some(filled_notional / filled_qty)
        } else {
            None
        };
        let trade_amount = match side {
            Side::Buy => filled_qty * filled_avg_price.unwrap_or(Decimal::ZERO),
            Side::Sell => -(filled_qty * filled_avg_price.unwrap_or(Decimal::ZERO)),
        };

        OrderResultSummary {
            symbol: item.symbol.clone(),
            action: side,
            requested_qty: order_size,
            filled_qty,
            filled_avg_price,
            trade_amount,
            order_id: broker_order_id.clone(),
            order_id_last6: broker_order_id
                .as_ref()
                .filter(|id| id.len() >= 6)
                .map(|id| id[id.len() - 6..].to_string()),
            status: final_status.to_string(),
            started_at,
            completed_at: Utc::now(),
            success,
            error_message,
            correlation_id,
        }
    }

    fn rejected_summary(
        &self,
        item: &RebalancePlanItem,
        side: Side,
        started_at: chrono::DateTime<Utc>,
        reason: String,
        correlation_id: Uuid,
    ) -> OrderResultSummary {
        OrderResultSummary {
            symbol: item.symbol.clone(),
            action: side,
            requested_qty: item.estimated_quantity.abs(),
            filled_qty: Decimal::ZERO,
            filled_avg_price: None,
            trade_amount: Decimal::ZERO,
            order_id: None,
            order_id_last6: None,
            status: "REJECTED".to_string(),
            started_at,
            completed_at: Utc::now(),
            success: false,
            error_message: Some(reason),
            correlation_id,
        }
    }

    /// Subscribe at order-placement priority and block briefly until a live
    /// quote is available.
    async fn await_quote(
        &self,
        symbol: &Symbol,
    ) -> Result<crate::market_data::Quote, ExecutionError> {
        self.subscriptions.acquire(symbol);
        self.market_data
            .subscribe(vec![symbol.clone()], ORDER_PLACEMENT_PRIORITY)
            .await
            .map_err(|_| ExecutionError::QuoteUnavailable(symbol.clone()))?;

        let deadline = tokio::time::Instant::now() + self.config.subscribe_timeout;
        loop {
            if let Some(quote) = self.market_data.get_quote(symbol) {
                return Ok(quote);
            }
            if tokio::time::Instant::now() >= deadline {
                return Err(ExecutionError::QuoteUnavailable(symbol.clone()));
            }
            tokio::time::sleep(self.config.subscribe_poll_interval).await;
        }
    }

    async fn place_order(&self, order: &mut ExecutionOrder) -> Result<(), ExecutionError> {
        let ack = self
            .broker
            .place_limit_order(PlaceOrderRequest {
                client_order_id: order.client_order_id,
                symbol: order.symbol.clone(),
                side: order.side,
                qty: order.requested_qty,
                limit_price: order.limit_price,
                time_in_force: TimeInForce::Day,
            })
            .await
            .map_err(|error| ExecutionError::Rejected {
                symbol: order.symbol.clone(),
                reason: error.message,
            })?;

        order.broker_order_id = Some(ack.broker_order_id);
        order
            .transition(OrderState::Open, Utc::now())
            .map_err(|_| ExecutionError::Rejected {
                symbol: order.symbol.clone(),
                reason: "illegal transition to OPEN".into(),
            })
    }

    /// Poll the broker for fills while watching for a re-peg trigger; bounded
    /// by `max_repegs_per_order` and `max_order_lifetime`.
    ///
    /// `order.requested_qty` is mutated on every re-peg to the unfilled
    /// remainder at that moment (so the broker only ever sees the leg still
    /// outstanding); `total_requested` is captured once, up front, as the
    /// fixed yardstick for "is this order as a whole done yet", and
    /// `filled_before_current_leg` carries forward what earlier legs filled so
    /// a re-peg never discards fills collected before it.
    async fn monitor_order(
        &self,
        order: &mut ExecutionOrder,
        symbol: &Symbol,
    ) -> Result<(), ExecutionError> {
        let total_requested = order.requested_qty;
        let lifetime_deadline = tokio::time::Instant::now() + self.config.max_order_lifetime;
        let mut opened_at = tokio::time::Instant::now();
        let mut prior_liquidity_score: Option<f64> = None;
        let mut filled_before_current_leg = Decimal::ZERO;

        loop {
            tokio::time::sleep(self.config.monitor_poll_interval).await;

            if let Some(broker_order_id) = order.broker_order_id.clone() {
                if let Ok(update) = self.broker.get_order(&broker_order_id).await {
                    order.filled_qty = filled_before_current_leg + update.filled_qty;
                    order.filled_avg_price = update.filled_avg_price;
                    match update.status {
                        crate::execution::broker::BrokerOrderStatus::Filled => {
                            order
                                .transition(OrderState::Filled, Utc::now())
                                .map_err(|_| ExecutionError::Rejected {
                                    symbol: symbol.clone(),
                                    reason: "illegal transition to FILLED".into(),
                                })?;
                            self.release_subscription(symbol);
                            return Ok(());
                        }
                        crate::execution::broker::BrokerOrderStatus::Rejected => {
                            let _ = order.transition(OrderState::Rejected, Utc::now());
                            self.release_subscription(symbol);
                            return Err(ExecutionError::Rejected {
                                symbol: symbol.clone(),
                                reason: "broker rejected order".into(),
                            });
                        }
                        _ => {}
                    }
                }
            }

            if order.filled_qty >= total_requested {
                order
                    .transition(OrderState::Filled, Utc::now())
                    .map_err(|_| ExecutionError::Rejected {
                        symbol: symbol.clone(),
                        reason: "illegal transition to FILLED".into(),
                    })?;
                self.release_subscription(symbol);
                return Ok(());
            }

            if tokio::time::Instant::now() >= lifetime_deadline {
                let _ = order.transition(OrderState::Expired, Utc::now());
                self.release_subscription(symbol);
                return Err(ExecutionError::Expired {
                    filled_qty: order.filled_qty,
                    requested_qty: total_requested,
                });
            }

            let quote = self.market_data.get_quote(symbol);
            let remaining = total_requested - order.filled_qty;
            let current_score = quote
                .as_ref()
                .map(|q| self.analyzer.analyze(q, remaining, order.side).liquidity_score);

            let liquidity_collapsed = match (prior_liquidity_score, current_score) {
                (Some(prior), Some(current)) => prior >= 60.0 && current < 30.0,
                _ => false,
            };
            if let Some(score) = current_score {
                prior_liquidity_score = Some(score);
            }

            let adverse_move = quote
                .as_ref()
                .and_then(|q| q.mid_price())
                .map(|mid| self.has_moved_adversely(order, mid))
                .unwrap_or(false);

            let timed_out = opened_at.elapsed() > self.config.repeg_interval;

            if timed_out || adverse_move || liquidity_collapsed {
                if order.repeg_count >= self.config.max_repegs_per_order {
                    self.release_subscription(symbol);
                    return Err(ExecutionError::RepegExhausted {
                        symbol: symbol.clone(),
                        max_repegs: self.config.max_repegs_per_order,
                    });
                }
                filled_before_current_leg = order.filled_qty;
                self.repeg_order(order, symbol, total_requested).await?;
                opened_at = tokio::time::Instant::now();
            }
        }
    }

    fn has_moved_adversely(&self, order: &ExecutionOrder, mid: Decimal) -> bool {
        let threshold = self.config.tick_size * Decimal::from(self.config.repeg_threshold_ticks);
        match order.side {
            Side::Buy => mid - order.limit_price > threshold,
            Side::Sell => order.limit_price - mid > threshold,
        }
    }

    async fn repeg_order(
        &self,
        order: &mut ExecutionOrder,
        symbol: &Symbol,
        total_requested: Decimal,
    ) -> Result<(), ExecutionError> {
        order
            .transition(OrderState::Cancelling, Utc::now())
            .map_err(|_| ExecutionError::Rejected {
                symbol: symbol.clone(),
                reason: "illegal transition to CANCELLING".into(),
            })?;

        if let Some(broker_order_id) = order.broker_order_id.clone() {
            self.broker
                .cancel_order(&broker_order_id)
                .await
                .map_err(|error| ExecutionError::Rejected {
                    symbol: symbol.clone(),
                    reason: error.message,
                })?;
        }

        order
            .transition(OrderState::Ready, Utc::now())
            .map_err(|_| ExecutionError::Rejected {
                symbol: symbol.clone(),
                reason: "illegal transition back to READY".into(),
            })?;

        let quote = self
            .market_data
            .get_quote(symbol)
            .ok_or_else(|| ExecutionError::QuoteUnavailable(symbol.clone()))?;
        // The unfilled remainder against the order's original total, not
        // against the leg just cancelled, so a second re-peg doesn't resubmit
        // the first re-peg's (already shrunk) leg size.
        let unfilled = total_requested - order.filled_qty;
        let analysis = self.analyzer.analyze(&quote, unfilled, order.side);
        order.limit_price = analysis.recommended_price;
        order.requested_qty = unfilled;
        order.repeg_count += 1;

        self.place_order(order).await
    }

    fn release_subscription(&self, symbol: &Symbol) {
        if self.subscriptions.release(symbol) {
            self.market_data.unsubscribe(symbol.clone());
        }
    }
}

/// Divide an oversized order into child clips that each fit one level of
/// available liquidity, sharing the parent's correlation id.
fn split_order_size(total_qty: Decimal, chunk_qty: Decimal) -> Vec<Decimal> {
    let mut remaining = total_qty;
    let mut sizes = Vec::new();
    while remaining > Decimal::ZERO {
        let take = remaining.min(chunk_qty);
        sizes.push(take);
        remaining -= take;
    }
    sizes
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_order_into_liquidity_sized_chunks() {
        let sizes = split_order_size(dec!(250), dec!(100));
        assert_eq!(sizes, vec![dec!(100), dec!(100), dec!(50)]);
    }

    #[test]
    fn subscription_refs_release_only_when_last_reference_drops() {
        let refs = SubscriptionRefs::default();
        let sym = Symbol::new("AAPL").unwrap();
        assert!(refs.acquire(&sym));
        assert!(!refs.acquire(&sym));
        assert!(!refs.release(&sym));
        assert!(refs.release(&sym));
    }
}
