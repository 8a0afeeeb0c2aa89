use crate::{config::TradingMode, liquidity::Side, symbol::Symbol};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Record emitted for one terminal order, per `spec.md` §4.5.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct OrderResultSummary {
    pub symbol: Symbol,
    pub action: Side,
    pub requested_qty: Decimal,
    pub filled_qty: Decimal,
    pub filled_avg_price: Option<Decimal>,
    pub trade_amount: Decimal,
    pub order_id: Option<String>,
    pub order_id_last6: Option<String>,
    pub status: String,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
    pub success: bool,
    pub error_message: Option<String>,
    pub correlation_id: Uuid,
}

/// Aggregate outcome of one execution run.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
pub struct ExecutionSummary {
    pub orders_total: u32,
    pub orders_succeeded: u32,
    pub orders_failed: u32,
    pub total_value: Decimal,
    pub success_rate: f64,
    pub execution_duration_seconds: f64,
}

impl ExecutionSummary {
    pub fn compute(results: &[OrderResultSummary], execution_duration_seconds: f64) -> Self {
        let orders_total = results.len() as u32;
        let orders_succeeded = results.iter().filter(|r| r.success).count() as u32;
        let orders_failed = orders_total - orders_succeeded;
        let total_value = results
            .iter()
            .filter(|r| r.success)
            .fold(Decimal::ZERO, |acc, r| acc + r.trade_amount.abs());
        let success_rate = if orders_total == 0 {
            1.0
        } else {
            f64::from(orders_succeeded) / f64::from(orders_total)
        };

        Self {
            orders_total,
            orders_succeeded,
            orders_failed,
            total_value,
            success_rate,
            execution_duration_seconds,
        }
    }
}

/// Overall run outcome, driving the process exit code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TradeStatus {
    Success,
    Partial,
    Failure,
}

impl TradeStatus {
    pub fn from_summary(summary: &ExecutionSummary) -> Self {
        if summary.orders_total == 0 || summary.orders_succeeded == summary.orders_total {
            Self::Success
        } else if summary.orders_succeeded > 0 {
            Self::Partial
        } else {
            Self::Failure
        }
    }

    pub fn is_success(&self) -> bool {
        !matches!(self, Self::Failure)
    }
}

/// Top-level record returned from one trading cycle.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct TradeResult {
    pub status: TradeStatus,
    pub success: bool,
    pub trading_mode: TradingMode,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
    pub correlation_id: Uuid,
    pub execution_summary: ExecutionSummary,
    pub orders: Vec<OrderResultSummary>,
    pub warnings: Vec<String>,
}

impl TradeResult {
    /// Exit code convention from `spec.md` §6: 0 on SUCCESS or PARTIAL with
    /// at least one fill, non-zero on FAILURE.
    pub fn exit_code(&self) -> i32 {
        match self.status {
            TradeStatus::Success | TradeStatus::Partial => 0,
            TradeStatus::Failure => 1,
        }
    }
}
