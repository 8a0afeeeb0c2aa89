use crate::{liquidity::Side, portfolio::MarginInfo, symbol::Symbol};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::collections::HashMap;
use thiserror::Error;
use uuid::Uuid;

/// Error taxonomy a broker adapter must classify its failures into
/// (`spec.md` §6): transient failures are retried by the caller, validation
/// and auth failures are not.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BrokerErrorKind {
    Transient,
    Validation,
    Auth,
    PermanentReject,
}

#[derive(Debug, Clone, Error)]
#[error("broker error ({kind:?}): {message}")]
pub struct BrokerError {
    pub kind: BrokerErrorKind,
    pub message: String,
}

impl BrokerError {
    pub fn is_retryable(&self) -> bool {
        matches!(self.kind, BrokerErrorKind::Transient)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeInForce {
    Day,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BrokerOrderStatus {
    Accepted,
    PartiallyFilled,
    Filled,
    Rejected,
    Cancelled,
    Expired,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PlaceOrderRequest {
    pub client_order_id: Uuid,
    pub symbol: Symbol,
    pub side: Side,
    pub qty: Decimal,
    pub limit_price: Decimal,
    pub time_in_force: TimeInForce,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OrderAck {
    pub broker_order_id: String,
    pub status: BrokerOrderStatus,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OrderUpdate {
    pub status: BrokerOrderStatus,
    pub filled_qty: Decimal,
    pub filled_avg_price: Option<Decimal>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AccountSnapshot {
    pub positions: HashMap<Symbol, Decimal>,
    pub prices: HashMap<Symbol, Decimal>,
    pub cash: Decimal,
    pub total_value: Decimal,
    pub margin: MarginInfo,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bar {
    pub open: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub close: Decimal,
    pub volume: Decimal,
    pub timestamp: DateTime<Utc>,
}

/// The brokerage integration this engine drives, consumed generically.
///
/// Out of scope per `spec.md` §6: only this interface is specified, not a
/// concrete brokerage wire implementation.
#[async_trait::async_trait]
pub trait BrokerClient: Send + Sync + 'static {
    async fn account_snapshot(&self) -> Result<AccountSnapshot, BrokerError>;

    async fn place_limit_order(
        &self,
        request: PlaceOrderRequest,
    ) -> Result<OrderAck, BrokerError>;

    async fn get_order(&self, broker_order_id: &str) -> Result<OrderUpdate, BrokerError>;

    async fn cancel_order(&self, broker_order_id: &str) -> Result<(), BrokerError>;

    async fn historical_bars(
        &self,
        symbol: &Symbol,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<Bar>, BrokerError>;
}
