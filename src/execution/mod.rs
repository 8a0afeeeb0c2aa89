mod broker;
mod engine;
mod error;
mod order;
mod summary;

pub use broker::{
    AccountSnapshot, Bar, BrokerClient, BrokerError, BrokerErrorKind, BrokerOrderStatus, OrderAck,
    OrderUpdate, PlaceOrderRequest, TimeInForce,
};
pub use engine::{ExecutionConfig, ExecutionEngine, ORDER_PLACEMENT_PRIORITY};
pub use error::ExecutionError;
pub use order::{ExecutionOrder, OrderState};
pub use summary::{ExecutionSummary, OrderResultSummary, TradeResult, TradeStatus};
