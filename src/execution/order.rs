use crate::{execution::error::ExecutionError, liquidity::Side, symbol::Symbol};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use uuid::Uuid;

/// Per-order lifecycle (`spec.md` §4.5). `Cancelling` is entered only as part
/// of a re-peg; a re-peg that confirms its cancel returns to `Ready` rather
/// than `Open`, so the order is re-priced before resubmission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderState {
    New,
    Ready,
    Open,
    Cancelling,
    Filled,
    Rejected,
    Expired,
    Cancelled,
}

impl OrderState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Filled | Self::Rejected | Self::Expired | Self::Cancelled
        )
    }

    fn can_transition_to(self, to: OrderState) -> bool {
        use OrderState::*;
        matches!(
            (self, to),
            (New, Ready)
                | (Ready, Open)
                | (Ready, Rejected)
                | (Open, Open)
                | (Open, Filled)
                | (Open, Cancelling)
                | (Open, Rejected)
                | (Open, Expired)
                | (Cancelling, Ready)
                | (Cancelling, Cancelled)
                | (Cancelling, Expired)
        )
    }
}

/// One order the Smart Execution Engine owns end-to-end, from a `RebalancePlanItem`
/// to a terminal fill/reject/expiry.
#[derive(Debug, Clone)]
pub struct ExecutionOrder {
    pub client_order_id: Uuid,
    pub broker_order_id: Option<String>,
    pub symbol: Symbol,
    pub side: Side,
    pub requested_qty: Decimal,
    pub limit_price: Decimal,
    pub status: OrderState,
    pub filled_qty: Decimal,
    pub filled_avg_price: Option<Decimal>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub correlation_id: Uuid,
    pub repeg_count: u32,
}

impl ExecutionOrder {
    pub fn new(
        symbol: Symbol,
        side: Side,
        requested_qty: Decimal,
        limit_price: Decimal,
        correlation_id: Uuid,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            client_order_id: Uuid::new_v4(),
            broker_order_id: None,
            symbol,
            side,
            requested_qty,
            limit_price,
            status: OrderState::New,
            filled_qty: Decimal::ZERO,
            filled_avg_price: None,
            created_at: now,
            updated_at: now,
            correlation_id,
            repeg_count: 0,
        }
    }

    pub fn unfilled_qty(&self) -> Decimal {
        self.requested_qty - self.filled_qty
    }

    pub fn is_fully_filled(&self) -> bool {
        self.filled_qty >= self.requested_qty
    }

    pub fn transition(&mut self, to: OrderState, now: DateTime<Utc>) -> Result<(), ExecutionError> {
        if !self.status.can_transition_to(to) {
            return Err(ExecutionError::IllegalTransition {
                from: self.status,
                to,
            });
        }
        self.status = to;
        self.updated_at = now;
        Ok(())
    }

    /// `order_id_last6` per `spec.md` §4.5: the last 6 characters of the
    /// broker order id, or `None` if it is shorter than 6.
    pub fn order_id_redacted(&self) -> Option<String> {
        let id = self.broker_order_id.as_ref()?;
        if id.len() < 6 {
            None
        } else {
            Some(id[id.len() - 6..].to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn order() -> ExecutionOrder {
        ExecutionOrder::new(
            Symbol::new("AAPL").unwrap(),
            Side::Buy,
            rust_decimal_macros::dec!(10),
            rust_decimal_macros::dec!(100),
            Uuid::nil(),
            Utc::now(),
        )
    }

    #[test]
    fn valid_lifecycle_transitions_succeed() {
        let mut order = order();
        let now = Utc::now();
        order.transition(OrderState::Ready, now).unwrap();
        order.transition(OrderState::Open, now).unwrap();
        order.transition(OrderState::Cancelling, now).unwrap();
        order.transition(OrderState::Ready, now).unwrap();
        order.transition(OrderState::Open, now).unwrap();
        order.transition(OrderState::Filled, now).unwrap();
        assert!(order.status.is_terminal());
    }

    #[test]
    fn rejects_illegal_transition() {
        let mut order = order();
        let result = order.transition(OrderState::Filled, Utc::now());
        assert!(matches!(
            result,
            Err(ExecutionError::IllegalTransition { .. })
        ));
    }

    #[test]
    fn redacts_order_id_to_last_six_chars() {
        let mut order = order();
        order.broker_order_id = Some("abc-order-id-0001234".to_string());
        assert_eq!(order.order_id_redacted(), Some("001234".to_string()));

        order.broker_order_id = Some("short".to_string());
        assert_eq!(order.order_id_redacted(), None);
    }
}
