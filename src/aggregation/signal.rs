use crate::symbol::Symbol;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::collections::HashMap;

/// One strategy worker's contribution to a session, keyed by
/// `(session_id, strategy_id)` and stored exactly once.
#[derive(Debug, Clone, PartialEq)]
pub struct PartialSignal {
    pub strategy_id: String,
    pub allocation_weight: Decimal,
    pub consolidated_portfolio: HashMap<Symbol, Decimal>,
    pub signal_count: u32,
    pub completed_at: DateTime<Utc>,
}
