use crate::{market_data::error::MarketDataError, symbol::Symbol};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Top-of-book quote for a single symbol.
///
/// `timestamp` is monotonically non-decreasing per symbol: the [`super::store::MarketDataStore`]
/// rejects an update that is older than the quote it would replace rather than
/// risk applying events out of arrival order.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Quote {
    pub symbol: Symbol,
    pub bid_price: Decimal,
    pub ask_price: Decimal,
    pub bid_size: Decimal,
    pub ask_size: Decimal,
    pub timestamp: DateTime<Utc>,
}

impl Quote {
    pub fn mid_price(&self) -> Option<Decimal> {
        if self.bid_price > Decimal::ZERO && self.ask_price > Decimal::ZERO {
            Some((self.bid_price + self.ask_price) / Decimal::TWO)
        } else {
            None
        }
    }

    pub fn spread(&self) -> Decimal {
        self.ask_price - self.bid_price
    }

    pub fn has_crossed_book(&self) -> bool {
        self.bid_price > Decimal::ZERO && self.ask_price > Decimal::ZERO && self.ask_price < self.bid_price
    }
}

/// Latest trade print for a single symbol; one slot per symbol, append-latest only.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Trade {
    pub symbol: Symbol,
    pub price: Decimal,
    pub size: Decimal,
    pub volume: Decimal,
    pub timestamp: DateTime<Utc>,
}

/// Wire-level event emitted by the market data stream task, tagged rather than
/// dict-shaped (`spec.md` §9: dynamic typing replaced by tagged variants).
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub enum StreamEvent {
    Quote(Quote),
    Trade(Trade),
    Heartbeat,
}
