use crate::{
    market_data::quote::{Quote, Trade},
    symbol::Symbol,
};
use chrono::{DateTime, Utc};
use fnv::FnvHashMap;
use parking_lot::RwLock;
use rust_decimal::Decimal;
use std::sync::atomic::{AtomicU64, Ordering};

/// Thread-safe latest-quote / latest-trade cache, keyed by symbol.
///
/// Many-reader / single-writer per `spec.md` §5: readers get owned copies
/// rather than references into the store, so the critical section held per
/// read or write is always short. Keyed with `FnvHashMap` rather than the
/// default hasher: symbols are short and this map is on the hot path of
/// every price lookup, matching the teacher's use of a faster hasher for
/// its own per-instrument lookup tables.
#[derive(Debug, Default)]
pub struct MarketDataStore {
    quotes: RwLock<FnvHashMap<Symbol, Quote>>,
    trades: RwLock<FnvHashMap<Symbol, Trade>>,
    quotes_evicted_total: AtomicU64,
}

impl MarketDataStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply an inbound quote update. Out-of-order updates (timestamp older
    /// than the quote currently held for this symbol) are dropped, preserving
    /// last-writer-wins-in-arrival-order semantics.
    pub fn apply_quote(&self, quote: Quote) {
        let mut quotes = self.quotes.write();
        match quotes.get(&quote.symbol) {
            Some(existing) if existing.timestamp > quote.timestamp => {}
            _ => {
                quotes.insert(quote.symbol.clone(), quote);
            }
        }
    }

    pub fn apply_trade(&self, trade: Trade) {
        let mut trades = self.trades.write();
        match trades.get(&trade.symbol) {
            Some(existing) if existing.timestamp > trade.timestamp => {}
            _ => {
                trades.insert(trade.symbol.clone(), trade);
            }
        }
    }

    pub fn get_quote(&self, symbol: &Symbol) -> Option<Quote> {
        self.quotes.read().get(symbol).cloned()
    }

    pub fn get_trade(&self, symbol: &Symbol) -> Option<Trade> {
        self.trades.read().get(symbol).cloned()
    }

    /// Priority: mid-price if both sides quoted, else last trade, else bid,
    /// else ask, else `None` — per `spec.md` §4.1.
    pub fn get_price(&self, symbol: &Symbol) -> Option<Decimal> {
        let quote = self.get_quote(symbol);

        if let Some(mid) = quote.as_ref().and_then(Quote::mid_price) {
            return Some(mid);
        }
        if let Some(trade) = self.get_trade(symbol) {
            return Some(trade.price);
        }
        let quote = quote?;
        if quote.bid_price > Decimal::ZERO {
            return Some(quote.bid_price);
        }
        if quote.ask_price > Decimal::ZERO {
            return Some(quote.ask_price);
        }
        None
    }

    /// Returns `None` unless `ask > bid > 0`.
    pub fn get_bid_ask(&self, symbol: &Symbol) -> Option<(Decimal, Decimal)> {
        let quote = self.get_quote(symbol)?;
        if quote.ask_price > quote.bid_price && quote.bid_price > Decimal::ZERO {
            Some((quote.bid_price, quote.ask_price))
        } else {
            None
        }
    }

    /// Drop quotes older than `max_age` relative to `now`. Returns the number
    /// evicted for the `quotes_evicted_total` metric.
    pub fn evict_stale(&self, now: DateTime<Utc>, max_age: chrono::Duration) -> u64 {
        let cutoff = now - max_age;
        let mut quotes = self.quotes.write();
        let before = quotes.len();
        quotes.retain(|_, quote| quote.timestamp >= cutoff);
        let evicted = (before - quotes.len()) as u64;
        if evicted > 0 {
            self.quotes_evicted_total
                .fetch_add(evicted, Ordering::Relaxed);
        }
        evicted
    }

    pub fn quotes_evicted_total(&self) -> u64 {
        self.quotes_evicted_total.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn quote_at(symbol: &str, bid: Decimal, ask: Decimal, t: DateTime<Utc>) -> Quote {
        Quote {
            symbol: Symbol::new(symbol).unwrap(),
            bid_price: bid,
            ask_price: ask,
            bid_size: dec!(100),
            ask_size: dec!(100),
            timestamp: t,
        }
    }

    #[test]
    fn get_price_prefers_mid_then_trade_then_bid_then_ask() {
        let store = MarketDataStore::new();
        let sym = Symbol::new("AAPL").unwrap();
        let now = Utc::now();

        assert_eq!(store.get_price(&sym), None);

        store.apply_quote(quote_at("AAPL", dec!(100.00), dec!(100.10), now));
        assert_eq!(store.get_price(&sym), Some(dec!(100.05)));

        store.apply_quote(quote_at("AAPL", Decimal::ZERO, dec!(100.10), now));
        store.apply_trade(Trade {
            symbol: sym.clone(),
            price: dec!(99.50),
            size: dec!(10),
            volume: dec!(10),
            timestamp: now,
        });
        assert_eq!(store.get_price(&sym), Some(dec!(99.50)));
    }

    #[test]
    fn rejects_out_of_order_quote_update() {
        let store = MarketDataStore::new();
        let now = Utc::now();
        store.apply_quote(quote_at("AAPL", dec!(10), dec!(10.10), now));
        store.apply_quote(quote_at(
            "AAPL",
            dec!(20),
            dec!(20.10),
            now - chrono::Duration::seconds(5),
        ));

        let stored = store.get_quote(&Symbol::new("AAPL").unwrap()).unwrap();
        assert_eq!(stored.bid_price, dec!(10));
    }

    #[test]
    fn evicts_quotes_older_than_max_age() {
        let store = MarketDataStore::new();
        let now = Utc::now();
        store.apply_quote(quote_at(
            "AAPL",
            dec!(10),
            dec!(10.10),
            now - chrono::Duration::seconds(600),
        ));
        store.apply_quote(quote_at("MSFT", dec!(20), dec!(20.10), now));

        let evicted = store.evict_stale(now, chrono::Duration::seconds(300));
        assert_eq!(evicted, 1);
        assert_eq!(store.get_quote(&Symbol::new("AAPL").unwrap()), None);
        assert!(store.get_quote(&Symbol::new("MSFT").unwrap()).is_some());
        assert_eq!(store.quotes_evicted_total(), 1);
    }

    #[test]
    fn bid_ask_requires_ask_strictly_greater_than_positive_bid() {
        let store = MarketDataStore::new();
        let now = Utc::now();
        let sym = Symbol::new("AAPL").unwrap();

        store.apply_quote(quote_at("AAPL", Decimal::ZERO, dec!(10.10), now));
        assert_eq!(store.get_bid_ask(&sym), None);

        store.apply_quote(quote_at("AAPL", dec!(10.10), dec!(10.10), now));
        assert_eq!(store.get_bid_ask(&sym), None);

        store.apply_quote(quote_at("AAPL", dec!(10.00), dec!(10.10), now));
        assert_eq!(store.get_bid_ask(&sym), Some((dec!(10.00), dec!(10.10))));
    }
}
