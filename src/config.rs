use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

/// Market data feed selector.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Feed {
    Iex,
    Sip,
}

impl Default for Feed {
    fn default() -> Self {
        Self::Iex
    }
}

/// Whether orders are routed to a real brokerage account or a paper account.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TradingMode {
    Paper,
    Live,
}

impl Default for TradingMode {
    fn default() -> Self {
        Self::Paper
    }
}

/// Process-wide configuration, enumerated in full per the external interfaces
/// specification. Initialised once at startup and held as a read-only handle
/// by every component (`spec.md` §9: "global singletons become process-wide
/// handles initialised at startup").
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    pub min_trade_amount: Decimal,
    pub cash_reserve_pct: Decimal,
    pub tick_size: Decimal,
    pub max_symbols: usize,
    pub max_quote_age_seconds: u64,
    pub cleanup_interval_seconds: u64,
    pub repeg_interval_seconds: u64,
    pub max_repegs_per_order: u32,
    pub aggregation_timeout_seconds: u64,
    pub feed: Feed,
    pub trading_mode: TradingMode,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            min_trade_amount: dec!(25.00),
            cash_reserve_pct: dec!(0.01),
            tick_size: dec!(0.01),
            max_symbols: 30,
            max_quote_age_seconds: 300,
            cleanup_interval_seconds: 60,
            repeg_interval_seconds: 30,
            max_repegs_per_order: 5,
            aggregation_timeout_seconds: 600,
            feed: Feed::Iex,
            trading_mode: TradingMode::Paper,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_matches_documented_defaults() {
        let config = Config::default();
        assert_eq!(config.min_trade_amount, dec!(25.00));
        assert_eq!(config.cash_reserve_pct, dec!(0.01));
        assert_eq!(config.tick_size, dec!(0.01));
        assert_eq!(config.max_symbols, 30);
        assert_eq!(config.max_quote_age_seconds, 300);
        assert_eq!(config.cleanup_interval_seconds, 60);
        assert_eq!(config.repeg_interval_seconds, 30);
        assert_eq!(config.max_repegs_per_order, 5);
        assert_eq!(config.aggregation_timeout_seconds, 600);
        assert_eq!(config.feed, Feed::Iex);
        assert_eq!(config.trading_mode, TradingMode::Paper);
    }
}
