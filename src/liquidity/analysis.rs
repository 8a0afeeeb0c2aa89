use crate::{liquidity::error::LiquidityError, market_data::quote::Quote, symbol::Symbol};
use rust_decimal::{prelude::ToPrimitive, Decimal};
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

/// Side of an order, used to pick which book level liquidity is measured against.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Side {
    Buy,
    Sell,
}

/// Suggested execution approach for an order given its liquidity analysis.
///
/// Grounded on `original_source/.../liquidity_analysis.py::get_execution_strategy_recommendation`.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ExecutionStrategyHint {
    Normal,
    Patient,
    Split,
    Aggressive,
}

/// Result of a liquidity analysis pass for one symbol, side, and order size.
#[derive(Debug, Clone, PartialEq)]
pub struct LiquidityAnalysis {
    pub symbol: Symbol,
    pub total_bid_volume: Decimal,
    pub total_ask_volume: Decimal,
    /// (ask_volume - bid_volume) / (ask_volume + bid_volume). Negative is bid-heavy.
    pub volume_imbalance: f64,
    /// 0-100, higher is more liquid.
    pub liquidity_score: f64,
    /// Limit price recommended for this side; never crosses the external
    /// quote (`spec.md` §4.2's no-self-cross invariant).
    pub recommended_price: Decimal,
    /// 0.0-1.0 confidence in the recommendation.
    pub confidence: f64,
}

/// Volume-aware limit price and liquidity-strength analysis, replacing a naive
/// bid/ask-plus-offset order placement.
///
/// Grounded on `original_source/the_alchemiser/execution_v2/utils/liquidity_analysis.py`,
/// with the side-aware pricing fix from
/// `original_source/tests/unit/execution_v2/test_liquidity_analysis_fix.py`
/// applied: a large order (>80% of the relevant side's size) prices AT the
/// touch for fill certainty, rather than stepping further away from it, which
/// is what `spec.md` §4.2 and its S4 worked example require.
#[derive(Debug, Clone, Copy)]
pub struct LiquidityAnalyzer {
    min_volume_threshold: Decimal,
    tick_size: Decimal,
}

impl Default for LiquidityAnalyzer {
    fn default() -> Self {
        Self::new(dec!(100), dec!(0.01))
    }
}

impl LiquidityAnalyzer {
    pub fn new(min_volume_threshold: Decimal, tick_size: Decimal) -> Self {
        Self {
            min_volume_threshold,
            tick_size,
        }
    }

    pub fn analyze(&self, quote: &Quote, order_size: Decimal, side: Side) -> LiquidityAnalysis {
        let total_bid_volume = quote.bid_size;
        let total_ask_volume = quote.ask_size;
        let total_volume = total_bid_volume + total_ask_volume;

        let volume_imbalance = if total_volume > Decimal::ZERO {
            ((total_ask_volume - total_bid_volume) / total_volume)
                .to_f64()
                .unwrap_or(0.0)
        } else {
            0.0
        };

        let liquidity_score = self.liquidity_score(quote, total_volume);
        let recommended_price = self.price_for_side(quote, order_size, side, volume_imbalance);
        let confidence = self.confidence(quote, order_size, total_volume);

        LiquidityAnalysis {
            symbol: quote.symbol.clone(),
            total_bid_volume,
            total_ask_volume,
            volume_imbalance,
            liquidity_score,
            recommended_price,
            confidence,
        }
    }

    fn liquidity_score(&self, quote: &Quote, total_volume: Decimal) -> f64 {
        let volume_score = (total_volume / dec!(1000))
            .to_f64()
            .unwrap_or(0.0)
            .min(50.0);

        let spread_score = match quote.mid_price() {
            Some(mid) if mid > Decimal::ZERO => {
                let spread_pct = (quote.spread() / mid * dec!(100)).to_f64().unwrap_or(0.0);
                (30.0 - spread_pct * 10.0).max(0.0)
            }
            _ => 0.0,
        };

        let balance_score = if total_volume > Decimal::ZERO {
            let smaller = quote.bid_size.min(quote.ask_size);
            let larger = quote.bid_size.max(quote.ask_size);
            if larger > Decimal::ZERO {
                (smaller / larger).to_f64().unwrap_or(0.0) * 20.0
            } else {
                0.0
            }
        } else {
            0.0
        };

        (volume_score + spread_score + balance_score).min(100.0)
    }

    /// `spec.md` §4.2 pricing algorithm. BUY references ask, SELL references
    /// bid; a fill ratio above 80% of the relevant side's size prices at the
    /// touch for certainty, between 30% and 80% (and below 30%) takes a
    /// one-tick improvement, and a heavy opposing-side imbalance nudges one
    /// further tick, always clamped back inside the external quote.
    fn price_for_side(
        &self,
        quote: &Quote,
        order_size: Decimal,
        side: Side,
        volume_imbalance: f64,
    ) -> Decimal {
        let (bid, ask) = (quote.bid_price, quote.ask_price);
        let (bid, ask) = if bid <= Decimal::ZERO || ask <= Decimal::ZERO {
            tracing::warn!(symbol = %quote.symbol, "non-positive bid/ask, substituting 0.01");
            (
                if bid <= Decimal::ZERO { dec!(0.01) } else { bid },
                if ask <= Decimal::ZERO { dec!(0.01) } else { ask },
            )
        } else {
            (bid, ask)
        };

        let mut price = match side {
            Side::Buy => {
                let fill_ratio = order_size / quote.ask_size.max(Decimal::ONE);
                if fill_ratio > dec!(0.8) {
                    ask
                } else {
                    ask - self.tick_size
                }
            }
            Side::Sell => {
                let fill_ratio = order_size / quote.bid_size.max(Decimal::ONE);
                if fill_ratio > dec!(0.8) {
                    bid
                } else {
                    bid + self.tick_size
                }
            }
        };

        // Imbalance nudge: heavy opposing side adds one tick of aggression,
        // still clamped inside the external quote.
        match side {
            Side::Buy if volume_imbalance < -0.2 => {
                price = (price + self.tick_size).min(ask);
            }
            Side::Sell if volume_imbalance > 0.2 => {
                price = (price - self.tick_size).max(bid);
            }
            _ => {}
        }

        let scale = self.tick_size.scale();
        price = price.round_dp(scale);

        let min_price = dec!(0.01);
        if price <= Decimal::ZERO {
            price = min_price;
        }

        match side {
            Side::Buy => price.min(ask),
            Side::Sell => price.max(bid),
        }
    }

    fn confidence(&self, quote: &Quote, order_size: Decimal, total_volume: Decimal) -> f64 {
        let mut confidence = 1.0_f64;

        if total_volume < self.min_volume_threshold && self.min_volume_threshold > Decimal::ZERO {
            let volume_penalty = 1.0
                - (total_volume / self.min_volume_threshold)
                    .to_f64()
                    .unwrap_or(0.0);
            confidence *= 1.0 - volume_penalty * 0.5;
        }

        if let Some(mid) = quote.mid_price().filter(|mid| *mid > Decimal::ZERO) {
            let spread_pct = (quote.spread() / mid * dec!(100)).to_f64().unwrap_or(0.0);
            if spread_pct > 1.0 {
                let spread_penalty = (spread_pct / 5.0).min(0.4);
                confidence *= 1.0 - spread_penalty;
            }
        }

        let available_volume = total_volume.max(Decimal::ONE).to_f64().unwrap_or(1.0);
        let order_volume_ratio = order_size.to_f64().unwrap_or(0.0) / available_volume;
        if order_volume_ratio > 1.0 {
            let size_penalty = ((order_volume_ratio - 1.0) * 0.5).min(0.6);
            confidence *= 1.0 - size_penalty;
        }

        confidence.max(0.1)
    }

    /// Reject an order against this quote when volume is too thin, the order
    /// dwarfs available volume, or the spread is unreasonably wide.
    pub fn validate_for_order(
        &self,
        quote: &Quote,
        side: Side,
        order_size: Decimal,
    ) -> Result<(), LiquidityError> {
        let (available_volume, side_name) = match side {
            Side::Buy => (quote.ask_size, "ask"),
            Side::Sell => (quote.bid_size, "bid"),
        };

        if available_volume < self.min_volume_threshold {
            return Err(LiquidityError::InsufficientVolume {
                side: side_name,
                available: available_volume,
                required: self.min_volume_threshold,
            });
        }

        if available_volume > Decimal::ZERO && order_size / available_volume > dec!(2) {
            return Err(LiquidityError::OrderTooLargeForLiquidity {
                side: side_name,
                order_size,
                available: available_volume,
            });
        }

        if let Some(mid) = quote.mid_price().filter(|mid| *mid > Decimal::ZERO) {
            let spread_pct = quote.spread() / mid * dec!(100);
            if spread_pct > dec!(5) {
                return Err(LiquidityError::SpreadTooWide { spread_pct });
            }
        }

        Ok(())
    }

    /// Recommend an execution approach from a completed analysis.
    ///
    /// Grounded on `liquidity_analysis.py::get_execution_strategy_recommendation`.
    pub fn strategy_hint(
        &self,
        analysis: &LiquidityAnalysis,
        side: Side,
        order_size: Decimal,
    ) -> ExecutionStrategyHint {
        if analysis.confidence > 0.8 && analysis.liquidity_score > 70.0 {
            return ExecutionStrategyHint::Normal;
        }

        if analysis.liquidity_score < 30.0 {
            return ExecutionStrategyHint::Patient;
        }

        let relevant_volume = match side {
            Side::Buy => analysis.total_ask_volume,
            Side::Sell => analysis.total_bid_volume,
        }
        .max(Decimal::ONE)
        .to_f64()
        .unwrap_or(1.0);
        let volume_ratio = order_size.to_f64().unwrap_or(0.0) / relevant_volume;

        if volume_ratio > 1.5 {
            return ExecutionStrategyHint::Split;
        }

        match side {
            Side::Buy if analysis.volume_imbalance < -0.3 => ExecutionStrategyHint::Aggressive,
            Side::Sell if analysis.volume_imbalance > 0.3 => ExecutionStrategyHint::Aggressive,
            _ => ExecutionStrategyHint::Normal,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn quote(bid_price: Decimal, ask_price: Decimal, bid_size: Decimal, ask_size: Decimal) -> Quote {
        Quote {
            symbol: Symbol::new("AAPL").unwrap(),
            bid_price,
            ask_price,
            bid_size,
            ask_size,
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn large_buy_order_prices_at_ask_for_certainty() {
        // S4: SOXS bid=4.14 ask=4.15 bid_size=37 ask_size=70, BUY 4478.29.
        let analyzer = LiquidityAnalyzer::new(dec!(100), dec!(0.01));
        let q = quote(dec!(4.14), dec!(4.15), dec!(37), dec!(70));
        let analysis = analyzer.analyze(&q, dec!(4478.29), Side::Buy);
        assert_eq!(analysis.recommended_price, dec!(4.15));
        assert!(analysis.recommended_price <= q.ask_price);
    }

    #[test]
    fn large_sell_order_prices_at_bid_for_certainty() {
        let analyzer = LiquidityAnalyzer::new(dec!(100), dec!(0.01));
        let q = quote(dec!(25.00), dec!(25.05), dec!(100), dec!(1000));
        let analysis = analyzer.analyze(&q, dec!(85), Side::Sell);
        assert_eq!(analysis.recommended_price, dec!(25.00));
    }

    #[test]
    fn small_order_attempts_one_tick_improvement() {
        let analyzer = LiquidityAnalyzer::new(dec!(100), dec!(0.01));
        let q = quote(dec!(10.00), dec!(10.10), dec!(1000), dec!(1000));

        let buy = analyzer.analyze(&q, dec!(250), Side::Buy);
        assert_eq!(buy.recommended_price, dec!(10.09));
        assert!(buy.recommended_price < q.ask_price);

        let sell = analyzer.analyze(&q, dec!(250), Side::Sell);
        assert_eq!(sell.recommended_price, dec!(10.01));
        assert!(sell.recommended_price > q.bid_price);
    }

    #[test]
    fn buy_never_crosses_ask_across_order_sizes() {
        let analyzer = LiquidityAnalyzer::new(dec!(100), dec!(0.01));
        let q = quote(dec!(100.00), dec!(100.05), dec!(100), dec!(50));
        for size in [dec!(10), dec!(50), dec!(100), dec!(500), dec!(5000)] {
            let analysis = analyzer.analyze(&q, size, Side::Buy);
            assert!(analysis.recommended_price <= q.ask_price);
        }
    }

    #[test]
    fn sell_never_crosses_bid_across_order_sizes() {
        let analyzer = LiquidityAnalyzer::new(dec!(100), dec!(0.01));
        let q = quote(dec!(100.00), dec!(100.05), dec!(50), dec!(100));
        for size in [dec!(10), dec!(50), dec!(100), dec!(500), dec!(5000)] {
            let analysis = analyzer.analyze(&q, size, Side::Sell);
            assert!(analysis.recommended_price >= q.bid_price);
        }
    }

    #[test]
    fn heavy_bid_side_nudges_buy_price_up_but_not_past_ask() {
        let analyzer = LiquidityAnalyzer::new(dec!(100), dec!(0.01));
        let q = quote(dec!(100.00), dec!(100.10), dec!(900), dec!(300));
        let analysis = analyzer.analyze(&q, dec!(10), Side::Buy);
        assert!(analysis.recommended_price > dec!(100.09));
        assert!(analysis.recommended_price <= q.ask_price);
        assert!(analysis.volume_imbalance < -0.2);
    }

    #[test]
    fn prices_are_always_positive_even_on_corrupt_quote() {
        let analyzer = LiquidityAnalyzer::new(dec!(100), dec!(0.01));
        let q = quote(Decimal::ZERO, Decimal::ZERO, dec!(10), dec!(10));
        let analysis = analyzer.analyze(&q, dec!(1), Side::Buy);
        assert!(analysis.recommended_price > Decimal::ZERO);
    }

    #[test]
    fn recommended_price_is_tick_quantized() {
        let analyzer = LiquidityAnalyzer::new(dec!(100), dec!(0.01));
        let q = quote(dec!(10.123).round_dp(2), dec!(10.127).round_dp(2), dec!(100), dec!(100));
        let analysis = analyzer.analyze(&q, dec!(50), Side::Buy);
        assert_eq!(analysis.recommended_price % dec!(0.01), Decimal::ZERO);
    }

    #[test]
    fn validate_rejects_thin_volume() {
        let analyzer = LiquidityAnalyzer::new(dec!(100), dec!(0.01));
        let q = quote(dec!(100.00), dec!(100.10), dec!(50), dec!(50));
        assert_eq!(
            analyzer.validate_for_order(&q, Side::Buy, dec!(10)),
            Err(LiquidityError::InsufficientVolume {
                side: "ask",
                available: dec!(50),
                required: dec!(100),
            })
        );
    }

    #[test]
    fn validate_rejects_order_more_than_double_available_volume() {
        let analyzer = LiquidityAnalyzer::new(dec!(100), dec!(0.01));
        let q = quote(dec!(100.00), dec!(100.10), dec!(1000), dec!(1000));
        assert_eq!(
            analyzer.validate_for_order(&q, Side::Buy, dec!(2500)),
            Err(LiquidityError::OrderTooLargeForLiquidity {
                side: "ask",
                order_size: dec!(2500),
                available: dec!(1000),
            })
        );
    }

    #[test]
    fn validate_rejects_wide_spread() {
        let analyzer = LiquidityAnalyzer::new(dec!(100), dec!(0.01));
        let q = quote(dec!(100.00), dec!(110.00), dec!(1000), dec!(1000));
        assert!(matches!(
            analyzer.validate_for_order(&q, Side::Buy, dec!(10)),
            Err(LiquidityError::SpreadTooWide { .. })
        ));
    }

    #[test]
    fn strategy_hint_prefers_normal_for_deep_confident_book() {
        let analyzer = LiquidityAnalyzer::new(dec!(100), dec!(0.01));
        let q = quote(dec!(100.00), dec!(100.01), dec!(30_000), dec!(30_000));
        let analysis = analyzer.analyze(&q, dec!(10), Side::Buy);
        assert_eq!(
            analyzer.strategy_hint(&analysis, Side::Buy, dec!(10)),
            ExecutionStrategyHint::Normal
        );
    }

    #[test]
    fn strategy_hint_is_patient_for_illiquid_book() {
        let analyzer = LiquidityAnalyzer::new(dec!(100), dec!(0.01));
        let q = quote(dec!(100.00), dec!(105.00), dec!(80), dec!(80));
        let analysis = analyzer.analyze(&q, dec!(10), Side::Buy);
        assert_eq!(
            analyzer.strategy_hint(&analysis, Side::Buy, dec!(10)),
            ExecutionStrategyHint::Patient
        );
    }

    #[test]
    fn strategy_hint_suggests_split_for_oversized_order() {
        let analyzer = LiquidityAnalyzer::new(dec!(100), dec!(0.01));
        let q = quote(dec!(100.00), dec!(100.05), dec!(1000), dec!(1000));
        let analysis = analyzer.analyze(&q, dec!(10), Side::Buy);
        assert_eq!(
            analyzer.strategy_hint(&analysis, Side::Buy, dec!(2000)),
            ExecutionStrategyHint::Split
        );
    }
}
