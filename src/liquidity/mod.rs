//! Volume-aware liquidity analysis for limit price selection, sized-order
//! validation, and execution strategy hints.

pub mod analysis;
pub mod error;

pub use analysis::{ExecutionStrategyHint, LiquidityAnalysis, LiquidityAnalyzer, Side};
pub use error::LiquidityError;
