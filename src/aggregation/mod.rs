//! Signal Aggregation Session: fan strategy evaluation out to N workers, fan
//! their partial signals back in exactly once each, and consolidate into one
//! target allocation.

pub mod coordinator;
pub mod error;
pub mod session;
pub mod signal;
pub mod store;

pub use coordinator::{AggregationConfig, StrategyConfig, StrategyEvaluation, StrategyEvaluator, run_session};
pub use error::AggregationError;
pub use session::{AggregationSession, SessionStatus};
pub use signal::PartialSignal;
pub use store::SessionStore;
