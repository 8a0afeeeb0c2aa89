#![forbid(unsafe_code)]
#![warn(
    unused,
    clippy::cognitive_complexity,
    unused_crate_dependencies,
    unused_extern_crates,
    clippy::unused_self,
    clippy::useless_let_if_seq,
    missing_debug_implementations,
    rust_2018_idioms,
    rust_2024_compatibility
)]
#![allow(clippy::type_complexity, clippy::too_many_arguments, type_alias_bounds)]

//! # Multi-Strategy Equities Trading Engine
//! Ingests streaming market data, consolidates algorithmic strategy signals into a
//! target allocation, computes a minimum-trade rebalance plan against live broker
//! state, and executes that plan through liquidity-aware limit orders with
//! re-pricing and partial-fill handling.
//! * **Exact**: every money, price, and quantity field is `rust_decimal::Decimal`;
//!   floats are confined to non-financial scores and statistics.
//! * **Thread safe**: the market data cache supports many concurrent readers
//!   behind a single writer task; session and order state are owned exclusively
//!   by the component that mutates them.
//! * **Auditable**: every order and plan carries a correlation id threading a
//!   logical workflow across components for tracing and logs.
//!
//! At a high level, it provides five components wired together by [`cycle::run`]:
//! * [`market_data`] — the streaming top-of-book cache and subscription manager.
//! * [`liquidity`] — volume-aware limit pricing and execution-strategy hints.
//! * [`portfolio`] — portfolio snapshots and the deterministic rebalance planner.
//! * [`aggregation`] — the multi-strategy signal consolidation session.
//! * [`execution`] — the Smart Execution Engine driving orders to a terminal state.

/// Process-wide configuration, enumerated in full per the external interfaces
/// specification.
pub mod config;

/// Top-level orchestration wiring the five components into one trading cycle.
pub mod cycle;

/// Defines all possible errors in the engine.
pub mod error;

/// Components for initialising trading-mode-aware order execution: the
/// broker interface, order lifecycle, and the Smart Execution Engine itself.
pub mod execution;

/// Provides default tracing logging initialisers.
pub mod logging;

/// Volume-aware limit pricing, liquidity scoring, and execution-strategy hints.
pub mod liquidity;

/// Per-symbol latest-quote/trade cache, subscription management, and the
/// streaming wire adapter trait.
pub mod market_data;

/// Portfolio snapshots, sizing policy, target allocations, and the
/// deterministic rebalance planner.
pub mod portfolio;

/// Multi-strategy signal aggregation session state machine.
pub mod aggregation;

/// Traits and types related to component shutdowns.
pub mod shutdown;

/// Normalised equity ticker symbol.
pub mod symbol;
