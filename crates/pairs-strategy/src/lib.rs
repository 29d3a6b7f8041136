//! Pairs-trading strategy engine.
//!
//! Screens a universe for cointegrated pairs, tracks rolling spread
//! z-scores, and runs the per-pair signal state machine. All computation is
//! synchronous over caller-supplied [`statarb_core::PriceHistory`] data;
//! data retrieval and order execution live elsewhere.

pub mod config;
pub mod screener;
pub mod signals;
pub mod spread;

pub use config::StrategyConfig;
pub use screener::Screener;
pub use signals::{evaluate_transition, signal_confidence, SignalEngine};
pub use spread::{calculate_spread_statistics, mean_std, spread_series, window_z_score};
