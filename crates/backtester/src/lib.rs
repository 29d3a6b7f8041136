//! Backtester
//!
//! Historical validation for cointegrated pairs. Replays the same state
//! machine the live signal engine runs, bar by bar, over a shared
//! [`statarb_core::PriceHistory`].
//!
//! # Example
//!
//! ```ignore
//! use backtester::{BacktestConfig, PairBacktester};
//!
//! let backtester = PairBacktester::new(BacktestConfig::default());
//! let results = backtester.validate_pairs(&pairs, &history)?;
//! for result in &results {
//!     println!("{}: {:.2}%", result.pair, result.return_pct);
//! }
//! ```

pub mod simulator;

// Re-exports
pub use simulator::{
    BacktestConfig, BacktestResult, PairBacktester, TradeDirection, TradeRecord,
};
