//! Statarb Core
//!
//! Shared domain types and the error taxonomy for the statistical-arbitrage
//! engine: price histories, pair/signal value objects, and the `Error` enum
//! every crate in the workspace speaks.

pub mod error;
pub mod types;

pub use error::{Error, Result};
pub use types::{
    CointegrationResult, PairSignal, PairStatus, PriceHistory, PricePoint, SignalType,
    SpreadStatistics, TradingPair,
};
