//! Shared domain types for pairs screening, signals, and risk gating.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::error::{Error, Result};

/// A single observation in a price series.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PricePoint {
    pub timestamp: DateTime<Utc>,
    pub price: f64,
}

/// Time-ordered price series keyed by symbol, aligned on a shared timeline.
///
/// Every series must cover exactly the same timestamps. The history is
/// immutable once handed to the screening/signal engines for an evaluation
/// window; alignment violations surface as [`Error::DataAlignment`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PriceHistory {
    timestamps: Vec<DateTime<Utc>>,
    series: HashMap<String, Vec<f64>>,
}

impl PriceHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a series for a symbol. The first series fixes the timeline;
    /// subsequent series must match it timestamp-for-timestamp.
    pub fn insert_series(&mut self, symbol: impl Into<String>, points: Vec<PricePoint>) -> Result<()> {
        let symbol = symbol.into();
        if self.timestamps.is_empty() && self.series.is_empty() {
            self.timestamps = points.iter().map(|p| p.timestamp).collect();
        } else {
            if points.len() != self.timestamps.len() {
                return Err(Error::DataAlignment(format!(
                    "series {} has {} points, timeline has {}",
                    symbol,
                    points.len(),
                    self.timestamps.len()
                )));
            }
            for (point, expected) in points.iter().zip(&self.timestamps) {
                if point.timestamp != *expected {
                    return Err(Error::DataAlignment(format!(
                        "series {} timestamp {} does not match timeline {}",
                        symbol, point.timestamp, expected
                    )));
                }
            }
        }

        self.series
            .insert(symbol, points.into_iter().map(|p| p.price).collect());
        Ok(())
    }

    /// Number of observations on the shared timeline.
    pub fn len(&self) -> usize {
        self.timestamps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }

    /// Symbols present in the history.
    pub fn symbols(&self) -> impl Iterator<Item = &str> {
        self.series.keys().map(|s| s.as_str())
    }

    pub fn timestamps(&self) -> &[DateTime<Utc>] {
        &self.timestamps
    }

    pub fn timestamp(&self, index: usize) -> Option<DateTime<Utc>> {
        self.timestamps.get(index).copied()
    }

    /// Price series for a symbol; missing symbols are an alignment error.
    pub fn series(&self, symbol: &str) -> Result<&[f64]> {
        self.series
            .get(symbol)
            .map(|s| s.as_slice())
            .ok_or_else(|| Error::DataAlignment(format!("no price series for symbol {}", symbol)))
    }

    /// Two aligned series for a pair of symbols.
    pub fn aligned_pair(&self, asset_a: &str, asset_b: &str) -> Result<(&[f64], &[f64])> {
        let a = self.series(asset_a)?;
        let b = self.series(asset_b)?;
        // Both are on the shared timeline by construction, but guard anyway.
        if a.len() != b.len() {
            return Err(Error::DataAlignment(format!(
                "{} has {} points, {} has {}",
                asset_a,
                a.len(),
                asset_b,
                b.len()
            )));
        }
        Ok((a, b))
    }
}

/// Trading status for a pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PairStatus {
    /// No active position.
    NoPosition,
    /// Long asset A, short asset B.
    LongSpread,
    /// Short asset A, long asset B.
    ShortSpread,
    /// Stopped out; terminal until the pair is re-screened.
    CointegrationBroken,
}

/// Result of a pairwise cointegration test. Immutable; retests create a
/// fresh result rather than mutating this one.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CointegrationResult {
    pub asset_a: String,
    pub asset_b: String,
    pub test_statistic: f64,
    pub p_value: f64,
    pub critical_value_5pct: f64,
    pub hedge_ratio: f64,
    pub is_cointegrated: bool,
    pub timestamp: DateTime<Utc>,
}

/// A cointegrated trading pair with its live position state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradingPair {
    pub asset_a: String,
    pub asset_b: String,
    pub hedge_ratio: f64,
    pub cointegration: CointegrationResult,
    pub status: PairStatus,
    /// Z-score at which the current position was entered.
    pub entry_z_score: Option<f64>,
    pub unrealized_pnl: f64,
    pub last_update: DateTime<Utc>,
}

impl TradingPair {
    /// Build a pair from a passing cointegration result.
    pub fn from_cointegration(result: CointegrationResult) -> Self {
        Self {
            asset_a: result.asset_a.clone(),
            asset_b: result.asset_b.clone(),
            hedge_ratio: result.hedge_ratio,
            cointegration: result,
            status: PairStatus::NoPosition,
            entry_z_score: None,
            unrealized_pnl: 0.0,
            last_update: Utc::now(),
        }
    }

    /// Display label, e.g. `AAPL/MSFT`.
    pub fn label(&self) -> String {
        format!("{}/{}", self.asset_a, self.asset_b)
    }

    pub fn update_status(&mut self, status: PairStatus) {
        self.status = status;
        self.last_update = Utc::now();
    }

    pub fn update_pnl(&mut self, pnl: f64) {
        self.unrealized_pnl = pnl;
        self.last_update = Utc::now();
    }
}

/// Rolling statistics of a pair's spread. A derived snapshot, recomputed on
/// every call and never persisted as mutable state.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SpreadStatistics {
    pub mean: f64,
    pub std: f64,
    pub z_score: f64,
    pub current_spread: f64,
    pub window_size: usize,
    /// True when the window had zero variance; z is defined as 0 then.
    pub degenerate: bool,
    pub timestamp: DateTime<Utc>,
}

/// Kind of trading signal emitted by the pair state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalType {
    EntryLong,
    EntryShort,
    Exit,
    Stop,
}

/// Trading signal for a pair. A value object consumed once by the caller.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PairSignal {
    pub asset_a: String,
    pub asset_b: String,
    pub signal_type: SignalType,
    pub z_score: f64,
    pub spread: f64,
    pub hedge_ratio: f64,
    /// Confidence score in [0, 100].
    pub confidence: f64,
    pub timestamp: DateTime<Utc>,
    pub metadata: HashMap<String, String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn points(prices: &[f64]) -> Vec<PricePoint> {
        prices
            .iter()
            .enumerate()
            .map(|(i, &price)| PricePoint {
                timestamp: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
                    + chrono::Duration::days(i as i64),
                price,
            })
            .collect()
    }

    #[test]
    fn test_aligned_insert_and_lookup() {
        let mut history = PriceHistory::new();
        history.insert_series("A", points(&[1.0, 2.0, 3.0])).unwrap();
        history.insert_series("B", points(&[4.0, 5.0, 6.0])).unwrap();

        assert_eq!(history.len(), 3);
        let (a, b) = history.aligned_pair("A", "B").unwrap();
        assert_eq!(a, &[1.0, 2.0, 3.0]);
        assert_eq!(b, &[4.0, 5.0, 6.0]);
    }

    #[test]
    fn test_length_mismatch_rejected() {
        let mut history = PriceHistory::new();
        history.insert_series("A", points(&[1.0, 2.0, 3.0])).unwrap();
        let err = history.insert_series("B", points(&[1.0, 2.0])).unwrap_err();
        assert!(matches!(err, Error::DataAlignment(_)));
    }

    #[test]
    fn test_timestamp_mismatch_rejected() {
        let mut history = PriceHistory::new();
        history.insert_series("A", points(&[1.0, 2.0])).unwrap();

        let mut shifted = points(&[1.0, 2.0]);
        shifted[1].timestamp = shifted[1].timestamp + chrono::Duration::hours(1);
        let err = history.insert_series("B", shifted).unwrap_err();
        assert!(matches!(err, Error::DataAlignment(_)));
    }

    #[test]
    fn test_missing_symbol_is_alignment_error() {
        let history = PriceHistory::new();
        assert!(matches!(
            history.series("GONE"),
            Err(Error::DataAlignment(_))
        ));
    }

    #[test]
    fn test_pair_from_cointegration() {
        let result = CointegrationResult {
            asset_a: "A".to_string(),
            asset_b: "B".to_string(),
            test_statistic: -3.8,
            p_value: 0.01,
            critical_value_5pct: -2.86,
            hedge_ratio: 1.5,
            is_cointegrated: true,
            timestamp: Utc::now(),
        };

        let pair = TradingPair::from_cointegration(result);
        assert_eq!(pair.status, PairStatus::NoPosition);
        assert_eq!(pair.hedge_ratio, 1.5);
        assert_eq!(pair.label(), "A/B");
        assert!(pair.entry_z_score.is_none());
    }
}
