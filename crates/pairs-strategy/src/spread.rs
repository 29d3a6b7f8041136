//! Spread construction and rolling z-score statistics.
//!
//! Both live monitoring and the backtester go through these helpers so the
//! two paths agree on z-score semantics observation-for-observation.

use chrono::Utc;
use statarb_core::{Error, PriceHistory, Result, SpreadStatistics, TradingPair};

/// Variance below this counts as a degenerate (constant) spread window.
const DEGENERATE_STD_EPS: f64 = 1e-9;

/// Spread = a − β·b over two aligned series.
pub fn spread_series(a: &[f64], b: &[f64], hedge_ratio: f64) -> Vec<f64> {
    a.iter()
        .zip(b)
        .map(|(&pa, &pb)| pa - hedge_ratio * pb)
        .collect()
}

/// Mean and sample standard deviation of a window.
pub fn mean_std(window: &[f64]) -> (f64, f64) {
    let n = window.len();
    if n < 2 {
        return (window.first().copied().unwrap_or(0.0), 0.0);
    }
    let mean = window.iter().sum::<f64>() / n as f64;
    let var = window.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / (n - 1) as f64;
    (mean, var.sqrt())
}

/// Z-score of the last observation in a window.
///
/// Returns `(z, mean, std, degenerate)`. A zero-variance window defines the
/// z-score as 0 with the degenerate flag set instead of dividing by zero.
pub fn window_z_score(window: &[f64]) -> (f64, f64, f64, bool) {
    let (mean, std) = mean_std(window);
    let current = window.last().copied().unwrap_or(mean);
    if std < DEGENERATE_STD_EPS {
        (0.0, mean, std, true)
    } else {
        ((current - mean) / std, mean, std, false)
    }
}

/// Rolling spread statistics for a pair over the trailing z-score window.
pub fn calculate_spread_statistics(
    pair: &TradingPair,
    price_data: &PriceHistory,
    z_score_window: usize,
) -> Result<SpreadStatistics> {
    let (a, b) = price_data.aligned_pair(&pair.asset_a, &pair.asset_b)?;
    let spread = spread_series(a, b, pair.hedge_ratio);

    if spread.len() < 2 {
        return Err(Error::DataInsufficient(format!(
            "need at least 2 observations for spread statistics, got {}",
            spread.len()
        )));
    }

    let start = spread.len().saturating_sub(z_score_window);
    let window = &spread[start..];
    let (z_score, mean, std, degenerate) = window_z_score(window);

    Ok(SpreadStatistics {
        mean,
        std,
        z_score,
        current_spread: *spread.last().expect("non-empty spread"),
        window_size: window.len(),
        degenerate,
        timestamp: Utc::now(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use statarb_core::{CointegrationResult, PricePoint};

    fn history_of(pairs: &[(&str, &[f64])]) -> PriceHistory {
        let mut history = PriceHistory::new();
        for (symbol, prices) in pairs {
            let points: Vec<PricePoint> = prices
                .iter()
                .enumerate()
                .map(|(i, &price)| PricePoint {
                    timestamp: chrono::Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
                        + chrono::Duration::days(i as i64),
                    price,
                })
                .collect();
            history.insert_series(*symbol, points).unwrap();
        }
        history
    }

    fn test_pair(hedge_ratio: f64) -> TradingPair {
        TradingPair::from_cointegration(CointegrationResult {
            asset_a: "A".to_string(),
            asset_b: "B".to_string(),
            test_statistic: -4.0,
            p_value: 0.01,
            critical_value_5pct: -2.86,
            hedge_ratio,
            is_cointegrated: true,
            timestamp: chrono::Utc::now(),
        })
    }

    #[test]
    fn test_spread_series() {
        let spread = spread_series(&[10.0, 12.0], &[4.0, 5.0], 2.0);
        assert_eq!(spread, vec![2.0, 2.0]);
    }

    #[test]
    fn test_z_score_round_trip() {
        // A current spread of m + k*s sits exactly k standard deviations out.
        let window: Vec<f64> = (0..20).map(|i| (i % 5) as f64).collect();
        let (mean, std) = mean_std(&window);
        assert!(std > 0.0);

        for k in [-3.0, -1.0, 0.0, 0.5, 2.0] {
            let current = mean + k * std;
            let z = (current - mean) / std;
            assert!((z - k).abs() < 1e-12);
        }
    }

    #[test]
    fn test_window_z_score_matches_definition() {
        let window = [1.0, 2.0, 3.0, 4.0, 10.0];
        let (z, mean, std, degenerate) = window_z_score(&window);
        assert!(!degenerate);
        assert!((z - (10.0 - mean) / std).abs() < 1e-12);
    }

    #[test]
    fn test_degenerate_window_is_flagged_not_divided() {
        let (z, _, std, degenerate) = window_z_score(&[5.0, 5.0, 5.0, 5.0]);
        assert_eq!(z, 0.0);
        assert_eq!(std, 0.0);
        assert!(degenerate);
    }

    #[test]
    fn test_statistics_use_trailing_window() {
        // 30 observations, window 20: early outliers must not leak in.
        let mut a = vec![1000.0; 10];
        a.extend((0..20).map(|i| 10.0 + (i % 3) as f64));
        let b = vec![0.0; 30];
        let history = history_of(&[("A", &a), ("B", &b)]);
        let pair = test_pair(1.0);

        let stats = calculate_spread_statistics(&pair, &history, 20).unwrap();
        assert_eq!(stats.window_size, 20);
        assert!(stats.mean < 20.0, "early outliers leaked: {}", stats.mean);
        assert!(!stats.degenerate);
    }

    #[test]
    fn test_too_short_history_rejected() {
        let history = history_of(&[("A", &[1.0]), ("B", &[1.0])]);
        let pair = test_pair(1.0);
        let err = calculate_spread_statistics(&pair, &history, 20).unwrap_err();
        assert!(matches!(err, Error::DataInsufficient(_)));
    }
}
