//! Cointegration screening over a universe of symbols.
//!
//! Hedge ratios come from an OLS regression with intercept; stationarity of
//! the resulting spread is judged with an augmented Dickey-Fuller test
//! against the standard critical-value table. The p-value is a table
//! interpolation, not a full response-surface computation, so treat it as an
//! approximation.

use chrono::Utc;
use statarb_core::{CointegrationResult, Error, PriceHistory, Result, TradingPair};
use tracing::{debug, info, warn};

use crate::config::StrategyConfig;
use crate::spread::spread_series;

/// Lagged difference terms in the ADF regression.
const ADF_LAGS: usize = 1;

/// Dickey-Fuller critical values (constant, no trend) and the p-values the
/// step approximation assigns to them.
const ADF_TABLE: [(f64, f64); 4] = [(-3.43, 0.01), (-2.86, 0.05), (-2.57, 0.10), (-1.94, 0.50)];

/// Screens symbol pairs for cointegration.
#[derive(Debug, Clone)]
pub struct Screener {
    config: StrategyConfig,
}

impl Screener {
    pub fn new(config: StrategyConfig) -> Self {
        Self { config }
    }

    /// Test two aligned price series for cointegration.
    ///
    /// Regresses `series_a` on `series_b` (with intercept) for the hedge
    /// ratio, then unit-root-tests the spread. Series shorter than
    /// `min_lookback_days` or containing non-finite values are rejected.
    pub fn test_cointegration(
        &self,
        asset_a: &str,
        asset_b: &str,
        series_a: &[f64],
        series_b: &[f64],
    ) -> Result<CointegrationResult> {
        if series_a.len() != series_b.len() {
            return Err(Error::DataAlignment(format!(
                "{} has {} points, {} has {}",
                asset_a,
                series_a.len(),
                asset_b,
                series_b.len()
            )));
        }
        if series_a.len() < self.config.min_lookback_days {
            return Err(Error::DataInsufficient(format!(
                "need {} observations for cointegration test, got {}",
                self.config.min_lookback_days,
                series_a.len()
            )));
        }
        for (symbol, series) in [(asset_a, series_a), (asset_b, series_b)] {
            if series.iter().any(|p| !p.is_finite()) {
                return Err(Error::DataInsufficient(format!(
                    "non-finite values in price series for {}",
                    symbol
                )));
            }
        }

        let hedge_ratio = self.hedge_ratio(asset_a, asset_b, series_a, series_b)?;
        let spread = spread_series(series_a, series_b, hedge_ratio);

        let (test_statistic, p_value) = match adf_test(&spread) {
            Some(result) => result,
            None => {
                // Degenerate regression (e.g. constant spread): treat as not
                // cointegrated rather than failing the whole screen.
                warn!(asset_a, asset_b, "ADF regression degenerate");
                (0.0, 1.0)
            }
        };

        let is_cointegrated = p_value < self.config.adf_p_value_threshold;

        Ok(CointegrationResult {
            asset_a: asset_a.to_string(),
            asset_b: asset_b.to_string(),
            test_statistic,
            p_value,
            critical_value_5pct: -2.86,
            hedge_ratio,
            is_cointegrated,
            timestamp: Utc::now(),
        })
    }

    /// Screen all unordered pairs from `universe` for cointegration.
    ///
    /// Returns a `TradingPair` for each cointegrated result, in universe
    /// enumeration order (deterministic for a fixed input). A universe
    /// symbol without a price series is an alignment error.
    pub fn screen_for_pairs(
        &self,
        universe: &[String],
        price_data: &PriceHistory,
    ) -> Result<Vec<TradingPair>> {
        info!(assets = universe.len(), "screening universe for cointegrated pairs");

        let mut pairs = Vec::new();
        let mut tested = 0usize;

        for (i, asset_a) in universe.iter().enumerate() {
            for asset_b in &universe[i + 1..] {
                let (a, b) = price_data.aligned_pair(asset_a, asset_b)?;
                tested += 1;

                let result = self.test_cointegration(asset_a, asset_b, a, b)?;
                if result.is_cointegrated {
                    info!(
                        asset_a = %asset_a,
                        asset_b = %asset_b,
                        p_value = result.p_value,
                        hedge_ratio = result.hedge_ratio,
                        "cointegrated pair found"
                    );
                    pairs.push(TradingPair::from_cointegration(result));
                } else {
                    debug!(
                        asset_a = %asset_a,
                        asset_b = %asset_b,
                        p_value = result.p_value,
                        "pair not cointegrated"
                    );
                }
            }
        }

        info!(
            tested,
            cointegrated = pairs.len(),
            "screening complete"
        );
        Ok(pairs)
    }

    /// Hedge ratio β from OLS of a on b with intercept.
    fn hedge_ratio(&self, asset_a: &str, asset_b: &str, a: &[f64], b: &[f64]) -> Result<f64> {
        let ones = vec![1.0; b.len()];
        let fit = ols(&[&ones, b], a).ok_or_else(|| {
            Error::Validation(format!(
                "hedge ratio regression degenerate for {}/{}",
                asset_a, asset_b
            ))
        })?;

        let mut beta = fit.coefficients[1];
        if beta <= 0.0 {
            warn!(asset_a, asset_b, beta, "negative hedge ratio, using absolute value");
            beta = beta.abs();
        }
        Ok(beta)
    }
}

struct OlsFit {
    coefficients: Vec<f64>,
    /// (X'X)^-1, needed for coefficient standard errors.
    xtx_inv: Vec<Vec<f64>>,
    /// Sum of squared residuals.
    sse: f64,
    observations: usize,
}

/// Ordinary least squares over column-major regressors. Returns `None` when
/// the normal equations are singular.
fn ols(columns: &[&[f64]], y: &[f64]) -> Option<OlsFit> {
    let k = columns.len();
    let n = y.len();
    if k == 0 || n <= k || columns.iter().any(|c| c.len() != n) {
        return None;
    }

    let mut xtx = vec![vec![0.0; k]; k];
    let mut xty = vec![0.0; k];
    for i in 0..k {
        for j in 0..k {
            xtx[i][j] = columns[i].iter().zip(columns[j]).map(|(a, b)| a * b).sum();
        }
        xty[i] = columns[i].iter().zip(y).map(|(a, b)| a * b).sum();
    }

    let xtx_inv = invert(&xtx)?;
    let coefficients: Vec<f64> = (0..k)
        .map(|i| (0..k).map(|j| xtx_inv[i][j] * xty[j]).sum())
        .collect();

    let sse = (0..n)
        .map(|t| {
            let fitted: f64 = (0..k).map(|i| coefficients[i] * columns[i][t]).sum();
            (y[t] - fitted).powi(2)
        })
        .sum();

    Some(OlsFit {
        coefficients,
        xtx_inv,
        sse,
        observations: n,
    })
}

/// Gauss-Jordan inverse for the small (≤ 3x3) normal-equation matrices.
fn invert(matrix: &[Vec<f64>]) -> Option<Vec<Vec<f64>>> {
    let k = matrix.len();
    let mut aug: Vec<Vec<f64>> = matrix
        .iter()
        .enumerate()
        .map(|(i, row)| {
            let mut r = row.clone();
            r.extend((0..k).map(|j| if i == j { 1.0 } else { 0.0 }));
            r
        })
        .collect();

    for col in 0..k {
        // Partial pivot.
        let pivot_row = (col..k).max_by(|&a, &b| {
            aug[a][col]
                .abs()
                .partial_cmp(&aug[b][col].abs())
                .unwrap_or(std::cmp::Ordering::Equal)
        })?;
        if aug[pivot_row][col].abs() < 1e-12 {
            return None;
        }
        aug.swap(col, pivot_row);

        let pivot = aug[col][col];
        for v in aug[col].iter_mut() {
            *v /= pivot;
        }
        for row in 0..k {
            if row != col {
                let factor = aug[row][col];
                for j in 0..2 * k {
                    aug[row][j] -= factor * aug[col][j];
                }
            }
        }
    }

    Some(aug.into_iter().map(|row| row[k..].to_vec()).collect())
}

/// Augmented Dickey-Fuller test: Δs_t on (1, s_{t-1}, Δs_{t-1}).
///
/// Returns `(test_statistic, p_value)` or `None` if the regression is
/// degenerate. The null is a unit root; a large negative statistic rejects
/// it, i.e. the spread is stationary.
fn adf_test(series: &[f64]) -> Option<(f64, f64)> {
    let n = series.len();
    if n < ADF_LAGS + 4 {
        return None;
    }

    let diffs: Vec<f64> = series.windows(2).map(|w| w[1] - w[0]).collect();

    // Observation t runs over diffs[ADF_LAGS..].
    let m = diffs.len() - ADF_LAGS;
    let y: Vec<f64> = diffs[ADF_LAGS..].to_vec();
    let ones = vec![1.0; m];
    let lag_level: Vec<f64> = series[ADF_LAGS..ADF_LAGS + m].to_vec();
    let lag_diff: Vec<f64> = diffs[..m].to_vec();

    let fit = ols(&[&ones, &lag_level, &lag_diff], &y)?;

    let params = 2 + ADF_LAGS;
    let dof = fit.observations.checked_sub(params)?;
    if dof == 0 {
        return None;
    }
    let mse = fit.sse / dof as f64;
    let se = (mse * fit.xtx_inv[1][1]).sqrt();
    if se < 1e-12 || !se.is_finite() {
        return None;
    }

    let t_stat = fit.coefficients[1] / se;
    Some((t_stat, approximate_p_value(t_stat)))
}

/// P-value interpolated from the Dickey-Fuller table; clamped to
/// [0.01, 0.50] outside it.
fn approximate_p_value(t_stat: f64) -> f64 {
    if t_stat <= ADF_TABLE[0].0 {
        return ADF_TABLE[0].1;
    }
    for window in ADF_TABLE.windows(2) {
        let (stat_lo, p_lo) = window[0];
        let (stat_hi, p_hi) = window[1];
        if t_stat <= stat_hi {
            let frac = (t_stat - stat_lo) / (stat_hi - stat_lo);
            return p_lo + frac * (p_hi - p_lo);
        }
    }
    ADF_TABLE[ADF_TABLE.len() - 1].1
}
