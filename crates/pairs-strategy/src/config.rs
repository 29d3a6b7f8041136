//! Strategy configuration.

use serde::{Deserialize, Serialize};

/// Parameters for screening, z-score computation, and signal generation.
///
/// All thresholds are in z-score units except where noted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StrategyConfig {
    /// Maximum ADF p-value for a pair to count as cointegrated.
    pub adf_p_value_threshold: f64,
    /// Minimum history length required for cointegration testing.
    pub min_lookback_days: usize,
    /// Rolling window for spread mean/std and the z-score.
    pub z_score_window: usize,
    /// Enter when |z| exceeds this.
    pub entry_z_threshold: f64,
    /// Exit when |z| falls below this.
    pub exit_z_threshold: f64,
    /// Force-close when |z| exceeds this; the pair is then considered broken.
    pub stop_z_threshold: f64,
    /// Maximum holding period in days.
    pub max_holding_days: usize,
    /// Minimum signal confidence callers are expected to act on.
    pub min_confidence: f64,
}

impl Default for StrategyConfig {
    fn default() -> Self {
        Self {
            adf_p_value_threshold: 0.05,
            min_lookback_days: 60,
            z_score_window: 20,
            entry_z_threshold: 2.0,
            exit_z_threshold: 0.5,
            stop_z_threshold: 3.5,
            max_holding_days: 30,
            min_confidence: 60.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = StrategyConfig::default();
        assert_eq!(config.adf_p_value_threshold, 0.05);
        assert_eq!(config.min_lookback_days, 60);
        assert_eq!(config.z_score_window, 20);
        assert_eq!(config.entry_z_threshold, 2.0);
        assert_eq!(config.exit_z_threshold, 0.5);
        assert_eq!(config.stop_z_threshold, 3.5);
        assert_eq!(config.min_confidence, 60.0);
    }
}
