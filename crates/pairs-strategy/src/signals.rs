//! Pair signal state machine.
//!
//! Transitions are evaluated in priority order: stop, then exit, then entry.
//! A stopped pair goes to `CointegrationBroken` and emits nothing further
//! until it is re-screened. The pure transition/confidence functions are also
//! used by the backtester so replay and live monitoring agree.

use std::collections::HashMap;

use chrono::Utc;
use statarb_core::{PairSignal, PairStatus, PriceHistory, Result, SignalType, TradingPair};
use tracing::{debug, info, warn};

use crate::config::StrategyConfig;
use crate::spread::calculate_spread_statistics;

/// Generates trading signals for cointegrated pairs.
pub struct SignalEngine {
    config: StrategyConfig,
}

/// State transition for a pair at a given z-score, in priority order.
///
/// Stops and exits only apply in-position; entries only apply flat. A broken
/// pair never transitions.
pub fn evaluate_transition(
    status: PairStatus,
    z_score: f64,
    config: &StrategyConfig,
) -> Option<SignalType> {
    match status {
        PairStatus::CointegrationBroken => None,
        PairStatus::LongSpread | PairStatus::ShortSpread => {
            if z_score.abs() > config.stop_z_threshold {
                Some(SignalType::Stop)
            } else if z_score.abs() < config.exit_z_threshold {
                Some(SignalType::Exit)
            } else {
                None
            }
        }
        PairStatus::NoPosition => {
            if z_score < -config.entry_z_threshold {
                Some(SignalType::EntryLong)
            } else if z_score > config.entry_z_threshold {
                Some(SignalType::EntryShort)
            } else {
                None
            }
        }
    }
}

/// Confidence in [0, 100], monotone in the distance past the threshold.
pub fn signal_confidence(signal_type: SignalType, z_score: f64, config: &StrategyConfig) -> f64 {
    match signal_type {
        SignalType::EntryLong | SignalType::EntryShort => {
            let span = (config.stop_z_threshold - config.entry_z_threshold).max(f64::EPSILON);
            let excess = ((z_score.abs() - config.entry_z_threshold) / span).clamp(0.0, 1.0);
            60.0 + 40.0 * excess
        }
        SignalType::Exit => {
            let depth =
                ((config.exit_z_threshold - z_score.abs()) / config.exit_z_threshold).clamp(0.0, 1.0);
            60.0 + 40.0 * depth
        }
        SignalType::Stop => 95.0,
    }
}

impl SignalEngine {
    pub fn new(config: StrategyConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &StrategyConfig {
        &self.config
    }

    /// Evaluate one pair and apply the resulting transition.
    ///
    /// Status and `entry_z_score` are updated in the same call that emits the
    /// signal, so a pair can never be entered twice without an intervening
    /// exit or stop.
    pub fn generate_signal(
        &self,
        pair: &mut TradingPair,
        price_data: &PriceHistory,
    ) -> Result<Option<PairSignal>> {
        if pair.status == PairStatus::CointegrationBroken {
            return Ok(None);
        }

        let stats =
            calculate_spread_statistics(pair, price_data, self.config.z_score_window)?;

        let Some(signal_type) = evaluate_transition(pair.status, stats.z_score, &self.config)
        else {
            debug!(
                pair = %pair.label(),
                z_score = stats.z_score,
                status = ?pair.status,
                "no transition"
            );
            return Ok(None);
        };

        let confidence = signal_confidence(signal_type, stats.z_score, &self.config);

        let mut metadata = HashMap::new();
        metadata.insert("spread_mean".to_string(), format!("{:.6}", stats.mean));
        metadata.insert("spread_std".to_string(), format!("{:.6}", stats.std));
        metadata.insert("window_size".to_string(), stats.window_size.to_string());
        if stats.degenerate {
            metadata.insert("degenerate_window".to_string(), "true".to_string());
        }
        if let Some(entry_z) = pair.entry_z_score {
            metadata.insert("entry_z_score".to_string(), format!("{:.4}", entry_z));
        }

        match signal_type {
            SignalType::EntryLong => {
                pair.entry_z_score = Some(stats.z_score);
                pair.update_status(PairStatus::LongSpread);
                info!(
                    pair = %pair.label(),
                    z_score = stats.z_score,
                    confidence,
                    "entry long spread"
                );
            }
            SignalType::EntryShort => {
                pair.entry_z_score = Some(stats.z_score);
                pair.update_status(PairStatus::ShortSpread);
                info!(
                    pair = %pair.label(),
                    z_score = stats.z_score,
                    confidence,
                    "entry short spread"
                );
            }
            SignalType::Exit => {
                pair.entry_z_score = None;
                pair.update_status(PairStatus::NoPosition);
                info!(pair = %pair.label(), z_score = stats.z_score, "exit to mean");
            }
            SignalType::Stop => {
                pair.entry_z_score = None;
                pair.update_status(PairStatus::CointegrationBroken);
                warn!(
                    pair = %pair.label(),
                    z_score = stats.z_score,
                    stop_z = self.config.stop_z_threshold,
                    "stop: spread diverged, marking cointegration broken"
                );
            }
        }

        Ok(Some(PairSignal {
            asset_a: pair.asset_a.clone(),
            asset_b: pair.asset_b.clone(),
            signal_type,
            z_score: stats.z_score,
            spread: stats.current_spread,
            hedge_ratio: pair.hedge_ratio,
            confidence,
            timestamp: Utc::now(),
            metadata,
        }))
    }

    /// Evaluate every pair against the shared history.
    pub fn monitor_pairs(
        &self,
        pairs: &mut [TradingPair],
        price_data: &PriceHistory,
    ) -> Result<Vec<PairSignal>> {
        let mut signals = Vec::new();
        for pair in pairs.iter_mut() {
            if let Some(signal) = self.generate_signal(pair, price_data)? {
                signals.push(signal);
            }
        }
        Ok(signals)
    }
}
