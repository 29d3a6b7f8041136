//! Stop-loss management for automated position protection.
//!
//! One stop record per open symbol. Stops only move in the protective
//! direction; the sole exception is [`StopLossManager::emergency_stop_update`],
//! which flags any violation it causes.

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::RwLock;
use tracing::{debug, error, info, warn};

use statarb_core::{Error, Result};

/// Side of the protected position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PositionSide {
    Long,
    Short,
}

/// How the stop price is derived.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopSpec {
    /// Fixed percentage from the entry price.
    FixedPct { stop_pct: Decimal },
    /// ATR multiple from the entry price.
    AtrBased { atr: Decimal, atr_multiplier: Decimal },
    /// Trails the high-water mark by a percentage.
    Trailing { trailing_pct: Decimal },
}

/// Kind tag stored on a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopKind {
    FixedPct,
    AtrBased,
    Trailing,
}

/// Configuration for stop placement and risk limits.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StopLossConfig {
    /// Maximum account fraction risked by a single trade.
    pub max_risk_per_trade: Decimal,
    pub default_stop_pct: Decimal,
    pub default_atr_multiplier: Decimal,
    pub default_trailing_pct: Decimal,
    /// Minimum stop distance as a fraction of entry price.
    pub min_stop_distance: Decimal,
    /// Maximum stop distance as a fraction of entry price.
    pub max_stop_distance: Decimal,
}

impl Default for StopLossConfig {
    fn default() -> Self {
        Self {
            max_risk_per_trade: Decimal::new(2, 2),   // 2%
            default_stop_pct: Decimal::new(2, 2),     // 2%
            default_atr_multiplier: Decimal::new(2, 0),
            default_trailing_pct: Decimal::new(5, 2), // 5%
            min_stop_distance: Decimal::new(5, 3),    // 0.5%
            max_stop_distance: Decimal::new(10, 2),   // 10%
        }
    }
}

/// Active stop for one open symbol.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StopRecord {
    pub symbol: String,
    pub entry_price: Decimal,
    pub stop_price: Decimal,
    pub position_side: PositionSide,
    pub stop_kind: StopKind,
    /// Present for trailing stops.
    pub trailing_pct: Option<Decimal>,
    /// Best price seen since entry (worst for shorts).
    pub high_water_mark: Decimal,
    pub shares: Decimal,
    /// Loss at the stop in account currency.
    pub risk_amount: Decimal,
    /// Stop distance as a fraction of entry price.
    pub risk_pct: Decimal,
    /// Risk as a fraction of the account balance.
    pub account_risk_pct: Decimal,
    pub created_at: DateTime<Utc>,
}

/// Result of a trailing stop update.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrailingUpdate {
    pub symbol: String,
    pub stop_price: Decimal,
    pub old_stop_price: Decimal,
    pub stop_moved: bool,
    pub high_water_mark: Decimal,
    /// Profit secured if the stop is now beyond the entry price.
    pub profit_locked: Decimal,
}

/// Result of an emergency stop override.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmergencyUpdate {
    pub symbol: String,
    pub stop_price: Decimal,
    pub old_stop_price: Decimal,
    /// True when the override relaxed the stop.
    pub violated_never_downgrade: bool,
    pub reason: String,
}

/// Coverage of open positions by stop records.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoverageReport {
    pub total_positions: usize,
    pub positions_with_stops: usize,
    pub coverage_pct: f64,
    pub missing_stops: Vec<String>,
    pub has_full_coverage: bool,
}

/// Summary statistics over active stops.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StopLossStats {
    pub total_stops: usize,
    pub long_stops: usize,
    pub short_stops: usize,
    pub fixed_pct_stops: usize,
    pub atr_based_stops: usize,
    pub trailing_stops: usize,
    pub total_risk_amount: Decimal,
}

/// Manager for per-symbol stop records.
pub struct StopLossManager {
    config: StopLossConfig,
    stops: DashMap<String, StopRecord>,
    account_balance: RwLock<Decimal>,
}

impl StopLossManager {
    pub fn new(config: StopLossConfig, account_balance: Decimal) -> Self {
        Self {
            config,
            stops: DashMap::new(),
            account_balance: RwLock::new(account_balance),
        }
    }

    /// Place (or replace) the stop for a symbol.
    ///
    /// Validation failures and risk-limit rejections leave no record behind.
    pub fn calculate_stop_loss(
        &self,
        symbol: &str,
        entry_price: Decimal,
        position_size: Decimal,
        side: PositionSide,
        spec: StopSpec,
    ) -> Result<StopRecord> {
        if symbol.is_empty() {
            return Err(Error::Validation("symbol must not be empty".to_string()));
        }
        if entry_price <= Decimal::ZERO {
            return Err(Error::Validation(format!(
                "entry price must be positive, got {}",
                entry_price
            )));
        }
        if position_size <= Decimal::ZERO {
            return Err(Error::Validation(format!(
                "position size must be positive, got {}",
                position_size
            )));
        }

        let (stop_kind, distance, trailing_pct) = match &spec {
            StopSpec::FixedPct { stop_pct } => {
                if *stop_pct <= Decimal::ZERO {
                    return Err(Error::Validation(format!(
                        "stop percentage must be positive, got {}",
                        stop_pct
                    )));
                }
                (StopKind::FixedPct, entry_price * *stop_pct, None)
            }
            StopSpec::AtrBased { atr, atr_multiplier } => {
                if *atr <= Decimal::ZERO || *atr_multiplier <= Decimal::ZERO {
                    return Err(Error::Validation(format!(
                        "ATR and multiplier must be positive, got {} x {}",
                        atr, atr_multiplier
                    )));
                }
                (StopKind::AtrBased, *atr * *atr_multiplier, None)
            }
            StopSpec::Trailing { trailing_pct } => {
                if *trailing_pct <= Decimal::ZERO {
                    return Err(Error::Validation(format!(
                        "trailing percentage must be positive, got {}",
                        trailing_pct
                    )));
                }
                (
                    StopKind::Trailing,
                    entry_price * *trailing_pct,
                    Some(*trailing_pct),
                )
            }
        };

        let risk_pct = distance / entry_price;
        if risk_pct < self.config.min_stop_distance || risk_pct > self.config.max_stop_distance {
            return Err(Error::Validation(format!(
                "stop distance {:.4} outside allowed range [{}, {}]",
                risk_pct, self.config.min_stop_distance, self.config.max_stop_distance
            )));
        }

        let stop_price = match side {
            PositionSide::Long => entry_price - distance,
            PositionSide::Short => entry_price + distance,
        };

        let risk_amount = distance * position_size;
        let balance = *self.account_balance.read().expect("balance lock poisoned");
        let account_risk_pct = if balance > Decimal::ZERO {
            risk_amount / balance
        } else {
            Decimal::ONE
        };

        if account_risk_pct > self.config.max_risk_per_trade {
            warn!(
                symbol,
                account_risk_pct = %account_risk_pct,
                limit = %self.config.max_risk_per_trade,
                "rejecting stop: trade risk exceeds account limit"
            );
            return Err(Error::RiskLimitExceeded {
                account_risk_pct: account_risk_pct.to_f64().unwrap_or(f64::NAN),
                limit: self.config.max_risk_per_trade.to_f64().unwrap_or(f64::NAN),
            });
        }
        if account_risk_pct >= self.config.max_risk_per_trade * Decimal::new(80, 2) {
            warn!(
                symbol,
                account_risk_pct = %account_risk_pct,
                limit = %self.config.max_risk_per_trade,
                "trade risk approaching account limit"
            );
        }

        let record = StopRecord {
            symbol: symbol.to_string(),
            entry_price,
            stop_price,
            position_side: side,
            stop_kind,
            trailing_pct,
            high_water_mark: entry_price,
            shares: position_size,
            risk_amount,
            risk_pct,
            account_risk_pct,
            created_at: Utc::now(),
        };

        info!(
            symbol,
            stop_price = %stop_price,
            kind = ?stop_kind,
            side = ?side,
            risk_amount = %risk_amount,
            "stop placed"
        );
        self.stops.insert(symbol.to_string(), record.clone());
        Ok(record)
    }

    /// Ratchet a trailing stop from a new price observation.
    ///
    /// The high-water mark only moves favorably and the stop never moves
    /// against the position.
    pub fn update_trailing_stop(
        &self,
        symbol: &str,
        current_price: Decimal,
    ) -> Result<TrailingUpdate> {
        if current_price <= Decimal::ZERO {
            return Err(Error::Validation(format!(
                "current price must be positive, got {}",
                current_price
            )));
        }

        let mut record = self
            .stops
            .get_mut(symbol)
            .ok_or_else(|| Error::Validation(format!("no stop record for symbol {}", symbol)))?;

        let trailing_pct = match (record.stop_kind, record.trailing_pct) {
            (StopKind::Trailing, Some(pct)) => pct,
            _ => {
                return Err(Error::Validation(format!(
                    "stop for {} is not a trailing stop",
                    symbol
                )))
            }
        };

        match record.position_side {
            PositionSide::Long => {
                if current_price > record.high_water_mark {
                    record.high_water_mark = current_price;
                }
            }
            PositionSide::Short => {
                if current_price < record.high_water_mark {
                    record.high_water_mark = current_price;
                }
            }
        }

        let candidate = match record.position_side {
            PositionSide::Long => record.high_water_mark * (Decimal::ONE - trailing_pct),
            PositionSide::Short => record.high_water_mark * (Decimal::ONE + trailing_pct),
        };

        let old_stop_price = record.stop_price;
        let stop_moved = match record.position_side {
            PositionSide::Long => candidate > record.stop_price,
            PositionSide::Short => candidate < record.stop_price,
        };
        if stop_moved {
            record.stop_price = candidate;
            debug!(
                symbol,
                old_stop = %old_stop_price,
                new_stop = %candidate,
                high_water_mark = %record.high_water_mark,
                "trailing stop ratcheted"
            );
        }

        let profit_locked = match record.position_side {
            PositionSide::Long => (record.stop_price - record.entry_price).max(Decimal::ZERO),
            PositionSide::Short => (record.entry_price - record.stop_price).max(Decimal::ZERO),
        } * record.shares;

        Ok(TrailingUpdate {
            symbol: symbol.to_string(),
            stop_price: record.stop_price,
            old_stop_price,
            stop_moved,
            high_water_mark: record.high_water_mark,
            profit_locked,
        })
    }

    /// Would the proposed stop keep the never-downgrade invariant?
    ///
    /// Vacuously true when the symbol has no record.
    pub fn validate_stop_never_downgrades(&self, symbol: &str, new_stop: Decimal) -> bool {
        match self.stops.get(symbol) {
            None => true,
            Some(record) => match record.position_side {
                PositionSide::Long => new_stop >= record.stop_price,
                PositionSide::Short => new_stop <= record.stop_price,
            },
        }
    }

    /// Check that every open symbol carries a stop.
    pub fn validate_100pct_coverage(&self, open_symbols: &[String]) -> CoverageReport {
        let missing_stops: Vec<String> = open_symbols
            .iter()
            .filter(|s| !self.stops.contains_key(s.as_str()))
            .cloned()
            .collect();

        let total_positions = open_symbols.len();
        let positions_with_stops = total_positions - missing_stops.len();
        let coverage_pct = if total_positions == 0 {
            100.0
        } else {
            positions_with_stops as f64 / total_positions as f64 * 100.0
        };
        let has_full_coverage = missing_stops.is_empty();

        if !has_full_coverage {
            error!(
                missing = ?missing_stops,
                coverage_pct,
                "stop-loss coverage violation: positions without stops"
            );
        }

        CoverageReport {
            total_positions,
            positions_with_stops,
            coverage_pct,
            missing_stops,
            has_full_coverage,
        }
    }

    /// Force the stop to a given price, bypassing never-downgrade.
    ///
    /// The only operation allowed to relax a stop; doing so sets the
    /// violation flag on the result.
    pub fn emergency_stop_update(
        &self,
        symbol: &str,
        emergency_stop_price: Decimal,
        reason: &str,
    ) -> Result<EmergencyUpdate> {
        let mut record = self
            .stops
            .get_mut(symbol)
            .ok_or_else(|| Error::Validation(format!("no stop record for symbol {}", symbol)))?;

        let old_stop_price = record.stop_price;
        let violated_never_downgrade = match record.position_side {
            PositionSide::Long => emergency_stop_price < old_stop_price,
            PositionSide::Short => emergency_stop_price > old_stop_price,
        };
        record.stop_price = emergency_stop_price;

        if violated_never_downgrade {
            warn!(
                symbol,
                old_stop = %old_stop_price,
                new_stop = %emergency_stop_price,
                reason,
                "emergency override relaxed a stop"
            );
        } else {
            info!(
                symbol,
                old_stop = %old_stop_price,
                new_stop = %emergency_stop_price,
                reason,
                "emergency stop update"
            );
        }

        Ok(EmergencyUpdate {
            symbol: symbol.to_string(),
            stop_price: emergency_stop_price,
            old_stop_price,
            violated_never_downgrade,
            reason: reason.to_string(),
        })
    }

    pub fn get_stop(&self, symbol: &str) -> Option<StopRecord> {
        self.stops.get(symbol).map(|r| r.clone())
    }

    pub fn all_stops(&self) -> Vec<StopRecord> {
        self.stops.iter().map(|e| e.value().clone()).collect()
    }

    /// Drop the stop when the position closes.
    pub fn remove_stop(&self, symbol: &str) -> Option<StopRecord> {
        let removed = self.stops.remove(symbol).map(|(_, r)| r);
        if removed.is_some() {
            info!(symbol, "stop removed");
        }
        removed
    }

    pub fn update_account_balance(&self, balance: Decimal) {
        *self.account_balance.write().expect("balance lock poisoned") = balance;
    }

    /// Summary over all active stops.
    pub fn stats(&self) -> StopLossStats {
        let stops = self.all_stops();
        StopLossStats {
            total_stops: stops.len(),
            long_stops: stops
                .iter()
                .filter(|s| s.position_side == PositionSide::Long)
                .count(),
            short_stops: stops
                .iter()
                .filter(|s| s.position_side == PositionSide::Short)
                .count(),
            fixed_pct_stops: stops
                .iter()
                .filter(|s| s.stop_kind == StopKind::FixedPct)
                .count(),
            atr_based_stops: stops
                .iter()
                .filter(|s| s.stop_kind == StopKind::AtrBased)
                .count(),
            trailing_stops: stops
                .iter()
                .filter(|s| s.stop_kind == StopKind::Trailing)
                .count(),
            total_risk_amount: stops.iter().map(|s| s.risk_amount).sum(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manager() -> StopLossManager {
        StopLossManager::new(StopLossConfig::default(), Decimal::new(100_000, 0))
    }

    fn dec(n: i64, scale: u32) -> Decimal {
        Decimal::new(n, scale)
    }

    #[test]
    fn test_fixed_pct_long_stop() {
        let m = manager();
        let record = m
            .calculate_stop_loss(
                "AAPL",
                dec(100, 0),
                dec(50, 0),
                PositionSide::Long,
                StopSpec::FixedPct { stop_pct: dec(2, 2) },
            )
            .unwrap();

        assert_eq!(record.stop_price, dec(98, 0));
        assert_eq!(record.risk_amount, dec(100, 0)); // 2.0 per share * 50
        assert_eq!(record.high_water_mark, dec(100, 0));
    }

    #[test]
    fn test_atr_stop_short_side() {
        let m = manager();
        let record = m
            .calculate_stop_loss(
                "MSFT",
                dec(200, 0),
                dec(10, 0),
                PositionSide::Short,
                StopSpec::AtrBased {
                    atr: dec(3, 0),
                    atr_multiplier: dec(2, 0),
                },
            )
            .unwrap();

        // Short stop sits above entry: 200 + 3 * 2.
        assert_eq!(record.stop_price, dec(206, 0));
        assert_eq!(record.risk_pct, dec(3, 2));
    }

    #[test]
    fn test_trailing_path_ratchets_and_holds() {
        let m = manager();
        m.calculate_stop_loss(
            "NVDA",
            dec(100, 0),
            dec(10, 0),
            PositionSide::Long,
            StopSpec::Trailing { trailing_pct: dec(5, 2) },
        )
        .unwrap();

        let prices = [110, 125, 140, 135, 133];
        let expected = [dec(1045, 1), dec(11875, 2), dec(133, 0), dec(133, 0), dec(133, 0)];
        for (price, want) in prices.iter().zip(expected) {
            let update = m.update_trailing_stop("NVDA", dec(*price, 0)).unwrap();
            assert_eq!(update.stop_price, want, "at price {}", price);
        }

        // High-water mark held at the peak; the pullback locked profit in.
        let record = m.get_stop("NVDA").unwrap();
        assert_eq!(record.high_water_mark, dec(140, 0));
        let update = m.update_trailing_stop("NVDA", dec(133, 0)).unwrap();
        assert!(!update.stop_moved);
        assert_eq!(update.profit_locked, dec(330, 0)); // (133 - 100) * 10
    }

    #[test]
    fn test_trailing_short_side_moves_down_only() {
        let m = manager();
        m.calculate_stop_loss(
            "TSLA",
            dec(100, 0),
            dec(10, 0),
            PositionSide::Short,
            StopSpec::Trailing { trailing_pct: dec(5, 2) },
        )
        .unwrap();

        let update = m.update_trailing_stop("TSLA", dec(90, 0)).unwrap();
        assert_eq!(update.stop_price, dec(945, 1)); // 90 * 1.05
        assert!(update.stop_moved);

        // Price bouncing back must not relax the stop.
        let update = m.update_trailing_stop("TSLA", dec(98, 0)).unwrap();
        assert_eq!(update.stop_price, dec(945, 1));
        assert!(!update.stop_moved);
    }

    #[test]
    fn test_risk_limit_rejection_leaves_no_record() {
        let m = manager();
        // 10% stop distance on a position sized to risk 10% of the account.
        let err = m
            .calculate_stop_loss(
                "GME",
                dec(100, 0),
                dec(1000, 0),
                PositionSide::Long,
                StopSpec::FixedPct { stop_pct: dec(10, 2) },
            )
            .unwrap_err();

        assert!(matches!(err, Error::RiskLimitExceeded { .. }));
        assert!(m.get_stop("GME").is_none());
    }

    #[test]
    fn test_stop_distance_bounds() {
        let m = manager();
        // 0.1% distance: below the 0.5% minimum.
        let err = m
            .calculate_stop_loss(
                "A",
                dec(100, 0),
                dec(1, 0),
                PositionSide::Long,
                StopSpec::FixedPct { stop_pct: dec(1, 3) },
            )
            .unwrap_err();
        assert!(matches!(err, Error::Validation(_)));

        // 15% distance: above the 10% maximum.
        let err = m
            .calculate_stop_loss(
                "B",
                dec(100, 0),
                dec(1, 0),
                PositionSide::Long,
                StopSpec::FixedPct { stop_pct: dec(15, 2) },
            )
            .unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }

    #[test]
    fn test_invalid_inputs_rejected() {
        let m = manager();
        let spec = StopSpec::FixedPct { stop_pct: dec(2, 2) };

        assert!(m
            .calculate_stop_loss("", dec(100, 0), dec(1, 0), PositionSide::Long, spec.clone())
            .is_err());
        assert!(m
            .calculate_stop_loss("A", dec(0, 0), dec(1, 0), PositionSide::Long, spec.clone())
            .is_err());
        assert!(m
            .calculate_stop_loss("A", dec(100, 0), dec(-5, 0), PositionSide::Long, spec)
            .is_err());
        assert!(m
            .calculate_stop_loss(
                "A",
                dec(100, 0),
                dec(1, 0),
                PositionSide::Long,
                StopSpec::AtrBased {
                    atr: dec(0, 0),
                    atr_multiplier: dec(2, 0),
                },
            )
            .is_err());
    }

    #[test]
    fn test_never_downgrade_predicate() {
        let m = manager();
        m.calculate_stop_loss(
            "AAPL",
            dec(100, 0),
            dec(10, 0),
            PositionSide::Long,
            StopSpec::FixedPct { stop_pct: dec(2, 2) },
        )
        .unwrap();

        assert!(m.validate_stop_never_downgrades("AAPL", dec(99, 0)));
        assert!(m.validate_stop_never_downgrades("AAPL", dec(98, 0)));
        assert!(!m.validate_stop_never_downgrades("AAPL", dec(97, 0)));
        // No record: vacuously fine.
        assert!(m.validate_stop_never_downgrades("UNKNOWN", dec(1, 0)));
    }

    #[test]
    fn test_emergency_override_flags_violation() {
        let m = manager();
        m.calculate_stop_loss(
            "AAPL",
            dec(100, 0),
            dec(10, 0),
            PositionSide::Long,
            StopSpec::FixedPct { stop_pct: dec(2, 2) },
        )
        .unwrap();

        // Tightening is not a violation.
        let update = m
            .emergency_stop_update("AAPL", dec(99, 0), "gap risk")
            .unwrap();
        assert!(!update.violated_never_downgrade);

        // Relaxing is allowed here but flagged.
        let update = m
            .emergency_stop_update("AAPL", dec(95, 0), "exchange halt")
            .unwrap();
        assert!(update.violated_never_downgrade);
        assert_eq!(m.get_stop("AAPL").unwrap().stop_price, dec(95, 0));
    }

    #[test]
    fn test_coverage_report_after_removal() {
        let m = manager();
        let symbols: Vec<String> = ["A", "B", "C"].iter().map(|s| s.to_string()).collect();
        for symbol in &symbols {
            m.calculate_stop_loss(
                symbol,
                dec(100, 0),
                dec(10, 0),
                PositionSide::Long,
                StopSpec::FixedPct { stop_pct: dec(2, 2) },
            )
            .unwrap();
        }
        m.remove_stop("B");

        let report = m.validate_100pct_coverage(&symbols);
        assert_eq!(report.total_positions, 3);
        assert_eq!(report.positions_with_stops, 2);
        assert_eq!(report.missing_stops, vec!["B".to_string()]);
        assert!(!report.has_full_coverage);

        let empty = m.validate_100pct_coverage(&[]);
        assert!(empty.has_full_coverage);
        assert_eq!(empty.coverage_pct, 100.0);
    }

    #[test]
    fn test_replacing_stop_keeps_one_record_per_symbol() {
        let m = manager();
        m.calculate_stop_loss(
            "AAPL",
            dec(100, 0),
            dec(10, 0),
            PositionSide::Long,
            StopSpec::FixedPct { stop_pct: dec(2, 2) },
        )
        .unwrap();
        m.calculate_stop_loss(
            "AAPL",
            dec(105, 0),
            dec(10, 0),
            PositionSide::Long,
            StopSpec::Trailing { trailing_pct: dec(5, 2) },
        )
        .unwrap();

        assert_eq!(m.all_stops().len(), 1);
        assert_eq!(m.get_stop("AAPL").unwrap().stop_kind, StopKind::Trailing);
    }

    #[test]
    fn test_stats_by_kind_and_side() {
        let m = manager();
        m.calculate_stop_loss(
            "A",
            dec(100, 0),
            dec(10, 0),
            PositionSide::Long,
            StopSpec::FixedPct { stop_pct: dec(2, 2) },
        )
        .unwrap();
        m.calculate_stop_loss(
            "B",
            dec(100, 0),
            dec(10, 0),
            PositionSide::Short,
            StopSpec::Trailing { trailing_pct: dec(5, 2) },
        )
        .unwrap();

        let stats = m.stats();
        assert_eq!(stats.total_stops, 2);
        assert_eq!(stats.long_stops, 1);
        assert_eq!(stats.short_stops, 1);
        assert_eq!(stats.fixed_pct_stops, 1);
        assert_eq!(stats.trailing_stops, 1);
        assert_eq!(stats.total_risk_amount, dec(70, 0)); // 20 + 50
    }

    #[test]
    fn test_account_balance_update_affects_risk_gate() {
        let m = manager();
        m.update_account_balance(dec(1_000, 0));

        // 2% stop on 100 shares risks 200, which is 20% of the new balance.
        let err = m
            .calculate_stop_loss(
                "AAPL",
                dec(100, 0),
                dec(100, 0),
                PositionSide::Long,
                StopSpec::FixedPct { stop_pct: dec(2, 2) },
            )
            .unwrap_err();
        assert!(matches!(err, Error::RiskLimitExceeded { .. }));
    }
}
