//! Chronological replay of the pair state machine over historical prices.
//!
//! The replay computes the rolling z-score over the pre-built spread series
//! and feeds it through the same transition rules as live monitoring, so a
//! pair behaves identically in backtest and production.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use pairs_strategy::{evaluate_transition, spread_series, window_z_score, StrategyConfig};
use statarb_core::{Error, PairStatus, PriceHistory, Result, SignalType, TradingPair};

/// Configuration for a backtest run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BacktestConfig {
    /// Capital allocated to each pair.
    pub initial_capital: f64,
    /// Strategy parameters, shared with the live signal engine.
    pub strategy: StrategyConfig,
}

impl Default for BacktestConfig {
    fn default() -> Self {
        Self {
            initial_capital: 100_000.0,
            strategy: StrategyConfig::default(),
        }
    }
}

/// Direction of a spread position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TradeDirection {
    /// Long asset A, short β units of asset B.
    LongSpread,
    /// Short asset A, long β units of asset B.
    ShortSpread,
}

/// One closed round trip.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradeRecord {
    pub id: Uuid,
    pub direction: TradeDirection,
    pub entry_time: DateTime<Utc>,
    pub exit_time: DateTime<Utc>,
    pub entry_z_score: f64,
    pub exit_z_score: f64,
    pub entry_price_a: f64,
    pub entry_price_b: f64,
    pub exit_price_a: f64,
    pub exit_price_b: f64,
    /// Shared unit count for both legs (dollar-neutral sizing).
    pub units: f64,
    pub holding_days: i64,
    /// What closed the trade: `Exit` (mean reversion or time limit) or `Stop`.
    pub exit_signal: SignalType,
    pub pnl: f64,
}

/// Result of backtesting a single pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BacktestResult {
    /// Pair label, e.g. `AAPL/MSFT`.
    pub pair: String,
    pub total_trades: usize,
    pub winning_trades: usize,
    pub losing_trades: usize,
    pub win_rate: f64,
    /// Realized PnL over all closed trades.
    pub total_pnl: f64,
    /// Total return over initial capital, in percent.
    pub return_pct: f64,
    /// Realized capital plus mark-to-market of any position still open.
    pub final_capital: f64,
    /// Mark-to-market of the open position at the last observation, if any.
    pub open_position_pnl: f64,
    pub trades: Vec<TradeRecord>,
    /// Realized capital plus open mark-to-market at every replayed step.
    pub equity_curve: Vec<(DateTime<Utc>, f64)>,
}

struct OpenPosition {
    direction: TradeDirection,
    entry_time: DateTime<Utc>,
    entry_z_score: f64,
    entry_price_a: f64,
    entry_price_b: f64,
    units: f64,
}

impl OpenPosition {
    /// PnL of the spread position at the given leg prices.
    fn mark_to_market(&self, price_a: f64, price_b: f64, hedge_ratio: f64) -> f64 {
        let spread_move =
            (price_a - self.entry_price_a) - hedge_ratio * (price_b - self.entry_price_b);
        match self.direction {
            TradeDirection::LongSpread => self.units * spread_move,
            TradeDirection::ShortSpread => -self.units * spread_move,
        }
    }
}

/// Replays the pair state machine over a price history.
pub struct PairBacktester {
    config: BacktestConfig,
}

impl PairBacktester {
    pub fn new(config: BacktestConfig) -> Self {
        Self { config }
    }

    /// Backtest a single pair chronologically.
    ///
    /// The replay starts once a full z-score window is available. Entries are
    /// sized dollar-neutral: `units = capital / (price_a + β·price_b)`. A
    /// position still open at the last observation is marked-to-market in
    /// `final_capital` but not counted as a closed trade.
    pub fn backtest_pair(
        &self,
        pair: &TradingPair,
        price_data: &PriceHistory,
    ) -> Result<BacktestResult> {
        let window = self.config.strategy.z_score_window;
        let (a, b) = price_data.aligned_pair(&pair.asset_a, &pair.asset_b)?;
        if a.len() <= window {
            return Err(Error::DataInsufficient(format!(
                "backtest needs more than {} observations, got {}",
                window,
                a.len()
            )));
        }

        let spread = spread_series(a, b, pair.hedge_ratio);

        let mut capital = self.config.initial_capital;
        let mut status = PairStatus::NoPosition;
        let mut open: Option<OpenPosition> = None;
        let mut trades: Vec<TradeRecord> = Vec::new();
        let mut equity_curve = Vec::with_capacity(spread.len() - window);

        for i in window..spread.len() {
            let timestamp = price_data.timestamp(i).ok_or_else(|| {
                Error::DataAlignment(format!("no timestamp for observation {}", i))
            })?;
            let (z_score, _, _, _) = window_z_score(&spread[i + 1 - window..=i]);

            match evaluate_transition(status, z_score, &self.config.strategy) {
                Some(SignalType::EntryLong) | Some(SignalType::EntryShort)
                    if open.is_none() =>
                {
                    let direction = if z_score < 0.0 {
                        TradeDirection::LongSpread
                    } else {
                        TradeDirection::ShortSpread
                    };
                    let gross = a[i] + pair.hedge_ratio * b[i];
                    if gross <= 0.0 {
                        warn!(
                            pair = %pair.label(),
                            price_a = a[i],
                            price_b = b[i],
                            "non-positive entry notional, skipping entry"
                        );
                    } else {
                        open = Some(OpenPosition {
                            direction,
                            entry_time: timestamp,
                            entry_z_score: z_score,
                            entry_price_a: a[i],
                            entry_price_b: b[i],
                            units: capital / gross,
                        });
                        status = match direction {
                            TradeDirection::LongSpread => PairStatus::LongSpread,
                            TradeDirection::ShortSpread => PairStatus::ShortSpread,
                        };
                    }
                }
                Some(signal @ (SignalType::Exit | SignalType::Stop)) => {
                    if let Some(position) = open.take() {
                        let pnl = position.mark_to_market(a[i], b[i], pair.hedge_ratio);
                        capital += pnl;
                        trades.push(close_trade(
                            position, timestamp, z_score, a[i], b[i], signal, pnl,
                        ));
                    }
                    status = if signal == SignalType::Stop {
                        PairStatus::CointegrationBroken
                    } else {
                        PairStatus::NoPosition
                    };
                }
                _ => {
                    // Time limit: force-close a stale position at the current bar.
                    let expired = open.as_ref().is_some_and(|p| {
                        (timestamp - p.entry_time).num_days()
                            >= self.config.strategy.max_holding_days as i64
                    });
                    if expired {
                        if let Some(position) = open.take() {
                            let pnl = position.mark_to_market(a[i], b[i], pair.hedge_ratio);
                            capital += pnl;
                            trades.push(close_trade(
                                position,
                                timestamp,
                                z_score,
                                a[i],
                                b[i],
                                SignalType::Exit,
                                pnl,
                            ));
                            status = PairStatus::NoPosition;
                        }
                    }
                }
            }

            let mark = open
                .as_ref()
                .map(|p| p.mark_to_market(a[i], b[i], pair.hedge_ratio))
                .unwrap_or(0.0);
            equity_curve.push((timestamp, capital + mark));
        }

        let last = spread.len() - 1;
        let open_position_pnl = open
            .as_ref()
            .map(|p| p.mark_to_market(a[last], b[last], pair.hedge_ratio))
            .unwrap_or(0.0);
        let final_capital = capital + open_position_pnl;

        let winning_trades = trades.iter().filter(|t| t.pnl > 0.0).count();
        let losing_trades = trades.len() - winning_trades;
        let win_rate = if trades.is_empty() {
            0.0
        } else {
            winning_trades as f64 / trades.len() as f64
        };
        let total_pnl: f64 = trades.iter().map(|t| t.pnl).sum();
        let return_pct =
            (final_capital - self.config.initial_capital) / self.config.initial_capital * 100.0;

        info!(
            pair = %pair.label(),
            trades = trades.len(),
            win_rate,
            return_pct,
            "backtest completed"
        );

        Ok(BacktestResult {
            pair: pair.label(),
            total_trades: trades.len(),
            winning_trades,
            losing_trades,
            win_rate,
            total_pnl,
            return_pct,
            final_capital,
            open_position_pnl,
            trades,
            equity_curve,
        })
    }

    /// Backtest every pair and rank the results by return, best first.
    ///
    /// Pairs that fail to backtest are logged and skipped rather than failing
    /// the whole batch.
    pub fn validate_pairs(
        &self,
        pairs: &[TradingPair],
        price_data: &PriceHistory,
    ) -> Result<Vec<BacktestResult>> {
        let mut results = Vec::with_capacity(pairs.len());
        for pair in pairs {
            match self.backtest_pair(pair, price_data) {
                Ok(result) => results.push(result),
                Err(e) => {
                    warn!(pair = %pair.label(), error = %e, "pair backtest failed");
                }
            }
        }

        results.sort_by(|x, y| {
            y.return_pct
                .partial_cmp(&x.return_pct)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        Ok(results)
    }
}

fn close_trade(
    position: OpenPosition,
    exit_time: DateTime<Utc>,
    exit_z_score: f64,
    exit_price_a: f64,
    exit_price_b: f64,
    exit_signal: SignalType,
    pnl: f64,
) -> TradeRecord {
    TradeRecord {
        id: Uuid::new_v4(),
        direction: position.direction,
        entry_time: position.entry_time,
        exit_time,
        entry_z_score: position.entry_z_score,
        exit_z_score,
        entry_price_a: position.entry_price_a,
        entry_price_b: position.entry_price_b,
        exit_price_a,
        exit_price_b,
        units: position.units,
        holding_days: (exit_time - position.entry_time).num_days(),
        exit_signal,
        pnl,
    }
}
