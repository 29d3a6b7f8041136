//! Circuit breakers for emergency trading halts.
//!
//! Each breaker type trips independently and stays latched until it is reset
//! through its own policy. Resets for the latched breakers require the
//! confirmation code generated at trip time; every reset attempt is recorded
//! in an audit log.

use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{error, info, warn};
use uuid::Uuid;

use statarb_core::{Error, Result};

/// Kind of circuit breaker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BreakerType {
    /// Session loss from the start-of-day value.
    DailyLoss,
    /// Drawdown from the peak portfolio value.
    MaxDrawdown,
    /// Run of consecutive losing trades.
    ConsecutiveLosses,
    /// Market volatility (VIX) above threshold.
    VolatilitySpike,
    /// Operator-initiated halt.
    Manual,
}

/// Configuration for circuit breaker thresholds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CircuitBreakerConfig {
    /// Daily loss fraction that halts trading (0.03 = 3%).
    pub daily_loss_limit: Decimal,
    /// Drawdown fraction from peak that halts trading.
    pub max_drawdown_limit: Decimal,
    /// Consecutive losing trades that halt trading.
    pub consecutive_loss_limit: u32,
    /// VIX level that halts trading.
    pub volatility_threshold: Decimal,
    pub daily_loss_enabled: bool,
    pub max_drawdown_enabled: bool,
    pub consecutive_losses_enabled: bool,
    pub volatility_enabled: bool,
    /// How long the VIX must stay below threshold before a volatility
    /// trip auto-resets.
    pub volatility_cooldown_minutes: i64,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            daily_loss_limit: Decimal::new(3, 2),       // 3%
            max_drawdown_limit: Decimal::new(10, 2),    // 10%
            consecutive_loss_limit: 5,
            volatility_threshold: Decimal::new(35, 0),
            daily_loss_enabled: true,
            max_drawdown_enabled: true,
            consecutive_losses_enabled: true,
            volatility_enabled: true,
            volatility_cooldown_minutes: 30,
        }
    }
}

/// Latched state of a single breaker.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BreakerRecord {
    pub tripped: bool,
    pub trip_reason: Option<String>,
    pub tripped_at: Option<DateTime<Utc>>,
    /// Required to reset the breaker; regenerated on every trip.
    pub confirmation_code: Option<String>,
}

/// One reset attempt, accepted or not.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResetAttempt {
    pub breaker: BreakerType,
    pub accepted: bool,
    pub justification: String,
    pub timestamp: DateTime<Utc>,
}

/// Outcome of a full breaker evaluation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BreakerStatus {
    pub trading_allowed: bool,
    pub breakers_tripped: Vec<BreakerType>,
    pub reasons: Vec<String>,
    /// Metrics at 80% or more of their threshold but not tripped.
    pub warnings: Vec<String>,
    pub current_daily_loss_pct: Option<Decimal>,
    pub current_drawdown_pct: Option<Decimal>,
    pub consecutive_losses: u32,
    pub current_vix: Option<Decimal>,
    pub timestamp: DateTime<Utc>,
}

/// Snapshot of breaker internals for dashboards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CircuitBreakerState {
    pub records: HashMap<BreakerType, BreakerRecord>,
    pub peak_portfolio_value: Decimal,
    pub consecutive_losses: u32,
}

#[derive(Debug, Default)]
struct BreakerInner {
    records: HashMap<BreakerType, BreakerRecord>,
    peak_portfolio_value: Decimal,
    consecutive_losses: u32,
    audit_log: Vec<ResetAttempt>,
    /// Since when the VIX has continuously been below threshold.
    vix_below_since: Option<DateTime<Utc>>,
}

impl BreakerInner {
    fn record(&mut self, breaker: BreakerType) -> &mut BreakerRecord {
        self.records.entry(breaker).or_default()
    }

    fn is_tripped(&self, breaker: BreakerType) -> bool {
        self.records.get(&breaker).map(|r| r.tripped).unwrap_or(false)
    }

    fn any_tripped(&self) -> bool {
        self.records.values().any(|r| r.tripped)
    }

    /// Latch a breaker; an already-tripped breaker keeps its original
    /// record and confirmation code.
    fn trip(&mut self, breaker: BreakerType, reason: &str) -> String {
        let record = self.record(breaker);
        if record.tripped {
            return record.confirmation_code.clone().unwrap_or_default();
        }

        let code = Uuid::new_v4().to_string();
        record.tripped = true;
        record.trip_reason = Some(reason.to_string());
        record.tripped_at = Some(Utc::now());
        record.confirmation_code = Some(code.clone());

        error!(
            breaker = ?breaker,
            reason,
            "circuit breaker TRIPPED - trading halted"
        );
        code
    }
}

/// Breaker engine for one account/session.
pub struct CircuitBreaker {
    config: CircuitBreakerConfig,
    inner: Arc<RwLock<BreakerInner>>,
    /// Fast path flag for checking if any breaker is tripped.
    is_tripped: AtomicBool,
}

impl CircuitBreaker {
    pub fn new(config: CircuitBreakerConfig) -> Self {
        Self {
            config,
            inner: Arc::new(RwLock::new(BreakerInner::default())),
            is_tripped: AtomicBool::new(false),
        }
    }

    /// Whether any breaker is currently tripped (fast path).
    pub fn is_tripped(&self) -> bool {
        self.is_tripped.load(Ordering::SeqCst)
    }

    /// Evaluate every enabled breaker against current inputs.
    ///
    /// Fail-safe: a missing or invalid input required by an enabled breaker
    /// trips that breaker instead of skipping the check.
    pub async fn check_breakers(
        &self,
        current_portfolio_value: Decimal,
        start_of_day_value: Option<Decimal>,
        current_vix: Option<Decimal>,
    ) -> BreakerStatus {
        let warn_fraction = Decimal::new(80, 2);
        let mut inner = self.inner.write().await;
        let mut warnings = Vec::new();

        if current_portfolio_value > inner.peak_portfolio_value {
            inner.peak_portfolio_value = current_portfolio_value;
        }

        let portfolio_valid = current_portfolio_value > Decimal::ZERO;

        // Daily loss
        let mut daily_loss_pct = None;
        if self.config.daily_loss_enabled {
            match start_of_day_value {
                Some(start) if start > Decimal::ZERO && portfolio_valid => {
                    let loss_pct = (start - current_portfolio_value) / start;
                    daily_loss_pct = Some(loss_pct);
                    if loss_pct >= self.config.daily_loss_limit {
                        inner.trip(
                            BreakerType::DailyLoss,
                            &format!(
                                "daily loss {:.2}% >= limit {:.2}%",
                                loss_pct * Decimal::ONE_HUNDRED,
                                self.config.daily_loss_limit * Decimal::ONE_HUNDRED
                            ),
                        );
                    } else if loss_pct >= self.config.daily_loss_limit * warn_fraction {
                        warnings.push(format!(
                            "daily loss {:.2}% approaching limit {:.2}%",
                            loss_pct * Decimal::ONE_HUNDRED,
                            self.config.daily_loss_limit * Decimal::ONE_HUNDRED
                        ));
                    }
                }
                _ => {
                    inner.trip(
                        BreakerType::DailyLoss,
                        "missing or invalid start-of-day value for daily loss check",
                    );
                }
            }
        }

        // Drawdown from peak
        let mut drawdown_pct = None;
        if self.config.max_drawdown_enabled {
            if !portfolio_valid {
                inner.trip(
                    BreakerType::MaxDrawdown,
                    "invalid portfolio value for drawdown check",
                );
            } else if inner.peak_portfolio_value > Decimal::ZERO {
                let drawdown =
                    (inner.peak_portfolio_value - current_portfolio_value) / inner.peak_portfolio_value;
                drawdown_pct = Some(drawdown);
                if drawdown >= self.config.max_drawdown_limit {
                    inner.trip(
                        BreakerType::MaxDrawdown,
                        &format!(
                            "drawdown {:.2}% >= limit {:.2}%",
                            drawdown * Decimal::ONE_HUNDRED,
                            self.config.max_drawdown_limit * Decimal::ONE_HUNDRED
                        ),
                    );
                } else if drawdown >= self.config.max_drawdown_limit * warn_fraction {
                    warnings.push(format!(
                        "drawdown {:.2}% approaching limit {:.2}%",
                        drawdown * Decimal::ONE_HUNDRED,
                        self.config.max_drawdown_limit * Decimal::ONE_HUNDRED
                    ));
                }
            }
        }

        // Consecutive losses
        if self.config.consecutive_losses_enabled {
            let losses = inner.consecutive_losses;
            let limit = self.config.consecutive_loss_limit;
            if losses >= limit {
                inner.trip(
                    BreakerType::ConsecutiveLosses,
                    &format!("{} consecutive losses >= limit {}", losses, limit),
                );
            } else if losses as f64 >= 0.8 * limit as f64 {
                warnings.push(format!(
                    "{} consecutive losses approaching limit {}",
                    losses, limit
                ));
            }
        }

        // Volatility spike
        if self.config.volatility_enabled {
            match current_vix {
                Some(vix) if vix > Decimal::ZERO => {
                    if vix >= self.config.volatility_threshold {
                        inner.vix_below_since = None;
                        inner.trip(
                            BreakerType::VolatilitySpike,
                            &format!(
                                "VIX {} >= threshold {}",
                                vix, self.config.volatility_threshold
                            ),
                        );
                    } else {
                        if vix >= self.config.volatility_threshold * warn_fraction {
                            warnings.push(format!(
                                "VIX {} approaching threshold {}",
                                vix, self.config.volatility_threshold
                            ));
                        }
                        self.maybe_auto_reset_volatility(&mut inner);
                    }
                }
                _ => {
                    inner.vix_below_since = None;
                    inner.trip(
                        BreakerType::VolatilitySpike,
                        "missing or invalid VIX for volatility check",
                    );
                }
            }
        }

        let breakers_tripped: Vec<BreakerType> = [
            BreakerType::DailyLoss,
            BreakerType::MaxDrawdown,
            BreakerType::ConsecutiveLosses,
            BreakerType::VolatilitySpike,
            BreakerType::Manual,
        ]
        .into_iter()
        .filter(|b| inner.is_tripped(*b))
        .collect();

        let reasons: Vec<String> = breakers_tripped
            .iter()
            .filter_map(|b| inner.records.get(b).and_then(|r| r.trip_reason.clone()))
            .collect();

        let trading_allowed = breakers_tripped.is_empty();
        self.is_tripped.store(!trading_allowed, Ordering::SeqCst);

        if !trading_allowed {
            warn!(breakers = ?breakers_tripped, "trading blocked by circuit breakers");
        }

        BreakerStatus {
            trading_allowed,
            breakers_tripped,
            reasons,
            warnings,
            current_daily_loss_pct: daily_loss_pct,
            current_drawdown_pct: drawdown_pct,
            consecutive_losses: inner.consecutive_losses,
            current_vix,
            timestamp: Utc::now(),
        }
    }

    /// Raise the stored peak if the given value exceeds it.
    pub async fn update_peak_portfolio_value(&self, value: Decimal) {
        let mut inner = self.inner.write().await;
        if value > inner.peak_portfolio_value {
            inner.peak_portfolio_value = value;
        }
    }

    /// Record a closed trade for the consecutive-loss counter.
    pub async fn record_trade(&self, pnl: Decimal) {
        let mut inner = self.inner.write().await;
        if pnl > Decimal::ZERO {
            inner.consecutive_losses = 0;
        } else {
            inner.consecutive_losses += 1;
        }
    }

    /// Trip a breaker explicitly. Returns the confirmation code required to
    /// reset it.
    pub async fn trip_breaker(&self, breaker: BreakerType, reason: &str) -> String {
        let mut inner = self.inner.write().await;
        let code = inner.trip(breaker, reason);
        self.is_tripped.store(true, Ordering::SeqCst);
        code
    }

    /// Operator halt. Returns the confirmation code.
    pub async fn manual_trip(&self, reason: &str) -> String {
        self.trip_breaker(BreakerType::Manual, reason).await
    }

    /// Reset a tripped breaker with its confirmation code.
    ///
    /// Every attempt, accepted or rejected, lands in the audit log.
    pub async fn reset_breaker(
        &self,
        breaker: BreakerType,
        confirmation_code: &str,
        justification: &str,
    ) -> Result<()> {
        let mut inner = self.inner.write().await;

        let accepted = match inner.records.get(&breaker) {
            Some(record) if record.tripped => {
                record.confirmation_code.as_deref() == Some(confirmation_code)
            }
            _ => false,
        };

        inner.audit_log.push(ResetAttempt {
            breaker,
            accepted,
            justification: justification.to_string(),
            timestamp: Utc::now(),
        });

        if !accepted {
            warn!(breaker = ?breaker, "rejected circuit breaker reset attempt");
            return Err(Error::PermissionDenied(format!(
                "invalid confirmation code or breaker {:?} not tripped",
                breaker
            )));
        }

        inner.records.insert(breaker, BreakerRecord::default());
        let still_tripped = inner.any_tripped();
        self.is_tripped.store(still_tripped, Ordering::SeqCst);

        info!(breaker = ?breaker, justification, "circuit breaker reset");
        Ok(())
    }

    /// Session-start reset: clears the daily loss breaker without a code.
    pub async fn reset_daily(&self) {
        let mut inner = self.inner.write().await;
        inner.records.insert(BreakerType::DailyLoss, BreakerRecord::default());
        let still_tripped = inner.any_tripped();
        self.is_tripped.store(still_tripped, Ordering::SeqCst);
        info!("daily loss breaker reset for new session");
    }

    /// Reset attempts so far, oldest first.
    pub async fn reset_audit(&self) -> Vec<ResetAttempt> {
        self.inner.read().await.audit_log.clone()
    }

    /// Snapshot of breaker internals.
    pub async fn state(&self) -> CircuitBreakerState {
        let inner = self.inner.read().await;
        CircuitBreakerState {
            records: inner.records.clone(),
            peak_portfolio_value: inner.peak_portfolio_value,
            consecutive_losses: inner.consecutive_losses,
        }
    }

    /// Auto-reset a volatility trip once the VIX has stayed below threshold
    /// for the configured cooldown.
    fn maybe_auto_reset_volatility(&self, inner: &mut BreakerInner) {
        if !inner.is_tripped(BreakerType::VolatilitySpike) {
            inner.vix_below_since = None;
            return;
        }

        let now = Utc::now();
        match inner.vix_below_since {
            None => inner.vix_below_since = Some(now),
            Some(since) => {
                if now - since >= Duration::minutes(self.config.volatility_cooldown_minutes) {
                    inner
                        .records
                        .insert(BreakerType::VolatilitySpike, BreakerRecord::default());
                    inner.vix_below_since = None;
                    info!(
                        cooldown_minutes = self.config.volatility_cooldown_minutes,
                        "volatility breaker auto-reset after cooldown"
                    );
                }
            }
        }
    }
}
