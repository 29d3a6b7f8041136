//! Error types for the statistical-arbitrage engine.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("insufficient data: {0}")]
    DataInsufficient(String),

    #[error("misaligned price data: {0}")]
    DataAlignment(String),

    #[error("validation error: {0}")]
    Validation(String),

    #[error("risk limit exceeded: account risk {account_risk_pct:.4} > max {limit:.4}")]
    RiskLimitExceeded { account_risk_pct: f64, limit: f64 },

    #[error("permission denied: {0}")]
    PermissionDenied(String),
}

pub type Result<T> = std::result::Result<T, Error>;
