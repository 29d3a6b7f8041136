//! Risk Manager
//!
//! Stop-loss management and circuit breakers for trading safety.

pub mod circuit_breaker;
pub mod stop_loss;

pub use circuit_breaker::{
    BreakerRecord, BreakerStatus, BreakerType, CircuitBreaker, CircuitBreakerConfig,
    CircuitBreakerState, ResetAttempt,
};
pub use stop_loss::{
    CoverageReport, EmergencyUpdate, PositionSide, StopKind, StopLossConfig, StopLossManager,
    StopLossStats, StopRecord, StopSpec, TrailingUpdate,
};
