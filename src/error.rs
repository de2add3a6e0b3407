use thiserror::Error;

use crate::scheduler::Phase;

#[derive(Debug, Error)]
pub enum SpiralError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("decode error: {0}")]
    Decode(String),

    #[error("scheduler is {actual:?}, expected {expected:?}")]
    InvalidState { expected: Phase, actual: Phase },

    /// Never propagated out of the scheduler, only logged.
    #[error("clock went backward from {last_ms:.1}ms to {observed_ms:.1}ms")]
    ClockRegression { last_ms: f64, observed_ms: f64 },
}

impl SpiralError {
    pub fn invalid(msg: impl Into<String>) -> Self {
        Self::InvalidArgument(msg.into())
    }

    pub fn decode(msg: impl Into<String>) -> Self {
        Self::Decode(msg.into())
    }
}

pub type Result<T> = std::result::Result<T, SpiralError>;
