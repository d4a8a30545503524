//! Errors reported by the scheduler and the reference clocks.

use thiserror::Error;

/// Everything that can go wrong while generating, anchoring or registering a series.
///
/// Errors are always raised at the call that detects them, never at firing time.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PhiError {
    #[error("invalid argument `{name}`: {reason}")]
    InvalidArgument { name: &'static str, reason: String },

    #[error("length mismatch: {offsets} offsets for {identifiers} identifiers")]
    LengthMismatch { offsets: usize, identifiers: usize },

    #[error("clock unavailable: {0}")]
    ClockUnavailable(String),
}

impl PhiError {
    pub(crate) fn invalid(name: &'static str, reason: impl Into<String>) -> Self {
        PhiError::InvalidArgument {
            name,
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, PhiError>;

/// Reject non-finite and non-positive values.
pub(crate) fn require_positive(name: &'static str, x: f64) -> Result<f64> {
    if !x.is_finite() {
        return Err(PhiError::invalid(name, format!("must be finite, got {x}")));
    }
    if x <= 0.0 {
        return Err(PhiError::invalid(name, format!("must be positive, got {x}")));
    }
    Ok(x)
}

/// Reject NaN and infinities.
pub(crate) fn require_finite(name: &'static str, x: f64) -> Result<f64> {
    if x.is_finite() {
        Ok(x)
    } else {
        Err(PhiError::invalid(name, format!("must be finite, got {x}")))
    }
}
