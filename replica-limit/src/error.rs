/// Errors produced while constructing or configuring the replica-limit primitives.
///
/// These are raised at construction time, never from the hot `try_acquire` /
/// `update_cubic` / `update` paths — those are pure arithmetic and cannot fail.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigurationError {
    /// An interval (rate, receive-rate, or hysteresis) was zero or negative.
    #[error("interval must be positive, got {0:?}")]
    NonPositiveInterval(f64),

    /// `cubic_beta` must lie in the open interval (0, 1).
    #[error("cubic_beta must be in (0, 1), got {0}")]
    InvalidBeta(f64),

    /// A capacity (token bucket max, EWMA alpha) was out of its valid range.
    #[error("{field} must be positive, got {value}")]
    NonPositiveValue { field: &'static str, value: f64 },

    /// `score_alpha` must lie in (0, 1].
    #[error("score_alpha must be in (0, 1], got {0}")]
    InvalidAlpha(f64),
}
