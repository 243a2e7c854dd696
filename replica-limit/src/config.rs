use std::time::Duration;

use crate::error::ConfigurationError;

/// Tunables for one endpoint's [`crate::RateController`] and
/// [`crate::ScoreTracker`].
///
/// There is no file-backed loader here — these primitives are embedded
/// library components, constructed programmatically by the owning
/// collaborator (the gate / registry layer). The defaults match the
/// values called out in the specification's configuration table.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RateLimitConfig {
    /// Width of one send-rate / receive-rate slot.
    pub rate_interval: Duration,
    /// `SendLimiter` token cap.
    pub rate_limiter_max_tokens: f64,
    /// Multiplicative decrease factor applied on CUBIC overshoot.
    pub cubic_beta: f64,
    /// Cubic coefficient.
    pub cubic_c: f64,
    /// Maximum single-step rate increase during the CUBIC probing branch.
    pub cubic_smax: f64,
    /// Multiplier on `rate_interval` that forms the overshoot hysteresis window.
    pub cubic_hysteresis_factor: u32,
    /// EWMA smoothing factor applied to score updates.
    pub score_alpha: f64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            rate_interval: Duration::from_millis(20),
            rate_limiter_max_tokens: 200.0,
            cubic_beta: 0.2,
            cubic_c: 4e-6,
            cubic_smax: 10.0,
            cubic_hysteresis_factor: 4,
            score_alpha: 0.9,
        }
    }
}

impl RateLimitConfig {
    /// Validates the configuration, rejecting non-positive intervals, an
    /// out-of-range `cubic_beta`, or an out-of-range `score_alpha`.
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if self.rate_interval.is_zero() {
            return Err(ConfigurationError::NonPositiveInterval(0.0));
        }
        if !(0.0 < self.cubic_beta && self.cubic_beta < 1.0) {
            return Err(ConfigurationError::InvalidBeta(self.cubic_beta));
        }
        if self.rate_limiter_max_tokens <= 0.0 {
            return Err(ConfigurationError::NonPositiveValue {
                field: "rate_limiter_max_tokens",
                value: self.rate_limiter_max_tokens,
            });
        }
        if self.cubic_smax <= 0.0 {
            return Err(ConfigurationError::NonPositiveValue {
                field: "cubic_smax",
                value: self.cubic_smax,
            });
        }
        if self.cubic_c <= 0.0 {
            return Err(ConfigurationError::NonPositiveValue {
                field: "cubic_c",
                value: self.cubic_c,
            });
        }
        if !(0.0 < self.score_alpha && self.score_alpha <= 1.0) {
            return Err(ConfigurationError::InvalidAlpha(self.score_alpha));
        }
        Ok(())
    }

    /// Hysteresis window: `rate_interval * cubic_hysteresis_factor`.
    pub fn hysteresis(&self) -> Duration {
        self.rate_interval * self.cubic_hysteresis_factor
    }
}
