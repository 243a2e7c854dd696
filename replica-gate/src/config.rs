use replica_limit::RateLimitConfig;

/// Selects whether reads go through adaptive admission control and
/// scoring, or bypass it entirely.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Strategy {
    /// Full rate-adaptive, score-ordered admission control.
    #[default]
    Adaptive,
    /// The core is bypassed: `compare_endpoints` treats every pair as
    /// equal (callers fall back to snitch-only ordering) and
    /// `push_read` treats every candidate as immediately sendable,
    /// admitting every request on its first pass without ever
    /// deferring it to a gate's stash.
    Default,
}

/// Top-level configuration for a replica group's admission gate,
/// wrapping the underlying rate/score primitives' configuration plus
/// the strategy toggle and mailbox sizing.
#[derive(Debug, Clone)]
pub struct GateConfig {
    pub rate_limit: RateLimitConfig,
    pub strategy: Strategy,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            rate_limit: RateLimitConfig::default(),
            strategy: Strategy::default(),
        }
    }
}

impl GateConfig {
    pub fn validate(&self) -> Result<(), replica_limit::ConfigurationError> {
        self.rate_limit.validate()
    }

    pub fn is_adaptive(&self) -> bool {
        matches!(self.strategy, Strategy::Adaptive)
    }
}
