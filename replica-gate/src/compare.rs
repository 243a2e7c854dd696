use std::cmp::Ordering;

use crate::config::GateConfig;
use crate::config::Strategy;
use crate::endpoint::Endpoint;
use crate::endpoint::EndpointRegistry;

/// Orders two endpoints by predicted read quality: lower badness score
/// first. A freshly referenced endpoint (no replies recorded yet)
/// scores `0.0` through the ordinary score formula — its service-time
/// EWMA starts at zero, which zeroes the whole cubic term regardless
/// of queue depth or concurrency compensation — so it naturally sorts
/// as the best possible candidate without any special-cased "unknown"
/// branch.
///
/// Under [`Strategy::Default`] every pair compares equal, so a stable
/// sort over this comparator leaves the snitch's own ordering intact.
pub fn compare_endpoints<E: Endpoint>(
    a: &E,
    b: &E,
    registry: &EndpointRegistry<E>,
    config: &GateConfig,
) -> Ordering {
    if config.strategy == Strategy::Default {
        return Ordering::Equal;
    }

    let n = registry.len() as u32;
    let record_a = registry.get_or_create(a);
    let record_b = registry.get_or_create(b);
    let score_a = record_a.score_tracker().score(n, record_a.pending_count());
    let score_b = record_b.score_tracker().score(n, record_b.pending_count());
    score_a.partial_cmp(&score_b).unwrap_or(Ordering::Equal)
}

#[cfg(test)]
mod tests {
    use super::*;
    use replica_limit::RateLimitConfig;

    #[test]
    fn fresh_endpoints_compare_equal() {
        let registry: EndpointRegistry<&'static str> = EndpointRegistry::new(RateLimitConfig::default());
        let config = GateConfig::default();
        assert_eq!(compare_endpoints(&"a", &"b", &registry, &config), Ordering::Equal);
    }

    #[test]
    fn lower_service_time_ewma_sorts_first() {
        let registry: EndpointRegistry<&'static str> = EndpointRegistry::new(RateLimitConfig::default());
        let config = GateConfig::default();

        let fast = registry.get_or_create(&"fast");
        fast.score_tracker().update(0, 1.0, 2.0);
        let slow = registry.get_or_create(&"slow");
        slow.score_tracker().update(0, 50.0, 100.0);

        assert_eq!(compare_endpoints(&"fast", &"slow", &registry, &config), Ordering::Less);
        assert_eq!(compare_endpoints(&"slow", &"fast", &registry, &config), Ordering::Greater);
    }

    #[test]
    fn default_strategy_always_compares_equal() {
        let registry: EndpointRegistry<&'static str> = EndpointRegistry::new(RateLimitConfig::default());
        let config = GateConfig {
            strategy: Strategy::Default,
            ..GateConfig::default()
        };

        let fast = registry.get_or_create(&"fast");
        fast.score_tracker().update(0, 1.0, 2.0);
        let slow = registry.get_or_create(&"slow");
        slow.score_tracker().update(0, 50.0, 100.0);

        assert_eq!(compare_endpoints(&"fast", &"slow", &registry, &config), Ordering::Equal);
    }
}
