use std::hash::Hash;
use std::sync::Arc;
use std::sync::atomic::AtomicI32;
use std::sync::atomic::Ordering;

use dashmap::DashMap;
use replica_limit::RateController;
use replica_limit::RateLimitConfig;
use replica_limit::ScoreTracker;

/// The initial send rate a freshly created [`RateController`] starts at,
/// before any reply has arrived to retarget it (specification end-to-end
/// scenario 1: "initial rate = 1").
const INITIAL_SEND_RATE: f64 = 1.0;

/// Marker bound for anything usable as a replica identity: opaque,
/// hashable, equatable, cheap to clone, and shareable across the
/// registry's concurrent map and the per-group gate tasks.
pub trait Endpoint: Eq + Hash + Clone + Send + Sync + std::fmt::Debug + 'static {}

impl<T> Endpoint for T where T: Eq + Hash + Clone + Send + Sync + std::fmt::Debug + 'static {}

/// The per-endpoint state this subsystem owns: in-flight read count,
/// send-rate controller, and score tracker.
///
/// `EndpointRegistry` is the exclusive owner of every `EndpointRecord`;
/// nothing outside it holds a `&mut` reference, matching `I1`.
#[derive(Debug)]
pub struct EndpointRecord {
    pending: AtomicI32,
    rate_controller: RateController,
    score_tracker: ScoreTracker,
}

impl EndpointRecord {
    fn new(config: &RateLimitConfig) -> Self {
        Self {
            pending: AtomicI32::new(0),
            rate_controller: RateController::new(config, INITIAL_SEND_RATE),
            score_tracker: ScoreTracker::new(config.score_alpha),
        }
    }

    pub fn pending_count(&self) -> i32 {
        self.pending.load(Ordering::Relaxed)
    }

    pub fn rate_controller(&self) -> &RateController {
        &self.rate_controller
    }

    pub fn score_tracker(&self) -> &ScoreTracker {
        &self.score_tracker
    }

    pub(crate) fn increment_pending(&self) {
        self.pending.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn decrement_pending(&self) {
        self.pending.fetch_sub(1, Ordering::Relaxed);
    }
}

/// Concurrent map from endpoint identity to its `{pending, rate
/// controller, score tracker}` record.
///
/// Creation is lazy and at-most-once: concurrent first references to
/// the same endpoint race on `dashmap`'s `entry` API, and the losing
/// side's freshly built `EndpointRecord` is simply dropped, per `I1`.
/// This generalizes `nowhere-actors::registry::Registry`'s
/// type-indexed put-if-absent map to a single resource kind keyed by
/// endpoint identity.
#[derive(Debug)]
pub struct EndpointRegistry<E: Endpoint> {
    records: DashMap<E, Arc<EndpointRecord>>,
    config: RateLimitConfig,
}

impl<E: Endpoint> EndpointRegistry<E> {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            records: DashMap::new(),
            config,
        }
    }

    /// Returns the endpoint's record, creating it on first reference.
    pub fn get_or_create(&self, endpoint: &E) -> Arc<EndpointRecord> {
        if let Some(existing) = self.records.get(endpoint) {
            return existing.clone();
        }
        self.records
            .entry(endpoint.clone())
            .or_insert_with(|| Arc::new(EndpointRecord::new(&self.config)))
            .clone()
    }

    /// Cardinality of all endpoints ever observed by this registry —
    /// the `n` in the score formula's `concurrency_compensation` term.
    /// See `SPEC_FULL.md`'s Open Question (b): this is the
    /// all-endpoints-ever-seen count, not the active replica group size.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_reference_creates_exactly_one_record() {
        let registry: EndpointRegistry<&'static str> = EndpointRegistry::new(RateLimitConfig::default());
        let a = registry.get_or_create(&"node-1");
        let b = registry.get_or_create(&"node-1");
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn distinct_endpoints_get_distinct_records() {
        let registry: EndpointRegistry<&'static str> = EndpointRegistry::new(RateLimitConfig::default());
        let a = registry.get_or_create(&"node-1");
        let b = registry.get_or_create(&"node-2");
        assert!(!Arc::ptr_eq(&a, &b));
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn pending_count_increments_and_decrements() {
        let registry: EndpointRegistry<&'static str> = EndpointRegistry::new(RateLimitConfig::default());
        let record = registry.get_or_create(&"node-1");
        assert_eq!(record.pending_count(), 0);
        record.increment_pending();
        record.increment_pending();
        assert_eq!(record.pending_count(), 2);
        record.decrement_pending();
        assert_eq!(record.pending_count(), 1);
    }
}
