/// Supplies the live, ordered list of replicas holding a given key.
///
/// This subsystem never decides cluster membership or replica
/// liveness itself — it defers to a `Snitch` for "what replicas exist
/// for this key, and in what preferred order", then re-orders and
/// throttles within that list. Grounded on the same seam
/// `tower-shot`'s layers leave for their wrapped `Service`: collaborator
/// behavior is injected, never hard-coded.
pub trait Snitch<K, E>: Send + Sync {
    /// Live replicas for `key`, in the snitch's own preferred order
    /// (typically proximity/topology based). May return fewer entries
    /// than the nominal replication factor if replicas are down.
    fn sorted_replicas(&self, key: &K) -> Vec<E>;
}

/// A fixed-table test double: every key maps to the same pre-sorted
/// replica list, regardless of what key is asked for.
#[derive(Debug, Clone)]
pub struct StaticSnitch<E> {
    replicas: Vec<E>,
}

impl<E: Clone> StaticSnitch<E> {
    pub fn new(replicas: Vec<E>) -> Self {
        Self { replicas }
    }
}

impl<K, E: Clone + Send + Sync> Snitch<K, E> for StaticSnitch<E> {
    fn sorted_replicas(&self, _key: &K) -> Vec<E> {
        self.replicas.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn static_snitch_ignores_the_key() {
        let snitch = StaticSnitch::new(vec!["a", "b", "c"]);
        assert_eq!(snitch.sorted_replicas(&1), vec!["a", "b", "c"]);
        assert_eq!(snitch.sorted_replicas(&2), vec!["a", "b", "c"]);
    }
}
