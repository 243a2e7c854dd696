use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Arc;

use dashmap::DashSet;
use opentelemetry::KeyValue;
use opentelemetry::global;
use opentelemetry::metrics::Counter;
use opentelemetry::metrics::Meter;
use tracing::trace;
use tracing::warn;

use crate::endpoint::Endpoint;
use crate::endpoint::EndpointRegistry;

/// The piggybacked queue-depth parameter name the messaging layer is
/// expected to attach to every reply's metadata map.
pub const QSZ: &str = "QSZ";
/// The piggybacked service-time parameter name (nanoseconds, big-endian
/// signed 64-bit) the messaging layer is expected to attach to every
/// reply's metadata map.
pub const MU: &str = "MU";

/// A reply's metadata map, as delivered by the messaging layer: each
/// named parameter is a length-prefixed byte string. This subsystem
/// does not define the wire format that produced this map — only that
/// [`QSZ`] and [`MU`] are present and hold big-endian integers of the
/// documented width.
pub type ReplyMetadata = HashMap<String, Vec<u8>>;

/// The two piggybacked values a reply must carry for metrics ingress to
/// proceed, plus the coordinator's own observed round-trip latency.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReplyMetrics {
    pub queue_size: u32,
    pub service_time_ns: i64,
    pub latency_ns: i64,
}

impl ReplyMetrics {
    /// Decodes `QSZ` (big-endian u32) and `MU` (big-endian i64) out of a
    /// reply's metadata map. Returns `None` — the `MissingMetric` error
    /// kind from the specification's error handling design — if either
    /// parameter is absent or the wrong width; that is treated as a
    /// malformed reply, not a crash.
    pub fn decode(metadata: &ReplyMetadata, latency_ns: i64) -> Option<Self> {
        let qsz = metadata.get(QSZ)?;
        let mu = metadata.get(MU)?;
        let queue_size = u32::from_be_bytes(qsz.as_slice().try_into().ok()?);
        let service_time_ns = i64::from_be_bytes(mu.as_slice().try_into().ok()?);
        Some(Self {
            queue_size,
            service_time_ns,
            latency_ns,
        })
    }
}

#[derive(Clone)]
struct IngressInstruments {
    missing_metric: Counter<u64>,
    invariant_violation: Counter<u64>,
}

impl IngressInstruments {
    fn new(meter: &Meter) -> Self {
        Self {
            missing_metric: meter.u64_counter("replica_gate.missing_metric").build(),
            invariant_violation: meter.u64_counter("replica_gate.invariant_violation").build(),
        }
    }
}

/// The hook the messaging layer calls on every completed reply and on
/// locally-served reads, updating `PendingCount`, the `RateController`,
/// and the `ScoreTracker` for one endpoint.
///
/// Construction is cheap (an `opentelemetry` meter lookup); a single
/// instance is meant to be shared across every reply for the process's
/// lifetime, mirroring how `EndpointRegistry` is shared.
#[derive(Clone)]
pub struct MetricsIngress {
    instruments: IngressInstruments,
}

impl Default for MetricsIngress {
    fn default() -> Self {
        Self::new()
    }
}

impl MetricsIngress {
    pub fn new() -> Self {
        Self {
            instruments: IngressInstruments::new(&global::meter("replica_gate")),
        }
    }

    /// Steps 1-4 of the specification's `MetricsIngress`: receive-tick,
    /// CUBIC update, pending decrement, score update — in that order,
    /// with steps 1-3 applied atomically per endpoint via the rate
    /// controller's own internal mutex and the pending counter's atomic
    /// decrement.
    ///
    /// `metadata` is decoded with [`ReplyMetrics::decode`]; a decode
    /// failure is the `MissingMetric` error kind: the reply is dropped
    /// from scoring, but `PendingCount` is still decremented so the
    /// counter cannot leak.
    pub fn ingest_reply<E: Endpoint>(
        &self,
        registry: &EndpointRegistry<E>,
        endpoint: &E,
        metadata: &ReplyMetadata,
        latency_ns: i64,
    ) {
        let record = registry.get_or_create(endpoint);

        match ReplyMetrics::decode(metadata, latency_ns) {
            Some(metrics) => {
                record.rate_controller().on_reply();
                record.decrement_pending();

                let service_time_ms = metrics.service_time_ns as f64 / 1e6;
                let latency_ms = metrics.latency_ns as f64 / 1e6;
                if latency_ms <= service_time_ms {
                    self.instruments.invariant_violation.add(1, &[]);
                }
                record
                    .score_tracker()
                    .update(metrics.queue_size, service_time_ms, latency_ms);
            }
            None => {
                warn!(?endpoint, "reply missing QSZ/MU metadata; dropping from metrics ingress");
                self.instruments.missing_metric.add(1, &[]);
                record.decrement_pending();
            }
        }
    }

    /// The local-read variant: no network round trip occurred, so there
    /// is no `PendingCount` entry to decrement and response time equals
    /// service time exactly (a loopback read cannot "wait" on itself).
    pub fn ingest_local_read<E: Endpoint>(
        &self,
        registry: &EndpointRegistry<E>,
        endpoint: &E,
        queue_size: u32,
        service_time_ms: f64,
    ) {
        let record = registry.get_or_create(endpoint);
        record.score_tracker().update_local(queue_size, service_time_ms);
        trace!(?endpoint, service_time_ms, "ingested local read");
    }
}

/// Enforces "exactly one decrement of `PendingCount` per dispatched
/// (endpoint, request) pair across reply receipt and timeout paths"
/// (`I4`/`P6`) when both paths race against the same completion.
///
/// A dispatched request is `register`ed once; whichever of "reply
/// arrived" or "request timed out" calls `complete` first performs the
/// side effect (the decrement), and the loser observes `false` and
/// skips it. This generalizes `EndpointRegistry`'s put-if-absent
/// discipline (`I1`) to a remove-once discipline over request
/// identities instead of endpoint identities.
pub struct CompletionTracker<Id: Eq + Hash + Send + Sync + 'static> {
    inflight: Arc<DashSet<Id>>,
}

impl<Id: Eq + Hash + Clone + Send + Sync + 'static> Default for CompletionTracker<Id> {
    fn default() -> Self {
        Self::new()
    }
}

impl<Id: Eq + Hash + Clone + Send + Sync + 'static> CompletionTracker<Id> {
    pub fn new() -> Self {
        Self {
            inflight: Arc::new(DashSet::new()),
        }
    }

    /// Marks `id` as dispatched and awaiting exactly one completion.
    pub fn register(&self, id: Id) {
        self.inflight.insert(id);
    }

    /// Attempts to complete `id`. Returns `true` exactly once per
    /// registered id — the side that wins should perform the
    /// `PendingCount` decrement; the losing side (a late reply racing a
    /// timeout, or vice versa) must not.
    pub fn complete(&self, id: &Id) -> bool {
        self.inflight.remove(id).is_some()
    }
}
