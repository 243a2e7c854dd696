use std::time::Duration;

use tracing::trace;
use tracing::warn;

use crate::config::GateConfig;
use crate::config::Strategy;
use crate::endpoint::Endpoint;
use crate::endpoint::EndpointRegistry;
use crate::messaging::Messenger;
use crate::snitch::Snitch;

/// A coordinator read awaiting admission into its replica group's
/// quorum dispatch.
///
/// `handler` is opaque to this subsystem: it is whatever the embedder
/// needs to resume the caller once the read is dispatched (a oneshot
/// sender, a continuation token, `()`). It is carried through
/// unexamined, including across a deferral and later replay.
#[derive(Debug, Clone)]
pub struct ReadRequest<K, Cmd, H> {
    pub key: K,
    pub command: Cmd,
    /// How many replicas the caller originally wanted in the quorum
    /// (one full-data recipient, the rest digest-only). The live
    /// sorted list from the snitch may be probed in its entirety even
    /// when it is longer than this.
    pub original_size: usize,
    pub handler: H,
}

/// Outcome of one admission attempt.
#[derive(Debug)]
pub enum PushOutcome<Req> {
    /// A data request and zero or more digest requests were
    /// dispatched; the caller's read is underway.
    Admitted,
    /// No probed candidate had an immediately available send budget.
    /// `wait` is the shortest time until any candidate's budget
    /// refills; `request` is the original request, to be stashed and
    /// retried once that time elapses.
    Deferred { wait: Duration, request: Req },
}

/// Attempts to admit one read: probes every live replica's send
/// budget, promotes the first available one to the quorum's data
/// recipient, dispatches digests to the remainder (truncated to
/// `request.original_size`), and bumps each dispatched endpoint's
/// pending count.
///
/// Per the specification, admission never throws — it only returns
/// durations — so this is infallible. A failed dispatch (a real
/// [`Messenger`] implementation's `send_data`/`send_digest` returning
/// `Err`) is logged and otherwise ignored rather than aborting
/// admission: the request has already been counted as in flight, and
/// the caller finds out about a lost reply the same way it finds out
/// about a slow one — its own timeout.
///
/// Under [`Strategy::Default`] every candidate is treated as
/// immediately available — the send-budget probe is skipped entirely
/// and the snitch's first live replica is always the data recipient —
/// so this never returns [`PushOutcome::Deferred`] in that mode.
pub async fn push_read<E, K, Cmd, H, S, M>(
    request: ReadRequest<K, Cmd, H>,
    snitch: &S,
    registry: &EndpointRegistry<E>,
    messenger: &M,
    local: &E,
    config: &GateConfig,
) -> PushOutcome<ReadRequest<K, Cmd, H>>
where
    E: Endpoint,
    S: Snitch<K, E>,
    M: Messenger<E, Cmd>,
{
    let mut sorted = snitch.sorted_replicas(&request.key);
    if sorted.is_empty() {
        // No live replicas at all; nothing to admit against. Treat as
        // an immediate, empty admission rather than deferring forever
        // against a budget that will never exist.
        return PushOutcome::Admitted;
    }

    let data_index = if config.strategy == Strategy::Default {
        Some(0)
    } else {
        let mut shortest_wait: Option<Duration> = None;
        let mut found = None;
        for (i, endpoint) in sorted.iter().enumerate() {
            let wait = if endpoint == local {
                0.0
            } else {
                registry.get_or_create(endpoint).rate_controller().try_acquire()
            };
            if wait <= 0.0 {
                found = Some(i);
                break;
            }
            // `try_acquire` reports nanoseconds, per `SendLimiter`'s contract.
            let wait = Duration::from_secs_f64(wait / 1e9);
            shortest_wait = Some(match shortest_wait {
                Some(current) if current <= wait => current,
                _ => wait,
            });
        }

        match found {
            Some(i) => Some(i),
            None => {
                let wait = shortest_wait.unwrap_or(Duration::from_millis(1));
                trace!(?wait, key = ?request.key, "no replica had an available send budget; deferring");
                return PushOutcome::Deferred { wait, request };
            }
        }
    };

    let data_index = data_index.expect("data_index is always set once admission proceeds");
    sorted.swap(0, data_index);
    sorted.truncate(request.original_size.max(1).min(sorted.len()));

    let mut endpoints = sorted.into_iter();
    let data_endpoint = endpoints.next().expect("sorted is non-empty");
    dispatch_data(&data_endpoint, &request.command, registry, messenger, local).await;
    for digest_endpoint in endpoints {
        dispatch_digest(&digest_endpoint, &request.command, registry, messenger, local).await;
    }

    PushOutcome::Admitted
}

async fn dispatch_data<E, Cmd, M>(
    endpoint: &E,
    command: &Cmd,
    registry: &EndpointRegistry<E>,
    messenger: &M,
    local: &E,
) where
    E: Endpoint,
    M: Messenger<E, Cmd>,
{
    if let Err(error) = messenger.send_data(endpoint, command).await {
        warn!(?endpoint, %error, "data dispatch failed");
    }
    // A locally-served read never completes through `MetricsIngress::
    // ingest_reply` — its only completion path is `ingest_local_read`,
    // which by design (per the specification's local-read variant)
    // never touches `PendingCount`. Incrementing it here would leak one
    // unit forever, since nothing downstream ever decrements it back.
    if endpoint != local {
        registry.get_or_create(endpoint).increment_pending();
    }
}

async fn dispatch_digest<E, Cmd, M>(
    endpoint: &E,
    command: &Cmd,
    registry: &EndpointRegistry<E>,
    messenger: &M,
    local: &E,
) where
    E: Endpoint,
    M: Messenger<E, Cmd>,
{
    if let Err(error) = messenger.send_digest(endpoint, command).await {
        warn!(?endpoint, %error, "digest dispatch failed");
    }
    if endpoint != local {
        registry.get_or_create(endpoint).increment_pending();
    }
}
