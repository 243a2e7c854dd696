use std::sync::Mutex;

use tracing::error;

#[derive(Debug, Clone, Copy)]
struct Ewma {
    queue: f64,
    service: f64,
    wait: f64,
    seeded: bool,
}

/// Per-replica EWMA-smoothed queue/service/response estimates, combined
/// into a cubic-weighted badness score.
///
/// Modeled on the same shape as a Peak-EWMA RTT estimate (decaying
/// smoothed latency guarded by a single mutex, touched only on reply
/// receipt and on score reads) but carrying three independent EWMAs
/// instead of one, and folding in the coordinator's own in-flight
/// request count as a multiplicative penalty.
#[derive(Debug)]
pub struct ScoreTracker {
    alpha: f64,
    state: Mutex<Ewma>,
}

impl ScoreTracker {
    pub fn new(alpha: f64) -> Self {
        Self {
            alpha,
            state: Mutex::new(Ewma {
                queue: 0.0,
                service: 0.0,
                wait: 0.0,
                seeded: false,
            }),
        }
    }

    /// Blends a fresh `(queue_size, service_time_ms, latency_ms)` sample
    /// into the three EWMAs. The very first sample a tracker ever sees
    /// seeds `Q`/`S`/`W` directly from that sample instead of blending
    /// against an assumed-zero prior — the same first-observation
    /// resolution [`crate::ReceiveRateTracker::add`] already applies, and
    /// the one the specification's own worked example assumes (a single
    /// reply must produce `score = (1 + Q)^3 * S` from that reply's raw
    /// values, not a 90%-damped fraction of them).
    ///
    /// `latency_ms` must be strictly greater than `service_time_ms` — a
    /// reply cannot take less time, end to end, than the server spent
    /// servicing it. Per the specification this is a data-integrity bug
    /// rather than normal operation: in debug builds it is caught early
    /// by `debug_assert!`; in all builds, a violation is logged and the
    /// sample is skipped rather than corrupting the wait-time EWMA with
    /// a negative value.
    pub fn update(&self, queue_size: u32, service_time_ms: f64, latency_ms: f64) {
        debug_assert!(
            latency_ms > service_time_ms,
            "latency_ms ({latency_ms}) must exceed service_time_ms ({service_time_ms})"
        );
        if latency_ms <= service_time_ms {
            error!(
                service_time_ms,
                latency_ms, "invariant violation: service_time >= latency; skipping score update"
            );
            return;
        }

        let mut state = self.state.lock().expect("score tracker mutex poisoned");
        let wait_sample = latency_ms - service_time_ms;
        if state.seeded {
            state.queue = self.alpha * queue_size as f64 + (1.0 - self.alpha) * state.queue;
            state.service = self.alpha * service_time_ms + (1.0 - self.alpha) * state.service;
            state.wait = self.alpha * wait_sample + (1.0 - self.alpha) * state.wait;
        } else {
            state.queue = queue_size as f64;
            state.service = service_time_ms;
            state.wait = wait_sample;
            state.seeded = true;
        }
    }

    /// Blends a fresh `(queue_size, service_time_ms)` sample from a
    /// locally-served read, where response time equals service time by
    /// construction (no network round trip occurred, so there is
    /// nothing to wait on). Unlike [`Self::update`], this never checks
    /// `latency > service_time` — that invariant describes replies that
    /// actually crossed the network; a loopback read does not. The first
    /// sample seeds `Q`/`S` directly, same as [`Self::update`].
    pub fn update_local(&self, queue_size: u32, service_time_ms: f64) {
        let mut state = self.state.lock().expect("score tracker mutex poisoned");
        if state.seeded {
            state.queue = self.alpha * queue_size as f64 + (1.0 - self.alpha) * state.queue;
            state.service = self.alpha * service_time_ms + (1.0 - self.alpha) * state.service;
            state.wait = (1.0 - self.alpha) * state.wait;
        } else {
            state.queue = queue_size as f64;
            state.service = service_time_ms;
            state.wait = 0.0;
            state.seeded = true;
        }
    }

    /// Computes the badness score given the coordinator's endpoint
    /// cardinality `n` and this endpoint's current pending-read count
    /// `pending`. Lower is better.
    ///
    /// `n` is the cardinality of the registry of all endpoints ever
    /// seen by this coordinator (not just the endpoints in the current
    /// replica group) — this ambiguity is called out explicitly in the
    /// specification's open questions and resolved there in favor of
    /// the source's literal behavior.
    pub fn score(&self, n: u32, pending: i32) -> f64 {
        let state = self.state.lock().expect("score tracker mutex poisoned");
        let concurrency_compensation = n as f64 * pending as f64;
        state.wait + (1.0 + state.queue + concurrency_compensation).powi(3) * state.service
    }
}
