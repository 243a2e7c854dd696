use std::sync::Mutex;
use std::time::Duration;

use quanta::Clock;
use quanta::Instant;

/// Floor below which a configured rate is clamped, so that
/// `try_acquire`'s wait-time division can never divide by (near) zero.
const RATE_EPSILON: f64 = 0.1;

#[derive(Debug)]
struct State {
    rate: f64,
    balance: f64,
    last_refill: Instant,
}

/// A continuous-refill token bucket permit issuer.
///
/// Unlike `shot-limit`'s integer-incrementing [`TokenBucket`][tb] (which
/// adds whole tokens once per elapsed interval), `SendLimiter` refills
/// fractionally on every call: the balance advances by
/// `rate * elapsed / interval` each time `try_acquire` is evaluated, so
/// a caller sampling more often than `interval` still observes the
/// correct long-run rate. The one-limiter-per-endpoint design keeps the
/// hot path down to a single mutex over plain floats — no I/O, no
/// `await`, lock durations sub-microsecond.
///
/// [tb]: https://docs.rs/shot-limit (sibling crate's design; not depended on here)
#[derive(Debug)]
pub struct SendLimiter {
    max_tokens: f64,
    interval_ns: f64,
    clock: Clock,
    state: Mutex<State>,
}

impl SendLimiter {
    /// Creates a limiter starting at `initial_rate` tokens/interval, with
    /// a full balance (`max_tokens`).
    pub fn new(initial_rate: f64, max_tokens: f64, interval: Duration) -> Self {
        Self::with_clock(initial_rate, max_tokens, interval, Clock::new())
    }

    /// Creates a limiter driven by a caller-supplied [`quanta::Clock`],
    /// letting tests substitute [`Clock::mock`] for deterministic time.
    pub fn with_clock(initial_rate: f64, max_tokens: f64, interval: Duration, clock: Clock) -> Self {
        let now = clock.now();
        Self {
            max_tokens,
            interval_ns: interval.as_nanos() as f64,
            clock,
            state: Mutex::new(State {
                rate: initial_rate.max(RATE_EPSILON),
                balance: max_tokens,
                last_refill: now,
            }),
        }
    }

    /// Attempts to consume one token. Returns `0.0` if granted, otherwise
    /// the nanoseconds until the next token will be available at the
    /// current rate. Never blocks.
    pub fn try_acquire(&self) -> f64 {
        let now = self.clock.now();
        let mut state = self.state.lock().expect("send limiter mutex poisoned");

        let dt = now.saturating_duration_since(state.last_refill).as_nanos() as f64;
        let refilled = state.balance + state.rate * dt / self.interval_ns;
        let balance_prime = refilled.min(self.max_tokens);

        if balance_prime >= 1.0 {
            state.balance = balance_prime - 1.0;
            state.last_refill = now;
            0.0
        } else {
            (1.0 - balance_prime) * self.interval_ns / state.rate
        }
    }

    /// Current target rate, in tokens per `interval`.
    pub fn rate(&self) -> f64 {
        self.state.lock().expect("send limiter mutex poisoned").rate
    }

    /// Updates the target rate, clamping to [`RATE_EPSILON`] so the
    /// refill arithmetic can never divide by (near) zero.
    pub fn set_rate(&self, r: f64) {
        let mut state = self.state.lock().expect("send limiter mutex poisoned");
        state.rate = r.max(RATE_EPSILON);
    }

    /// The configured token cap (`max_tokens`), for invariant checks.
    pub fn max_tokens(&self) -> f64 {
        self.max_tokens
    }
}
