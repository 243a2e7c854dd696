use std::sync::Mutex;
use std::time::Duration;

use quanta::Clock;
use quanta::Instant;

use crate::config::RateLimitConfig;
use crate::receive_rate::ReceiveRateTracker;
use crate::send_limiter::SendLimiter;

const OVERSHOOT_FLOOR: f64 = 0.1;

#[derive(Debug)]
struct CubicState {
    /// Rate observed at the last downward (overshoot) step.
    r_max: f64,
    /// Wall-clock time of the last decrease.
    t_dec: f64,
    /// Wall-clock time of the last increase.
    t_inc: f64,
}

/// Owns one endpoint's [`SendLimiter`] and [`ReceiveRateTracker`], and
/// runs the CUBIC update that retargets the send rate whenever a reply
/// arrives.
///
/// The curve increases slowly right after an overshoot (near `Rmax`,
/// where the last overshoot happened) and accelerates the longer it has
/// been since — giving rapid recovery after a transient slowdown while
/// staying stable once the send rate tracks the measured receive rate.
/// This is the same shape as TCP CUBIC congestion control, substituting
/// "replica reply rate" for "ACK rate".
#[derive(Debug)]
pub struct RateController {
    send_limiter: SendLimiter,
    receive_tracker: ReceiveRateTracker,
    beta: f64,
    c: f64,
    smax: f64,
    hysteresis_ms: f64,
    clock: Clock,
    anchor: Instant,
    state: Mutex<CubicState>,
}

impl RateController {
    /// Constructs a controller from a validated [`RateLimitConfig`],
    /// starting the send rate at `initial_rate` tokens/interval.
    pub fn new(config: &RateLimitConfig, initial_rate: f64) -> Self {
        Self::with_clock(config, initial_rate, Clock::new())
    }

    pub fn with_clock(config: &RateLimitConfig, initial_rate: f64, clock: Clock) -> Self {
        let anchor = clock.now();
        Self {
            send_limiter: SendLimiter::with_clock(
                initial_rate,
                config.rate_limiter_max_tokens,
                config.rate_interval,
                clock.clone(),
            ),
            receive_tracker: ReceiveRateTracker::with_clock(config.rate_interval, clock.clone()),
            beta: config.cubic_beta,
            c: config.cubic_c,
            smax: config.cubic_smax,
            hysteresis_ms: config.hysteresis().as_secs_f64() * 1000.0,
            clock,
            anchor,
            state: Mutex::new(CubicState {
                r_max: initial_rate,
                t_dec: 0.0,
                t_inc: 0.0,
            }),
        }
    }

    pub fn send_limiter(&self) -> &SendLimiter {
        &self.send_limiter
    }

    pub fn receive_tracker(&self) -> &ReceiveRateTracker {
        &self.receive_tracker
    }

    /// Attempts to reserve a send permit; delegates to the owned
    /// [`SendLimiter`].
    pub fn try_acquire(&self) -> f64 {
        self.send_limiter.try_acquire()
    }

    fn wall_ms(&self) -> f64 {
        self.clock.now().saturating_duration_since(self.anchor).as_secs_f64() * 1000.0
    }

    /// Records one completed reply and runs the CUBIC update.
    ///
    /// Steps 1–3 of `MetricsIngress` (receive-tick, CUBIC update, pending
    /// decrement) must be atomic per endpoint; the caller is responsible
    /// for that ordering, but the receive-tick plus rate retarget inside
    /// this call are themselves atomic with respect to each other via
    /// `state`'s mutex.
    pub fn on_reply(&self) {
        self.receive_tracker.add(1);
        self.update_cubic();
    }

    /// Runs the CUBIC retarget in isolation (exposed for tests and for
    /// callers that tick the receive tracker separately).
    pub fn update_cubic(&self) {
        let r_s = self.send_limiter.rate();
        let r_r = self.receive_tracker.current_rate();
        let now = self.wall_ms();

        let mut state = self.state.lock().expect("rate controller mutex poisoned");

        if r_s > r_r && now - state.t_inc > self.hysteresis_ms {
            // Overshoot: the send rate has outrun what replicas can
            // actually answer. Back off multiplicatively and remember
            // the rate we backed off from.
            state.r_max = r_s;
            self.send_limiter.set_rate((r_s * self.beta).max(OVERSHOOT_FLOOR));
            state.t_dec = now;
        } else if r_s < r_r {
            // Probing: replicas can keep up with more than we're
            // currently sending. Grow along the CUBIC curve, capped by
            // SMAX per step.
            let t = now - state.t_dec;
            state.t_inc = now;

            let k = (state.r_max * self.beta / self.c).cbrt();
            let r_new = self.c * (t - k).powi(3) + state.r_max;

            if r_new - r_s > self.smax {
                self.send_limiter.set_rate(r_s + self.smax);
            } else {
                self.send_limiter.set_rate(r_new);
            }
        }
        // Otherwise: r_s == r_r, no-op.
    }
}
