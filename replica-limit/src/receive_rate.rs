use std::sync::Mutex;
use std::time::Duration;

use quanta::Clock;
use quanta::Instant;

#[derive(Debug)]
struct State {
    rate: f64,
    event_count: u64,
    last_slot: i64,
}

/// A slot-based EWMA of the inter-arrival rate of replies.
///
/// One tick (`add(1)`) is recorded per completed reply. Time is divided
/// into fixed-width slots (`interval`); crossing a slot boundary blends
/// the prior slot's event count into the smoothed `rate` and resets the
/// counter. This is deliberately *not* a true moving average — the
/// value resets between slots, so it tracks recent throughput with
/// hysteresis rather than a long memory, the same trade-off
/// `shot-limit`'s [`FixedWindow`] strategy makes for admission instead
/// of estimation.
#[derive(Debug)]
pub struct ReceiveRateTracker {
    interval_ms: f64,
    clock: Clock,
    anchor: Instant,
    state: Mutex<State>,
}

impl ReceiveRateTracker {
    pub fn new(interval: Duration) -> Self {
        Self::with_clock(interval, Clock::new())
    }

    pub fn with_clock(interval: Duration, clock: Clock) -> Self {
        let anchor = clock.now();
        Self {
            interval_ms: interval.as_secs_f64() * 1000.0,
            clock,
            anchor,
            state: Mutex::new(State {
                rate: 0.0,
                event_count: 0,
                last_slot: -1,
            }),
        }
    }

    fn wall_ms(&self) -> f64 {
        self.clock.now().saturating_duration_since(self.anchor).as_secs_f64() * 1000.0
    }

    /// Records `events` reply-arrival ticks in the current slot, rolling
    /// the slot over (and blending the EWMA) first if time has advanced
    /// into a new one.
    pub fn add(&self, events: u64) {
        let wall_ms = self.wall_ms();
        let slot = (wall_ms / self.interval_ms).floor() as i64;
        let mut state = self.state.lock().expect("receive rate mutex poisoned");

        if slot > state.last_slot {
            if state.last_slot >= 0 {
                let elapsed_slots = (slot - state.last_slot) as f64;
                let alpha = (elapsed_slots / self.interval_ms).min(1.0);
                state.rate = alpha * state.event_count as f64 + (1.0 - alpha) * state.rate;
            } else {
                // First observation: seed directly from this slot's count.
                state.rate = state.event_count as f64;
            }
            state.event_count = 0;
            state.last_slot = slot;
        }

        state.event_count += events;
    }

    /// Forces a slot roll-over (via `add(0)`) and returns the smoothed rate.
    pub fn current_rate(&self) -> f64 {
        self.add(0);
        self.state.lock().expect("receive rate mutex poisoned").rate
    }
}
