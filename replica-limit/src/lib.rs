//! # replica-limit
//!
//! `replica-limit` provides the pure, synchronous estimation and
//! rate-adaptation primitives behind replica-selection admission
//! control: a continuous-refill send-rate limiter, a slotted
//! receive-rate tracker, a CUBIC-driven rate controller that ties the
//! two together, and a cubic-weighted badness score used to order
//! replicas by predicted response quality.
//!
//! ## Core Philosophy
//!
//! Every primitive here is lock-held-only-across-pure-arithmetic: no
//! I/O, no `await`, lock durations sub-microsecond. None of it knows
//! about endpoints, replica groups, or the network — those concerns
//! live one layer up, in `replica-gate`.
//!
//! ## Example
//!
//! ```rust
//! use replica_limit::{RateLimitConfig, RateController};
//!
//! let config = RateLimitConfig::default();
//! config.validate().unwrap();
//! let controller = RateController::new(&config, 1.0);
//!
//! if controller.try_acquire() == 0.0 {
//!     // permit granted; dispatch the request, then on reply:
//!     controller.on_reply();
//! }
//! ```

mod config;
mod cubic;
mod error;
mod receive_rate;
mod score;
mod send_limiter;

pub use config::RateLimitConfig;
pub use cubic::RateController;
pub use error::ConfigurationError;
pub use receive_rate::ReceiveRateTracker;
pub use score::ScoreTracker;
pub use send_limiter::SendLimiter;
