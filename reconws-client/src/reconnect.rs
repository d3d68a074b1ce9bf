//! Reconnection backoff strategies
//!
//! When a dial attempt fails, the dial loop asks its strategy how long to
//! sleep before the next one. Failures are never terminal: a strategy only
//! decides the pace of retries, not whether they happen.
//!
//! # Built-in Strategies
//!
//! - **ExponentialBackoff**: multiplicative growth between a minimum and a
//!   maximum, with optional jitter (the default)
//! - **FixedDelay**: constant delay between attempts
//!
//! # Examples
//!
//! ```rust
//! use reconws_client::{ExponentialBackoff, ReconnectionStrategy};
//! use std::time::Duration;
//!
//! // Default: 2s to 30s, factor 1.5, with jitter
//! let default = ExponentialBackoff::default();
//!
//! // Deterministic: 100ms, 200ms, 400ms, ... capped at 1s
//! let mut custom = ExponentialBackoff::new(Duration::from_millis(100), Duration::from_secs(1))
//!     .with_factor(2.0);
//! assert_eq!(custom.next_interval(), Duration::from_millis(100));
//! assert_eq!(custom.next_interval(), Duration::from_millis(200));
//! ```

use rand::Rng;
use std::time::Duration;

/// Default lower bound of the retry interval
pub const DEFAULT_MIN_RECONNECT_INTERVAL: Duration = Duration::from_secs(2);
/// Default upper bound of the retry interval
pub const DEFAULT_MAX_RECONNECT_INTERVAL: Duration = Duration::from_secs(30);
/// Default growth factor between consecutive intervals
pub const DEFAULT_RECONNECT_INTERVAL_FACTOR: f64 = 1.5;

/// Trait for reconnection strategies
///
/// The strategy keeps an attempt counter. The dial loop calls
/// [`next_interval`](Self::next_interval) once per failed attempt and
/// [`reset`](Self::reset) after every successful connection, so the first
/// failure after a long-lived connection starts again from the minimum.
pub trait ReconnectionStrategy: Send + Sync {
    /// Returns the delay before the next attempt and advances the counter
    fn next_interval(&mut self) -> Duration;

    /// Reset the attempt counter after a successful connection
    fn reset(&mut self);

    /// Number of intervals handed out since the last reset
    fn attempt(&self) -> u32;
}

/// Exponential backoff with optional jitter
///
/// The interval for attempt `n` is `min * factor^n`, clamped to `max`. With
/// jitter enabled the returned value is drawn uniformly between `min` and
/// that computed interval, so concurrent clients do not retry in lockstep.
/// Every returned value lies in `[min, max]`.
#[derive(Debug, Clone)]
pub struct ExponentialBackoff {
    min: Duration,
    max: Duration,
    factor: f64,
    jitter: bool,
    current_attempt: u32,
}

impl ExponentialBackoff {
    /// Create a new exponential backoff strategy
    ///
    /// Uses the default factor and no jitter. A `max` below `min` is raised
    /// to `min`.
    pub fn new(min: Duration, max: Duration) -> Self {
        Self {
            min,
            max: max.max(min),
            factor: DEFAULT_RECONNECT_INTERVAL_FACTOR,
            jitter: false,
            current_attempt: 0,
        }
    }

    /// Set the growth factor
    ///
    /// Values that are not finite or not positive fall back to the default.
    pub fn with_factor(mut self, factor: f64) -> Self {
        self.factor = if factor.is_finite() && factor > 0.0 {
            factor
        } else {
            DEFAULT_RECONNECT_INTERVAL_FACTOR
        };
        self
    }

    /// Enable jitter to prevent thundering herd
    pub fn with_jitter(mut self) -> Self {
        self.jitter = true;
        self
    }

    /// Disable jitter
    pub fn without_jitter(mut self) -> Self {
        self.jitter = false;
        self
    }

    /// Lower bound of the interval
    pub fn min(&self) -> Duration {
        self.min
    }

    /// Upper bound of the interval
    pub fn max(&self) -> Duration {
        self.max
    }

    /// Growth factor
    pub fn factor(&self) -> f64 {
        self.factor
    }

    /// Whether jitter is applied
    pub fn jitter(&self) -> bool {
        self.jitter
    }

    fn computed_nanos(&self, attempt: u32) -> f64 {
        let min = self.min.as_nanos() as f64;
        let max = self.max.as_nanos() as f64;
        let grown = min * self.factor.powf(f64::from(attempt));

        if !grown.is_finite() || grown > max {
            max
        } else {
            grown.max(min)
        }
    }
}

impl Default for ExponentialBackoff {
    fn default() -> Self {
        Self::new(DEFAULT_MIN_RECONNECT_INTERVAL, DEFAULT_MAX_RECONNECT_INTERVAL)
            .with_factor(DEFAULT_RECONNECT_INTERVAL_FACTOR)
            .with_jitter()
    }
}

impl ReconnectionStrategy for ExponentialBackoff {
    fn next_interval(&mut self) -> Duration {
        let computed = self.computed_nanos(self.current_attempt);
        self.current_attempt = self.current_attempt.saturating_add(1);

        let min = self.min.as_nanos() as f64;
        let nanos = if self.jitter && computed > min {
            rand::thread_rng().gen_range(min..=computed)
        } else {
            computed
        };

        Duration::from_nanos(nanos as u64)
    }

    fn reset(&mut self) {
        self.current_attempt = 0;
    }

    fn attempt(&self) -> u32 {
        self.current_attempt
    }
}

/// Fixed delay reconnection strategy
#[derive(Debug, Clone)]
pub struct FixedDelay {
    delay: Duration,
    current_attempt: u32,
}

impl FixedDelay {
    /// Create a new fixed delay strategy
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            current_attempt: 0,
        }
    }
}

impl ReconnectionStrategy for FixedDelay {
    fn next_interval(&mut self) -> Duration {
        self.current_attempt = self.current_attempt.saturating_add(1);
        self.delay
    }

    fn reset(&mut self) {
        self.current_attempt = 0;
    }

    fn attempt(&self) -> u32 {
        self.current_attempt
    }
}
