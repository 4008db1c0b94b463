//! Per-provider rate-limit state: a "limited until T" flag that clears
//! itself on the first read after T.

use parking_lot::Mutex;
use std::time::{Duration, Instant};

use baton_config::RateLimitConfig;

#[derive(Debug, Default)]
struct Inner {
    limited_until: Option<Instant>,
    limit_count: u64,
}

#[derive(Debug)]
pub struct RateLimitState {
    default_reset: Duration,
    inner: Mutex<Inner>,
}

impl RateLimitState {
    pub fn new(config: &RateLimitConfig) -> Self {
        Self {
            default_reset: config.default_reset(),
            inner: Mutex::new(Inner::default()),
        }
    }

    /// Mark the provider limited. Without a reset hint the configured
    /// default cooldown applies.
    pub fn mark_limited(&self, reset_after: Option<Duration>) {
        let mut inner = self.inner.lock();
        inner.limited_until = Some(Instant::now() + reset_after.unwrap_or(self.default_reset));
        inner.limit_count += 1;
    }

    /// Whether the provider is currently limited. An elapsed limit is
    /// cleared by this read.
    pub fn is_limited(&self) -> bool {
        let mut inner = self.inner.lock();
        match inner.limited_until {
            Some(until) if Instant::now() >= until => {
                inner.limited_until = None;
                false
            }
            Some(_) => true,
            None => false,
        }
    }

    pub fn clear_limit(&self) {
        self.inner.lock().limited_until = None;
    }

    /// Time remaining until the limit expires, if one is active.
    pub fn time_until_reset(&self) -> Option<Duration> {
        let inner = self.inner.lock();
        inner
            .limited_until
            .map(|until| until.saturating_duration_since(Instant::now()))
            .filter(|remaining| !remaining.is_zero())
    }

    /// How many times this provider has been limited since construction
    /// or the last reset.
    pub fn limit_count(&self) -> u64 {
        self.inner.lock().limit_count
    }

    pub fn reset(&self) {
        *self.inner.lock() = Inner::default();
    }
}
