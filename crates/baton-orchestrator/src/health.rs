//! Per-provider health: a bounded window of recent outcomes and the
//! success rate derived from it.

use parking_lot::Mutex;
use std::collections::VecDeque;

use baton_config::HealthConfig;

#[derive(Debug, Default)]
struct Inner {
    // true = success. Counters are updated on every push and evicting
    // pop so they always agree with the window's contents.
    outcomes: VecDeque<bool>,
    successes: usize,
    failures: usize,
}

#[derive(Debug)]
pub struct HealthMonitor {
    enabled: bool,
    window: usize,
    threshold: f64,
    inner: Mutex<Inner>,
}

impl HealthMonitor {
    pub fn new(config: &HealthConfig) -> Self {
        Self {
            enabled: config.enabled,
            window: config.window.max(1),
            threshold: config.threshold,
            inner: Mutex::new(Inner::default()),
        }
    }

    fn record(&self, success: bool) {
        let mut inner = self.inner.lock();
        inner.outcomes.push_back(success);
        if success {
            inner.successes += 1;
        } else {
            inner.failures += 1;
        }
        if inner.outcomes.len() > self.window {
            if let Some(evicted) = inner.outcomes.pop_front() {
                if evicted {
                    inner.successes -= 1;
                } else {
                    inner.failures -= 1;
                }
            }
        }
    }

    pub fn record_success(&self) {
        self.record(true);
    }

    pub fn record_failure(&self) {
        self.record(false);
    }

    /// Success rate over the window; 1.0 when no outcomes are recorded.
    pub fn success_rate(&self) -> f64 {
        let inner = self.inner.lock();
        if inner.outcomes.is_empty() {
            1.0
        } else {
            inner.successes as f64 / inner.outcomes.len() as f64
        }
    }

    /// Healthy when disabled, when the window is empty, or when the rate
    /// clears the threshold.
    pub fn is_healthy(&self) -> bool {
        if !self.enabled {
            return true;
        }
        let inner = self.inner.lock();
        if inner.outcomes.is_empty() {
            return true;
        }
        let rate = inner.successes as f64 / inner.outcomes.len() as f64;
        rate >= self.threshold
    }

    pub fn recent_successes(&self) -> usize {
        self.inner.lock().successes
    }

    pub fn recent_failures(&self) -> usize {
        self.inner.lock().failures
    }

    pub fn reset(&self) {
        *self.inner.lock() = Inner::default();
    }
}
