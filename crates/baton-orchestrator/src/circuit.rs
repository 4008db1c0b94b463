//! Per-provider circuit breaker.
//!
//! Closed → open after `failure_threshold` failures; open → half-open
//! lazily once `timeout` has elapsed at the next status read; half-open
//! closes after `half_open_max_calls` consecutive successes and re-opens
//! on a single failure.

use parking_lot::Mutex;
use serde::Serialize;
use std::time::Instant;

use baton_config::CircuitBreakerConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

/// State change produced by a `record_*` call. The caller emits the
/// matching event; returning the transition from inside the critical
/// section guarantees each transition is observed exactly once even
/// under concurrent failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitTransition {
    Opened,
    Closed,
}

#[derive(Debug)]
struct Inner {
    state: CircuitState,
    failure_count: u32,
    success_count: u32,
    opened_at: Option<Instant>,
}

impl Inner {
    fn initial() -> Self {
        Self {
            state: CircuitState::Closed,
            failure_count: 0,
            success_count: 0,
            opened_at: None,
        }
    }

    fn enter_open(&mut self) {
        self.state = CircuitState::Open;
        self.opened_at = Some(Instant::now());
        self.failure_count = 0;
        self.success_count = 0;
    }

    fn enter_closed(&mut self) {
        self.state = CircuitState::Closed;
        self.failure_count = 0;
        self.success_count = 0;
        self.opened_at = None;
    }
}

#[derive(Debug)]
pub struct CircuitBreaker {
    config: CircuitBreakerConfig,
    inner: Mutex<Inner>,
}

impl CircuitBreaker {
    pub fn new(config: CircuitBreakerConfig) -> Self {
        Self {
            config,
            inner: Mutex::new(Inner::initial()),
        }
    }

    /// Lazy open → half-open transition once the open timeout elapsed.
    fn advance(&self, inner: &mut Inner) {
        if inner.state == CircuitState::Open {
            let elapsed = inner
                .opened_at
                .map(|at| at.elapsed() >= self.config.timeout())
                .unwrap_or(true);
            if elapsed {
                inner.state = CircuitState::HalfOpen;
                inner.success_count = 0;
            }
        }
    }

    /// Whether calls are currently blocked. Performs the lazy open →
    /// half-open transition.
    pub fn is_open(&self) -> bool {
        if !self.config.enabled {
            return false;
        }
        let mut inner = self.inner.lock();
        self.advance(&mut inner);
        inner.state == CircuitState::Open
    }

    pub fn is_closed(&self) -> bool {
        !self.config.enabled || self.inner.lock().state == CircuitState::Closed
    }

    pub fn is_half_open(&self) -> bool {
        self.config.enabled && self.inner.lock().state == CircuitState::HalfOpen
    }

    pub fn state(&self) -> CircuitState {
        if !self.config.enabled {
            return CircuitState::Closed;
        }
        let mut inner = self.inner.lock();
        self.advance(&mut inner);
        inner.state
    }

    pub fn record_success(&self) -> Option<CircuitTransition> {
        if !self.config.enabled {
            return None;
        }
        let mut inner = self.inner.lock();
        self.advance(&mut inner);
        match inner.state {
            CircuitState::Closed => {
                inner.failure_count = 0;
                None
            }
            CircuitState::HalfOpen => {
                inner.success_count += 1;
                if inner.success_count >= self.config.half_open_max_calls {
                    inner.enter_closed();
                    Some(CircuitTransition::Closed)
                } else {
                    None
                }
            }
            CircuitState::Open => None,
        }
    }

    pub fn record_failure(&self) -> Option<CircuitTransition> {
        if !self.config.enabled {
            return None;
        }
        let mut inner = self.inner.lock();
        self.advance(&mut inner);
        match inner.state {
            CircuitState::Closed => {
                inner.failure_count += 1;
                if inner.failure_count >= self.config.failure_threshold {
                    inner.enter_open();
                    Some(CircuitTransition::Opened)
                } else {
                    None
                }
            }
            // One failure re-opens a probing circuit.
            CircuitState::HalfOpen => {
                inner.enter_open();
                Some(CircuitTransition::Opened)
            }
            CircuitState::Open => None,
        }
    }

    pub fn failure_count(&self) -> u32 {
        self.inner.lock().failure_count
    }

    pub fn reset(&self) {
        *self.inner.lock() = Inner::initial();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn breaker(threshold: u32, timeout_secs: u64) -> CircuitBreaker {
        CircuitBreaker::new(CircuitBreakerConfig {
            enabled: true,
            failure_threshold: threshold,
            timeout_secs,
            half_open_max_calls: 2,
        })
    }

    #[test]
    fn opens_at_the_failure_threshold() {
        let cb = breaker(3, 60);
        assert_eq!(cb.record_failure(), None);
        assert_eq!(cb.record_failure(), None);
        assert!(!cb.is_open());
        assert_eq!(cb.record_failure(), Some(CircuitTransition::Opened));
        assert!(cb.is_open());
        // The count reset on opening; further failures do not grow it.
        assert_eq!(cb.failure_count(), 0);
        assert_eq!(cb.record_failure(), None);
        assert_eq!(cb.failure_count(), 0);
    }

    #[test]
    fn success_resets_the_closed_count() {
        let cb = breaker(3, 60);
        cb.record_failure();
        cb.record_failure();
        cb.record_success();
        cb.record_failure();
        cb.record_failure();
        assert!(!cb.is_open());
    }

    #[test]
    fn open_transitions_to_half_open_after_timeout() {
        let cb = breaker(1, 0);
        cb.record_failure();
        // timeout_secs = 0: the next status read probes immediately.
        assert!(!cb.is_open());
        assert!(cb.is_half_open());
    }

    #[test]
    fn open_blocks_until_the_timeout() {
        let cb = breaker(1, 60);
        cb.record_failure();
        assert!(cb.is_open());
        assert!(!cb.is_half_open());
    }

    #[test]
    fn half_open_closes_after_enough_successes() {
        let cb = breaker(1, 0);
        cb.record_failure();
        assert!(!cb.is_open()); // now half-open
        assert_eq!(cb.record_success(), None);
        assert_eq!(cb.record_success(), Some(CircuitTransition::Closed));
        assert!(cb.is_closed());
    }

    #[test]
    fn half_open_reopens_on_a_single_failure() {
        let cb = breaker(1, 0);
        cb.record_failure();
        assert!(!cb.is_open()); // now half-open
        assert_eq!(cb.record_failure(), Some(CircuitTransition::Opened));
        // timeout 0: the next read probes again
        assert_eq!(cb.state(), CircuitState::HalfOpen);
    }

    #[test]
    fn disabled_breaker_never_opens() {
        let cb = CircuitBreaker::new(CircuitBreakerConfig {
            enabled: false,
            failure_threshold: 1,
            timeout_secs: 60,
            half_open_max_calls: 1,
        });
        for _ in 0..10 {
            assert_eq!(cb.record_failure(), None);
        }
        assert!(!cb.is_open());
        assert!(cb.is_closed());
    }

    #[test]
    fn reset_returns_to_closed() {
        let cb = breaker(1, 60);
        cb.record_failure();
        assert!(cb.is_open());
        cb.reset();
        assert!(cb.is_closed());
        assert_eq!(cb.failure_count(), 0);
    }

    #[test]
    fn concurrent_failures_open_exactly_once() {
        use std::sync::atomic::{AtomicUsize, Ordering};
        use std::sync::Arc;

        let cb = Arc::new(breaker(5, 60));
        let opened = Arc::new(AtomicUsize::new(0));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let cb = Arc::clone(&cb);
                let opened = Arc::clone(&opened);
                std::thread::spawn(move || {
                    for _ in 0..10 {
                        if cb.record_failure() == Some(CircuitTransition::Opened) {
                            opened.fetch_add(1, Ordering::SeqCst);
                        }
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }

        assert_eq!(opened.load(Ordering::SeqCst), 1);
        assert!(cb.is_open());
        assert_eq!(cb.failure_count(), 0);
    }
}
