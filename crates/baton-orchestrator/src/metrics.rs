//! Concurrency-safe orchestration metrics with a read-consistent
//! snapshot.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::{BTreeMap, VecDeque};
use std::time::Duration;

/// Switches kept for reporting.
const SWITCH_HISTORY: usize = 10;

#[derive(Debug, Clone, Serialize)]
pub struct SwitchRecord {
    pub from: String,
    pub to: String,
    pub reason: String,
    pub at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ProviderCounters {
    pub attempts: u64,
    pub successes: u64,
    pub failures: u64,
    pub avg_duration_ms: f64,
}

#[derive(Debug, Clone, Default)]
struct ProviderStats {
    attempts: u64,
    successes: u64,
    failures: u64,
    durations: Vec<Duration>,
}

impl ProviderStats {
    fn counters(&self) -> ProviderCounters {
        let avg_duration_ms = if self.durations.is_empty() {
            0.0
        } else {
            let total: Duration = self.durations.iter().sum();
            total.as_secs_f64() * 1000.0 / self.durations.len() as f64
        };
        ProviderCounters {
            attempts: self.attempts,
            successes: self.successes,
            failures: self.failures,
            avg_duration_ms,
        }
    }
}

/// Read-consistent view of the metrics at one instant.
#[derive(Debug, Clone, Serialize)]
pub struct MetricsSnapshot {
    pub total_attempts: u64,
    pub total_successes: u64,
    pub total_failures: u64,
    pub total_switches: u64,
    pub providers: BTreeMap<String, ProviderCounters>,
    pub error_counts: BTreeMap<String, u64>,
    pub last_success: Option<DateTime<Utc>>,
    pub last_failure: Option<DateTime<Utc>>,
    /// Most recent switches, oldest first.
    pub recent_switches: Vec<SwitchRecord>,
}

#[derive(Debug, Default)]
struct Inner {
    total_attempts: u64,
    total_successes: u64,
    total_failures: u64,
    total_switches: u64,
    providers: BTreeMap<String, ProviderStats>,
    error_counts: BTreeMap<String, u64>,
    last_success: Option<DateTime<Utc>>,
    last_failure: Option<DateTime<Utc>>,
    switches: VecDeque<SwitchRecord>,
}

#[derive(Debug, Default)]
pub struct Metrics {
    inner: Mutex<Inner>,
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_attempt(&self, provider: &str) {
        let mut inner = self.inner.lock();
        inner.total_attempts += 1;
        inner.providers.entry(provider.to_string()).or_default().attempts += 1;
    }

    pub fn record_success(&self, provider: &str, duration: Duration) {
        let mut inner = self.inner.lock();
        inner.total_successes += 1;
        inner.last_success = Some(Utc::now());
        let stats = inner.providers.entry(provider.to_string()).or_default();
        stats.successes += 1;
        stats.durations.push(duration);
    }

    pub fn record_failure(&self, provider: &str, error_kind: &str) {
        let mut inner = self.inner.lock();
        inner.total_failures += 1;
        inner.last_failure = Some(Utc::now());
        inner.providers.entry(provider.to_string()).or_default().failures += 1;
        *inner.error_counts.entry(error_kind.to_string()).or_default() += 1;
    }

    pub fn record_switch(&self, from: &str, to: &str, reason: &str) {
        let mut inner = self.inner.lock();
        inner.total_switches += 1;
        inner.switches.push_back(SwitchRecord {
            from: from.to_string(),
            to: to.to_string(),
            reason: reason.to_string(),
            at: Utc::now(),
        });
        while inner.switches.len() > SWITCH_HISTORY {
            inner.switches.pop_front();
        }
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let inner = self.inner.lock();
        MetricsSnapshot {
            total_attempts: inner.total_attempts,
            total_successes: inner.total_successes,
            total_failures: inner.total_failures,
            total_switches: inner.total_switches,
            providers: inner
                .providers
                .iter()
                .map(|(name, stats)| (name.clone(), stats.counters()))
                .collect(),
            error_counts: inner.error_counts.clone(),
            last_success: inner.last_success,
            last_failure: inner.last_failure,
            recent_switches: inner.switches.iter().cloned().collect(),
        }
    }

    pub fn reset(&self) {
        *self.inner.lock() = Inner::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn totals_equal_per_provider_sums() {
        let metrics = Metrics::new();
        metrics.record_attempt("a");
        metrics.record_attempt("a");
        metrics.record_attempt("b");
        metrics.record_success("a", Duration::from_millis(100));
        metrics.record_failure("a", "timeout");
        metrics.record_failure("b", "rate_limited");

        let snap = metrics.snapshot();
        assert_eq!(snap.total_attempts, 3);
        assert_eq!(
            snap.total_attempts,
            snap.providers.values().map(|p| p.attempts).sum::<u64>()
        );
        assert_eq!(
            snap.total_successes,
            snap.providers.values().map(|p| p.successes).sum::<u64>()
        );
        assert_eq!(
            snap.total_failures,
            snap.providers.values().map(|p| p.failures).sum::<u64>()
        );
        assert_eq!(snap.error_counts["timeout"], 1);
        assert_eq!(snap.error_counts["rate_limited"], 1);
        assert!(snap.last_success.is_some());
        assert!(snap.last_failure.is_some());
    }

    #[test]
    fn average_duration_reflects_recorded_runs() {
        let metrics = Metrics::new();
        metrics.record_success("a", Duration::from_millis(100));
        metrics.record_success("a", Duration::from_millis(300));
        let snap = metrics.snapshot();
        assert!((snap.providers["a"].avg_duration_ms - 200.0).abs() < 1e-6);
    }

    #[test]
    fn switch_history_is_bounded() {
        let metrics = Metrics::new();
        for i in 0..15 {
            metrics.record_switch("a", "b", &format!("reason-{i}"));
        }
        let snap = metrics.snapshot();
        assert_eq!(snap.total_switches, 15);
        assert_eq!(snap.recent_switches.len(), SWITCH_HISTORY);
        // Oldest entries were dropped.
        assert_eq!(snap.recent_switches[0].reason, "reason-5");
        assert_eq!(snap.recent_switches[9].reason, "reason-14");
    }

    #[test]
    fn reset_clears_everything() {
        let metrics = Metrics::new();
        metrics.record_attempt("a");
        metrics.record_failure("a", "provider");
        metrics.reset();

        let snap = metrics.snapshot();
        assert_eq!(snap.total_attempts, 0);
        assert!(snap.providers.is_empty());
        assert!(snap.error_counts.is_empty());
        assert!(snap.last_failure.is_none());
    }

    #[test]
    fn concurrent_updates_do_not_lose_counts() {
        use std::sync::Arc;

        let metrics = Arc::new(Metrics::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let metrics = Arc::clone(&metrics);
                std::thread::spawn(move || {
                    for _ in 0..100 {
                        metrics.record_attempt("a");
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(metrics.snapshot().total_attempts, 800);
    }
}
