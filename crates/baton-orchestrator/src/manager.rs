//! Provider manager: owns the circuit, rate-limit, and health state for
//! every enabled provider and decides which adapter a call should use.

use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use crate::circuit::{CircuitBreaker, CircuitState, CircuitTransition};
use crate::health::HealthMonitor;
use crate::rate_limit::RateLimitState;
use baton_config::BatonConfig;
use baton_core::{BatonError, CallbackBus, OrchestratorEvent, Result};
use baton_exec::CommandRunner;
use baton_providers::{AdapterContext, CliAgent, ProviderRegistry};

struct ProviderState {
    circuit: CircuitBreaker,
    rate_limit: RateLimitState,
    health: HealthMonitor,
}

impl ProviderState {
    fn new(config: &BatonConfig) -> Self {
        let orchestration = &config.orchestration;
        Self {
            circuit: CircuitBreaker::new(orchestration.circuit_breaker.clone()),
            rate_limit: RateLimitState::new(&orchestration.rate_limit),
            health: HealthMonitor::new(&orchestration.health),
        }
    }
}

/// One row of `health_status()`.
#[derive(Debug, Clone, Serialize)]
pub struct ProviderHealthReport {
    pub provider: String,
    pub healthy: bool,
    pub circuit_state: CircuitState,
    pub rate_limited: bool,
    pub success_rate: f64,
    pub recent_successes: usize,
    pub recent_failures: usize,
}

pub struct ProviderManager {
    config: Arc<BatonConfig>,
    registry: Arc<ProviderRegistry>,
    runner: Arc<dyn CommandRunner>,
    callbacks: CallbackBus,
    states: HashMap<String, ProviderState>,
    /// Memoized fallback chain per enabled provider.
    chains: HashMap<String, Vec<String>>,
    adapters: RwLock<HashMap<String, Arc<dyn CliAgent>>>,
    current: Mutex<String>,
}

impl ProviderManager {
    pub fn new(
        config: Arc<BatonConfig>,
        registry: Arc<ProviderRegistry>,
        runner: Arc<dyn CommandRunner>,
        callbacks: CallbackBus,
    ) -> Self {
        let enabled = config.enabled_providers();
        let states = enabled
            .iter()
            .map(|name| (name.clone(), ProviderState::new(&config)))
            .collect();
        let chains = enabled
            .iter()
            .map(|name| (name.clone(), Self::build_chain(name, &config, &enabled)))
            .collect();
        let current = Mutex::new(config.default_provider.clone());
        Self {
            config,
            registry,
            runner,
            callbacks,
            states,
            chains,
            adapters: RwLock::new(HashMap::new()),
            current,
        }
    }

    /// `[preferred] ++ fallback_providers ++ all providers`, deduplicated
    /// preserving first occurrence, restricted to enabled providers.
    fn build_chain(provider: &str, config: &BatonConfig, enabled: &[String]) -> Vec<String> {
        let mut chain: Vec<String> = Vec::new();
        let candidates = std::iter::once(provider.to_string())
            .chain(config.fallback_providers.iter().cloned())
            .chain(enabled.iter().cloned());
        for candidate in candidates {
            if enabled.contains(&candidate) && !chain.contains(&candidate) {
                chain.push(candidate);
            }
        }
        chain
    }

    pub fn current_provider(&self) -> String {
        self.current.lock().clone()
    }

    /// The adapter for `name` (aliases accepted), instantiating and
    /// caching it on first use.
    pub fn adapter(&self, name: &str) -> Result<Arc<dyn CliAgent>> {
        let name = &self.registry.canonical_name(name);
        if let Some(adapter) = self.adapters.read().get(name) {
            return Ok(Arc::clone(adapter));
        }
        let factory = self.registry.get(name)?;
        let provider_config = self
            .config
            .provider(name)
            .cloned()
            .ok_or_else(|| BatonError::ProviderNotFound(name.to_string()))?;
        let adapter = factory(AdapterContext {
            runner: Arc::clone(&self.runner),
            config: provider_config,
            callbacks: self.callbacks.clone(),
        });
        self.adapters
            .write()
            .entry(name.to_string())
            .or_insert_with(|| Arc::clone(&adapter));
        Ok(adapter)
    }

    /// Why `name` cannot take calls right now, if anything.
    fn gate_reason(&self, name: &str) -> Option<&'static str> {
        let state = self.states.get(name)?;
        if state.circuit.is_open() {
            Some("circuit_open")
        } else if state.rate_limit.is_limited() {
            Some("rate_limited")
        } else if !state.health.is_healthy() {
            Some("unhealthy")
        } else {
            None
        }
    }

    /// The central decision: the preferred provider if it can take calls,
    /// otherwise the first survivor of its fallback chain.
    pub fn select(&self, preferred: Option<&str>) -> Result<Arc<dyn CliAgent>> {
        let provider = match preferred {
            Some(p) => self.registry.canonical_name(p),
            None => self.current_provider(),
        };
        if !self.states.contains_key(&provider) {
            return Err(BatonError::ProviderNotFound(provider));
        }
        match self.gate_reason(&provider) {
            Some(reason) => self.select_fallback(&provider, reason),
            None => self.adapter(&provider),
        }
    }

    /// First provider in `from`'s chain that can take calls, skipping
    /// `from` itself.
    pub fn select_fallback(&self, from: &str, reason: &str) -> Result<Arc<dyn CliAgent>> {
        let mut attempted = vec![from.to_string()];
        let mut reasons = BTreeMap::from([(from.to_string(), reason.to_string())]);

        let chain = self.chains.get(from).cloned().unwrap_or_default();
        for candidate in chain.iter().filter(|c| c.as_str() != from) {
            match self.gate_reason(candidate) {
                None => return self.adapter(candidate),
                Some(gate) => {
                    attempted.push(candidate.clone());
                    reasons.insert(candidate.clone(), gate.to_string());
                }
            }
        }

        Err(BatonError::NoProvidersAvailable { attempted, reasons })
    }

    /// Move `current_provider` to a fallback and announce the switch.
    pub fn switch_provider(
        &self,
        reason: &str,
        context: Option<String>,
    ) -> Result<Arc<dyn CliAgent>> {
        let from = self.current_provider();
        let adapter = self.select_fallback(&from, reason)?;
        let to = adapter.name().to_string();
        *self.current.lock() = to.clone();
        info!(%from, %to, reason, "switching provider");
        self.callbacks.emit(&OrchestratorEvent::ProviderSwitch {
            from,
            to,
            reason: reason.to_string(),
            context,
        });
        Ok(adapter)
    }

    pub fn record_success(&self, provider: &str) {
        if let Some(state) = self.states.get(provider) {
            state.health.record_success();
            if state.circuit.record_success() == Some(CircuitTransition::Closed) {
                info!(provider, "circuit closed");
                self.callbacks.emit(&OrchestratorEvent::CircuitClose {
                    provider: provider.to_string(),
                });
            }
        }
    }

    pub fn record_failure(&self, provider: &str) {
        if let Some(state) = self.states.get(provider) {
            state.health.record_failure();
            if state.circuit.record_failure() == Some(CircuitTransition::Opened) {
                warn!(provider, "circuit opened");
                self.callbacks.emit(&OrchestratorEvent::CircuitOpen {
                    provider: provider.to_string(),
                });
            }
        }
    }

    pub fn mark_rate_limited(&self, provider: &str, reset_after: Option<Duration>) {
        if let Some(state) = self.states.get(provider) {
            state.rate_limit.mark_limited(reset_after);
            warn!(provider, ?reset_after, "provider rate limited");
        }
    }

    pub fn circuit_open(&self, provider: &str) -> bool {
        self.states
            .get(provider)
            .map(|s| s.circuit.is_open())
            .unwrap_or(false)
    }

    pub fn rate_limited(&self, provider: &str) -> bool {
        self.states
            .get(provider)
            .map(|s| s.rate_limit.is_limited())
            .unwrap_or(false)
    }

    pub fn healthy(&self, provider: &str) -> bool {
        self.states
            .get(provider)
            .map(|s| s.health.is_healthy())
            .unwrap_or(false)
    }

    /// Providers currently able to take calls, in name order.
    pub fn available_providers(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .states
            .keys()
            .filter(|name| self.gate_reason(name).is_none())
            .cloned()
            .collect();
        names.sort();
        names
    }

    pub fn health_status(&self) -> Vec<ProviderHealthReport> {
        let mut reports: Vec<ProviderHealthReport> = self
            .states
            .iter()
            .map(|(name, state)| ProviderHealthReport {
                provider: name.clone(),
                healthy: state.health.is_healthy(),
                circuit_state: state.circuit.state(),
                rate_limited: state.rate_limit.is_limited(),
                success_rate: state.health.success_rate(),
                recent_successes: state.health.recent_successes(),
                recent_failures: state.health.recent_failures(),
            })
            .collect();
        reports.sort_by(|a, b| a.provider.cmp(&b.provider));
        reports
    }

    /// Return every provider's state to its post-construction value.
    pub fn reset(&self) {
        for state in self.states.values() {
            state.circuit.reset();
            state.rate_limit.reset();
            state.health.reset();
        }
        *self.current.lock() = self.config.default_provider.clone();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use baton_config::ProviderConfig;
    use baton_exec::ScriptedRunner;
    use baton_providers::MockAgent;

    fn config_with(providers: &[&str], fallbacks: &[&str]) -> BatonConfig {
        BatonConfig {
            default_provider: providers[0].to_string(),
            fallback_providers: fallbacks.iter().map(|s| s.to_string()).collect(),
            providers: providers
                .iter()
                .map(|name| ((*name).to_string(), ProviderConfig::named(name)))
                .collect(),
            ..Default::default()
        }
    }

    fn manager_for(config: BatonConfig, mocks: &[&MockAgent]) -> ProviderManager {
        let registry = ProviderRegistry::new();
        for mock in mocks {
            registry.register(mock.name(), "true", &[], mock.factory());
        }
        ProviderManager::new(
            Arc::new(config),
            Arc::new(registry),
            Arc::new(ScriptedRunner::new()),
            CallbackBus::new(),
        )
    }

    #[test]
    fn chain_order_is_preferred_then_fallbacks_then_rest() {
        let config = config_with(&["a", "b", "c", "d"], &["c"]);
        let enabled = config.enabled_providers();
        let chain = ProviderManager::build_chain("b", &config, &enabled);
        assert_eq!(chain, vec!["b", "c", "a", "d"]);
    }

    #[test]
    fn select_returns_the_preferred_provider_when_clear() {
        let mock = MockAgent::new("a");
        let manager = manager_for(config_with(&["a"], &[]), &[&mock]);
        let adapter = manager.select(None).unwrap();
        assert_eq!(adapter.name(), "a");
    }

    #[test]
    fn select_falls_back_when_rate_limited() {
        let a = MockAgent::new("a");
        let b = MockAgent::new("b");
        let manager = manager_for(config_with(&["a", "b"], &["b"]), &[&a, &b]);

        manager.mark_rate_limited("a", Some(Duration::from_secs(3600)));
        let adapter = manager.select(Some("a")).unwrap();
        assert_eq!(adapter.name(), "b");
        assert!(manager.rate_limited("a"));
    }

    #[test]
    fn exhausted_chain_reports_every_attempt() {
        let a = MockAgent::new("a");
        let b = MockAgent::new("b");
        let manager = manager_for(config_with(&["a", "b"], &[]), &[&a, &b]);

        manager.mark_rate_limited("a", Some(Duration::from_secs(3600)));
        manager.mark_rate_limited("b", Some(Duration::from_secs(3600)));

        let err = match manager.select(Some("a")) {
            Err(e) => e,
            Ok(_) => panic!("expected an error"),
        };
        match err {
            BatonError::NoProvidersAvailable { attempted, reasons } => {
                assert_eq!(attempted, vec!["a".to_string(), "b".to_string()]);
                assert_eq!(reasons["a"], "rate_limited");
                assert_eq!(reasons["b"], "rate_limited");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn switch_provider_updates_current_and_emits() {
        use std::sync::atomic::{AtomicUsize, Ordering};

        let a = MockAgent::new("a");
        let b = MockAgent::new("b");
        let config = config_with(&["a", "b"], &["b"]);
        let registry = ProviderRegistry::new();
        registry.register("a", "true", &[], a.factory());
        registry.register("b", "true", &[], b.factory());

        let callbacks = CallbackBus::new();
        let switches = Arc::new(AtomicUsize::new(0));
        {
            let switches = Arc::clone(&switches);
            callbacks.on_provider_switch(move |from, to, reason, _| {
                assert_eq!(from, "a");
                assert_eq!(to, "b");
                assert_eq!(reason, "rate_limited");
                switches.fetch_add(1, Ordering::SeqCst);
            });
        }

        let manager = ProviderManager::new(
            Arc::new(config),
            Arc::new(registry),
            Arc::new(ScriptedRunner::new()),
            callbacks,
        );

        let adapter = manager.switch_provider("rate_limited", None).unwrap();
        assert_eq!(adapter.name(), "b");
        assert_eq!(manager.current_provider(), "b");
        assert_eq!(switches.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn record_failure_opens_the_circuit_once() {
        let a = MockAgent::new("a");
        let mut config = config_with(&["a"], &[]);
        config.orchestration.circuit_breaker.failure_threshold = 3;
        let manager = manager_for(config, &[&a]);

        manager.record_failure("a");
        manager.record_failure("a");
        assert!(!manager.circuit_open("a"));
        manager.record_failure("a");
        assert!(manager.circuit_open("a"));

        let err = match manager.select(Some("a")) {
            Err(e) => e,
            Ok(_) => panic!("expected an error"),
        };
        assert!(matches!(err, BatonError::NoProvidersAvailable { .. }));
    }

    #[test]
    fn reset_restores_post_construction_state() {
        let a = MockAgent::new("a");
        let b = MockAgent::new("b");
        let manager = manager_for(config_with(&["a", "b"], &[]), &[&a, &b]);

        manager.mark_rate_limited("a", Some(Duration::from_secs(3600)));
        manager.switch_provider("rate_limited", None).unwrap();
        for _ in 0..5 {
            manager.record_failure("b");
        }

        manager.reset();
        assert_eq!(manager.current_provider(), "a");
        assert!(!manager.rate_limited("a"));
        assert!(!manager.circuit_open("b"));
        assert!(manager.healthy("b"));
        assert_eq!(
            manager.available_providers(),
            vec!["a".to_string(), "b".to_string()]
        );
    }

    #[test]
    fn disabled_providers_never_enter_the_chain() {
        let a = MockAgent::new("a");
        let b = MockAgent::new("b");
        let mut config = config_with(&["a", "b"], &[]);
        config.providers.get_mut("b").unwrap().enabled = false;
        let manager = manager_for(config, &[&a, &b]);

        manager.mark_rate_limited("a", None);
        let err = match manager.select(Some("a")) {
            Err(e) => e,
            Ok(_) => panic!("expected an error"),
        };
        match err {
            BatonError::NoProvidersAvailable { attempted, .. } => {
                assert_eq!(attempted, vec!["a".to_string()]);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
