//! Builder for the orchestrator: typed setters over the config, custom
//! provider registration, and callback wiring in one fluent chain.

use std::sync::Arc;

use crate::orchestrator::Orchestrator;
use baton_config::{
    BatonConfig, CircuitBreakerConfig, HealthConfig, ProviderConfig, RateLimitConfig, RetryConfig,
};
use baton_core::{CallbackBus, Result, TokenEvent};
use baton_exec::{CommandRunner, SystemRunner};
use baton_providers::{AdapterFactory, ProviderRegistry};

/// Fluent construction of an [`Orchestrator`].
///
/// # Example
/// ```no_run
/// use baton_orchestrator::Orchestrator;
///
/// let orchestrator = Orchestrator::builder()
///     .default_provider("claude")
///     .fallback_providers(["cursor", "gemini"])
///     .provider("claude", |p| {
///         p.model = Some("claude-sonnet-4-20250514".into());
///         p.timeout_secs = 120;
///     })
///     .retry(|r| r.max_attempts = 5)
///     .on_provider_switch(|from, to, reason, _| {
///         eprintln!("switched {from} -> {to} ({reason})");
///     })
///     .build()
///     .unwrap();
/// ```
pub struct OrchestratorBuilder {
    config: BatonConfig,
    registry: ProviderRegistry,
    callbacks: CallbackBus,
    runner: Option<Arc<dyn CommandRunner>>,
}

impl OrchestratorBuilder {
    /// Start with no providers; `build()` seeds the builtin set when none
    /// are configured explicitly.
    pub fn new() -> Self {
        let config = BatonConfig {
            providers: Default::default(),
            ..Default::default()
        };
        Self {
            config,
            registry: ProviderRegistry::new(),
            callbacks: CallbackBus::new(),
            runner: None,
        }
    }

    /// Start from an already-loaded configuration.
    pub fn from_config(config: BatonConfig) -> Self {
        Self {
            config,
            ..Self::new()
        }
    }

    pub fn default_provider(mut self, name: impl Into<String>) -> Self {
        self.config.default_provider = name.into();
        self
    }

    pub fn fallback_providers<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.config.fallback_providers = names.into_iter().map(Into::into).collect();
        self
    }

    /// Configure one provider, creating its entry when missing.
    pub fn provider(mut self, name: &str, configure: impl FnOnce(&mut ProviderConfig)) -> Self {
        let entry = self
            .config
            .providers
            .entry(name.to_string())
            .or_insert_with(|| ProviderConfig::named(name));
        configure(entry);
        self
    }

    pub fn circuit_breaker(mut self, configure: impl FnOnce(&mut CircuitBreakerConfig)) -> Self {
        configure(&mut self.config.orchestration.circuit_breaker);
        self
    }

    pub fn retry(mut self, configure: impl FnOnce(&mut RetryConfig)) -> Self {
        configure(&mut self.config.orchestration.retry);
        self
    }

    pub fn rate_limit(mut self, configure: impl FnOnce(&mut RateLimitConfig)) -> Self {
        configure(&mut self.config.orchestration.rate_limit);
        self
    }

    pub fn health(mut self, configure: impl FnOnce(&mut HealthConfig)) -> Self {
        configure(&mut self.config.orchestration.health);
        self
    }

    pub fn auto_switch_on_error(mut self, enabled: bool) -> Self {
        self.config.orchestration.auto_switch_on_error = enabled;
        self
    }

    /// Use a specific executor (tests pass a scripted runner here).
    pub fn runner(mut self, runner: Arc<dyn CommandRunner>) -> Self {
        self.runner = Some(runner);
        self
    }

    /// Register a custom provider adapter.
    pub fn register_provider(
        self,
        name: &str,
        binary: &str,
        aliases: &[&str],
        factory: AdapterFactory,
    ) -> Self {
        self.registry.register(name, binary, aliases, factory);
        self
    }

    pub fn on_tokens_used(self, f: impl Fn(&TokenEvent) + Send + Sync + 'static) -> Self {
        self.callbacks.on_tokens_used(f);
        self
    }

    pub fn on_provider_switch(
        self,
        f: impl Fn(&str, &str, &str, Option<&str>) + Send + Sync + 'static,
    ) -> Self {
        self.callbacks.on_provider_switch(f);
        self
    }

    pub fn on_circuit_open(self, f: impl Fn(&str) + Send + Sync + 'static) -> Self {
        self.callbacks.on_circuit_open(f);
        self
    }

    pub fn on_circuit_close(self, f: impl Fn(&str) + Send + Sync + 'static) -> Self {
        self.callbacks.on_circuit_close(f);
        self
    }

    /// Validate the configuration and assemble the orchestrator.
    pub fn build(mut self) -> Result<Orchestrator> {
        if self.config.providers.is_empty() {
            self.config.providers = BatonConfig::default().providers;
        }
        let runner = self
            .runner
            .unwrap_or_else(|| Arc::new(SystemRunner::new()));
        Orchestrator::new(
            self.config,
            Arc::new(self.registry),
            runner,
            self.callbacks,
        )
    }
}

impl Default for OrchestratorBuilder {
    fn default() -> Self {
        Self::new()
    }
}
