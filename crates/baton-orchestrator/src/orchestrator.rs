//! The outer control loop: select a provider, invoke it, classify the
//! failure, update state, then retry, switch, or give up.

use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use crate::ledger::TokenLedger;
use crate::manager::{ProviderHealthReport, ProviderManager};
use crate::metrics::{Metrics, MetricsSnapshot};
use baton_config::BatonConfig;
use baton_core::{AgentResponse, BatonError, CallbackBus, Result};
use baton_exec::CommandRunner;
use baton_providers::{CliAgent, ProviderRegistry, SendOptions};

/// How the loop responds to a failure class.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FailureStrategy {
    /// Try a fallback provider before the next attempt.
    Switch,
    /// Sleep and try again (the next select may still pick a fallback if
    /// the provider's gates closed meanwhile).
    Retry,
}

#[derive(Debug, Clone, Serialize)]
pub struct OrchestratorStatus {
    pub current_provider: String,
    pub available_providers: Vec<String>,
    pub providers: Vec<ProviderHealthReport>,
    pub metrics: MetricsSnapshot,
}

/// The resilient dispatcher. Safe for concurrent `send` calls.
pub struct Orchestrator {
    config: Arc<BatonConfig>,
    manager: ProviderManager,
    metrics: Metrics,
    callbacks: CallbackBus,
    tokens: TokenLedger,
}

impl Orchestrator {
    pub fn builder() -> crate::builder::OrchestratorBuilder {
        crate::builder::OrchestratorBuilder::new()
    }

    pub fn new(
        config: BatonConfig,
        registry: Arc<ProviderRegistry>,
        runner: Arc<dyn CommandRunner>,
        callbacks: CallbackBus,
    ) -> Result<Self> {
        config.validate().map_err(BatonError::Config)?;
        let config = Arc::new(config);
        let tokens = TokenLedger::attach(&callbacks);
        let manager = ProviderManager::new(
            Arc::clone(&config),
            registry,
            runner,
            callbacks.clone(),
        );
        Ok(Self {
            config,
            manager,
            metrics: Metrics::new(),
            callbacks,
            tokens,
        })
    }

    /// Send a prompt through the orchestrated path: provider selection,
    /// retry with backoff, and transparent failover.
    pub async fn send(
        &self,
        prompt: &str,
        preferred: Option<&str>,
        opts: SendOptions,
    ) -> Result<AgentResponse> {
        let retry = &self.config.orchestration.retry;
        let max_attempts = retry.max_attempts;
        let mut retries = 0u32;
        let mut preferred: Option<String> = preferred.map(String::from);

        loop {
            // NoProvidersAvailable from selection is terminal.
            let adapter = self.manager.select(preferred.as_deref())?;
            let provider = adapter.name().to_string();
            // Track the provider actually chosen so a retry sticks with it
            // unless its own gates close.
            preferred = Some(provider.clone());

            self.metrics.record_attempt(&provider);

            match adapter.send(prompt, &opts).await {
                Ok(response) => {
                    self.metrics.record_success(&provider, response.duration);
                    self.manager.record_success(&provider);
                    return Ok(response);
                }
                Err(err) => {
                    debug!(provider, error = %err, "attempt failed");
                    match &err {
                        BatonError::NoProvidersAvailable { .. } => return Err(err),
                        BatonError::RateLimited { retry_after, .. } => {
                            self.manager.mark_rate_limited(&provider, *retry_after);
                            self.handle_failure(&err, &provider, FailureStrategy::Switch)
                                .await;
                        }
                        BatonError::CircuitOpen(_) => {
                            self.handle_failure(&err, &provider, FailureStrategy::Switch)
                                .await;
                        }
                        BatonError::Timeout(_)
                        | BatonError::Provider { .. }
                        | BatonError::CommandExecution(_)
                        | BatonError::ProviderUnavailable { .. } => {
                            self.manager.record_failure(&provider);
                            self.handle_failure(&err, &provider, FailureStrategy::Retry)
                                .await;
                        }
                        _ => {
                            self.manager.record_failure(&provider);
                            self.handle_failure(&err, &provider, FailureStrategy::Switch)
                                .await;
                        }
                    }

                    retries += 1;
                    if !self.should_retry(retries, max_attempts) {
                        return Err(Self::surface_error(err, &provider));
                    }
                }
            }
        }
    }

    /// Run one provider directly: no fallback, no retry, no circuit or
    /// health updates. The adapter's error surfaces as-is.
    pub async fn execute_direct(
        &self,
        prompt: &str,
        provider: &str,
        opts: SendOptions,
    ) -> Result<AgentResponse> {
        let adapter = self.manager.adapter(provider)?;
        adapter.send(prompt, &opts).await
    }

    /// The adapter for `name`, bypassing selection gates.
    pub fn provider(&self, name: &str) -> Result<Arc<dyn CliAgent>> {
        self.manager.adapter(name)
    }

    async fn handle_failure(&self, err: &BatonError, provider: &str, strategy: FailureStrategy) {
        self.metrics.record_failure(provider, err.kind());

        match strategy {
            FailureStrategy::Switch => {
                if !self.config.orchestration.auto_switch_on_error {
                    return;
                }
                match self
                    .manager
                    .switch_provider(err.kind(), Some(err.to_string()))
                {
                    Ok(next) => {
                        self.metrics.record_switch(provider, next.name(), err.kind());
                    }
                    // The outer loop surfaces exhaustion on its next
                    // select or when retries run out.
                    Err(BatonError::NoProvidersAvailable { .. }) => {
                        debug!(provider, "no fallback available");
                    }
                    Err(other) => {
                        warn!(provider, error = %other, "switch failed");
                    }
                }
            }
            FailureStrategy::Retry => {
                let delay = self.retry_delay();
                if delay > Duration::ZERO {
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }

    fn should_retry(&self, retries: u32, max_attempts: u32) -> bool {
        self.config.orchestration.retry.enabled && retries < max_attempts
    }

    // TODO: compound by exponential_base^attempt — the knob exists in
    // RetryConfig but is not applied yet.
    fn retry_delay(&self) -> Duration {
        let retry = &self.config.orchestration.retry;
        let base = retry.base_delay();
        let delay = if retry.jitter {
            base.mul_f64(1.0 + rand::random::<f64>() * 0.5)
        } else {
            base
        };
        delay.min(retry.max_delay())
    }

    /// The error thrown when retries are exhausted: typed errors surface
    /// as-is, everything else is wrapped as a provider error.
    fn surface_error(err: BatonError, provider: &str) -> BatonError {
        match err {
            wrapped @ (BatonError::Io(_) | BatonError::Serialization(_) | BatonError::Other(_)) => {
                BatonError::Provider {
                    provider: provider.to_string(),
                    message: wrapped.to_string(),
                }
            }
            typed => typed,
        }
    }

    pub fn status(&self) -> OrchestratorStatus {
        OrchestratorStatus {
            current_provider: self.manager.current_provider(),
            available_providers: self.manager.available_providers(),
            providers: self.manager.health_status(),
            metrics: self.metrics.snapshot(),
        }
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    pub fn tokens(&self) -> &TokenLedger {
        &self.tokens
    }

    pub fn callbacks(&self) -> &CallbackBus {
        &self.callbacks
    }

    pub fn manager(&self) -> &ProviderManager {
        &self.manager
    }

    pub fn config(&self) -> &BatonConfig {
        &self.config
    }

    /// Return the orchestrator to its post-construction state.
    pub fn reset(&self) {
        self.manager.reset();
        self.metrics.reset();
        self.tokens.reset();
    }
}
