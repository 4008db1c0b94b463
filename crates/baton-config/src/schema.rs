use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

/// Canonical names of the built-in providers, in fallback-tail order.
pub const BUILTIN_PROVIDERS: &[&str] = &[
    "aider",
    "claude",
    "codex",
    "cursor",
    "gemini",
    "github_copilot",
    "kilocode",
    "opencode",
];

/// Root configuration — maps to `baton.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BatonConfig {
    /// Provider tried first when the caller states no preference.
    pub default_provider: String,
    /// Providers tried, in order, when the selected one is unavailable.
    /// The remaining configured providers follow in name order.
    pub fallback_providers: Vec<String>,
    /// Per-provider settings, keyed by canonical provider name.
    pub providers: BTreeMap<String, ProviderConfig>,
    pub orchestration: OrchestrationConfig,
    pub logging: LoggingConfig,
}

impl Default for BatonConfig {
    fn default() -> Self {
        let providers = BUILTIN_PROVIDERS
            .iter()
            .map(|name| ((*name).to_string(), ProviderConfig::named(name)))
            .collect();
        Self {
            default_provider: "claude".into(),
            fallback_providers: vec![],
            providers,
            orchestration: OrchestrationConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl BatonConfig {
    /// Validate the configuration. Returns non-fatal warnings, or an error
    /// message for configurations the orchestrator cannot run with.
    pub fn validate(&self) -> Result<Vec<String>, String> {
        if self.providers.is_empty() {
            return Err("no providers configured".into());
        }
        if !self.providers.contains_key(&self.default_provider) {
            return Err(format!(
                "default_provider `{}` is not a configured provider",
                self.default_provider
            ));
        }

        let mut warnings = Vec::new();
        for name in &self.fallback_providers {
            if !self.providers.contains_key(name) {
                warnings.push(format!("fallback provider `{name}` is not configured"));
            }
        }
        if self.providers.values().all(|p| !p.enabled) {
            return Err("all configured providers are disabled".into());
        }
        if let Some(p) = self.providers.get(&self.default_provider) {
            if !p.enabled {
                warnings.push(format!(
                    "default_provider `{}` is disabled; every call will fall back",
                    self.default_provider
                ));
            }
        }
        Ok(warnings)
    }

    pub fn provider(&self, name: &str) -> Option<&ProviderConfig> {
        self.providers.get(name)
    }

    /// Names of enabled providers, in map (name) order.
    pub fn enabled_providers(&self) -> Vec<String> {
        self.providers
            .iter()
            .filter(|(_, p)| p.enabled)
            .map(|(name, _)| name.clone())
            .collect()
    }
}

// ── Providers ──────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    pub name: String,
    pub enabled: bool,
    /// Lower is preferred. Informational; chain order is governed by
    /// `fallback_providers`.
    pub priority: u32,
    /// Models this provider is allowed to run. Empty means "anything".
    pub models: Vec<String>,
    /// Default model when the caller names none.
    pub model: Option<String>,
    /// Flags appended before the prompt-carrying flag on every call.
    pub default_flags: Vec<String>,
    /// Per-call subprocess timeout.
    pub timeout_secs: u64,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            name: String::new(),
            enabled: true,
            priority: 0,
            models: vec![],
            model: None,
            default_flags: vec![],
            timeout_secs: 300,
        }
    }
}

impl ProviderConfig {
    pub fn named(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Default::default()
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

// ── Orchestration ──────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OrchestrationConfig {
    pub circuit_breaker: CircuitBreakerConfig,
    pub retry: RetryConfig,
    pub rate_limit: RateLimitConfig,
    pub health: HealthConfig,
    /// Switch to a fallback provider when a call fails with a
    /// switch-worthy error.
    pub auto_switch_on_error: bool,
}

impl Default for OrchestrationConfig {
    fn default() -> Self {
        Self {
            circuit_breaker: CircuitBreakerConfig::default(),
            retry: RetryConfig::default(),
            rate_limit: RateLimitConfig::default(),
            health: HealthConfig::default(),
            auto_switch_on_error: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CircuitBreakerConfig {
    pub enabled: bool,
    /// Failures that open the circuit.
    pub failure_threshold: u32,
    /// How long an open circuit blocks before allowing probes.
    pub timeout_secs: u64,
    /// Consecutive half-open successes required to close.
    pub half_open_max_calls: u32,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            failure_threshold: 5,
            timeout_secs: 60,
            half_open_max_calls: 1,
        }
    }
}

impl CircuitBreakerConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub enabled: bool,
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
    /// Configured for exponential backoff; see the delay computation for
    /// its current status.
    pub exponential_base: f64,
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_attempts: 3,
            base_delay_ms: 1000,
            max_delay_ms: 30_000,
            exponential_base: 2.0,
            jitter: true,
        }
    }
}

impl RetryConfig {
    pub fn base_delay(&self) -> Duration {
        Duration::from_millis(self.base_delay_ms)
    }

    pub fn max_delay(&self) -> Duration {
        Duration::from_millis(self.max_delay_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Cooldown applied when a provider reports a rate limit without a
    /// reset hint.
    pub default_reset_secs: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            default_reset_secs: 60,
        }
    }
}

impl RateLimitConfig {
    pub fn default_reset(&self) -> Duration {
        Duration::from_secs(self.default_reset_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HealthConfig {
    pub enabled: bool,
    /// Number of recent outcomes considered.
    pub window: usize,
    /// Minimum success rate over the window to count as healthy.
    pub threshold: f64,
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            window: 100,
            threshold: 0.5,
        }
    }
}

// ── Logging ────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default log filter (overridden by RUST_LOG and CLI flags).
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = BatonConfig::default();
        let warnings = config.validate().unwrap();
        assert!(warnings.is_empty());
        assert_eq!(config.default_provider, "claude");
        assert_eq!(config.providers.len(), BUILTIN_PROVIDERS.len());
    }

    #[test]
    fn empty_providers_is_an_error() {
        let config = BatonConfig {
            providers: BTreeMap::new(),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn unknown_default_provider_is_an_error() {
        let config = BatonConfig {
            default_provider: "nonexistent".into(),
            ..Default::default()
        };
        assert!(config.validate().unwrap_err().contains("nonexistent"));
    }

    #[test]
    fn unknown_fallback_is_only_a_warning() {
        let config = BatonConfig {
            fallback_providers: vec!["nonexistent".into()],
            ..Default::default()
        };
        let warnings = config.validate().unwrap();
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].contains("nonexistent"));
    }

    #[test]
    fn toml_round_trip_keeps_overrides() {
        let raw = r#"
            default_provider = "cursor"
            fallback_providers = ["claude"]

            [providers.cursor]
            name = "cursor"
            model = "claude-3-5-sonnet"
            timeout_secs = 120

            [providers.claude]
            name = "claude"

            [orchestration.retry]
            max_attempts = 5
            jitter = false

            [orchestration.circuit_breaker]
            failure_threshold = 3
        "#;
        let config: BatonConfig = toml::from_str(raw).unwrap();
        assert_eq!(config.default_provider, "cursor");
        assert_eq!(config.providers["cursor"].timeout_secs, 120);
        assert_eq!(config.orchestration.retry.max_attempts, 5);
        assert!(!config.orchestration.retry.jitter);
        assert_eq!(config.orchestration.circuit_breaker.failure_threshold, 3);
        // Untouched sections keep their defaults.
        assert_eq!(config.orchestration.health.window, 100);
        assert!(config.orchestration.auto_switch_on_error);
    }
}
