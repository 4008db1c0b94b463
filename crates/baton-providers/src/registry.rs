//! Provider registry: canonical name → adapter factory, with aliases.
//!
//! The registry is a plain value so it can be injected and reset in
//! tests; [`ProviderRegistry::global`] offers a process-wide default.
//! Built-ins register lazily on first lookup, and never clobber a custom
//! registration under the same name.

use once_cell::sync::Lazy;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

use crate::adapter::{AdapterContext, CliAgent};
use crate::aider::AiderAgent;
use crate::claude::ClaudeAgent;
use crate::codex::CodexAgent;
use crate::copilot::CopilotAgent;
use crate::cursor::CursorAgent;
use crate::gemini::GeminiAgent;
use crate::minimal::MinimalAgent;
use baton_core::{BatonError, Result};
use baton_exec::CommandRunner;

pub type AdapterFactory = Arc<dyn Fn(AdapterContext) -> Arc<dyn CliAgent> + Send + Sync>;

struct Registration {
    factory: AdapterFactory,
    binary: String,
}

#[derive(Default)]
struct RegistryInner {
    factories: HashMap<String, Registration>,
    aliases: HashMap<String, String>,
    builtins_loaded: bool,
}

#[derive(Default)]
pub struct ProviderRegistry {
    inner: RwLock<RegistryInner>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Process-wide default instance.
    pub fn global() -> &'static ProviderRegistry {
        static GLOBAL: Lazy<ProviderRegistry> = Lazy::new(ProviderRegistry::new);
        &GLOBAL
    }

    /// Register a provider under `name`, with the binary it wraps and any
    /// aliases that should resolve to it.
    pub fn register(&self, name: &str, binary: &str, aliases: &[&str], factory: AdapterFactory) {
        let mut inner = self.inner.write();
        Self::register_locked(&mut inner, name, binary, aliases, factory, true);
    }

    fn register_locked(
        inner: &mut RegistryInner,
        name: &str,
        binary: &str,
        aliases: &[&str],
        factory: AdapterFactory,
        replace: bool,
    ) {
        if !replace && inner.factories.contains_key(name) {
            return;
        }
        inner.factories.insert(
            name.to_string(),
            Registration {
                factory,
                binary: binary.to_string(),
            },
        );
        for alias in aliases {
            inner
                .aliases
                .insert((*alias).to_string(), name.to_string());
        }
    }

    fn ensure_builtins(&self) {
        if self.inner.read().builtins_loaded {
            return;
        }
        let mut inner = self.inner.write();
        if inner.builtins_loaded {
            return;
        }
        inner.builtins_loaded = true;

        // Custom registrations made before first lookup win over builtins.
        Self::register_locked(
            &mut inner,
            "claude",
            "claude",
            &["anthropic"],
            Arc::new(|ctx| Arc::new(ClaudeAgent::new(ctx))),
            false,
        );
        Self::register_locked(
            &mut inner,
            "cursor",
            "cursor-agent",
            &[],
            Arc::new(|ctx| Arc::new(CursorAgent::new(ctx))),
            false,
        );
        Self::register_locked(
            &mut inner,
            "gemini",
            "gemini",
            &[],
            Arc::new(|ctx| Arc::new(GeminiAgent::new(ctx))),
            false,
        );
        Self::register_locked(
            &mut inner,
            "github_copilot",
            "copilot",
            &["copilot"],
            Arc::new(|ctx| Arc::new(CopilotAgent::new(ctx))),
            false,
        );
        Self::register_locked(
            &mut inner,
            "codex",
            "codex",
            &[],
            Arc::new(|ctx| Arc::new(CodexAgent::new(ctx))),
            false,
        );
        Self::register_locked(
            &mut inner,
            "aider",
            "aider",
            &[],
            Arc::new(|ctx| Arc::new(AiderAgent::new(ctx))),
            false,
        );
        Self::register_locked(
            &mut inner,
            "opencode",
            "opencode",
            &[],
            Arc::new(|ctx| Arc::new(MinimalAgent::opencode(ctx))),
            false,
        );
        Self::register_locked(
            &mut inner,
            "kilocode",
            "kilocode",
            &[],
            Arc::new(|ctx| Arc::new(MinimalAgent::kilocode(ctx))),
            false,
        );
    }

    /// Resolve an alias to its canonical name; unknown names pass through.
    pub fn canonical_name(&self, name: &str) -> String {
        self.ensure_builtins();
        let inner = self.inner.read();
        inner
            .aliases
            .get(name)
            .cloned()
            .unwrap_or_else(|| name.to_string())
    }

    pub fn get(&self, name: &str) -> Result<AdapterFactory> {
        self.ensure_builtins();
        let inner = self.inner.read();
        let canonical = inner.aliases.get(name).map(String::as_str).unwrap_or(name);
        inner
            .factories
            .get(canonical)
            .map(|r| Arc::clone(&r.factory))
            .ok_or_else(|| BatonError::ProviderNotFound(name.to_string()))
    }

    pub fn registered(&self, name: &str) -> bool {
        self.ensure_builtins();
        let inner = self.inner.read();
        let canonical = inner.aliases.get(name).map(String::as_str).unwrap_or(name);
        inner.factories.contains_key(canonical)
    }

    /// All canonical provider names, sorted.
    pub fn all(&self) -> Vec<String> {
        self.ensure_builtins();
        let mut names: Vec<String> = self.inner.read().factories.keys().cloned().collect();
        names.sort();
        names
    }

    /// Providers whose binary resolves on PATH, sorted.
    pub fn available(&self, runner: &dyn CommandRunner) -> Vec<String> {
        self.ensure_builtins();
        let inner = self.inner.read();
        let mut names: Vec<String> = inner
            .factories
            .iter()
            .filter(|(_, reg)| runner.which(&reg.binary).is_some())
            .map(|(name, _)| name.clone())
            .collect();
        names.sort();
        names
    }

    pub fn binary_for(&self, name: &str) -> Option<String> {
        self.ensure_builtins();
        let inner = self.inner.read();
        let canonical = inner.aliases.get(name).map(String::as_str).unwrap_or(name);
        inner.factories.get(canonical).map(|r| r.binary.clone())
    }

    /// Drop every registration, including builtins (they reload lazily).
    pub fn reset(&self) {
        *self.inner.write() = RegistryInner::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockAgent;
    use baton_config::ProviderConfig;
    use baton_core::CallbackBus;
    use baton_exec::ScriptedRunner;

    fn ctx() -> AdapterContext {
        AdapterContext {
            runner: Arc::new(ScriptedRunner::new()),
            config: ProviderConfig::named("claude"),
            callbacks: CallbackBus::new(),
        }
    }

    #[test]
    fn builtins_load_on_first_lookup() {
        let registry = ProviderRegistry::new();
        let factory = registry.get("claude").unwrap();
        let adapter = factory(ctx());
        assert_eq!(adapter.name(), "claude");
        assert_eq!(registry.all().len(), 8);
    }

    #[test]
    fn aliases_resolve_to_canonical_names() {
        let registry = ProviderRegistry::new();
        assert_eq!(registry.canonical_name("anthropic"), "claude");
        assert_eq!(registry.canonical_name("copilot"), "github_copilot");
        let factory = registry.get("copilot").unwrap();
        assert_eq!(factory(ctx()).name(), "github_copilot");
    }

    #[test]
    fn unknown_provider_is_an_error() {
        let registry = ProviderRegistry::new();
        let err = match registry.get("not-a-provider") {
            Err(e) => e,
            Ok(_) => panic!("expected an error"),
        };
        assert!(matches!(err, BatonError::ProviderNotFound(_)));
    }

    #[test]
    fn custom_registration_survives_builtin_load() {
        let registry = ProviderRegistry::new();
        let mock = MockAgent::new("claude");
        // Registered before the first lookup triggers the builtin load.
        registry.register("claude", "true", &[], mock.factory());

        let factory = registry.get("claude").unwrap();
        let adapter = factory(ctx());
        // Still the mock, not the builtin ClaudeAgent.
        assert_eq!(adapter.display_name(), "claude");
    }

    #[test]
    fn available_filters_by_binary_presence() {
        let registry = ProviderRegistry::new();
        let runner = ScriptedRunner::new().with_installed(&["claude", "gemini"]);
        let available = registry.available(&runner);
        assert_eq!(available, vec!["claude".to_string(), "gemini".to_string()]);
    }

    #[test]
    fn reset_returns_to_lazy_state() {
        let registry = ProviderRegistry::new();
        registry.register("custom", "custom-bin", &[], MockAgent::new("custom").factory());
        assert!(registry.registered("custom"));

        registry.reset();
        assert!(!registry.registered("custom"));
        // Builtins come back lazily.
        assert!(registry.registered("claude"));
    }
}
