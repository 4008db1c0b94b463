//! The provider adapter contract.
//!
//! An adapter is a thin translator between the uniform `send` operation
//! and one CLI binary's argv conventions. All orchestration decisions
//! (retry, switch, circuit state) live above this layer; adapters only
//! build commands, parse results, and surface typed errors.

use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;
use uuid::Uuid;

use baton_config::ProviderConfig;
use baton_core::{
    classify, AgentResponse, BatonError, CallbackBus, ErrorCategory, ErrorPatterns,
    OrchestratorEvent, Result, TokenEvent,
};
use baton_exec::{CommandOutput, CommandRunner, ExecOptions};

/// Everything an adapter instance needs: the executor, its provider
/// config, and the bus it emits token events on.
#[derive(Clone)]
pub struct AdapterContext {
    pub runner: Arc<dyn CommandRunner>,
    pub config: ProviderConfig,
    pub callbacks: CallbackBus,
}

/// Per-call options. `options.X` overrides `config.X`.
#[derive(Debug, Clone, Default)]
pub struct SendOptions {
    pub model: Option<String>,
    pub timeout: Option<Duration>,
    /// Session/conversation to resume, for adapters that support it.
    pub session: Option<String>,
    /// Run with permission checks disabled, for adapters that support it.
    pub dangerous: bool,
    /// Extra argv appended after the configured default flags.
    pub extra_flags: Vec<String>,
    pub env: HashMap<String, String>,
}

/// An argv plus an optional stdin payload. Adapters that deliver the
/// prompt on stdin (cursor) set `stdin`; nothing above this layer cares.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    pub args: Vec<String>,
    pub stdin: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Capabilities {
    pub streaming: bool,
    pub file_upload: bool,
    pub vision: bool,
    pub tool_use: bool,
    pub json_mode: bool,
    pub mcp: bool,
    pub dangerous_mode: bool,
}

/// Network endpoints a provider's binary needs reachable. Informational;
/// surfaced by `baton doctor`.
#[derive(Debug, Clone, Default, Serialize)]
pub struct FirewallRequirements {
    pub domains: Vec<String>,
    pub ip_ranges: Vec<String>,
}

/// A project-level instruction file the binary reads, e.g. `CLAUDE.md`.
#[derive(Debug, Clone, Serialize)]
pub struct InstructionFile {
    pub path: String,
    pub description: String,
    pub symlink: bool,
}

impl InstructionFile {
    pub fn new(path: &str, description: &str) -> Self {
        Self {
            path: path.to_string(),
            description: description.to_string(),
            symlink: false,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ModelInfo {
    pub name: String,
    pub family: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct McpServer {
    pub name: String,
    pub status: String,
    pub enabled: bool,
}

/// Result of validating an adapter's provider config.
#[derive(Debug, Clone, Serialize)]
pub struct ConfigCheck {
    pub valid: bool,
    pub errors: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct HealthReport {
    pub healthy: bool,
    pub message: String,
}

/// Uniform contract every CLI wrapper exposes.
///
/// Adapters are stateless after construction and safe to share across
/// concurrent calls. The provided `send` implements the whole
/// build → execute → parse → classify pipeline; concrete adapters
/// normally implement only the identity methods and `build_command`.
#[async_trait]
pub trait CliAgent: Send + Sync {
    fn context(&self) -> &AdapterContext;

    /// Canonical provider name, e.g. `github_copilot`.
    fn name(&self) -> &str;

    fn display_name(&self) -> &str {
        self.name()
    }

    /// Binary looked up on PATH, e.g. `cursor-agent`.
    fn binary(&self) -> &str;

    fn capabilities(&self) -> Capabilities {
        Capabilities::default()
    }

    /// Provider-specific classification patterns, tried before the
    /// generic taxonomy table.
    fn error_patterns(&self) -> ErrorPatterns {
        ErrorPatterns::new()
    }

    fn firewall_requirements(&self) -> FirewallRequirements {
        FirewallRequirements::default()
    }

    fn instruction_files(&self) -> Vec<InstructionFile> {
        vec![]
    }

    /// Static model table for this provider, if one is known.
    fn known_models(&self) -> &[&str] {
        &[]
    }

    async fn discover_models(&self) -> Vec<ModelInfo> {
        let mut models: Vec<ModelInfo> = self
            .known_models()
            .iter()
            .map(|m| ModelInfo {
                name: (*m).to_string(),
                family: Some(self.model_family(m)),
            })
            .collect();
        for m in &self.context().config.models {
            if !models.iter().any(|known| known.name == *m) {
                models.push(ModelInfo {
                    name: m.clone(),
                    family: Some(self.model_family(m)),
                });
            }
        }
        models
    }

    /// Normalize a provider model name to its family, e.g. strip a date
    /// suffix. Identity by default.
    fn model_family(&self, model: &str) -> String {
        model.to_string()
    }

    /// Inverse of [`CliAgent::model_family`]: the provider's name for a
    /// family. Identity by default.
    fn model_for_family(&self, family: &str) -> String {
        family.to_string()
    }

    fn supports_model_family(&self, family: &str) -> bool {
        self.known_models()
            .iter()
            .any(|m| self.model_family(m) == family)
    }

    fn supports_mcp(&self) -> bool {
        self.capabilities().mcp
    }

    async fn mcp_servers(&self) -> Result<Vec<McpServer>> {
        Ok(vec![])
    }

    fn supports_dangerous_mode(&self) -> bool {
        self.capabilities().dangerous_mode
    }

    fn dangerous_mode_flags(&self) -> Vec<String> {
        vec![]
    }

    fn supports_sessions(&self) -> bool {
        false
    }

    fn session_flags(&self, _session: &str) -> Vec<String> {
        vec![]
    }

    fn validate_config(&self) -> ConfigCheck {
        let config = &self.context().config;
        let mut errors = Vec::new();
        if let Some(model) = &config.model {
            if !config.models.is_empty() && !config.models.contains(model) {
                errors.push(format!(
                    "model `{model}` is not in the configured model list"
                ));
            }
        }
        ConfigCheck {
            valid: errors.is_empty(),
            errors,
        }
    }

    async fn health_status(&self) -> HealthReport {
        match self.context().runner.which(self.binary()) {
            Some(path) => HealthReport {
                healthy: true,
                message: format!("{} found at {}", self.binary(), path.display()),
            },
            None => HealthReport {
                healthy: false,
                message: format!("binary `{}` not found on PATH", self.binary()),
            },
        }
    }

    fn available(&self) -> bool {
        self.context().runner.which(self.binary()).is_some()
    }

    /// The model for this call: per-call option first, then config.
    fn resolve_model(&self, opts: &SendOptions) -> Option<String> {
        opts.model
            .clone()
            .or_else(|| self.context().config.model.clone())
    }

    /// Build the argv (and optional stdin payload) for one invocation.
    fn build_command(&self, prompt: &str, opts: &SendOptions) -> CommandSpec;

    fn build_env(&self, opts: &SendOptions) -> HashMap<String, String> {
        opts.env.clone()
    }

    /// Turn a completed invocation into a response. The default keeps
    /// stdout as the output and populates `error` from stderr on a
    /// non-zero exit.
    fn parse_response(&self, output: &CommandOutput, opts: &SendOptions) -> AgentResponse {
        let error = if output.success() {
            None
        } else {
            let stderr = output.stderr.trim();
            Some(if stderr.is_empty() {
                format!("exit code {}", output.exit_code)
            } else {
                stderr.to_string()
            })
        };
        AgentResponse {
            output: output.stdout.trim_end().to_string(),
            exit_code: output.exit_code,
            duration: output.duration,
            provider: self.name().to_string(),
            model: self.resolve_model(opts),
            tokens: None,
            metadata: HashMap::new(),
            error,
        }
    }

    /// Map an execution failure to the matching typed error, classifying
    /// its text through this adapter's patterns.
    fn classify_failure(&self, err: BatonError) -> BatonError {
        match err {
            BatonError::Timeout(_) => err,
            other => {
                let message = other.to_string();
                match classify(&message, Some(&self.error_patterns())) {
                    ErrorCategory::RateLimited => BatonError::RateLimited {
                        provider: self.name().to_string(),
                        retry_after: None,
                    },
                    ErrorCategory::AuthExpired => {
                        BatonError::Auth(format!("{}: {message}", self.name()))
                    }
                    ErrorCategory::Timeout => BatonError::Timeout(message),
                    _ => BatonError::Provider {
                        provider: self.name().to_string(),
                        message,
                    },
                }
            }
        }
    }

    /// Send a prompt through this adapter's binary and return the parsed
    /// response. Emits a token-usage event when the response carries
    /// token counts.
    async fn send(&self, prompt: &str, opts: &SendOptions) -> Result<AgentResponse> {
        let ctx = self.context();

        if !self.available() {
            return Err(BatonError::ProviderUnavailable {
                provider: self.name().to_string(),
                reason: format!("binary `{}` not found on PATH", self.binary()),
            });
        }

        let spec = self.build_command(prompt, opts);
        let env = self.build_env(opts);
        let timeout = opts.timeout.unwrap_or_else(|| ctx.config.timeout());
        let exec_opts = ExecOptions {
            timeout: Some(timeout),
            env,
            stdin: spec.stdin,
            working_dir: None,
        };

        debug!(
            provider = self.name(),
            binary = self.binary(),
            "dispatching prompt"
        );

        match ctx.runner.execute(self.binary(), &spec.args, &exec_opts).await {
            Ok(output) => {
                let response = self.parse_response(&output, opts);
                if let Some(usage) = response.tokens {
                    ctx.callbacks.emit(&OrchestratorEvent::TokensUsed(TokenEvent {
                        provider: self.name().to_string(),
                        model: response.model.clone(),
                        usage,
                        at: Utc::now(),
                        request_id: Uuid::new_v4(),
                    }));
                }
                Ok(response)
            }
            Err(err) => Err(self.classify_failure(err)),
        }
    }
}
