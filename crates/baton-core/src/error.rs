use std::collections::BTreeMap;
use std::time::Duration;
use thiserror::Error;

/// Unified error type for the entire baton workspace.
#[derive(Error, Debug)]
pub enum BatonError {
    // ── Provider errors ────────────────────────────────────────
    #[error("provider error: {provider}: {message}")]
    Provider { provider: String, message: String },

    #[error("provider not found: {0}")]
    ProviderNotFound(String),

    #[error("provider unavailable: {provider}: {reason}")]
    ProviderUnavailable { provider: String, reason: String },

    #[error("authentication failed: {0}")]
    Auth(String),

    // ── Execution errors ───────────────────────────────────────
    #[error("command timed out: {0}")]
    Timeout(String),

    #[error("command execution failed: {0}")]
    CommandExecution(String),

    // ── Orchestration errors ───────────────────────────────────
    #[error("rate limited: {provider}")]
    RateLimited {
        provider: String,
        retry_after: Option<Duration>,
    },

    #[error("circuit open for provider: {0}")]
    CircuitOpen(String),

    #[error("no providers available (attempted: {})", .attempted.join(", "))]
    NoProvidersAvailable {
        attempted: Vec<String>,
        reasons: BTreeMap<String, String>,
    },

    // ── Config errors ──────────────────────────────────────────
    #[error("config error: {0}")]
    Config(String),

    // ── Generic wrappers ───────────────────────────────────────
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

impl BatonError {
    /// Stable snake_case tag for this error, used as the metrics error-count
    /// key and the provider-switch reason string.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Provider { .. } => "provider",
            Self::ProviderNotFound(_) => "provider_not_found",
            Self::ProviderUnavailable { .. } => "provider_unavailable",
            Self::Auth(_) => "auth",
            Self::Timeout(_) => "timeout",
            Self::CommandExecution(_) => "command_execution",
            Self::RateLimited { .. } => "rate_limited",
            Self::CircuitOpen(_) => "circuit_open",
            Self::NoProvidersAvailable { .. } => "no_providers_available",
            Self::Config(_) => "config",
            Self::Io(_) => "io",
            Self::Serialization(_) => "serialization",
            Self::Other(_) => "other",
        }
    }

    pub fn provider(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Provider {
            provider: provider.into(),
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, BatonError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_providers_display_lists_attempts() {
        let err = BatonError::NoProvidersAvailable {
            attempted: vec!["claude".into(), "cursor".into()],
            reasons: BTreeMap::from([
                ("claude".into(), "rate_limited".into()),
                ("cursor".into(), "circuit_open".into()),
            ]),
        };
        assert_eq!(
            err.to_string(),
            "no providers available (attempted: claude, cursor)"
        );
        assert_eq!(err.kind(), "no_providers_available");
    }

    #[test]
    fn kind_is_stable_for_typed_errors() {
        let err = BatonError::RateLimited {
            provider: "claude".into(),
            retry_after: Some(Duration::from_secs(60)),
        };
        assert_eq!(err.kind(), "rate_limited");
        assert_eq!(BatonError::Timeout("claude".into()).kind(), "timeout");
    }
}
