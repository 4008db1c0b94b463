//! Error taxonomy: maps heterogeneous textual agent errors into a closed
//! set of categories, each with a recommended recovery action.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// Closed set of error categories the orchestrator decides on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    RateLimited,
    QuotaExceeded,
    AuthExpired,
    Timeout,
    Transient,
    Permanent,
    Unknown,
}

/// What the orchestrator should do about an error of a given category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecoveryAction {
    SwitchProvider,
    RetryWithBackoff,
    Escalate,
}

impl ErrorCategory {
    pub fn action(self) -> RecoveryAction {
        match self {
            Self::RateLimited | Self::QuotaExceeded | Self::AuthExpired => {
                RecoveryAction::SwitchProvider
            }
            // Unknown gets a bounded second chance rather than an immediate
            // escalation.
            Self::Timeout | Self::Transient | Self::Unknown => RecoveryAction::RetryWithBackoff,
            Self::Permanent => RecoveryAction::Escalate,
        }
    }

    pub fn is_retryable(self) -> bool {
        match self {
            Self::RateLimited | Self::Timeout | Self::Transient | Self::Unknown => true,
            Self::QuotaExceeded | Self::AuthExpired | Self::Permanent => false,
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            Self::RateLimited => "provider rejected the request due to rate limiting",
            Self::QuotaExceeded => "account quota or billing limit reached",
            Self::AuthExpired => "authentication is missing, invalid, or expired",
            Self::Timeout => "the agent did not complete within the timeout",
            Self::Transient => "temporary failure, likely to succeed on retry",
            Self::Permanent => "the request itself is invalid and will not succeed",
            Self::Unknown => "unclassified failure",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::RateLimited => "rate_limited",
            Self::QuotaExceeded => "quota_exceeded",
            Self::AuthExpired => "auth_expired",
            Self::Timeout => "timeout",
            Self::Transient => "transient",
            Self::Permanent => "permanent",
            Self::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Provider-specific classification patterns, tried before the generic
/// table in their declared order.
#[derive(Debug, Clone, Default)]
pub struct ErrorPatterns {
    entries: Vec<(ErrorCategory, Vec<Regex>)>,
}

impl ErrorPatterns {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add patterns for a category. Invalid patterns are rejected so that a
    /// provider's table is either fully usable or a configuration error.
    pub fn with(mut self, category: ErrorCategory, patterns: &[&str]) -> crate::Result<Self> {
        let mut compiled = Vec::with_capacity(patterns.len());
        for pat in patterns {
            compiled.push(Regex::new(pat).map_err(|e| {
                crate::BatonError::Config(format!("invalid error pattern `{pat}`: {e}"))
            })?);
        }
        self.entries.push((category, compiled));
        Ok(self)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn matches(&self, message: &str) -> Option<ErrorCategory> {
        for (category, patterns) in &self.entries {
            if patterns.iter().any(|p| p.is_match(message)) {
                return Some(*category);
            }
        }
        None
    }
}

// Generic fallback patterns. Order matters: first match wins.
static GENERIC_PATTERNS: Lazy<Vec<(ErrorCategory, Regex)>> = Lazy::new(|| {
    let table: &[(ErrorCategory, &str)] = &[
        (
            ErrorCategory::RateLimited,
            r"rate.?limit|too many requests|\b429\b",
        ),
        (ErrorCategory::QuotaExceeded, r"quota|usage.?limit|billing"),
        (
            ErrorCategory::AuthExpired,
            r"auth|unauthorized|forbidden|invalid.*(key|token)|\b401\b|\b403\b",
        ),
        (ErrorCategory::Timeout, r"timeout|timed.?out"),
        (ErrorCategory::Transient, r"temporary|retry|\b50[023]\b"),
        (
            ErrorCategory::Permanent,
            r"invalid|malformed|bad.?request|\b400\b",
        ),
    ];
    table
        .iter()
        .map(|(cat, pat)| {
            // The table is static; a bad pattern is a programming error.
            (*cat, Regex::new(pat).unwrap())
        })
        .collect()
});

/// Classify an error message into a category.
///
/// The message is lowercased first. Provider patterns, when given, win over
/// the generic table; within each table the first match wins.
pub fn classify(message: &str, provider_patterns: Option<&ErrorPatterns>) -> ErrorCategory {
    let message = message.to_lowercase();

    if let Some(patterns) = provider_patterns {
        if let Some(category) = patterns.matches(&message) {
            return category;
        }
    }

    for (category, pattern) in GENERIC_PATTERNS.iter() {
        if pattern.is_match(&message) {
            return *category;
        }
    }

    ErrorCategory::Unknown
}
