use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;
use uuid::Uuid;

/// A completed response from a CLI agent, as delivered to the caller.
///
/// The dispatcher hides which binary ran and how many attempts it took;
/// `provider` names the adapter that ultimately produced this response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentResponse {
    /// Agent output (stdout, trailing whitespace trimmed).
    pub output: String,
    /// Exit code of the agent process. A non-zero exit does not make the
    /// call an error by itself; see [`AgentResponse::success`].
    pub exit_code: i32,
    /// Wall-clock duration of the subprocess invocation.
    pub duration: Duration,
    /// Canonical name of the provider that produced this response.
    pub provider: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tokens: Option<TokenUsage>,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub metadata: HashMap<String, serde_json::Value>,
    /// Classified error text when the agent exited non-zero.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl AgentResponse {
    pub fn success(&self) -> bool {
        self.exit_code == 0 && self.error.is_none()
    }
}

/// Token counts reported by an agent, when its output exposes them.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub input: u64,
    pub output: u64,
    pub total: u64,
}

impl TokenUsage {
    pub fn new(input: u64, output: u64) -> Self {
        Self {
            input,
            output,
            total: input + output,
        }
    }

    pub fn add(&mut self, other: &TokenUsage) {
        self.input += other.input;
        self.output += other.output;
        self.total += other.total;
    }
}

/// Emitted by an adapter whenever a response carried token counts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenEvent {
    pub provider: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    pub usage: TokenUsage,
    pub at: DateTime<Utc>,
    pub request_id: Uuid,
}
