//! Mock adapter for deterministic testing.
//!
//! Returns pre-queued outcomes without running any binary, and records
//! every prompt for assertions. Clones share the same queue, so a test
//! can keep a handle while the registry's factory hands instances to the
//! orchestrator.

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

use crate::adapter::{AdapterContext, CliAgent, CommandSpec, SendOptions};
use crate::registry::AdapterFactory;
use baton_config::ProviderConfig;
use baton_core::{
    AgentResponse, BatonError, CallbackBus, OrchestratorEvent, Result, TokenEvent, TokenUsage,
};
use baton_exec::ScriptedRunner;

/// A pre-configured outcome for one `send` call.
pub enum MockOutcome {
    Respond {
        output: String,
        exit_code: i32,
        error: Option<String>,
        tokens: Option<TokenUsage>,
    },
    Fail(BatonError),
}

/// A mock CLI agent backed by a queue of [`MockOutcome`]s.
///
/// # Example
/// ```
/// use baton_providers::MockAgent;
/// let agent = MockAgent::new("test").with_response("Hello!");
/// ```
#[derive(Clone)]
pub struct MockAgent {
    name: Arc<str>,
    outcomes: Arc<Mutex<VecDeque<MockOutcome>>>,
    prompts: Arc<Mutex<Vec<String>>>,
    ctx: AdapterContext,
}

impl MockAgent {
    pub fn new(name: impl Into<String>) -> Self {
        let name: String = name.into();
        let ctx = AdapterContext {
            runner: Arc::new(ScriptedRunner::new()),
            config: ProviderConfig::named(&name),
            callbacks: CallbackBus::new(),
        };
        Self {
            name: name.into(),
            outcomes: Arc::new(Mutex::new(VecDeque::new())),
            prompts: Arc::new(Mutex::new(Vec::new())),
            ctx,
        }
    }

    /// Queue a successful text response.
    pub fn with_response(self, text: &str) -> Self {
        self.outcomes.lock().push_back(MockOutcome::Respond {
            output: text.to_string(),
            exit_code: 0,
            error: None,
            tokens: None,
        });
        self
    }

    /// Queue a successful response that reports token usage.
    pub fn with_tokens(self, text: &str, input: u64, output: u64) -> Self {
        self.outcomes.lock().push_back(MockOutcome::Respond {
            output: text.to_string(),
            exit_code: 0,
            error: None,
            tokens: Some(TokenUsage::new(input, output)),
        });
        self
    }

    /// Queue a non-zero exit with classified error text.
    pub fn with_exit(self, exit_code: i32, error: &str) -> Self {
        self.outcomes.lock().push_back(MockOutcome::Respond {
            output: String::new(),
            exit_code,
            error: Some(error.to_string()),
            tokens: None,
        });
        self
    }

    /// Queue a typed failure.
    pub fn with_failure(self, error: BatonError) -> Self {
        self.outcomes.lock().push_back(MockOutcome::Fail(error));
        self
    }

    /// Queue a rate-limit failure.
    pub fn with_rate_limit(self, retry_after: Option<Duration>) -> Self {
        let provider = self.name.to_string();
        self.with_failure(BatonError::RateLimited {
            provider,
            retry_after,
        })
    }

    /// Queue a timeout failure.
    pub fn with_timeout(self) -> Self {
        let message = format!("{} timed out after 300s", self.name);
        self.with_failure(BatonError::Timeout(message))
    }

    /// Queue a generic provider failure.
    pub fn with_provider_error(self, message: &str) -> Self {
        let provider = self.name.to_string();
        self.with_failure(BatonError::Provider {
            provider,
            message: message.to_string(),
        })
    }

    /// Prompts received so far, in order.
    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().clone()
    }

    pub fn call_count(&self) -> usize {
        self.prompts.lock().len()
    }

    /// A registry factory producing instances that share this handle's
    /// queue and prompt log.
    pub fn factory(&self) -> AdapterFactory {
        let proto = self.clone();
        Arc::new(move |ctx| {
            let mut agent = proto.clone();
            agent.ctx = ctx;
            Arc::new(agent)
        })
    }
}

#[async_trait]
impl CliAgent for MockAgent {
    fn context(&self) -> &AdapterContext {
        &self.ctx
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn binary(&self) -> &str {
        "true"
    }

    fn available(&self) -> bool {
        true
    }

    fn build_command(&self, _prompt: &str, _opts: &SendOptions) -> CommandSpec {
        CommandSpec {
            args: vec![],
            stdin: None,
        }
    }

    async fn send(&self, prompt: &str, opts: &SendOptions) -> Result<AgentResponse> {
        self.prompts.lock().push(prompt.to_string());

        let outcome = self.outcomes.lock().pop_front();
        match outcome {
            None => Ok(self.respond("(mock: no more queued outcomes)", 0, None, None, opts)),
            Some(MockOutcome::Respond {
                output,
                exit_code,
                error,
                tokens,
            }) => Ok(self.respond(&output, exit_code, error, tokens, opts)),
            Some(MockOutcome::Fail(error)) => Err(error),
        }
    }
}

impl MockAgent {
    fn respond(
        &self,
        output: &str,
        exit_code: i32,
        error: Option<String>,
        tokens: Option<TokenUsage>,
        opts: &SendOptions,
    ) -> AgentResponse {
        let model = self.resolve_model(opts);
        if let Some(usage) = tokens {
            self.ctx
                .callbacks
                .emit(&OrchestratorEvent::TokensUsed(TokenEvent {
                    provider: self.name.to_string(),
                    model: model.clone(),
                    usage,
                    at: Utc::now(),
                    request_id: Uuid::new_v4(),
                }));
        }
        AgentResponse {
            output: output.to_string(),
            exit_code,
            duration: Duration::from_millis(5),
            provider: self.name.to_string(),
            model,
            tokens,
            metadata: HashMap::new(),
            error,
        }
    }
}
