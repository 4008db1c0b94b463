//! Anthropic Claude CLI adapter (`claude`).

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;

use crate::adapter::{
    AdapterContext, Capabilities, CliAgent, CommandSpec, FirewallRequirements, InstructionFile,
    SendOptions,
};
use baton_core::{ErrorCategory, ErrorPatterns};

pub const CLAUDE_MODELS: &[&str] = &[
    "claude-opus-4-20250514",
    "claude-sonnet-4-20250514",
    "claude-haiku-4-20250514",
];

// Model names carry a release date suffix; the family drops it.
static DATE_SUFFIX: Lazy<Regex> = Lazy::new(|| Regex::new(r"-\d{8}$").unwrap());

static ERROR_PATTERNS: Lazy<ErrorPatterns> = Lazy::new(|| {
    ErrorPatterns::new()
        .with(
            ErrorCategory::QuotaExceeded,
            &["credit balance", "out of credits"],
        )
        .unwrap()
        .with(ErrorCategory::RateLimited, &["overloaded"])
        .unwrap()
});

pub struct ClaudeAgent {
    ctx: AdapterContext,
}

impl ClaudeAgent {
    pub fn new(ctx: AdapterContext) -> Self {
        Self { ctx }
    }
}

#[async_trait]
impl CliAgent for ClaudeAgent {
    fn context(&self) -> &AdapterContext {
        &self.ctx
    }

    fn name(&self) -> &str {
        "claude"
    }

    fn display_name(&self) -> &str {
        "Anthropic Claude"
    }

    fn binary(&self) -> &str {
        "claude"
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities {
            tool_use: true,
            json_mode: true,
            mcp: true,
            dangerous_mode: true,
            ..Default::default()
        }
    }

    fn error_patterns(&self) -> ErrorPatterns {
        ERROR_PATTERNS.clone()
    }

    fn firewall_requirements(&self) -> FirewallRequirements {
        FirewallRequirements {
            domains: vec!["api.anthropic.com".into(), "console.anthropic.com".into()],
            ip_ranges: vec![],
        }
    }

    fn instruction_files(&self) -> Vec<InstructionFile> {
        vec![InstructionFile::new(
            "CLAUDE.md",
            "project instructions read at session start",
        )]
    }

    fn known_models(&self) -> &[&str] {
        CLAUDE_MODELS
    }

    fn model_family(&self, model: &str) -> String {
        DATE_SUFFIX.replace(model, "").into_owned()
    }

    fn model_for_family(&self, family: &str) -> String {
        self.known_models()
            .iter()
            .find(|m| self.model_family(m) == family)
            .map(|m| (*m).to_string())
            .unwrap_or_else(|| family.to_string())
    }

    fn dangerous_mode_flags(&self) -> Vec<String> {
        vec!["--dangerously-skip-permissions".into()]
    }

    fn build_command(&self, prompt: &str, opts: &SendOptions) -> CommandSpec {
        let mut args: Vec<String> = vec!["--print".into(), "--output-format=text".into()];
        if let Some(model) = self.resolve_model(opts) {
            args.push("--model".into());
            args.push(model);
        }
        if opts.dangerous {
            args.extend(self.dangerous_mode_flags());
        }
        args.extend(self.ctx.config.default_flags.iter().cloned());
        args.extend(opts.extra_flags.iter().cloned());
        args.push("--prompt".into());
        args.push(prompt.to_string());
        CommandSpec { args, stdin: None }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use baton_config::ProviderConfig;
    use baton_core::{classify, CallbackBus};
    use baton_exec::ScriptedRunner;
    use std::sync::Arc;

    fn agent() -> ClaudeAgent {
        ClaudeAgent::new(AdapterContext {
            runner: Arc::new(ScriptedRunner::new()),
            config: ProviderConfig::named("claude"),
            callbacks: CallbackBus::new(),
        })
    }

    #[test]
    fn builds_print_command_with_prompt_flag() {
        let spec = agent().build_command("fix the tests", &SendOptions::default());
        assert_eq!(
            spec.args,
            vec![
                "--print",
                "--output-format=text",
                "--prompt",
                "fix the tests"
            ]
        );
        assert!(spec.stdin.is_none());
    }

    #[test]
    fn model_and_dangerous_flags() {
        let opts = SendOptions {
            model: Some("claude-sonnet-4-20250514".into()),
            dangerous: true,
            ..Default::default()
        };
        let spec = agent().build_command("hi", &opts);
        assert!(spec.args.contains(&"--model".to_string()));
        assert!(spec
            .args
            .contains(&"--dangerously-skip-permissions".to_string()));
        // The prompt flag stays last.
        assert_eq!(spec.args.last().unwrap(), "hi");
    }

    #[test]
    fn default_flags_come_before_the_prompt() {
        let mut config = ProviderConfig::named("claude");
        config.default_flags = vec!["--add-dir".into(), "/src".into()];
        let agent = ClaudeAgent::new(AdapterContext {
            runner: Arc::new(ScriptedRunner::new()),
            config,
            callbacks: CallbackBus::new(),
        });
        let spec = agent.build_command("hi", &SendOptions::default());
        let add_dir = spec.args.iter().position(|a| a == "--add-dir").unwrap();
        let prompt = spec.args.iter().position(|a| a == "--prompt").unwrap();
        assert!(add_dir < prompt);
    }

    #[test]
    fn family_strips_date_suffix_idempotently() {
        let agent = agent();
        assert_eq!(
            agent.model_family("claude-sonnet-4-20250514"),
            "claude-sonnet-4"
        );
        // Already a family: unchanged.
        assert_eq!(agent.model_family("claude-sonnet-4"), "claude-sonnet-4");
        assert_eq!(
            agent.model_for_family("claude-sonnet-4"),
            "claude-sonnet-4-20250514"
        );
        assert!(agent.supports_model_family("claude-opus-4"));
    }

    #[test]
    fn provider_patterns_reclassify_quota_messages() {
        let patterns = agent().error_patterns();
        assert_eq!(
            classify("Credit balance is too low", Some(&patterns)),
            ErrorCategory::QuotaExceeded
        );
    }
}
