//! Google Gemini CLI adapter (`gemini`).

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;

use crate::adapter::{
    AdapterContext, Capabilities, CliAgent, CommandSpec, FirewallRequirements, InstructionFile,
    SendOptions,
};

pub const GEMINI_MODELS: &[&str] = &["gemini-2.5-pro", "gemini-2.5-flash", "gemini-2.0-flash"];

// Revision suffix like `-002`; the family drops it.
static REVISION_SUFFIX: Lazy<Regex> = Lazy::new(|| Regex::new(r"-\d{3}$").unwrap());

pub struct GeminiAgent {
    ctx: AdapterContext,
}

impl GeminiAgent {
    pub fn new(ctx: AdapterContext) -> Self {
        Self { ctx }
    }
}

#[async_trait]
impl CliAgent for GeminiAgent {
    fn context(&self) -> &AdapterContext {
        &self.ctx
    }

    fn name(&self) -> &str {
        "gemini"
    }

    fn display_name(&self) -> &str {
        "Google Gemini"
    }

    fn binary(&self) -> &str {
        "gemini"
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities {
            tool_use: true,
            vision: true,
            ..Default::default()
        }
    }

    fn firewall_requirements(&self) -> FirewallRequirements {
        FirewallRequirements {
            domains: vec!["generativelanguage.googleapis.com".into()],
            ip_ranges: vec![],
        }
    }

    fn instruction_files(&self) -> Vec<InstructionFile> {
        vec![InstructionFile::new(
            "GEMINI.md",
            "project instructions read at session start",
        )]
    }

    fn known_models(&self) -> &[&str] {
        GEMINI_MODELS
    }

    fn model_family(&self, model: &str) -> String {
        REVISION_SUFFIX.replace(model, "").into_owned()
    }

    fn build_command(&self, prompt: &str, opts: &SendOptions) -> CommandSpec {
        let mut args: Vec<String> = Vec::new();
        if let Some(model) = self.resolve_model(opts) {
            args.push("--model".into());
            args.push(model);
        }
        args.extend(self.ctx.config.default_flags.iter().cloned());
        args.extend(opts.extra_flags.iter().cloned());
        args.push("--prompt".into());
        args.push(prompt.to_string());
        CommandSpec { args, stdin: None }
    }
}
