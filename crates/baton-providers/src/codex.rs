//! OpenAI Codex CLI adapter (`codex`).

use async_trait::async_trait;

use crate::adapter::{
    AdapterContext, Capabilities, CliAgent, CommandSpec, InstructionFile, SendOptions,
};

pub struct CodexAgent {
    ctx: AdapterContext,
}

impl CodexAgent {
    pub fn new(ctx: AdapterContext) -> Self {
        Self { ctx }
    }
}

#[async_trait]
impl CliAgent for CodexAgent {
    fn context(&self) -> &AdapterContext {
        &self.ctx
    }

    fn name(&self) -> &str {
        "codex"
    }

    fn display_name(&self) -> &str {
        "OpenAI Codex"
    }

    fn binary(&self) -> &str {
        "codex"
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities {
            tool_use: true,
            ..Default::default()
        }
    }

    fn instruction_files(&self) -> Vec<InstructionFile> {
        vec![InstructionFile::new(
            "AGENTS.md",
            "project instructions read at session start",
        )]
    }

    fn supports_sessions(&self) -> bool {
        true
    }

    fn session_flags(&self, session: &str) -> Vec<String> {
        vec!["--session".into(), session.to_string()]
    }

    fn build_command(&self, prompt: &str, opts: &SendOptions) -> CommandSpec {
        let mut args: Vec<String> = Vec::new();
        if let Some(model) = self.resolve_model(opts) {
            args.push("--model".into());
            args.push(model);
        }
        if let Some(session) = &opts.session {
            args.extend(self.session_flags(session));
        }
        args.extend(self.ctx.config.default_flags.iter().cloned());
        args.extend(opts.extra_flags.iter().cloned());
        args.push("--prompt".into());
        args.push(prompt.to_string());
        CommandSpec { args, stdin: None }
    }
}
