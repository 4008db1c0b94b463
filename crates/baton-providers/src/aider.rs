//! Aider CLI adapter (`aider`).
//!
//! Aider is interactive by default; `--yes` keeps it scriptable.

use async_trait::async_trait;

use crate::adapter::{
    AdapterContext, Capabilities, CliAgent, CommandSpec, InstructionFile, SendOptions,
};

pub struct AiderAgent {
    ctx: AdapterContext,
}

impl AiderAgent {
    pub fn new(ctx: AdapterContext) -> Self {
        Self { ctx }
    }
}

#[async_trait]
impl CliAgent for AiderAgent {
    fn context(&self) -> &AdapterContext {
        &self.ctx
    }

    fn name(&self) -> &str {
        "aider"
    }

    fn display_name(&self) -> &str {
        "Aider"
    }

    fn binary(&self) -> &str {
        "aider"
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities {
            tool_use: true,
            ..Default::default()
        }
    }

    fn instruction_files(&self) -> Vec<InstructionFile> {
        vec![InstructionFile::new(
            ".aider.conf.yml",
            "per-project aider configuration",
        )]
    }

    fn supports_sessions(&self) -> bool {
        true
    }

    fn session_flags(&self, session: &str) -> Vec<String> {
        vec!["--restore-chat-history".into(), session.to_string()]
    }

    fn build_command(&self, prompt: &str, opts: &SendOptions) -> CommandSpec {
        let mut args: Vec<String> = vec!["--yes".into()];
        if let Some(model) = self.resolve_model(opts) {
            args.push("--model".into());
            args.push(model);
        }
        if let Some(session) = &opts.session {
            args.extend(self.session_flags(session));
        }
        args.extend(self.ctx.config.default_flags.iter().cloned());
        args.extend(opts.extra_flags.iter().cloned());
        args.push("--message".into());
        args.push(prompt.to_string());
        CommandSpec { args, stdin: None }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use baton_config::ProviderConfig;
    use baton_core::CallbackBus;
    use baton_exec::ScriptedRunner;
    use std::sync::Arc;

    #[test]
    fn always_passes_yes_and_uses_message_flag() {
        let agent = AiderAgent::new(AdapterContext {
            runner: Arc::new(ScriptedRunner::new()),
            config: ProviderConfig::named("aider"),
            callbacks: CallbackBus::new(),
        });
        let spec = agent.build_command("add a test", &SendOptions::default());
        assert_eq!(spec.args.first().unwrap(), "--yes");
        assert_eq!(spec.args[spec.args.len() - 2], "--message");
        assert_eq!(spec.args.last().unwrap(), "add a test");
    }
}
