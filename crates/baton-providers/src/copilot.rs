//! GitHub Copilot CLI adapter (`copilot`).

use async_trait::async_trait;

use crate::adapter::{
    AdapterContext, Capabilities, CliAgent, CommandSpec, FirewallRequirements, InstructionFile,
    SendOptions,
};

pub struct CopilotAgent {
    ctx: AdapterContext,
}

impl CopilotAgent {
    pub fn new(ctx: AdapterContext) -> Self {
        Self { ctx }
    }
}

#[async_trait]
impl CliAgent for CopilotAgent {
    fn context(&self) -> &AdapterContext {
        &self.ctx
    }

    fn name(&self) -> &str {
        "github_copilot"
    }

    fn display_name(&self) -> &str {
        "GitHub Copilot"
    }

    fn binary(&self) -> &str {
        "copilot"
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities {
            tool_use: true,
            dangerous_mode: true,
            ..Default::default()
        }
    }

    fn firewall_requirements(&self) -> FirewallRequirements {
        FirewallRequirements {
            domains: vec!["api.github.com".into(), "api.githubcopilot.com".into()],
            ip_ranges: vec![],
        }
    }

    fn instruction_files(&self) -> Vec<InstructionFile> {
        vec![InstructionFile::new(
            ".github/copilot-instructions.md",
            "repository instructions applied to every request",
        )]
    }

    fn dangerous_mode_flags(&self) -> Vec<String> {
        vec!["--allow-all-tools".into()]
    }

    fn supports_sessions(&self) -> bool {
        true
    }

    fn session_flags(&self, session: &str) -> Vec<String> {
        vec!["--resume".into(), session.to_string()]
    }

    fn build_command(&self, prompt: &str, opts: &SendOptions) -> CommandSpec {
        let mut args: Vec<String> = Vec::new();
        if let Some(model) = self.resolve_model(opts) {
            args.push("--model".into());
            args.push(model);
        }
        if opts.dangerous {
            args.extend(self.dangerous_mode_flags());
        }
        if let Some(session) = &opts.session {
            args.extend(self.session_flags(session));
        }
        args.extend(self.ctx.config.default_flags.iter().cloned());
        args.extend(opts.extra_flags.iter().cloned());
        args.push("-p".into());
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

    fn agent() -> CopilotAgent {
        CopilotAgent::new(AdapterContext {
            runner: Arc::new(ScriptedRunner::new()),
            config: ProviderConfig::named("github_copilot"),
            callbacks: CallbackBus::new(),
        })
    }

    #[test]
    fn session_and_dangerous_flags() {
        let opts = SendOptions {
            session: Some("abc123".into()),
            dangerous: true,
            ..Default::default()
        };
        let spec = agent().build_command("continue", &opts);
        assert!(spec.args.contains(&"--allow-all-tools".to_string()));
        let resume = spec.args.iter().position(|a| a == "--resume").unwrap();
        assert_eq!(spec.args[resume + 1], "abc123");
        assert_eq!(spec.args[spec.args.len() - 2], "-p");
        assert_eq!(spec.args.last().unwrap(), "continue");
    }
}
