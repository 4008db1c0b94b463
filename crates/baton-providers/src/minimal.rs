//! Shared adapter for providers with minimal CLI surfaces (opencode,
//! kilocode): a `--prompt` flag and nothing else.

use async_trait::async_trait;

use crate::adapter::{AdapterContext, CliAgent, CommandSpec, SendOptions};

pub struct MinimalAgent {
    name: &'static str,
    display_name: &'static str,
    binary: &'static str,
    ctx: AdapterContext,
}

impl MinimalAgent {
    pub fn opencode(ctx: AdapterContext) -> Self {
        Self {
            name: "opencode",
            display_name: "OpenCode",
            binary: "opencode",
            ctx,
        }
    }

    pub fn kilocode(ctx: AdapterContext) -> Self {
        Self {
            name: "kilocode",
            display_name: "Kilocode",
            binary: "kilocode",
            ctx,
        }
    }
}

#[async_trait]
impl CliAgent for MinimalAgent {
    fn context(&self) -> &AdapterContext {
        &self.ctx
    }

    fn name(&self) -> &str {
        self.name
    }

    fn display_name(&self) -> &str {
        self.display_name
    }

    fn binary(&self) -> &str {
        self.binary
    }

    fn build_command(&self, prompt: &str, opts: &SendOptions) -> CommandSpec {
        let mut args: Vec<String> = Vec::new();
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
    use crate::adapter::Capabilities;
    use baton_config::ProviderConfig;
    use baton_core::CallbackBus;
    use baton_exec::ScriptedRunner;
    use std::sync::Arc;

    fn ctx(name: &str) -> AdapterContext {
        AdapterContext {
            runner: Arc::new(ScriptedRunner::new()),
            config: ProviderConfig::named(name),
            callbacks: CallbackBus::new(),
        }
    }

    #[test]
    fn minimal_agents_have_no_capabilities() {
        let agent = MinimalAgent::opencode(ctx("opencode"));
        assert_eq!(agent.capabilities(), Capabilities::default());
        assert!(!agent.supports_sessions());
        assert!(!agent.supports_dangerous_mode());
    }

    #[test]
    fn kilocode_builds_a_bare_prompt_command() {
        let agent = MinimalAgent::kilocode(ctx("kilocode"));
        let spec = agent.build_command("hello", &SendOptions::default());
        assert_eq!(spec.args, vec!["--prompt", "hello"]);
        assert_eq!(agent.binary(), "kilocode");
    }
}
