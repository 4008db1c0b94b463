//! Cursor CLI adapter (`cursor-agent`).
//!
//! Cursor takes the prompt on stdin rather than argv. MCP servers are
//! read from `~/.cursor/mcp.json`.

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::PathBuf;

use crate::adapter::{
    AdapterContext, Capabilities, CliAgent, CommandSpec, InstructionFile, McpServer, SendOptions,
};
use baton_core::Result;

pub const CURSOR_MODELS: &[&str] = &["claude-3-5-sonnet", "claude-3-7-sonnet", "gpt-4o"];

// Version numbers: dots in the family, hyphens in the provider name.
static DOTTED_VERSION: Lazy<Regex> = Lazy::new(|| Regex::new(r"(\d)\.(\d)").unwrap());
static HYPHENATED_VERSION: Lazy<Regex> = Lazy::new(|| Regex::new(r"(\d)-(\d)").unwrap());

/// Shape of `~/.cursor/mcp.json`.
#[derive(Debug, Deserialize)]
struct McpFile {
    #[serde(default, rename = "mcpServers")]
    mcp_servers: HashMap<String, McpServerDef>,
}

#[derive(Debug, Deserialize)]
#[allow(dead_code)]
struct McpServerDef {
    command: String,
    #[serde(default)]
    args: Vec<String>,
}

pub struct CursorAgent {
    ctx: AdapterContext,
    mcp_config_path: PathBuf,
}

impl CursorAgent {
    pub fn new(ctx: AdapterContext) -> Self {
        let mcp_config_path = dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".cursor")
            .join("mcp.json");
        Self {
            ctx,
            mcp_config_path,
        }
    }

    #[cfg(test)]
    fn with_mcp_config_path(mut self, path: PathBuf) -> Self {
        self.mcp_config_path = path;
        self
    }

    fn read_mcp_servers(&self) -> Result<Vec<McpServer>> {
        if !self.mcp_config_path.exists() {
            return Ok(vec![]);
        }
        let raw = std::fs::read_to_string(&self.mcp_config_path)?;
        let file: McpFile = serde_json::from_str(&raw)?;
        let mut servers: Vec<McpServer> = file
            .mcp_servers
            .into_keys()
            .map(|name| McpServer {
                name,
                status: "configured".into(),
                enabled: true,
            })
            .collect();
        servers.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(servers)
    }
}

#[async_trait]
impl CliAgent for CursorAgent {
    fn context(&self) -> &AdapterContext {
        &self.ctx
    }

    fn name(&self) -> &str {
        "cursor"
    }

    fn display_name(&self) -> &str {
        "Cursor"
    }

    fn binary(&self) -> &str {
        "cursor-agent"
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities {
            tool_use: true,
            mcp: true,
            ..Default::default()
        }
    }

    fn instruction_files(&self) -> Vec<InstructionFile> {
        vec![InstructionFile::new(
            ".cursorrules",
            "project rules applied to every agent run",
        )]
    }

    fn known_models(&self) -> &[&str] {
        CURSOR_MODELS
    }

    fn model_family(&self, model: &str) -> String {
        HYPHENATED_VERSION.replace_all(model, "$1.$2").into_owned()
    }

    fn model_for_family(&self, family: &str) -> String {
        DOTTED_VERSION.replace_all(family, "$1-$2").into_owned()
    }

    async fn mcp_servers(&self) -> Result<Vec<McpServer>> {
        self.read_mcp_servers()
    }

    fn build_command(&self, prompt: &str, opts: &SendOptions) -> CommandSpec {
        let mut args: Vec<String> = vec!["-p".into()];
        if let Some(model) = self.resolve_model(opts) {
            args.push("--model".into());
            args.push(model);
        }
        args.extend(self.ctx.config.default_flags.iter().cloned());
        args.extend(opts.extra_flags.iter().cloned());
        CommandSpec {
            args,
            stdin: Some(prompt.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use baton_config::ProviderConfig;
    use baton_core::CallbackBus;
    use baton_exec::ScriptedRunner;
    use std::io::Write;
    use std::sync::Arc;

    fn agent() -> CursorAgent {
        CursorAgent::new(AdapterContext {
            runner: Arc::new(ScriptedRunner::new()),
            config: ProviderConfig::named("cursor"),
            callbacks: CallbackBus::new(),
        })
    }

    #[test]
    fn prompt_travels_on_stdin() {
        let spec = agent().build_command("refactor this", &SendOptions::default());
        assert_eq!(spec.args, vec!["-p"]);
        assert_eq!(spec.stdin.as_deref(), Some("refactor this"));
    }

    #[test]
    fn version_dots_round_trip() {
        let agent = agent();
        assert_eq!(
            agent.model_family("claude-3-5-sonnet"),
            "claude-3.5-sonnet"
        );
        assert_eq!(
            agent.model_for_family("claude-3.5-sonnet"),
            "claude-3-5-sonnet"
        );
        // Round trip: family(provider_name(family)) == family.
        let family = "claude-3.5-sonnet";
        assert_eq!(agent.model_family(&agent.model_for_family(family)), family);
    }

    #[test]
    fn names_without_versions_pass_through() {
        let agent = agent();
        assert_eq!(agent.model_family("gpt-4o"), "gpt-4o");
        assert_eq!(agent.model_for_family("gpt-4o"), "gpt-4o");
    }

    #[tokio::test]
    async fn reads_mcp_servers_from_config_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"mcpServers": {{"github": {{"command": "gh-mcp", "args": ["--stdio"]}}, "filesystem": {{"command": "fs-mcp"}}}}}}"#
        )
        .unwrap();

        let agent = agent().with_mcp_config_path(file.path().to_path_buf());
        let servers = agent.mcp_servers().await.unwrap();
        assert_eq!(servers.len(), 2);
        assert_eq!(servers[0].name, "filesystem");
        assert_eq!(servers[1].name, "github");
        assert!(servers.iter().all(|s| s.enabled));
    }

    #[tokio::test]
    async fn missing_mcp_config_is_empty_not_an_error() {
        let agent = agent().with_mcp_config_path(PathBuf::from("/nonexistent/mcp.json"));
        assert!(agent.mcp_servers().await.unwrap().is_empty());
    }
}
