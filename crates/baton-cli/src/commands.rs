use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::{generate, Shell};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use baton_config::{BatonConfig, ConfigLoader};
use baton_core::{BatonError, Result};
use baton_exec::{CommandRunner, SystemRunner};
use baton_orchestrator::{Orchestrator, OrchestratorBuilder};
use baton_providers::{CliAgent, ProviderRegistry, SendOptions};

/// baton — resilient dispatcher for CLI coding agents
#[derive(Parser)]
#[command(name = "baton", version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to baton.toml config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Log level override (e.g. debug, info, warn, error)
    #[arg(short, long, global = true)]
    log_level: Option<String>,

    /// Enable verbose output (debug logging)
    #[arg(short, long, global = true, conflicts_with = "quiet")]
    verbose: bool,

    /// Suppress all log output (errors only)
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Send a prompt through the orchestrated path
    Send {
        /// The prompt to dispatch
        prompt: String,

        /// Preferred provider (default: config's default_provider)
        #[arg(short, long)]
        provider: Option<String>,

        /// Model to request
        #[arg(short, long)]
        model: Option<String>,

        /// Per-call timeout in seconds
        #[arg(long)]
        timeout_secs: Option<u64>,

        /// Session/conversation to resume
        #[arg(long)]
        session: Option<String>,

        /// Run the agent with permission checks disabled
        #[arg(long)]
        dangerous: bool,

        /// Bypass orchestration: no retry, no failover (requires --provider)
        #[arg(long, requires = "provider")]
        direct: bool,

        /// Print the full response as JSON instead of just the output
        #[arg(long)]
        json: bool,
    },
    /// Show provider health and metrics
    Status,
    /// List registered providers and whether their binaries are installed
    Providers,
    /// List a provider's models
    Models {
        /// Provider name or alias
        provider: String,
    },
    /// Check configuration and provider readiness
    Doctor,
    /// Show the effective configuration
    Config {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Write a starter baton.toml
    Init {
        /// Create in the current directory instead of ~/.baton/
        #[arg(long)]
        local: bool,
    },
    /// Generate shell completions for bash, zsh, or fish
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

impl Cli {
    pub async fn run(self) -> Result<()> {
        let config = ConfigLoader::load(self.config.as_deref())?;
        self.init_logging(&config);

        match self.command {
            Commands::Send {
                ref prompt,
                ref provider,
                ref model,
                timeout_secs,
                ref session,
                dangerous,
                direct,
                json,
            } => {
                let orchestrator = build_orchestrator(config)?;
                let opts = SendOptions {
                    model: model.clone(),
                    timeout: timeout_secs.map(Duration::from_secs),
                    session: session.clone(),
                    dangerous,
                    ..Default::default()
                };
                let response = if direct {
                    let provider = provider.as_deref().unwrap_or_default();
                    orchestrator.execute_direct(prompt, provider, opts).await?
                } else {
                    orchestrator.send(prompt, provider.as_deref(), opts).await?
                };

                if json {
                    println!("{}", serde_json::to_string_pretty(&response)?);
                } else {
                    println!("{}", response.output);
                    if let Some(error) = &response.error {
                        eprintln!("agent error: {error}");
                    }
                }
                if !response.success() {
                    std::process::exit(response.exit_code.max(1));
                }
                Ok(())
            }

            Commands::Status => {
                let orchestrator = build_orchestrator(config)?;
                let status = orchestrator.status();
                println!("{}", serde_json::to_string_pretty(&status)?);
                Ok(())
            }

            Commands::Providers => {
                let registry = ProviderRegistry::new();
                let runner = SystemRunner::new();
                for name in registry.all() {
                    let binary = registry.binary_for(&name).unwrap_or_default();
                    let installed = runner.which(&binary).is_some();
                    let marker = if installed { "✓" } else { "✗" };
                    let enabled = config
                        .provider(&name)
                        .map(|p| p.enabled)
                        .unwrap_or(false);
                    let state = if enabled { "" } else { " (disabled)" };
                    println!("{marker} {name:<16} {binary}{state}");
                }
                Ok(())
            }

            Commands::Models { ref provider } => {
                let orchestrator = build_orchestrator(config)?;
                let adapter = orchestrator.provider(provider)?;
                let models = adapter.discover_models().await;
                if models.is_empty() {
                    println!("no known models for {}", adapter.display_name());
                }
                for model in models {
                    match model.family {
                        Some(family) if family != model.name => {
                            println!("{:<36} family: {family}", model.name)
                        }
                        _ => println!("{}", model.name),
                    }
                }
                Ok(())
            }

            Commands::Doctor => {
                match config.validate() {
                    Ok(warnings) => {
                        println!("config: ok");
                        for w in warnings {
                            println!("  warning: {w}");
                        }
                    }
                    Err(e) => println!("config: ERROR — {e}"),
                }

                let orchestrator = build_orchestrator(config)?;
                for name in orchestrator.config().enabled_providers() {
                    let adapter = match orchestrator.provider(&name) {
                        Ok(a) => a,
                        Err(e) => {
                            println!("{name}: ERROR — {e}");
                            continue;
                        }
                    };
                    let health = adapter.health_status().await;
                    let marker = if health.healthy { "✓" } else { "✗" };
                    println!("{marker} {name}: {}", health.message);

                    let check = adapter.validate_config();
                    for error in check.errors {
                        println!("    config error: {error}");
                    }
                    for file in adapter.instruction_files() {
                        println!("    instructions: {} — {}", file.path, file.description);
                    }
                    let firewall = adapter.firewall_requirements();
                    if !firewall.domains.is_empty() {
                        println!("    needs network: {}", firewall.domains.join(", "));
                    }
                }
                Ok(())
            }

            Commands::Config { json } => {
                if json {
                    println!("{}", serde_json::to_string_pretty(&config)?);
                } else {
                    let rendered = toml::to_string_pretty(&config)
                        .map_err(|e| BatonError::Config(e.to_string()))?;
                    println!("{rendered}");
                }
                Ok(())
            }

            Commands::Init { local } => {
                let path = if local {
                    PathBuf::from("baton.toml")
                } else {
                    let dir = dirs::home_dir()
                        .unwrap_or_else(|| PathBuf::from("."))
                        .join(".baton");
                    std::fs::create_dir_all(&dir)?;
                    dir.join("baton.toml")
                };
                if path.exists() {
                    return Err(BatonError::Config(format!(
                        "{} already exists",
                        path.display()
                    )));
                }
                std::fs::write(&path, STARTER_CONFIG)?;
                println!("wrote {}", path.display());
                Ok(())
            }

            Commands::Completions { shell } => {
                let mut cmd = Cli::command();
                generate(shell, &mut cmd, "baton", &mut std::io::stdout());
                Ok(())
            }
        }
    }

    fn init_logging(&self, config: &BatonConfig) {
        let level = if self.quiet {
            "error".to_string()
        } else if self.verbose {
            "debug".to_string()
        } else {
            self.log_level
                .clone()
                .unwrap_or_else(|| config.logging.level.clone())
        };
        tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level)),
            )
            .with_target(false)
            .init();
    }
}

fn build_orchestrator(config: BatonConfig) -> Result<Orchestrator> {
    let runner: Arc<dyn CommandRunner> = Arc::new(SystemRunner::new());
    OrchestratorBuilder::from_config(config).runner(runner).build()
}

const STARTER_CONFIG: &str = r#"# baton configuration
#
# The default provider handles every call until its circuit opens, it is
# rate limited, or its recent success rate drops; then the fallbacks are
# tried in order.

default_provider = "claude"
fallback_providers = ["cursor", "gemini"]

[providers.claude]
name = "claude"
# model = "claude-sonnet-4-20250514"
# default_flags = []
timeout_secs = 300

[providers.cursor]
name = "cursor"
timeout_secs = 300

[providers.gemini]
name = "gemini"
timeout_secs = 300

[orchestration]
auto_switch_on_error = true

[orchestration.circuit_breaker]
enabled = true
failure_threshold = 5
timeout_secs = 60
half_open_max_calls = 1

[orchestration.retry]
enabled = true
max_attempts = 3
base_delay_ms = 1000
max_delay_ms = 30000
jitter = true

[orchestration.rate_limit]
default_reset_secs = 60

[orchestration.health]
enabled = true
window = 100
threshold = 0.5

[logging]
level = "info"
"#;
