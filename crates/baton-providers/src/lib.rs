//! # baton-providers
//!
//! Adapters over CLI coding-agent binaries. Each adapter translates the
//! uniform [`CliAgent`] contract into one binary's argv conventions; the
//! registry maps provider names (and aliases) to adapter factories.

pub mod adapter;
pub mod aider;
pub mod claude;
pub mod codex;
pub mod copilot;
pub mod cursor;
pub mod gemini;
pub mod minimal;
pub mod mock;
pub mod registry;

pub use adapter::{
    AdapterContext, Capabilities, CliAgent, CommandSpec, ConfigCheck, FirewallRequirements,
    HealthReport, InstructionFile, McpServer, ModelInfo, SendOptions,
};
pub use mock::MockAgent;
pub use registry::{AdapterFactory, ProviderRegistry};
