//! # baton-exec
//!
//! Subprocess execution for agent binaries: a [`CommandRunner`] trait, the
//! tokio-backed [`SystemRunner`], and a [`ScriptedRunner`] for tests.

pub mod runner;
pub mod scripted;

pub use runner::{CommandOutput, CommandRunner, ExecOptions, SystemRunner};
pub use scripted::ScriptedRunner;
