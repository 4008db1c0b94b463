//! # baton-cli
//!
//! Command-line interface for the baton dispatcher.
//!
//! ## Commands
//!
//! - `baton send` — Send a prompt through the orchestrated path
//! - `baton status` — Show provider health and metrics
//! - `baton providers` — List registered providers and their binaries
//! - `baton models` — List a provider's models
//! - `baton doctor` — Check configuration and provider readiness
//! - `baton config` — Show the effective configuration
//! - `baton init` — Write a starter baton.toml

pub mod commands;

pub use commands::Cli;
