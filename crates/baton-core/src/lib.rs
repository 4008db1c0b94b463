//! # baton-core
//!
//! Core types, errors, and the error taxonomy for the baton dispatcher.
//! This crate defines the shared vocabulary used by every other crate in
//! the workspace.

pub mod callback;
pub mod error;
pub mod response;
pub mod taxonomy;

pub use callback::{CallbackBus, OrchestratorEvent};
pub use error::{BatonError, Result};
pub use response::{AgentResponse, TokenEvent, TokenUsage};
pub use taxonomy::{classify, ErrorCategory, ErrorPatterns, RecoveryAction};
