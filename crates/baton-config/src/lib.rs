//! # baton-config
//!
//! Configuration schema and loader for baton (`baton.toml`). The loaded
//! configuration is immutable for the life of the process; the
//! orchestration state machines assume a fixed config.

pub mod loader;
pub mod schema;

pub use loader::ConfigLoader;
pub use schema::{
    BatonConfig, CircuitBreakerConfig, HealthConfig, LoggingConfig, OrchestrationConfig,
    ProviderConfig, RateLimitConfig, RetryConfig,
};
