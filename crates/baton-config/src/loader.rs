use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::schema::BatonConfig;
use baton_core::{BatonError, Result};

/// Loads the baton configuration. The result is a plain value; once the
/// orchestrator is built from it, nothing re-reads the file.
pub struct ConfigLoader;

impl ConfigLoader {
    /// Resolve the config path: explicit path > BATON_CONFIG env >
    /// ~/.baton/baton.toml
    pub fn resolve_path(explicit: Option<&Path>) -> PathBuf {
        if let Some(p) = explicit {
            return p.to_path_buf();
        }
        if let Ok(p) = std::env::var("BATON_CONFIG") {
            return PathBuf::from(p);
        }
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".baton")
            .join("baton.toml")
    }

    /// Load the config from disk, falling back to defaults.
    pub fn load(path: Option<&Path>) -> Result<BatonConfig> {
        let config_path = Self::resolve_path(path);
        let config = if config_path.exists() {
            info!(?config_path, "loading configuration");
            let raw = std::fs::read_to_string(&config_path)?;
            toml::from_str::<BatonConfig>(&raw).map_err(|e| {
                BatonError::Config(format!("failed to parse {}: {}", config_path.display(), e))
            })?
        } else {
            warn!(?config_path, "config file not found, using defaults");
            BatonConfig::default()
        };

        let config = Self::apply_env_overrides(config);

        match config.validate() {
            Ok(warnings) => {
                for w in &warnings {
                    warn!("{}", w);
                }
            }
            Err(e) => {
                return Err(BatonError::Config(e));
            }
        }

        Ok(config)
    }

    /// Apply env var overrides (BATON_DEFAULT_PROVIDER, BATON_LOG_LEVEL, …)
    fn apply_env_overrides(mut config: BatonConfig) -> BatonConfig {
        if let Ok(v) = std::env::var("BATON_DEFAULT_PROVIDER") {
            config.default_provider = v;
        }
        if let Ok(v) = std::env::var("BATON_LOG_LEVEL") {
            config.logging.level = v;
        }
        if let Ok(v) = std::env::var("BATON_AUTO_SWITCH") {
            if let Ok(flag) = v.parse::<bool>() {
                config.orchestration.auto_switch_on_error = flag;
            }
        }
        if let Ok(v) = std::env::var("BATON_RETRY_MAX_ATTEMPTS") {
            if let Ok(attempts) = v.parse::<u32>() {
                config.orchestration.retry.max_attempts = attempts;
            }
        }
        config
    }
}
