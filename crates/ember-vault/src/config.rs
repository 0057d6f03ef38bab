//! Vault configuration.
//!
//! Provides [`VaultConfig`] with defaults matching
//! [`ember_core::constants`]. Values are layered: built-in defaults, then an
//! optional TOML file, then `EMBER_`-prefixed environment variables with `__`
//! between nested keys (`EMBER_MULTIPLIER__CAP_BPS=20000`).

use std::path::{Path, PathBuf};

use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};

use ember_core::error::VaultError;
use ember_core::types::MultiplierParams;

/// Environment variable prefix.
pub const ENV_PREFIX: &str = "EMBER";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VaultConfig {
    /// Loyalty multiplier parameters.
    pub multiplier: MultiplierParams,
    /// Log level filter string (e.g. "info", "debug", "ember_vault=trace").
    pub log_level: String,
}

impl Default for VaultConfig {
    fn default() -> Self {
        Self {
            multiplier: MultiplierParams::default(),
            log_level: "info".to_string(),
        }
    }
}

impl VaultConfig {
    /// Load configuration from `path` (if given and present) and the
    /// environment, on top of the defaults.
    ///
    /// # Errors
    ///
    /// - [`VaultError::InvalidConfig`] if a source fails to parse or the
    ///   result does not validate
    pub fn load(path: Option<&Path>) -> Result<Self, VaultError> {
        let defaults = Config::try_from(&VaultConfig::default()).map_err(invalid)?;
        let mut builder = Config::builder().add_source(defaults);
        if let Some(path) = path {
            builder = builder.add_source(File::from(path).required(false));
        }
        let cfg: VaultConfig = builder
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .map_err(invalid)?
            .try_deserialize()
            .map_err(invalid)?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Reject multiplier parameters the engine cannot use.
    pub fn validate(&self) -> Result<(), VaultError> {
        self.multiplier.validate()
    }

    /// Default location of the config file: `<config_dir>/ember/vault.toml`.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("ember")
            .join("vault.toml")
    }
}

fn invalid(e: config::ConfigError) -> VaultError {
    VaultError::InvalidConfig(e.to_string())
}
