//! Application Configuration using Figment
//!
//! Configuration is loaded from:
//! 1. `config/lexium.toml` (base configuration)
//! 2. Environment variables prefixed with `LEXIUM_`, with `__` separating
//!    nesting levels
//!
//! # Example
//! ```no_run
//! use lexium_motor::config::AppConfig;
//!
//! # fn main() -> anyhow::Result<()> {
//! let config = AppConfig::load()?;
//! config.validate()?;
//! println!("Controller: {}", config.controller.motor_port_name);
//! # Ok(())
//! # }
//! ```
//!
//! `LEXIUM_CONTROLLER__TARGET=/dev/ttyUSB1` overrides `controller.target`.

use crate::logging::OutputFormat;
use anyhow::{bail, Context, Result};
use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use motor_driver_lexium::LexiumConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Default location of the configuration file.
pub const DEFAULT_CONFIG_PATH: &str = "config/lexium.toml";

/// Prefix for environment overrides.
pub const ENV_PREFIX: &str = "LEXIUM_";

const VALID_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// Top-level application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Application settings
    #[serde(default)]
    pub application: ApplicationConfig,
    /// The controller this application drives
    pub controller: LexiumConfig,
}

/// Application-level configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApplicationConfig {
    /// Application name
    #[serde(default = "default_name")]
    pub name: String,
    /// Logging level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Log output format
    #[serde(default)]
    pub log_format: OutputFormat,
}

fn default_name() -> String {
    "lexium-motor".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for ApplicationConfig {
    fn default() -> Self {
        Self {
            name: default_name(),
            log_level: default_log_level(),
            log_format: OutputFormat::default(),
        }
    }
}

impl AppConfig {
    /// Load configuration from `config/lexium.toml` and the environment.
    pub fn load() -> Result<Self, figment::Error> {
        Self::load_from(DEFAULT_CONFIG_PATH)
    }

    /// Load configuration from a specific file path and the environment.
    ///
    /// A missing file is not an error as long as the environment supplies
    /// every required key.
    pub fn load_from<P: AsRef<Path>>(path: P) -> Result<Self, figment::Error> {
        Self::figment(path).extract()
    }

    /// The provider stack used by [`load_from`](Self::load_from).
    pub fn figment<P: AsRef<Path>>(path: P) -> Figment {
        Figment::new()
            .merge(Toml::file(path.as_ref()))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
    }

    /// Validate configuration after loading.
    pub fn validate(&self) -> Result<()> {
        let level = self.application.log_level.to_lowercase();
        if !VALID_LEVELS.contains(&level.as_str()) {
            bail!(
                "Invalid log_level '{}'. Must be one of: {}",
                self.application.log_level,
                VALID_LEVELS.join(", ")
            );
        }

        self.controller
            .validate()
            .context("Invalid [controller] section")?;

        Ok(())
    }
}
