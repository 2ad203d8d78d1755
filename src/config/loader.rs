//! Configuration Loader
//!
//! Environment-aware configuration loading. Sources are layered in order,
//! later ones overriding earlier ones:
//!
//! 1. built-in defaults ([`AggregatorConfig::default`])
//! 2. `<dir>/aggregator.toml` (optional)
//! 3. `<dir>/aggregator.<environment>.toml` (optional)
//! 4. `AGGREGATOR__*` environment variables, `__` separating nested keys
//!    (`AGGREGATOR__BUCKETS__RAW=raw-zone`)

use config::{Config, Environment, File};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use super::error::{ConfigResult, ConfigurationError};
use super::AggregatorConfig;
use crate::constants::env;

pub struct ConfigLoader {
    config_directory: PathBuf,
    environment: String,
    read_env_vars: bool,
}

impl ConfigLoader {
    /// Loader for `config_directory` with environment auto-detection
    pub fn new(config_directory: impl Into<PathBuf>) -> Self {
        Self {
            config_directory: config_directory.into(),
            environment: Self::detect_environment(),
            read_env_vars: true,
        }
    }

    /// Use an explicit environment instead of the detected one.
    /// This is useful for testing without modifying global environment variables
    pub fn with_environment(mut self, environment: impl Into<String>) -> Self {
        self.environment = environment.into();
        self
    }

    /// Skip the `AGGREGATOR__*` environment variable layer
    pub fn without_env_vars(mut self) -> Self {
        self.read_env_vars = false;
        self
    }

    pub fn environment(&self) -> &str {
        &self.environment
    }

    /// Detect the environment from `AGGREGATOR_ENV`, then `APP_ENV`
    pub fn detect_environment() -> String {
        std::env::var(env::ENVIRONMENT)
            .or_else(|_| std::env::var(env::FALLBACK_ENVIRONMENT))
            .unwrap_or_else(|_| "development".to_string())
    }

    /// Load, merge and validate the configuration
    pub fn load(&self) -> ConfigResult<AggregatorConfig> {
        debug!(
            "Loading configuration for environment '{}' from directory: {}",
            self.environment,
            self.config_directory.display()
        );

        let defaults = AggregatorConfig {
            environment: self.environment.clone(),
            ..AggregatorConfig::default()
        };
        let defaults = Config::try_from(&defaults)
            .map_err(|e| ConfigurationError::load_error(&self.environment, e))?;

        let mut builder = Config::builder()
            .add_source(defaults)
            .add_source(File::from(self.base_file()).required(false))
            .add_source(File::from(self.environment_file()).required(false));

        if self.read_env_vars {
            builder = builder.add_source(
                Environment::with_prefix(env::CONFIG_PREFIX)
                    .prefix_separator(env::CONFIG_SEPARATOR)
                    .separator(env::CONFIG_SEPARATOR),
            );
        }

        let merged = builder
            .build()
            .map_err(|e| ConfigurationError::load_error(&self.environment, e))?;
        let config: AggregatorConfig = merged
            .try_deserialize()
            .map_err(ConfigurationError::deserialize_error)?;

        config.validate()?;

        info!(
            environment = %config.environment,
            project = %config.project,
            landing_zone = %config.buckets.landing_zone,
            "Configuration loaded successfully"
        );
        Ok(config)
    }

    fn base_file(&self) -> PathBuf {
        self.config_directory.join("aggregator.toml")
    }

    fn environment_file(&self) -> PathBuf {
        self.config_directory
            .join(format!("aggregator.{}.toml", self.environment))
    }

    pub fn config_directory(&self) -> &Path {
        &self.config_directory
    }
}
