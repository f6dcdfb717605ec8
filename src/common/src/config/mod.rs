use std::path::Path;

use serde::{Deserialize, Serialize};

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};

use once_cell::sync::OnceCell;
use thiserror::Error;
use tracing_subscriber::EnvFilter;

pub static CONFIG: OnceCell<Configuration> = OnceCell::new();

/// File picked up from the working directory by [`Configuration::load`].
pub const CONFIG_FILE: &str = "promscrape.toml";

/// Prefix of environment overrides, nested keys split on `__`.
pub const ENV_PREFIX: &str = "PROMSCRAPE__";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("assembler.name_label cannot be empty")]
    EmptyNameLabel,
    #[error("invalid logging.level '{level}': {reason}")]
    InvalidLogLevel { level: String, reason: String },
}

/// How samples are assembled into families.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AssemblerConfig {
    /// Label holding the metric name, never part of a series identity.
    pub name_label: String,
    /// Use `<family>_created` samples as the start time of cumulative series.
    pub honor_created_timestamps: bool,
    /// Record exemplars attached to samples.
    pub exemplars: bool,
    /// Emit stale markers as points flagged "no recorded value". When off,
    /// stale samples are dropped before assembly.
    pub keep_stale_markers: bool,
}

impl Default for AssemblerConfig {
    fn default() -> Self {
        Self {
            name_label: String::from("__name__"),
            honor_created_timestamps: true,
            exemplars: true,
            keep_stale_markers: true,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter directive, e.g. `info` or `assembler=debug`.
    /// `RUST_LOG` takes precedence when set.
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: String::from("info"),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Configuration {
    pub assembler: AssemblerConfig,
    pub logging: LoggingConfig,
}

impl Configuration {
    /// Defaults, then `promscrape.toml`, then `PROMSCRAPE__*` variables.
    pub fn load() -> Result<Self, Box<figment::Error>> {
        Self::extract(Toml::file(CONFIG_FILE))
    }

    /// Like [`Configuration::load`] with an explicit file instead of
    /// `promscrape.toml`.
    pub fn load_from_path(path: &Path) -> Result<Self, Box<figment::Error>> {
        Self::extract(Toml::file(path))
    }

    fn extract(file: figment::providers::Data<Toml>) -> Result<Self, Box<figment::Error>> {
        let config = Figment::from(Serialized::defaults(Configuration::default()))
            .merge(file)
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()
            .map_err(Box::new)?;

        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.assembler.name_label.trim().is_empty() {
            return Err(ConfigError::EmptyNameLabel);
        }
        EnvFilter::try_new(&self.logging.level).map_err(|e| ConfigError::InvalidLogLevel {
            level: self.logging.level.clone(),
            reason: e.to_string(),
        })?;
        Ok(())
    }

    /// The process-wide configuration, loaded on first use.
    pub fn global() -> Result<&'static Configuration, Box<figment::Error>> {
        CONFIG.get_or_try_init(Self::load)
    }
}
