/// Common test utilities and helpers for integration tests
use anyhow::{Context, Result};
use common::config::Configuration;
use tempfile::TempDir;

pub mod fixtures;
pub mod generators;

/// Write `toml` to a temporary `promscrape.toml` and load it the way a
/// deployment would. The directory lives as long as the returned guard.
pub fn create_test_config(toml: &str) -> Result<(Configuration, TempDir)> {
    let temp_dir = TempDir::new().context("Failed to create temp dir")?;
    let path = temp_dir.path().join(common::config::CONFIG_FILE);
    std::fs::write(&path, toml).context("Failed to write config file")?;

    let config = Configuration::load_from_path(&path).map_err(|e| anyhow::anyhow!("{e}"))?;
    config.validate()?;
    Ok((config, temp_dir))
}

/// Initialize test logging
pub fn init_test_logging() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();
}
