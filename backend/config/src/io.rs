//! Optional YAML config file.

use crate::schema::HomhConfig;
use anyhow::{Context, Result};
use std::path::Path;
use tokio::fs;
use tracing::{debug, info};

/// Env var naming an optional config file.
pub const CONFIG_PATH_VAR: &str = "HOMH_CONFIG";

/// Load and parse the config from disk.
///
/// Returns `Ok(Default::default())` if the file doesn't exist.
pub async fn load_config(path: &Path) -> Result<HomhConfig> {
    if !path.exists() {
        debug!(path = %path.display(), "Config file does not exist; using defaults");
        return Ok(HomhConfig::default());
    }

    let raw = fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config = parse_config(&raw)
        .with_context(|| format!("Failed to parse config YAML at: {}", path.display()))?;

    info!(path = %path.display(), "Loaded config");
    Ok(config)
}

/// Parse config YAML. An empty document yields the default config.
pub fn parse_config(raw: &str) -> Result<HomhConfig> {
    if raw.trim().is_empty() {
        return Ok(HomhConfig::default());
    }
    Ok(serde_yaml::from_str(raw)?)
}
