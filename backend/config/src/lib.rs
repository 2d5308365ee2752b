//! `homh-config` — gateway configuration.
//!
//! Provides:
//! - Typed config schema (provider, server, database, logging)
//! - Optional YAML file with `${ENV_VAR}` substitution
//! - Environment overrides and startup-fatal required variables
//! - Default value application
//! - Validation and redaction for safe logging

pub mod defaults;
pub mod env;
pub mod io;
pub mod redact;
pub mod schema;
pub mod validation;

pub use defaults::apply_all_defaults;
pub use env::{
    apply_env_overrides, require_startup_vars, resolve_env_vars, resolve_env_vars_with,
    MissingEnvVarError,
};
pub use io::{load_config, parse_config, CONFIG_PATH_VAR};
pub use redact::{redact, redacted_snapshot};
pub use schema::HomhConfig;
pub use validation::{validate, ConfigValidationError, ValidationReport};

use anyhow::{bail, Context, Result};
use std::collections::HashMap;
use std::path::Path;

/// Load the config from the process environment and an optional YAML file.
///
/// This is the main entry point at startup. Every error it returns is fatal.
pub async fn load_and_prepare(path: Option<&Path>) -> Result<HomhConfig> {
    let env: HashMap<String, String> = std::env::vars().collect();
    let file_config = match path {
        Some(path) => load_config(path).await?,
        None => HomhConfig::default(),
    };
    prepare(file_config, &env)
}

/// Run the substitution, override, default and validation pipeline over a parsed config.
pub fn prepare(file_config: HomhConfig, env: &HashMap<String, String>) -> Result<HomhConfig> {
    let value = serde_json::to_value(&file_config)
        .context("Failed to serialize config for processing")?;
    let value = resolve_env_vars_with(&value, env).context("Failed to resolve env vars in config")?;
    let config: HomhConfig =
        serde_json::from_value(value).context("Failed to deserialize config after processing")?;

    let config = apply_env_overrides(config, env)?;
    let config = apply_all_defaults(config);

    require_startup_vars(&config)?;

    let report = validate(&config);
    for warning in &report.warnings {
        tracing::warn!(path = %warning.path, message = %warning.message, "Config warning");
    }
    if let Some(first) = report.errors.into_iter().next() {
        bail!(first);
    }

    Ok(config)
}
