//! Environment variables: `${VAR}` substitution in config files and direct
//! overrides from the process environment.
//!
//! Only uppercase `[A-Z_][A-Z0-9_]*` variable names are matched.
//! `$${VAR}` escapes to a literal `${VAR}`.

use anyhow::{bail, Context, Result};
use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use serde_json::Value;
use std::collections::HashMap;

use crate::schema::HomhConfig;

/// Credential for the Gemini API. Required.
pub const GOOGLE_API_KEY: &str = "GOOGLE_API_KEY";
/// Chat store connection string. Required.
pub const DATABASE_URL: &str = "DATABASE_URL";

pub const HOMH_BIND: &str = "HOMH_BIND";
pub const HOMH_MODEL: &str = "HOMH_MODEL";
pub const HOMH_PROVIDER_BASE_URL: &str = "HOMH_PROVIDER_BASE_URL";
pub const HOMH_PROVIDER_TIMEOUT_SECS: &str = "HOMH_PROVIDER_TIMEOUT_SECS";
pub const HOMH_TEMPERATURE: &str = "HOMH_TEMPERATURE";
pub const HOMH_MAX_OUTPUT_TOKENS: &str = "HOMH_MAX_OUTPUT_TOKENS";
pub const HOMH_CORS_ORIGINS: &str = "HOMH_CORS_ORIGINS";
pub const HOMH_LOG_LEVEL: &str = "HOMH_LOG_LEVEL";
pub const HOMH_LOG_DIR: &str = "HOMH_LOG_DIR";

/// Matches `${VAR}` with an optional leading `$` (the escape form).
static ENV_VAR_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(\$?)\$\{([A-Z_][A-Z0-9_]*)\}").expect("valid env var regex"));

/// Error returned for missing env vars.
#[derive(Debug, thiserror::Error)]
#[error("Missing env var \"{var_name}\" required for config path: {config_path}")]
pub struct MissingEnvVarError {
    pub var_name: String,
    pub config_path: String,
}

/// Substitute `${VAR}` references in a config JSON value tree using the process env.
pub fn resolve_env_vars(value: &Value) -> Result<Value> {
    resolve_env_vars_with(value, &std::env::vars().collect())
}

/// Substitute env vars using a provided map (useful for testing).
pub fn resolve_env_vars_with(value: &Value, env: &HashMap<String, String>) -> Result<Value> {
    substitute_value(value, env, "")
}

fn substitute_value(value: &Value, env: &HashMap<String, String>, path: &str) -> Result<Value> {
    match value {
        Value::String(s) => Ok(Value::String(substitute_string(s, env, path)?)),
        Value::Array(arr) => {
            let result: Result<Vec<_>> = arr
                .iter()
                .enumerate()
                .map(|(i, v)| substitute_value(v, env, &format!("{path}[{i}]")))
                .collect();
            Ok(Value::Array(result?))
        }
        Value::Object(map) => {
            let mut result = serde_json::Map::new();
            for (k, v) in map {
                let child_path = if path.is_empty() {
                    k.clone()
                } else {
                    format!("{path}.{k}")
                };
                result.insert(k.clone(), substitute_value(v, env, &child_path)?);
            }
            Ok(Value::Object(result))
        }
        other => Ok(other.clone()),
    }
}

fn substitute_string(s: &str, env: &HashMap<String, String>, path: &str) -> Result<String> {
    if !s.contains('$') {
        return Ok(s.to_string());
    }

    let mut missing: Option<MissingEnvVarError> = None;
    let substituted = ENV_VAR_PATTERN.replace_all(s, |caps: &Captures| {
        let var_name = &caps[2];
        if !caps[1].is_empty() {
            return format!("${{{var_name}}}");
        }
        match env.get(var_name) {
            Some(val) if !val.is_empty() => val.clone(),
            _ => {
                missing.get_or_insert_with(|| MissingEnvVarError {
                    var_name: var_name.to_string(),
                    config_path: path.to_string(),
                });
                String::new()
            }
        }
    });

    if let Some(err) = missing {
        bail!(err);
    }
    Ok(substituted.into_owned())
}

/// Overlay direct environment variables onto the config. Env wins over file values.
pub fn apply_env_overrides(
    mut config: HomhConfig,
    env: &HashMap<String, String>,
) -> Result<HomhConfig> {
    let get = |name: &str| env.get(name).map(|v| v.trim()).filter(|v| !v.is_empty());

    if let Some(v) = get(GOOGLE_API_KEY) {
        config.provider.api_key = Some(v.to_string());
    }
    if let Some(v) = get(DATABASE_URL) {
        config.database.url = Some(v.to_string());
    }
    if let Some(v) = get(HOMH_BIND) {
        config.server.bind = Some(v.to_string());
    }
    if let Some(v) = get(HOMH_MODEL) {
        config.provider.model = Some(v.to_string());
    }
    if let Some(v) = get(HOMH_PROVIDER_BASE_URL) {
        config.provider.base_url = Some(v.trim_end_matches('/').to_string());
    }
    if let Some(v) = get(HOMH_PROVIDER_TIMEOUT_SECS) {
        config.provider.timeout_secs = Some(
            v.parse()
                .with_context(|| format!("{HOMH_PROVIDER_TIMEOUT_SECS} must be an integer, got '{v}'"))?,
        );
    }
    if let Some(v) = get(HOMH_TEMPERATURE) {
        config.provider.temperature = Some(
            v.parse()
                .with_context(|| format!("{HOMH_TEMPERATURE} must be a number, got '{v}'"))?,
        );
    }
    if let Some(v) = get(HOMH_MAX_OUTPUT_TOKENS) {
        config.provider.max_output_tokens = Some(
            v.parse()
                .with_context(|| format!("{HOMH_MAX_OUTPUT_TOKENS} must be an integer, got '{v}'"))?,
        );
    }
    if let Some(v) = get(HOMH_CORS_ORIGINS) {
        config.server.cors_origins = Some(
            v.split(',')
                .map(str::trim)
                .filter(|o| !o.is_empty())
                .map(str::to_string)
                .collect(),
        );
    }
    if let Some(v) = get(HOMH_LOG_LEVEL) {
        config.logging.level = Some(v.to_string());
    }
    if let Some(v) = get(HOMH_LOG_DIR) {
        config.logging.dir = Some(v.to_string());
    }

    Ok(config)
}

/// Fail unless the provider credential and the database URL are both present.
pub fn require_startup_vars(config: &HomhConfig) -> Result<(), MissingEnvVarError> {
    if config.api_key().trim().is_empty() {
        return Err(MissingEnvVarError {
            var_name: GOOGLE_API_KEY.to_string(),
            config_path: "provider.apiKey".to_string(),
        });
    }
    if config.database_url().trim().is_empty() {
        return Err(MissingEnvVarError {
            var_name: DATABASE_URL.to_string(),
            config_path: "database.url".to_string(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn env(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[test]
    fn substitutes_simple_var() {
        let v = json!({"provider": {"apiKey": "${GOOGLE_API_KEY}"}});
        let result = resolve_env_vars_with(&v, &env(&[("GOOGLE_API_KEY", "AIza-test")])).unwrap();
        assert_eq!(result["provider"]["apiKey"], "AIza-test");
    }

    #[test]
    fn error_on_missing_var_names_path() {
        let v = json!({"database": {"url": "${MISSING_DB}"}});
        let err = resolve_env_vars_with(&v, &HashMap::new()).unwrap_err().to_string();
        assert!(err.contains("MISSING_DB"));
        assert!(err.contains("database.url"));
    }

    #[test]
    fn escaped_reference_is_kept_literal() {
        let v = json!({"x": "$${NOT_A_VAR}"});
        let result = resolve_env_vars_with(&v, &HashMap::new()).unwrap();
        assert_eq!(result["x"], "${NOT_A_VAR}");
    }

    #[test]
    fn overrides_from_env() {
        let cfg = apply_env_overrides(
            HomhConfig::default(),
            &env(&[
                (GOOGLE_API_KEY, "key"),
                (DATABASE_URL, "sqlite://homh.db"),
                (HOMH_CORS_ORIGINS, "http://a.test, http://b.test,"),
                (HOMH_PROVIDER_TIMEOUT_SECS, "15"),
            ]),
        )
        .unwrap();
        assert_eq!(cfg.api_key(), "key");
        assert_eq!(cfg.database_url(), "sqlite://homh.db");
        assert_eq!(cfg.cors_origins(), ["http://a.test", "http://b.test"]);
        assert_eq!(cfg.provider.timeout_secs, Some(15));
    }

    #[test]
    fn rejects_unparseable_numbers() {
        let result = apply_env_overrides(HomhConfig::default(), &env(&[(HOMH_TEMPERATURE, "warm")]));
        assert!(result.unwrap_err().to_string().contains(HOMH_TEMPERATURE));
    }

    #[test]
    fn requires_credential_before_database() {
        let err = require_startup_vars(&HomhConfig::default()).unwrap_err();
        assert_eq!(err.var_name, GOOGLE_API_KEY);

        let mut cfg = HomhConfig::default();
        cfg.provider.api_key = Some("key".to_string());
        let err = require_startup_vars(&cfg).unwrap_err();
        assert_eq!(err.var_name, DATABASE_URL);
    }
}
