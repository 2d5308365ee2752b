//! HOMH gateway configuration schema.
//!
//! Every field is optional on disk; `defaults::apply_all_defaults` fills in
//! whatever the file and the environment leave unset.

use serde::{Deserialize, Serialize};

/// Root configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HomhConfig {
    /// LLM provider credentials and generation settings
    #[serde(default)]
    pub provider: ProviderConfig,

    /// HTTP server settings
    #[serde(default)]
    pub server: ServerConfig,

    /// Chat document store
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Logging output
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,

    /// Maximum wait for the next streamed fragment, in seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_output_tokens: Option<u32>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerConfig {
    /// Socket address, e.g. `127.0.0.1:8000`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bind: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cors_origins: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DatabaseConfig {
    /// `sqlite://<path>`, a plain file path, or `:memory:`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoggingConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub level: Option<String>,

    /// Directory for rotated NDJSON logs; console only when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dir: Option<String>,
}

impl HomhConfig {
    pub fn api_key(&self) -> &str {
        self.provider.api_key.as_deref().unwrap_or_default()
    }

    pub fn database_url(&self) -> &str {
        self.database.url.as_deref().unwrap_or_default()
    }

    pub fn bind(&self) -> &str {
        self.server
            .bind
            .as_deref()
            .unwrap_or(crate::defaults::DEFAULT_BIND)
    }

    pub fn cors_origins(&self) -> &[String] {
        self.server.cors_origins.as_deref().unwrap_or_default()
    }

    pub fn log_level(&self) -> &str {
        self.logging
            .level
            .as_deref()
            .unwrap_or(crate::defaults::DEFAULT_LOG_LEVEL)
    }
}
