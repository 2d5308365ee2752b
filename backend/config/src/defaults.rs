//! Config defaults: applies sensible default values to parsed config.

use crate::schema::HomhConfig;

/// Default bind address; matches the port the web client targets.
pub const DEFAULT_BIND: &str = "127.0.0.1:8000";

/// Default model for streamed generation.
pub const DEFAULT_MODEL: &str = "gemini-1.5-flash-latest";

/// Default Gemini API root.
pub const DEFAULT_PROVIDER_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Default wait for the next streamed fragment.
pub const DEFAULT_PROVIDER_TIMEOUT_SECS: u64 = 60;

/// Default log level.
pub const DEFAULT_LOG_LEVEL: &str = "info";

/// Development origins allowed by CORS.
pub const DEFAULT_CORS_ORIGINS: &[&str] = &["http://localhost:3000", "http://localhost:5173"];

/// Apply all defaults to a freshly loaded config.
pub fn apply_all_defaults(config: HomhConfig) -> HomhConfig {
    let config = apply_provider_defaults(config);
    let config = apply_server_defaults(config);
    apply_logging_defaults(config)
}

/// Model, endpoint and timeout. Sampling options stay unset.
fn apply_provider_defaults(mut config: HomhConfig) -> HomhConfig {
    let provider = &mut config.provider;
    if provider.model.is_none() {
        provider.model = Some(DEFAULT_MODEL.to_string());
    }
    if provider.base_url.is_none() {
        provider.base_url = Some(DEFAULT_PROVIDER_BASE_URL.to_string());
    }
    if provider.timeout_secs.is_none() {
        provider.timeout_secs = Some(DEFAULT_PROVIDER_TIMEOUT_SECS);
    }
    config
}

fn apply_server_defaults(mut config: HomhConfig) -> HomhConfig {
    let server = &mut config.server;
    if server.bind.is_none() {
        server.bind = Some(DEFAULT_BIND.to_string());
    }
    if server.cors_origins.is_none() {
        server.cors_origins = Some(DEFAULT_CORS_ORIGINS.iter().map(|o| o.to_string()).collect());
    }
    config
}

fn apply_logging_defaults(mut config: HomhConfig) -> HomhConfig {
    if config.logging.level.is_none() {
        config.logging.level = Some(DEFAULT_LOG_LEVEL.to_string());
    }
    config
}
