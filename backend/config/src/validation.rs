//! Config validation with user-friendly error messages.

use crate::schema::HomhConfig;
use thiserror::Error;

/// A config validation error with field path and message.
#[derive(Debug, Error)]
#[error("Config validation error at '{path}': {message}")]
pub struct ConfigValidationError {
    pub path: String,
    pub message: String,
}

/// A collection of validation errors found in one pass.
#[derive(Debug, Default)]
pub struct ValidationReport {
    pub errors: Vec<ConfigValidationError>,
    pub warnings: Vec<ConfigValidationError>,
}

impl ValidationReport {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    fn error(&mut self, path: impl Into<String>, message: impl Into<String>) {
        self.errors.push(ConfigValidationError {
            path: path.into(),
            message: message.into(),
        });
    }

    fn warn(&mut self, path: impl Into<String>, message: impl Into<String>) {
        self.warnings.push(ConfigValidationError {
            path: path.into(),
            message: message.into(),
        });
    }
}

/// Validate the config and return a report of all errors and warnings.
pub fn validate(config: &HomhConfig) -> ValidationReport {
    let mut report = ValidationReport::default();
    validate_provider(config, &mut report);
    validate_server(config, &mut report);
    validate_database(config, &mut report);
    report
}

fn validate_provider(config: &HomhConfig, report: &mut ValidationReport) {
    let provider = &config.provider;
    if provider.model.as_deref().is_some_and(|m| m.trim().is_empty()) {
        report.error("provider.model", "Model id cannot be empty");
    }
    if let Some(url) = &provider.base_url {
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            report.error("provider.baseUrl", format!("'{url}' is not an http(s) URL"));
        }
    }
    if let Some(temperature) = provider.temperature {
        if !(0.0..=2.0).contains(&temperature) {
            report.error("provider.temperature", "temperature must be within 0.0..=2.0");
        }
    }
    if provider.max_output_tokens == Some(0) {
        report.error("provider.maxOutputTokens", "maxOutputTokens must be > 0");
    }
    if provider.timeout_secs == Some(0) {
        report.warn(
            "provider.timeoutSecs",
            "timeoutSecs is 0; fragment timeouts are disabled and a stalled provider will hang the response",
        );
    }
}

fn validate_server(config: &HomhConfig, report: &mut ValidationReport) {
    if let Some(bind) = &config.server.bind {
        if bind.parse::<std::net::SocketAddr>().is_err() {
            report.error("server.bind", format!("'{bind}' is not a socket address (host:port)"));
        }
    }
    if config.cors_origins().iter().any(|o| o == "*") {
        report.warn("server.corsOrigins", "Wildcard CORS origin allows any site to call the API");
    }
}

fn validate_database(config: &HomhConfig, report: &mut ValidationReport) {
    let url = config.database_url();
    if url.starts_with("mongodb://") || url.starts_with("mongodb+srv://") {
        report.error(
            "database.url",
            "Only SQLite document stores are supported (sqlite://<path>, a file path, or :memory:)",
        );
    }
}
