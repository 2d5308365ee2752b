use thiserror::Error;

/// Top-level error type for the HOMH gateway.
#[derive(Debug, Error)]
pub enum HomhError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("LLM provider error ({provider}): {message}")]
    Provider { provider: String, message: String },

    #[error("template error: {0}")]
    Template(String),

    #[error("storage error: {0}")]
    Storage(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl HomhError {
    pub fn provider(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Provider {
            provider: provider.into(),
            message: message.into(),
        }
    }
}
