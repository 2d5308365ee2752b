use anyhow::Result;
use async_trait::async_trait;
use futures::stream::BoxStream;

/// Fragments of generated text as they arrive from a provider.
///
/// An `Err` item ends the useful part of the stream; callers stop polling after it.
pub type FragmentStream = BoxStream<'static, Result<String>>;

/// Trait for streaming text-generation providers.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Provider name (e.g., "gemini").
    fn name(&self) -> &str;

    /// Model identifier used when the request does not name one.
    fn default_model(&self) -> &str;

    /// Open a streaming generation session.
    ///
    /// Errors returned here happen before any fragment is produced.
    async fn stream(&self, request: &LlmRequest) -> Result<FragmentStream>;
}

/// Request to an LLM provider.
#[derive(Debug, Clone, Default)]
pub struct LlmRequest {
    /// Model override; `None` uses the provider default.
    pub model: Option<String>,
    /// The compiled instruction, sent as the sole content.
    pub instruction: String,
    pub options: GenerationOptions,
}

impl LlmRequest {
    pub fn new(instruction: impl Into<String>) -> Self {
        Self {
            instruction: instruction.into(),
            ..Default::default()
        }
    }

    pub fn with_options(mut self, options: GenerationOptions) -> Self {
        self.options = options;
        self
    }
}

/// Optional sampling parameters. Unset fields are not sent to the provider.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct GenerationOptions {
    pub temperature: Option<f32>,
    pub max_output_tokens: Option<u32>,
}

impl GenerationOptions {
    pub fn is_empty(&self) -> bool {
        self.temperature.is_none() && self.max_output_tokens.is_none()
    }
}
