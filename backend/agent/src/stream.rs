//! Fragment forwarding with a single user-visible fallback on failure.
//!
//! Per exchange the generator moves through
//! `Configuring → Streaming → Completed`, or `→ Failed → Completed` after
//! emitting the fallback fragment. The output is a pull-based stream: the
//! provider is only asked for the next fragment when the caller asks for one,
//! and dropping the output drops the provider stream with it.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Result};
use futures::stream::{self, BoxStream, StreamExt};
use tracing::{debug, error, info, Instrument, Span};

use homh_core::{FragmentStream, GenerationOptions, LlmProvider, LlmRequest};
use homh_logging::redact_sensitive_data;

/// The only text a caller ever sees when generation fails.
pub const FALLBACK_MESSAGE: &str =
    "Apologies, I'm experiencing a technical difficulty. Could you try again?";

/// Caller-facing stream of text fragments. Never yields an error.
pub type ResponseStream = BoxStream<'static, String>;

/// Drives one provider stream per exchange.
#[derive(Clone)]
pub struct StreamGenerator {
    provider: Arc<dyn LlmProvider>,
    model: Option<String>,
    options: GenerationOptions,
    fragment_timeout: Option<Duration>,
}

impl StreamGenerator {
    pub fn new(provider: Arc<dyn LlmProvider>) -> Self {
        Self {
            provider,
            model: None,
            options: GenerationOptions::default(),
            fragment_timeout: None,
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn with_options(mut self, options: GenerationOptions) -> Self {
        self.options = options;
        self
    }

    /// Bound the wait for the session to open and for each next fragment.
    /// A zero duration disables the bound.
    pub fn with_fragment_timeout(mut self, timeout: Duration) -> Self {
        self.fragment_timeout = (!timeout.is_zero()).then_some(timeout);
        self
    }

    pub fn provider_name(&self) -> &str {
        self.provider.name()
    }

    /// Stream the response for an already-compiled instruction.
    ///
    /// An `Err` instruction goes straight to the fallback fragment. Every poll
    /// of the returned stream runs inside the span that was current here.
    pub fn generate(&self, instruction: Result<String>) -> ResponseStream {
        let phase = match instruction {
            Ok(instruction) => Phase::Configuring(LlmRequest {
                model: self.model.clone(),
                instruction,
                options: self.options,
            }),
            Err(e) => Phase::Failed(e.context("Instruction compilation failed")),
        };

        let run = Run {
            provider: Arc::clone(&self.provider),
            fragment_timeout: self.fragment_timeout,
            forwarded: 0,
            finished: false,
            span: Span::current(),
        };

        stream::unfold((phase, run), |(phase, run)| {
            let span = run.span.clone();
            step(phase, run).instrument(span)
        })
        .boxed()
    }
}

/// Advance until the next caller-visible fragment, or the end.
async fn step(mut phase: Phase, mut run: Run) -> Option<(String, (Phase, Run))> {
    loop {
        phase = match phase {
            Phase::Configuring(request) => run.open(&request).await,
            Phase::Streaming(mut fragments) => match run.next_fragment(&mut fragments).await {
                Ok(Some(text)) if text.is_empty() => Phase::Streaming(fragments),
                Ok(Some(text)) => {
                    run.forwarded += 1;
                    return Some((text, (Phase::Streaming(fragments), run)));
                }
                Ok(None) => {
                    info!(
                        provider = run.provider.name(),
                        fragments = run.forwarded,
                        "Response stream completed"
                    );
                    run.finished = true;
                    Phase::Completed
                }
                Err(e) => Phase::Failed(e),
            },
            Phase::Failed(e) => {
                error!(
                    provider = run.provider.name(),
                    fragments_before_failure = run.forwarded,
                    error = %redact_sensitive_data(&format!("{e:?}")),
                    "LLM streaming failed; sending fallback"
                );
                run.finished = true;
                return Some((FALLBACK_MESSAGE.to_string(), (Phase::Completed, run)));
            }
            Phase::Completed => return None,
        };
    }
}

enum Phase {
    Configuring(LlmRequest),
    Streaming(FragmentStream),
    Failed(anyhow::Error),
    Completed,
}

struct Run {
    provider: Arc<dyn LlmProvider>,
    fragment_timeout: Option<Duration>,
    forwarded: usize,
    finished: bool,
    span: Span,
}

impl Run {
    async fn open(&self, request: &LlmRequest) -> Phase {
        let opened = match self.fragment_timeout {
            Some(limit) => tokio::time::timeout(limit, self.provider.stream(request))
                .await
                .unwrap_or_else(|_| Err(anyhow!("provider did not open a stream within {limit:?}"))),
            None => self.provider.stream(request).await,
        };
        match opened {
            Ok(fragments) => {
                debug!(provider = self.provider.name(), "Provider stream opened");
                Phase::Streaming(fragments)
            }
            Err(e) => Phase::Failed(e.context("Failed to open provider stream")),
        }
    }

    async fn next_fragment(&self, fragments: &mut FragmentStream) -> Result<Option<String>> {
        let next = match self.fragment_timeout {
            Some(limit) => tokio::time::timeout(limit, fragments.next())
                .await
                .map_err(|_| anyhow!("no fragment from provider within {limit:?}"))?,
            None => fragments.next().await,
        };
        next.transpose()
    }
}

impl Drop for Run {
    fn drop(&mut self) {
        let _entered = self.span.enter();
        if !self.finished {
            debug!(
                provider = self.provider.name(),
                fragments = self.forwarded,
                "Response stream abandoned by caller; provider stream released"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use homh_llm::MockProvider;

    async fn collect(generator: &StreamGenerator, instruction: Result<String>) -> Vec<String> {
        generator.generate(instruction).collect().await
    }

    #[tokio::test]
    async fn test_forwards_fragments_in_order() {
        let provider = Arc::new(MockProvider::new("mock").with_fragments(["Hello", " there", "!"]));
        let generator = StreamGenerator::new(provider.clone());
        let out = collect(&generator, Ok("instruction".into())).await;
        assert_eq!(out, vec!["Hello", " there", "!"]);
        assert_eq!(provider.requests()[0].instruction, "instruction");
    }

    #[tokio::test]
    async fn test_empty_fragments_are_skipped() {
        let provider = Arc::new(MockProvider::new("mock").with_fragments(["", "a", "", "b"]));
        let out = collect(&StreamGenerator::new(provider), Ok("x".into())).await;
        assert_eq!(out, vec!["a", "b"]);
    }

    #[tokio::test]
    async fn test_mid_stream_failure_appends_fallback() {
        let provider = Arc::new(
            MockProvider::new("mock")
                .with_fragments(["Hello", " there"])
                .then_fail("connection reset")
                .with_fragments(["never seen"]),
        );
        let out = collect(&StreamGenerator::new(provider), Ok("x".into())).await;
        assert_eq!(out, vec!["Hello", " there", FALLBACK_MESSAGE]);
    }

    #[tokio::test]
    async fn test_open_failure_yields_only_fallback() {
        let provider = Arc::new(MockProvider::new("mock").failing_on_open("HTTP 403"));
        let out = collect(&StreamGenerator::new(provider), Ok("x".into())).await;
        assert_eq!(out, vec![FALLBACK_MESSAGE]);
    }

    #[tokio::test]
    async fn test_instruction_error_never_reaches_provider() {
        let provider = Arc::new(MockProvider::new("mock").with_fragments(["unused"]));
        let generator = StreamGenerator::new(provider.clone());
        let out = collect(&generator, Err(anyhow!("template broke"))).await;
        assert_eq!(out, vec![FALLBACK_MESSAGE]);
        assert!(provider.requests().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_stalled_provider_times_out_into_fallback() {
        let provider = Arc::new(MockProvider::new("mock").with_fragments(["partial"]).then_stall());
        let generator =
            StreamGenerator::new(provider).with_fragment_timeout(Duration::from_secs(5));
        let out = collect(&generator, Ok("x".into())).await;
        assert_eq!(out, vec!["partial", FALLBACK_MESSAGE]);
    }

    #[tokio::test]
    async fn test_pull_based_and_cancellable() {
        let provider = Arc::new(MockProvider::new("mock").with_fragments(["a", "b", "c", "d"]));
        let generator = StreamGenerator::new(provider.clone());

        let mut out = generator.generate(Ok("x".into()));
        assert_eq!(provider.pulled(), 0);
        assert_eq!(out.next().await.as_deref(), Some("a"));
        assert_eq!(provider.pulled(), 1);
        assert_eq!(out.next().await.as_deref(), Some("b"));
        drop(out);
        assert_eq!(provider.pulled(), 2);
    }

    #[tokio::test]
    async fn test_model_and_options_are_forwarded() {
        let provider = Arc::new(MockProvider::new("mock"));
        let options = GenerationOptions {
            temperature: Some(0.3),
            max_output_tokens: Some(256),
        };
        let generator = StreamGenerator::new(provider.clone())
            .with_model("gemini-2.5-flash")
            .with_options(options);
        let out = collect(&generator, Ok("x".into())).await;
        assert!(out.is_empty());

        let request = &provider.requests()[0];
        assert_eq!(request.model.as_deref(), Some("gemini-2.5-flash"));
        assert_eq!(request.options, options);
    }
}
