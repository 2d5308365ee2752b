use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use futures::stream::{self, StreamExt};

use homh_core::{FragmentStream, LlmProvider, LlmRequest};

/// One scripted step of a mock stream.
#[derive(Debug, Clone)]
pub enum MockStep {
    /// Yield this fragment.
    Fragment(String),
    /// Yield an error. Later steps still play if the consumer keeps polling.
    Fail(String),
    /// Never resolve. Used to exercise timeouts.
    Stall,
}

/// A mock LLM provider that plays back a scripted fragment sequence.
///
/// It records every request it receives and counts how many stream items were
/// actually pulled, so tests can check ordering, backpressure and cancellation.
pub struct MockProvider {
    name: String,
    script: Vec<MockStep>,
    open_error: Option<String>,
    requests: Mutex<Vec<LlmRequest>>,
    pulled: Arc<AtomicUsize>,
}

impl MockProvider {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            script: Vec::new(),
            open_error: None,
            requests: Mutex::new(Vec::new()),
            pulled: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Stream these fragments, then end normally.
    pub fn with_fragments<I, S>(mut self, fragments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.script
            .extend(fragments.into_iter().map(|f| MockStep::Fragment(f.into())));
        self
    }

    pub fn then_fail(mut self, message: impl Into<String>) -> Self {
        self.script.push(MockStep::Fail(message.into()));
        self
    }

    pub fn then_stall(mut self) -> Self {
        self.script.push(MockStep::Stall);
        self
    }

    /// Fail when the session is opened, before any fragment.
    pub fn failing_on_open(mut self, message: impl Into<String>) -> Self {
        self.open_error = Some(message.into());
        self
    }

    /// Requests received so far, in order.
    pub fn requests(&self) -> Vec<LlmRequest> {
        self.requests
            .lock()
            .map(|r| r.clone())
            .unwrap_or_default()
    }

    /// Number of stream items pulled by consumers so far.
    pub fn pulled(&self) -> usize {
        self.pulled.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LlmProvider for MockProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn default_model(&self) -> &str {
        "mock"
    }

    async fn stream(&self, request: &LlmRequest) -> Result<FragmentStream> {
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(request.clone());
        }
        if let Some(message) = &self.open_error {
            return Err(anyhow!("{message}"));
        }

        let pulled = Arc::clone(&self.pulled);
        let fragments = stream::iter(self.script.clone()).then(move |step| {
            let pulled = Arc::clone(&pulled);
            async move {
                pulled.fetch_add(1, Ordering::SeqCst);
                match step {
                    MockStep::Fragment(text) => Ok(text),
                    MockStep::Fail(message) => Err(anyhow!("{message}")),
                    MockStep::Stall => futures::future::pending().await,
                }
            }
        });

        Ok(fragments.boxed())
    }
}
