//! One chat exchange end to end: persona resolution, instruction
//! compilation, streamed response.

use std::sync::Arc;

use anyhow::Result;
use tracing::{info, info_span};

use homh_core::ChatRequest;

use crate::persona::PersonaRegistry;
use crate::prompt::PromptCompiler;
use crate::stream::{ResponseStream, StreamGenerator};

/// The companion that answers chat requests.
///
/// Cheap to clone; the registry and compiler are shared.
#[derive(Clone)]
pub struct CompanionAgent {
    registry: Arc<PersonaRegistry>,
    compiler: Arc<PromptCompiler>,
    generator: StreamGenerator,
}

impl CompanionAgent {
    pub fn new(
        registry: Arc<PersonaRegistry>,
        compiler: Arc<PromptCompiler>,
        generator: StreamGenerator,
    ) -> Self {
        Self {
            registry,
            compiler,
            generator,
        }
    }

    pub fn registry(&self) -> &Arc<PersonaRegistry> {
        &self.registry
    }

    /// Build the instruction the provider receives for this request.
    pub fn instruction_for(&self, request: &ChatRequest) -> Result<String> {
        let persona = self.registry.resolve(&request.persona);
        self.compiler
            .compile(&persona, &request.chat_history, &request.message)
    }

    /// Stream the companion's reply. Never fails; failures surface as the
    /// fallback fragment.
    ///
    /// Events logged while the stream is polled carry the `respond` span.
    pub fn respond(&self, request: &ChatRequest) -> ResponseStream {
        let persona = self.registry.resolve(&request.persona);
        let span = info_span!(
            "respond",
            provider = self.generator.provider_name(),
            persona = %persona.name
        );
        let _entered = span.enter();
        info!(
            history_turns = request.chat_history.len(),
            "Generating companion response"
        );
        let instruction = self
            .compiler
            .compile(&persona, &request.chat_history, &request.message);
        self.generator.generate(instruction)
    }
}
