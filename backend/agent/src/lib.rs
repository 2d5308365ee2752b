//! HOMH companion agent.
//!
//! Persona resolution, instruction compilation, and the streaming generator
//! that turns provider fragments into the caller-facing response.

pub mod agent;
pub mod persona;
pub mod prompt;
pub mod stream;

#[cfg(test)]
mod test_support;

pub use agent::CompanionAgent;
pub use persona::{PersonaEntry, PersonaRegistry, DEFAULT_PERSONA_ID};
pub use prompt::{serialize_history, PromptCompiler, INSTRUCTION_TEMPLATE};
pub use stream::{ResponseStream, StreamGenerator, FALLBACK_MESSAGE};
