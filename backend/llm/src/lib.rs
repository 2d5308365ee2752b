//! Streaming LLM providers: Gemini over SSE, plus a scripted mock.

pub mod providers;
pub mod sse;

pub use providers::{GeminiProvider, MockProvider, MockStep};
