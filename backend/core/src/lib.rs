pub mod error;
pub mod traits;
pub mod types;

pub use error::HomhError;
pub use traits::{FragmentStream, GenerationOptions, LlmProvider, LlmRequest};
pub use types::{ChatRequest, ChatTurn, PersonaDescriptor, PersonaInput, SavedChat};
