pub mod gemini;
pub mod mock;

pub use gemini::GeminiProvider;
pub use mock::{MockProvider, MockStep};
