//! Built-in engine adapters.

mod openai;
pub use openai::{OpenAiEngine, GEMINI_BASE_URL, OPENAI_BASE_URL};
