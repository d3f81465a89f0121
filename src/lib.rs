pub mod cli;
pub mod core;
pub mod providers;

pub use crate::core::fallback::{FallbackClient, GenerateError};
pub use crate::providers::{ChatMessage, GenerationResult, LlmProvider, ProviderError, ProviderId};
