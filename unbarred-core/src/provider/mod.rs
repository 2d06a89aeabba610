//! LLM provider abstraction layer.
//!
//! Defines the generation interface the pipeline depends on, plus the
//! hosted-model implementation used in production.

pub mod anthropic;
mod types;

// Re-export common types
pub use types::{ChatRequest, ChatResponse, Message, Provider, ProviderError, Result};

pub use anthropic::AnthropicProvider;
