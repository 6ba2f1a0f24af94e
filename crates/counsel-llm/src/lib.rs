//! Counsel LLM - Model client adapters, prompt store, and prompt chains

pub mod anthropic;
pub mod chain;
pub mod mock;
pub mod prompt;
pub mod provider;
pub mod types;

pub use anthropic::AnthropicProvider;
pub use chain::PromptChain;
pub use prompt::{FilePromptStore, InMemoryPromptStore, PromptError, PromptStore, PromptTemplate, PromptVars};
pub use provider::{Completion, LlmError, LlmProvider, LlmResult, LlmStream};
pub use types::*;
