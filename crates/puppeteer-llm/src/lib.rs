//! Puppeteer LLM - The opaque model collaborator
//!
//! The orchestrator only needs "prompt in, text out, may fail". Providers
//! adapt that contract to concrete HTTP APIs; `MockProvider` scripts it for
//! tests and offline runs.

pub mod anthropic;
pub mod mock;
pub mod openai;
pub mod provider;
pub mod types;

pub use anthropic::AnthropicProvider;
pub use mock::{MockBehavior, MockProvider};
pub use openai::OpenAiProvider;
pub use provider::{LlmError, LlmProvider, LlmResult};
pub use types::*;
