//! # parley-llm — LLM Decisions for parley
//!
//! Implements [`parley_core::ConversationDecider`] on top of chat-completion
//! backends:
//!   - **Ollama** (local, recommended default)
//!   - **OpenAI-compatible API** (also works with Together, vLLM, etc.)
//!
//! Every call degrades gracefully: when the backend is missing, slow, or
//! returns junk, the decider falls back to deterministic templates so a run
//! never stalls on the model.
//!
//! # Routing
//!
//! ```text
//! should_withdraw        → small model, JSON {"leave": bool}   [cap: max_messages]
//! begin_conversation     → large model, free text              [fallback: greeting]
//! continue_conversation  → large model, transcript as chat     [fallback: reply]
//! ```

pub mod client;
pub mod decider;
pub mod error;
pub mod prompt;
pub mod types;

pub use client::LlmClient;
pub use decider::LlmDecider;
pub use error::LlmError;
pub use types::{LlmRequest, LlmResponse, LlmTier};
