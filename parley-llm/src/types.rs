//! Core types for LLM requests and responses.

use parley_core::chat::ChatMessage;
use serde::{Deserialize, Serialize};

/// Model size used for a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LlmTier {
    /// Small local model. Fast, cheap; yes/no decisions.
    Small,
    /// Large model. Utterances.
    Large,
}

/// A request to the LLM.
#[derive(Debug, Clone, Serialize)]
pub struct LlmRequest {
    /// System prompt (persona, rules).
    pub system: String,
    /// Conversation transcript plus the final instruction, oldest first.
    pub messages: Vec<ChatMessage>,
    /// Which tier is this request?
    pub tier: LlmTier,
    /// Maximum tokens to generate.
    pub max_tokens: u32,
    /// Temperature (0.0 = deterministic, 1.0 = creative).
    pub temperature: f32,
    /// Ask the provider for a JSON object.
    pub json_mode: bool,
    /// Request timeout in milliseconds.
    pub timeout_ms: u64,
}

impl LlmRequest {
    /// Create a request answered by the small model.
    #[must_use]
    pub fn small(system: impl Into<String>, messages: Vec<ChatMessage>) -> Self {
        Self {
            system: system.into(),
            messages,
            tier: LlmTier::Small,
            max_tokens: 20,
            temperature: 0.2,
            json_mode: false,
            timeout_ms: 5000,
        }
    }

    /// Create a request answered by the large model.
    #[must_use]
    pub fn large(system: impl Into<String>, messages: Vec<ChatMessage>) -> Self {
        Self {
            system: system.into(),
            messages,
            tier: LlmTier::Large,
            max_tokens: 160,
            temperature: 0.8,
            json_mode: false,
            timeout_ms: 5000,
        }
    }

    /// Request a JSON object as output.
    #[must_use]
    pub fn with_json(mut self) -> Self {
        self.json_mode = true;
        self
    }

    /// Set sampling parameters.
    #[must_use]
    pub fn with_sampling(mut self, max_tokens: u32, temperature: f32) -> Self {
        self.max_tokens = max_tokens;
        self.temperature = temperature;
        self
    }

    /// Set the timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }
}

/// A response from the LLM.
#[derive(Debug, Clone, Deserialize)]
pub struct LlmResponse {
    /// The generated text.
    pub text: String,
    /// How many tokens were generated.
    pub tokens_generated: u32,
    /// Latency in milliseconds.
    pub latency_ms: u64,
    /// Which model was used.
    pub model: String,
}

/// Structured leave-or-stay answer (JSON mode).
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct LeaveDecision {
    /// Whether the agent leaves now.
    pub leave: bool,
}
