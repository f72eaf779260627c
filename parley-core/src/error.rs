//! Error types for the parley core library.

use thiserror::Error;

use crate::action::ActionKind;
use crate::types::{AgentId, ConversationId, ThinkId};

/// Top-level error type for collaborator operations.
#[derive(Error, Debug)]
pub enum ParleyError {
    /// The agent is not registered with the world.
    #[error("Agent not found: {0}")]
    AgentNotFound(AgentId),

    /// The conversation does not exist.
    #[error("Conversation not found: {0}")]
    ConversationNotFound(ConversationId),

    /// A new decision-cycle was requested while one is still open for this agent.
    #[error("Agent {agent} is already thinking ({think_id})")]
    AlreadyThinking {
        /// The busy agent.
        agent: AgentId,
        /// The outstanding cycle handle.
        think_id: ThinkId,
    },

    /// The world refused to apply an action.
    #[error("{kind} rejected for agent {agent}: {reason}")]
    ActionRejected {
        /// Which action was refused.
        kind: ActionKind,
        /// The submitting agent.
        agent: AgentId,
        /// Why the world refused it.
        reason: String,
    },

    /// A decision collaborator could not produce an answer.
    #[error("Decision failed: {0}")]
    Decision(String),

    /// Serialization or deserialization failure.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// SQLite persistence error.
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Generic I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ParleyError {
    /// Shorthand for an [`ParleyError::ActionRejected`].
    pub fn rejected(kind: ActionKind, agent: AgentId, reason: impl Into<String>) -> Self {
        Self::ActionRejected {
            kind,
            agent,
            reason: reason.into(),
        }
    }

    /// The rejected action kind, when this is a rejection.
    #[must_use]
    pub fn rejected_kind(&self) -> Option<ActionKind> {
        match self {
            Self::ActionRejected { kind, .. } => Some(*kind),
            _ => None,
        }
    }
}

/// Convenience Result type alias.
pub type Result<T> = std::result::Result<T, ParleyError>;
