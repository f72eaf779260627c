//! Structured actions submitted to the world, and the durable records it returns.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::types::{AgentId, ConversationId, ThinkId};

/// A single world mutation requested by an agent's decision-cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Action {
    /// Open a new conversation with the given audience.
    #[serde(rename_all = "camelCase")]
    StartConversation {
        /// Agents invited into the conversation.
        audience: Vec<AgentId>,
    },
    /// Say something in an existing conversation.
    #[serde(rename_all = "camelCase")]
    Talking {
        /// Agents the utterance is addressed to.
        audience: Vec<AgentId>,
        /// The utterance.
        content: String,
        /// Conversation the utterance belongs to.
        conversation_id: ConversationId,
    },
    /// Close the decision-cycle identified by `think_id`.
    #[serde(rename_all = "camelCase")]
    Done {
        /// Handle issued with the cycle's snapshot.
        think_id: ThinkId,
    },
}

impl Action {
    /// The payload-free discriminant.
    #[must_use]
    pub fn kind(&self) -> ActionKind {
        match self {
            Self::StartConversation { .. } => ActionKind::StartConversation,
            Self::Talking { .. } => ActionKind::Talking,
            Self::Done { .. } => ActionKind::Done,
        }
    }
}

/// Discriminant of [`Action`], used in logs and errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ActionKind {
    /// [`Action::StartConversation`].
    StartConversation,
    /// [`Action::Talking`].
    Talking,
    /// [`Action::Done`].
    Done,
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::StartConversation => "startConversation",
            Self::Talking => "talking",
            Self::Done => "done",
        };
        f.write_str(name)
    }
}

/// What applying an action changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ActionOutcome {
    /// A conversation was created.
    ConversationStarted(ConversationId),
    /// A message was appended to a conversation.
    MessageSent {
        /// Where the message landed.
        conversation_id: ConversationId,
    },
    /// The thinking marker for a cycle was cleared.
    ThinkingCleared(ThinkId),
}

/// Durable record of one applied action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionRecord {
    /// Position in the world's action log.
    pub seq: u64,
    /// Submitting agent.
    pub agent: AgentId,
    /// The action as submitted.
    pub action: Action,
    /// What it changed.
    pub outcome: ActionOutcome,
    /// When it was applied.
    pub applied_at: DateTime<Utc>,
}

impl ActionRecord {
    /// The conversation created by this record, if it is a start record.
    #[must_use]
    pub fn started_conversation(&self) -> Option<ConversationId> {
        match self.outcome {
            ActionOutcome::ConversationStarted(id) => Some(id),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn action_serializes_with_type_tag() {
        let action = Action::Done { think_id: ThinkId(3) };
        let json = serde_json::to_value(&action).expect("serialize");
        assert_eq!(json["type"], "done");
        assert_eq!(json["thinkId"], 3);
    }

    #[test]
    fn talking_uses_camel_case_fields() {
        let id = ConversationId::new();
        let action = Action::Talking {
            audience: vec![],
            content: "hi".into(),
            conversation_id: id,
        };
        let json = serde_json::to_value(&action).expect("serialize");
        assert_eq!(json["type"], "talking");
        assert_eq!(json["conversationId"], id.0.to_string());
        assert_eq!(action.kind().to_string(), "talking");
    }
}
