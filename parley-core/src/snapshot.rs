//! Point-in-time perception of one agent.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{AgentRecord, ConversationId, ThinkId};

/// Another agent within perception range.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NearbyAgent {
    /// The nearby agent.
    pub agent: AgentRecord,
    /// First encounter: the observer has never shared a conversation with it.
    pub new: bool,
    /// The nearby agent has a decision-cycle in flight.
    pub thinking: bool,
}

/// A single line in a conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Name of the speaker.
    pub sender: String,
    /// Names of the addressees, in submission order.
    pub recipients: Vec<String>,
    /// What was said.
    pub text: String,
    /// When it was said.
    pub timestamp: DateTime<Utc>,
}

impl Message {
    /// Transcript form: `"<sender> to <r1>, <r2>: <text>"`.
    #[must_use]
    pub fn render(&self) -> String {
        format!("{} to {}: {}", self.sender, self.recipients.join(", "), self.text)
    }
}

/// A conversation the observer can currently see, with its full history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VisibleConversation {
    /// Conversation identity.
    pub id: ConversationId,
    /// Messages, oldest first.
    pub messages: Vec<Message>,
}

/// Everything an agent perceives at the start of a decision-cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentSnapshot {
    /// The observing agent's own record.
    pub agent: AgentRecord,
    /// Other agents in range, in a stable order.
    pub nearby: Vec<NearbyAgent>,
    /// Conversations the observer is visibly part of.
    pub conversations: Vec<VisibleConversation>,
    /// Handle for closing this cycle.
    pub think_id: ThinkId,
}

impl AgentSnapshot {
    /// Nearby agents met for the first time.
    #[must_use]
    pub fn new_friends(&self) -> Vec<&NearbyAgent> {
        self.nearby.iter().filter(|n| n.new).collect()
    }

    /// First nearby agent flagged as thinking, if any.
    #[must_use]
    pub fn thinking_neighbour(&self) -> Option<&NearbyAgent> {
        self.nearby.iter().find(|n| n.thinking)
    }
}
