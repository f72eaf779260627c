//! Identity types shared by every parley crate.
//!
//! All ids are serializable and cheap to copy.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Identity Types
// ---------------------------------------------------------------------------

/// Unique identifier for a simulated participant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AgentId(pub Uuid);

impl AgentId {
    /// Create a new random agent ID.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for AgentId {
    fn default() -> Self {
        Self::new()
    }
}

/// Unique identifier for a conversation, minted by the start-conversation action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ConversationId(pub Uuid);

impl ConversationId {
    /// Create a new random conversation ID.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ConversationId {
    fn default() -> Self {
        Self::new()
    }
}

/// Correlation handle for one decision-cycle.
///
/// Issued when a snapshot is captured and consumed by the matching `Done` action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ThinkId(pub u64);

impl fmt::Display for AgentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for ConversationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for ThinkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "think-{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Agent Record
// ---------------------------------------------------------------------------

/// The durable description of an agent, as seen by itself and by others.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentRecord {
    /// Stable identity.
    pub id: AgentId,
    /// Display name used in chat transcripts.
    pub name: String,
    /// Who the agent is (persona text fed to the decision collaborators).
    pub identity: String,
    /// What the agent is trying to do right now.
    pub plan: String,
}

impl AgentRecord {
    /// Create a record with a fresh id.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        identity: impl Into<String>,
        plan: impl Into<String>,
    ) -> Self {
        Self {
            id: AgentId::new(),
            name: name.into(),
            identity: identity.into(),
            plan: plan.into(),
        }
    }
}
