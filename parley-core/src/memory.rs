//! Conversation memories — "who I talked with, and when".
//!
//! After a run, every participant gets one [`ConversationMemory`] pointing at
//! the conversation it took part in. Stores implement
//! [`MemoryStore`](crate::collab::MemoryStore); [`VolatileMemoryStore`] keeps
//! them in process, [`ConversationLog`](crate::persistence::ConversationLog)
//! keeps them in SQLite.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::collab::MemoryStore;
use crate::error::Result;
use crate::types::{AgentId, ConversationId};

/// One agent's record of having taken part in a conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationMemory {
    /// Who remembers.
    pub agent: AgentId,
    /// What they remember taking part in.
    pub conversation: ConversationId,
    /// When the memory was formed.
    pub recorded_at: DateTime<Utc>,
}

/// In-process memory store.
#[derive(Debug, Default)]
pub struct VolatileMemoryStore {
    memories: Mutex<Vec<ConversationMemory>>,
}

impl VolatileMemoryStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// All memories, in recording order.
    #[must_use]
    pub fn memories(&self) -> Vec<ConversationMemory> {
        self.memories.lock().clone()
    }

    /// Memories held by one agent.
    #[must_use]
    pub fn memories_for(&self, agent: AgentId) -> Vec<ConversationMemory> {
        self.memories
            .lock()
            .iter()
            .filter(|m| m.agent == agent)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl MemoryStore for VolatileMemoryStore {
    async fn record_conversation(
        &self,
        agent: AgentId,
        conversation: ConversationId,
        at: DateTime<Utc>,
    ) -> Result<()> {
        self.memories.lock().push(ConversationMemory {
            agent,
            conversation,
            recorded_at: at,
        });
        Ok(())
    }
}
