//! Collaborator traits consumed by the turn scheduler.
//!
//! Every method is a suspension point: the scheduler awaits each call to
//! completion before making the next one, so implementations never see two
//! calls from the same scheduler in flight at once.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::action::{Action, ActionRecord};
use crate::chat::ChatMessage;
use crate::error::Result;
use crate::snapshot::{AgentSnapshot, NearbyAgent};
use crate::types::{AgentId, AgentRecord, ConversationId};

/// Builds an agent's view of its surroundings.
#[async_trait]
pub trait SnapshotProvider: Send + Sync {
    /// Open a decision-cycle for `agent` and return what it perceives.
    ///
    /// A durable thinking marker must be recorded *before* the snapshot is
    /// computed, so an aborted cycle leaves evidence behind.
    async fn capture(&self, agent: AgentId) -> Result<AgentSnapshot>;
}

/// Chooses what an agent says and whether it leaves.
#[async_trait]
pub trait ConversationDecider: Send + Sync {
    /// Opening line for a conversation with newly met `participants`.
    async fn begin_conversation(
        &self,
        participants: &[String],
        agent: &AgentRecord,
    ) -> Result<String>;

    /// Reply given the history so far and who is nearby.
    async fn continue_conversation(
        &self,
        history: &[ChatMessage],
        agent: &AgentRecord,
        nearby: &[NearbyAgent],
    ) -> Result<String>;

    /// Whether `agent` withdraws from the conversation now.
    async fn should_withdraw(&self, history: &[ChatMessage], agent: &AgentRecord) -> Result<bool>;
}

/// Applies actions against shared world state.
///
/// Implementations are the linearizable transactional boundary of the
/// system: each `submit` either applies atomically and returns its durable
/// record, or changes nothing and returns an error.
#[async_trait]
pub trait ActionApplier: Send + Sync {
    /// Apply `action` on behalf of `agent`.
    async fn submit(&self, agent: AgentId, action: Action) -> Result<ActionRecord>;
}

/// Long-term memory of conversations.
#[async_trait]
pub trait MemoryStore: Send + Sync {
    /// Record that `agent` took part in `conversation` at `at`.
    async fn record_conversation(
        &self,
        agent: AgentId,
        conversation: ConversationId,
        at: DateTime<Utc>,
    ) -> Result<()>;
}
