//! In-memory world: a reference [`SnapshotProvider`] and [`ActionApplier`].
//!
//! There is no movement model — every registered agent is "nearby" every
//! other one, in registration order. All state sits behind a single mutex,
//! so each capture or action is applied atomically and in submission order.
//!
//! Consistency rules enforced here (independently of the scheduler's own
//! invariants):
//! - an agent has at most one open decision-cycle (thinking marker);
//! - an agent is a member of at most one conversation;
//! - only members may speak in, or be addressed in, a conversation;
//! - `Done` must quote the agent's outstanding [`ThinkId`].

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use tracing::{debug, info};

use crate::action::{Action, ActionOutcome, ActionRecord};
use crate::collab::{ActionApplier, SnapshotProvider};
use crate::error::{ParleyError, Result};
use crate::snapshot::{AgentSnapshot, Message, NearbyAgent, VisibleConversation};
use crate::types::{AgentId, AgentRecord, ConversationId, ThinkId};

/// Full state of one conversation, as held by the world.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversationState {
    /// Conversation identity.
    pub id: ConversationId,
    /// Initiator first, then the audience in submission order.
    pub members: Vec<AgentId>,
    /// Transcript, oldest first.
    pub messages: Vec<Message>,
    /// When the conversation was created.
    pub started_at: DateTime<Utc>,
}

#[derive(Debug, Default)]
struct WorldState {
    agents: Vec<AgentRecord>,
    thinking: HashMap<AgentId, ThinkId>,
    conversations: Vec<ConversationState>,
    acquainted: HashSet<(AgentId, AgentId)>,
    log: Vec<ActionRecord>,
    next_think: u64,
}

fn pair(a: AgentId, b: AgentId) -> (AgentId, AgentId) {
    if a <= b { (a, b) } else { (b, a) }
}

impl WorldState {
    fn record(&self, agent: AgentId) -> Result<&AgentRecord> {
        self.agents
            .iter()
            .find(|a| a.id == agent)
            .ok_or(ParleyError::AgentNotFound(agent))
    }

    fn conversation_of(&self, agent: AgentId) -> Option<&ConversationState> {
        self.conversations.iter().find(|c| c.members.contains(&agent))
    }

    fn capture(&mut self, agent: AgentId) -> Result<AgentSnapshot> {
        let me = self.record(agent)?.clone();
        if let Some(&think_id) = self.thinking.get(&agent) {
            return Err(ParleyError::AlreadyThinking { agent, think_id });
        }

        // The marker goes in before anything else is read.
        self.next_think += 1;
        let think_id = ThinkId(self.next_think);
        self.thinking.insert(agent, think_id);

        let nearby = self
            .agents
            .iter()
            .filter(|other| other.id != agent)
            .map(|other| NearbyAgent {
                agent: other.clone(),
                new: !self.acquainted.contains(&pair(agent, other.id)),
                thinking: self.thinking.contains_key(&other.id),
            })
            .collect();

        let conversations = self
            .conversations
            .iter()
            .filter(|c| c.members.contains(&agent))
            .map(|c| VisibleConversation {
                id: c.id,
                messages: c.messages.clone(),
            })
            .collect();

        Ok(AgentSnapshot {
            agent: me,
            nearby,
            conversations,
            think_id,
        })
    }

    fn apply(&mut self, agent: AgentId, action: &Action) -> Result<ActionOutcome> {
        let kind = action.kind();
        self.record(agent)?;

        match action {
            Action::StartConversation { audience } => {
                if audience.contains(&agent) {
                    return Err(ParleyError::rejected(kind, agent, "initiator listed in audience"));
                }
                for member in std::iter::once(&agent).chain(audience) {
                    self.record(*member)?;
                    if let Some(existing) = self.conversation_of(*member) {
                        return Err(ParleyError::rejected(
                            kind,
                            agent,
                            format!("{member} is already in conversation {}", existing.id),
                        ));
                    }
                }

                let mut members = Vec::with_capacity(audience.len() + 1);
                members.push(agent);
                members.extend(audience.iter().copied());
                for (i, a) in members.iter().enumerate() {
                    for b in &members[i + 1..] {
                        self.acquainted.insert(pair(*a, *b));
                    }
                }

                let id = ConversationId::new();
                info!(conversation = %id, initiator = %agent, members = members.len(), "Conversation started");
                self.conversations.push(ConversationState {
                    id,
                    members,
                    messages: Vec::new(),
                    started_at: Utc::now(),
                });
                Ok(ActionOutcome::ConversationStarted(id))
            }

            Action::Talking {
                audience,
                content,
                conversation_id,
            } => {
                if content.trim().is_empty() {
                    return Err(ParleyError::rejected(kind, agent, "empty utterance"));
                }
                let sender = self.record(agent)?.name.clone();
                let mut recipients = Vec::with_capacity(audience.len());
                for listener in audience {
                    recipients.push(self.record(*listener)?.name.clone());
                }

                let conversation = self
                    .conversations
                    .iter_mut()
                    .find(|c| c.id == *conversation_id)
                    .ok_or(ParleyError::ConversationNotFound(*conversation_id))?;
                if !conversation.members.contains(&agent) {
                    return Err(ParleyError::rejected(kind, agent, "speaker is not a member"));
                }
                let outsider = audience.iter().find(|a| !conversation.members.contains(*a));
                if let Some(outsider) = outsider {
                    return Err(ParleyError::rejected(
                        kind,
                        agent,
                        format!("{outsider} is not a member"),
                    ));
                }

                conversation.messages.push(Message {
                    sender,
                    recipients,
                    text: content.clone(),
                    timestamp: Utc::now(),
                });
                Ok(ActionOutcome::MessageSent {
                    conversation_id: *conversation_id,
                })
            }

            Action::Done { think_id } => match self.thinking.get(&agent).copied() {
                Some(outstanding) if outstanding == *think_id => {
                    self.thinking.remove(&agent);
                    Ok(ActionOutcome::ThinkingCleared(*think_id))
                }
                Some(outstanding) => Err(ParleyError::rejected(
                    kind,
                    agent,
                    format!("expected {outstanding}, got {think_id}"),
                )),
                None => Err(ParleyError::rejected(kind, agent, "no open decision-cycle")),
            },
        }
    }
}

/// Shared, thread-safe world state.
#[derive(Debug, Default)]
pub struct InMemoryWorld {
    state: Mutex<WorldState>,
}

impl InMemoryWorld {
    /// Create an empty world.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an agent and return its id.
    pub fn register(&self, record: AgentRecord) -> AgentId {
        let id = record.id;
        debug!(agent = %id, name = %record.name, "Agent registered");
        self.state.lock().agents.push(record);
        id
    }

    /// Register an agent built from its persona fields.
    pub fn register_agent(
        &self,
        name: impl Into<String>,
        identity: impl Into<String>,
        plan: impl Into<String>,
    ) -> AgentId {
        self.register(AgentRecord::new(name, identity, plan))
    }

    /// Look up an agent record.
    #[must_use]
    pub fn agent(&self, id: AgentId) -> Option<AgentRecord> {
        self.state.lock().agents.iter().find(|a| a.id == id).cloned()
    }

    /// The outstanding decision-cycle for `agent`, if any.
    #[must_use]
    pub fn thinking(&self, agent: AgentId) -> Option<ThinkId> {
        self.state.lock().thinking.get(&agent).copied()
    }

    /// Full state of a conversation.
    #[must_use]
    pub fn conversation(&self, id: ConversationId) -> Option<ConversationState> {
        self.state
            .lock()
            .conversations
            .iter()
            .find(|c| c.id == id)
            .cloned()
    }

    /// Every action applied so far, in order.
    #[must_use]
    pub fn actions(&self) -> Vec<ActionRecord> {
        self.state.lock().log.clone()
    }

    /// Open a decision-cycle for `agent`.
    ///
    /// # Errors
    /// Fails if the agent is unknown or already thinking.
    pub fn capture_snapshot(&self, agent: AgentId) -> Result<AgentSnapshot> {
        self.state.lock().capture(agent)
    }

    /// Apply one action atomically.
    ///
    /// # Errors
    /// Returns [`ParleyError::ActionRejected`] (or a lookup error) when a
    /// consistency rule is violated; nothing is changed in that case.
    pub fn apply(&self, agent: AgentId, action: Action) -> Result<ActionRecord> {
        let mut state = self.state.lock();
        let outcome = state.apply(agent, &action)?;
        let record = ActionRecord {
            seq: state.log.len() as u64,
            agent,
            action,
            outcome,
            applied_at: Utc::now(),
        };
        debug!(agent = %agent, seq = record.seq, kind = %record.action.kind(), "Action applied");
        state.log.push(record.clone());
        Ok(record)
    }
}

#[async_trait]
impl SnapshotProvider for InMemoryWorld {
    async fn capture(&self, agent: AgentId) -> Result<AgentSnapshot> {
        self.capture_snapshot(agent)
    }
}

#[async_trait]
impl ActionApplier for InMemoryWorld {
    async fn submit(&self, agent: AgentId, action: Action) -> Result<ActionRecord> {
        self.apply(agent, action)
    }
}
