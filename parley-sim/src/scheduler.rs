//! Round-robin turn scheduler.
//!
//! One run drives one conversation. Agents take decision-cycles in input
//! order, pass after pass, until one of them withdraws:
//!
//! ```text
//! cycle(agent):
//!   capture snapshot (thinking marker first)
//!   nobody nearby may be thinking
//!   AwaitingOpen   → no conversation visible → start → opening line → talk
//!   InConversation → exactly the held one visible → withdraw? → reply → talk
//!   done(think_id)
//! ```
//!
//! Every check failure and every rejected submission aborts the run. Nothing
//! is retried; a supervisor wanting another attempt starts a fresh run.

use std::sync::Arc;

use chrono::Utc;
use parley_core::config::{SchedulerConfig, SubmissionPolicy};
use parley_core::{
    Action, ActionApplier, ActionKind, ActionRecord, AgentId, AgentSnapshot, ConversationDecider,
    ConversationId, MemoryStore, ParleyError, SnapshotProvider,
};
use serde::Serialize;
use tracing::{Instrument, debug, info, info_span, warn};

use crate::error::{CycleStage, Result, SchedulerError};
use crate::history;

/// Where the run stands with respect to its conversation.
///
/// The run starts in [`Phase::AwaitingOpen`] and moves to
/// [`Phase::InConversation`] exactly once, when the applier confirms the
/// conversation start. It never moves back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Phase {
    /// No conversation yet; the next cycle opens one.
    #[default]
    AwaitingOpen,
    /// The conversation every later cycle must see.
    InConversation {
        /// Id returned by the start submission.
        conversation_id: ConversationId,
    },
}

impl Phase {
    /// The held conversation, once established.
    #[must_use]
    pub fn conversation_id(self) -> Option<ConversationId> {
        match self {
            Self::AwaitingOpen => None,
            Self::InConversation { conversation_id } => Some(conversation_id),
        }
    }
}

/// Summary of a completed run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunReport {
    /// The conversation the run held.
    pub conversation_id: ConversationId,
    /// Passes started, including the one cut short by the withdrawal.
    pub passes: usize,
    /// Decision-cycles that passed the thinking check.
    pub cycles: usize,
    /// `Talking` submissions the applier accepted.
    pub messages_sent: usize,
    /// Agent whose withdrawal ended the loop.
    pub withdrawn_by: Option<AgentId>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CycleEnd {
    Continue,
    Withdrew,
}

#[derive(Debug, Default)]
struct RunState {
    phase: Phase,
    cycles: usize,
    messages_sent: usize,
}

/// Drives one conversation to completion over the four collaborators.
pub struct TurnScheduler {
    snapshots: Arc<dyn SnapshotProvider>,
    decider: Arc<dyn ConversationDecider>,
    applier: Arc<dyn ActionApplier>,
    memory: Arc<dyn MemoryStore>,
    config: SchedulerConfig,
}

impl std::fmt::Debug for TurnScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TurnScheduler")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl TurnScheduler {
    /// Create a scheduler with the default [`SchedulerConfig`].
    #[must_use]
    pub fn new(
        snapshots: Arc<dyn SnapshotProvider>,
        decider: Arc<dyn ConversationDecider>,
        applier: Arc<dyn ActionApplier>,
        memory: Arc<dyn MemoryStore>,
    ) -> Self {
        Self {
            snapshots,
            decider,
            applier,
            memory,
            config: SchedulerConfig::default(),
        }
    }

    /// Replace the scheduler settings.
    #[must_use]
    pub fn with_config(mut self, config: SchedulerConfig) -> Self {
        self.config = config;
        self
    }

    /// Run the conversation among `agents`, in this order, to completion.
    ///
    /// On success every agent has been recorded in the memory store as a
    /// participant of the returned conversation.
    ///
    /// # Errors
    /// Any [`SchedulerError`]; the run stops at the first one.
    pub async fn run(&self, agents: &[AgentId]) -> Result<RunReport> {
        if agents.is_empty() {
            return Err(SchedulerError::NoConversation);
        }

        let mut state = RunState::default();
        let mut passes = 0;
        let mut withdrawn_by = None;

        'passes: loop {
            passes += 1;
            debug!(pass = passes, "Pass started");
            for &agent in agents {
                if self.cycle(agent, &mut state).await? == CycleEnd::Withdrew {
                    withdrawn_by = Some(agent);
                    break 'passes;
                }
            }
        }

        let conversation_id = state
            .phase
            .conversation_id()
            .ok_or(SchedulerError::NoConversation)?;

        let now = Utc::now();
        for &agent in agents {
            self.memory
                .record_conversation(agent, conversation_id, now)
                .await
                .map_err(collaborator(agent, CycleStage::Memory))?;
        }

        info!(
            conversation = %conversation_id,
            passes,
            cycles = state.cycles,
            messages = state.messages_sent,
            "Conversation finished"
        );

        Ok(RunReport {
            conversation_id,
            passes,
            cycles: state.cycles,
            messages_sent: state.messages_sent,
            withdrawn_by,
        })
    }

    async fn cycle(&self, agent: AgentId, state: &mut RunState) -> Result<CycleEnd> {
        let snapshot = self
            .snapshots
            .capture(agent)
            .await
            .map_err(collaborator(agent, CycleStage::Snapshot))?;

        if let Some(busy) = snapshot.thinking_neighbour() {
            return Err(SchedulerError::UnexpectedThinking {
                observer: agent,
                thinking: busy.agent.id,
            });
        }
        state.cycles += 1;
        debug!(agent = %agent, think = %snapshot.think_id, nearby = snapshot.nearby.len(), "Cycle started");

        match state.phase {
            Phase::AwaitingOpen => self.open(&snapshot, state).await?,
            Phase::InConversation { conversation_id } => {
                if self.converse(&snapshot, conversation_id, state).await? == CycleEnd::Withdrew {
                    return Ok(CycleEnd::Withdrew);
                }
            }
        }

        self.submit(agent, Action::Done {
            think_id: snapshot.think_id,
        })
        .await?;
        Ok(CycleEnd::Continue)
    }

    /// Opening cycle: start the conversation with everyone new and greet them.
    async fn open(&self, snapshot: &AgentSnapshot, state: &mut RunState) -> Result<()> {
        let agent = snapshot.agent.id;
        if !snapshot.conversations.is_empty() {
            return Err(SchedulerError::ConversationAlreadyVisible {
                agent,
                count: snapshot.conversations.len(),
            });
        }

        let friends = snapshot.new_friends();
        let audience: Vec<AgentId> = friends.iter().map(|n| n.agent.id).collect();
        let names: Vec<String> = friends.iter().map(|n| n.agent.name.clone()).collect();

        let record = self
            .submit(agent, Action::StartConversation {
                audience: audience.clone(),
            })
            .await?;
        let conversation_id =
            record
                .started_conversation()
                .ok_or_else(|| SchedulerError::SubmissionFailed {
                    agent,
                    action: ActionKind::StartConversation,
                    reason: format!("applier answered with {:?}", record.outcome),
                })?;
        state.phase = Phase::InConversation { conversation_id };
        info!(agent = %agent, conversation = %conversation_id, audience = ?names, "Conversation opened");

        let content = self
            .decider
            .begin_conversation(&names, &snapshot.agent)
            .await
            .map_err(collaborator(agent, CycleStage::Opening))?;

        self.submit(agent, Action::Talking {
            audience,
            content,
            conversation_id,
        })
        .await?;
        state.messages_sent += 1;
        Ok(())
    }

    /// Steady-state cycle: check the held conversation, then leave or reply.
    async fn converse(
        &self,
        snapshot: &AgentSnapshot,
        held: ConversationId,
        state: &mut RunState,
    ) -> Result<CycleEnd> {
        let agent = snapshot.agent.id;
        let [visible] = snapshot.conversations.as_slice() else {
            return Err(SchedulerError::ConversationCount {
                agent,
                count: snapshot.conversations.len(),
            });
        };
        if visible.id != held {
            return Err(SchedulerError::ConversationDrift {
                agent,
                expected: held,
                found: visible.id,
            });
        }

        let history = history::render(&visible.messages);

        let leave = self
            .decider
            .should_withdraw(&history, &snapshot.agent)
            .await
            .map_err(collaborator(agent, CycleStage::Withdrawal))?;
        if leave {
            info!(agent = %agent, conversation = %held, messages = history.len(), "Agent withdrew");
            self.submit(agent, Action::Done {
                think_id: snapshot.think_id,
            })
            .await?;
            return Ok(CycleEnd::Withdrew);
        }

        let content = self
            .decider
            .continue_conversation(&history, &snapshot.agent, &snapshot.nearby)
            .await
            .map_err(collaborator(agent, CycleStage::Reply))?;

        let reply = Action::Talking {
            audience: snapshot.nearby.iter().map(|n| n.agent.id).collect(),
            content,
            conversation_id: held,
        };
        match self.submit(agent, reply).await {
            Ok(_) => state.messages_sent += 1,
            Err(e) if self.config.reply_submission == SubmissionPolicy::BestEffort => {
                warn!(agent = %agent, conversation = %held, error = %e, "Reply rejected, continuing");
            }
            Err(e) => return Err(e),
        }
        Ok(CycleEnd::Continue)
    }

    async fn submit(&self, agent: AgentId, action: Action) -> Result<ActionRecord> {
        let kind = action.kind();
        self.applier
            .submit(agent, action)
            .await
            .map_err(|e| SchedulerError::SubmissionFailed {
                agent,
                action: kind,
                reason: e.to_string(),
            })
    }
}

fn collaborator(agent: AgentId, stage: CycleStage) -> impl FnOnce(ParleyError) -> SchedulerError {
    move |source| SchedulerError::Collaborator {
        agent,
        stage,
        source,
    }
}

/// Run one conversation inside a `conversation` tracing span.
///
/// # Errors
/// Whatever [`TurnScheduler::run`] returns.
pub async fn run_conversation(scheduler: &TurnScheduler, agents: &[AgentId]) -> Result<RunReport> {
    let span = info_span!("conversation", agents = agents.len());
    async {
        info!("Conversation run starting");
        let result = scheduler.run(agents).await;
        if let Err(e) = &result {
            warn!(error = %e, "Conversation run aborted");
        }
        result
    }
    .instrument(span)
    .await
}
