//! Ways a run can fail.
//!
//! Every variant is fatal: the scheduler returns it from [`run`] without
//! retrying, leaving whatever thinking marker was open as evidence.
//!
//! [`run`]: crate::TurnScheduler::run

use std::fmt;

use parley_core::{ActionKind, AgentId, ConversationId, ParleyError};
use thiserror::Error;

/// Which collaborator call failed inside a decision-cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleStage {
    /// Snapshot capture.
    Snapshot,
    /// Opening line for a new conversation.
    Opening,
    /// Leave-or-stay decision.
    Withdrawal,
    /// Steady-state reply.
    Reply,
    /// Recording conversation memories after the loop.
    Memory,
}

impl fmt::Display for CycleStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Snapshot => "snapshot capture",
            Self::Opening => "opening line",
            Self::Withdrawal => "withdrawal decision",
            Self::Reply => "reply",
            Self::Memory => "memory recording",
        };
        f.write_str(name)
    }
}

/// Fatal scheduler errors.
#[derive(Error, Debug)]
pub enum SchedulerError {
    /// A nearby agent still had a decision-cycle open when this one began.
    #[error("Agent {observer} started a cycle while {thinking} was still thinking")]
    UnexpectedThinking {
        /// Agent whose cycle was starting.
        observer: AgentId,
        /// Neighbour flagged as thinking.
        thinking: AgentId,
    },

    /// The opening cycle found conversations already in progress.
    #[error("Agent {agent} sees {count} conversation(s) before any was started")]
    ConversationAlreadyVisible {
        /// Agent running the opening cycle.
        agent: AgentId,
        /// Visible conversations found.
        count: usize,
    },

    /// A steady-state cycle did not see exactly one conversation.
    #[error("Agent {agent} sees {count} conversations, expected exactly one")]
    ConversationCount {
        /// Agent whose snapshot was inconsistent.
        agent: AgentId,
        /// Visible conversations found.
        count: usize,
    },

    /// The visible conversation is not the one the run started.
    #[error("Agent {agent} sees conversation {found}, expected {expected}")]
    ConversationDrift {
        /// Agent whose snapshot drifted.
        agent: AgentId,
        /// Conversation established on the opening cycle.
        expected: ConversationId,
        /// Conversation actually visible.
        found: ConversationId,
    },

    /// The action applier refused a submission.
    #[error("{action} submitted by {agent} failed: {reason}")]
    SubmissionFailed {
        /// Submitting agent.
        agent: AgentId,
        /// Kind of the refused action.
        action: ActionKind,
        /// Applier's explanation.
        reason: String,
    },

    /// The loop finished without a conversation ever being established.
    #[error("No conversation was established")]
    NoConversation,

    /// A snapshot, decision or memory call returned an error.
    #[error("{stage} failed for agent {agent}: {source}")]
    Collaborator {
        /// Agent the call was made for.
        agent: AgentId,
        /// Which call failed.
        stage: CycleStage,
        /// Underlying collaborator error.
        #[source]
        source: ParleyError,
    },
}

impl SchedulerError {
    /// The action kind of a failed submission.
    #[must_use]
    pub fn failed_action(&self) -> Option<ActionKind> {
        match self {
            Self::SubmissionFailed { action, .. } => Some(*action),
            _ => None,
        }
    }
}

/// Convenience Result type alias.
pub type Result<T> = std::result::Result<T, SchedulerError>;
