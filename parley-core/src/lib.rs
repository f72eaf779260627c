//! # parley-core
//!
//! Shared vocabulary for the parley conversation orchestrator.
//!
//! The turn scheduler in `parley-sim` talks to four collaborators, all
//! declared here as traits in [`collab`]:
//!
//! - [`SnapshotProvider`] — "What do I see?" (nearby agents, visible conversations)
//! - [`ConversationDecider`] — "What do I say, and do I leave?"
//! - [`ActionApplier`] — "Make it so." (start, talk, done)
//! - [`MemoryStore`] — "Remember that this happened."
//!
//! Reference implementations live alongside the traits:
//! [`world::InMemoryWorld`] for perception and actions,
//! [`memory::VolatileMemoryStore`] and [`persistence::ConversationLog`] for memory.

#![deny(clippy::unwrap_used)]
#![deny(missing_docs)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod action;
pub mod chat;
pub mod collab;
pub mod config;
pub mod error;
pub mod memory;
pub mod persistence;
pub mod snapshot;
pub mod types;
pub mod world;

pub use action::{Action, ActionKind, ActionOutcome, ActionRecord};
pub use chat::{ChatMessage, ChatRole};
pub use collab::{ActionApplier, ConversationDecider, MemoryStore, SnapshotProvider};
pub use config::ParleyConfig;
pub use error::ParleyError;
pub use snapshot::{AgentSnapshot, Message, NearbyAgent, VisibleConversation};
pub use types::*;
