//! # parley-sim — Turn Scheduler for parley
//!
//! Drives a multi-agent conversation to completion, one decision-cycle at a
//! time, against the collaborator traits declared in `parley-core`.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │                TurnScheduler                 │
//! │   pass: A ──► B ──► C ──► A ──► … (withdraw) │
//! │                                              │
//! │  capture ─► check ─► decide ─► submit ─► done│
//! └────┬──────────┬──────────┬──────────┬────────┘
//!      ▼          ▼          ▼          ▼
//!  Snapshot   Conversation  Action    Memory
//!  Provider     Decider     Applier    Store
//! ```
//!
//! ## Modules
//!
//! - `scheduler` — the round-robin loop, its phase machine and invariant checks
//! - `error` — the closed set of ways a run can fail
//! - `history` — transcript → chat history rendering

#![deny(clippy::unwrap_used)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod error;
pub mod history;
pub mod scheduler;

pub use error::{CycleStage, SchedulerError};
pub use scheduler::{Phase, RunReport, TurnScheduler, run_conversation};
