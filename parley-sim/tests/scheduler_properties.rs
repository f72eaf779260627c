//! Integration Tests — Turn Scheduler Properties
//!
//! Each test runs the scheduler against the in-memory world, wrapped in a
//! fault-injecting shim that can corrupt snapshots or refuse submissions, and
//! a scripted decider that withdraws on cue. The shim records every capture
//! and every submission attempt, so tests can assert on what the scheduler
//! did *not* do after a failure.

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use proptest::prelude::*;

use parley_core::config::{SchedulerConfig, SubmissionPolicy};
use parley_core::error::Result as CoreResult;
use parley_core::memory::VolatileMemoryStore;
use parley_core::world::InMemoryWorld;
use parley_core::{
    Action, ActionApplier, ActionKind, ActionOutcome, ActionRecord, AgentId, AgentRecord,
    AgentSnapshot, ChatMessage, ConversationDecider, ConversationId, NearbyAgent, ParleyError,
    SnapshotProvider, VisibleConversation,
};
use parley_sim::{CycleStage, SchedulerError, TurnScheduler};

// ---------------------------------------------------------------------------
// Fault-injecting world
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
struct Faults {
    /// Flag the first neighbour as thinking on this (1-based) capture.
    thinking_on_capture: Option<usize>,
    /// Add a second visible conversation on this capture.
    extra_conversation_on_capture: Option<usize>,
    /// Swap the visible conversation's id on this capture.
    drift_on_capture: Option<usize>,
    /// Refuse every `Talking` from this agent.
    mute_replies_from: Option<AgentId>,
    /// Report the start as something other than a conversation start.
    hide_start_outcome: bool,
}

struct FaultyWorld {
    world: Arc<InMemoryWorld>,
    faults: Faults,
    captures: Mutex<Vec<AgentSnapshot>>,
    submissions: Mutex<Vec<(AgentId, Action)>>,
}

impl FaultyWorld {
    fn new(world: Arc<InMemoryWorld>, faults: Faults) -> Self {
        Self {
            world,
            faults,
            captures: Mutex::new(Vec::new()),
            submissions: Mutex::new(Vec::new()),
        }
    }

    fn captured_agents(&self) -> Vec<AgentId> {
        self.captures.lock().iter().map(|s| s.agent.id).collect()
    }

    fn submitted(&self) -> Vec<(AgentId, Action)> {
        self.submissions.lock().clone()
    }
}

#[async_trait]
impl SnapshotProvider for FaultyWorld {
    async fn capture(&self, agent: AgentId) -> CoreResult<AgentSnapshot> {
        let mut snapshot = self.world.capture_snapshot(agent)?;
        let mut captures = self.captures.lock();
        let n = captures.len() + 1;

        if self.faults.thinking_on_capture == Some(n) {
            if let Some(first) = snapshot.nearby.first_mut() {
                first.thinking = true;
            }
        }
        if self.faults.extra_conversation_on_capture == Some(n) {
            snapshot.conversations.push(VisibleConversation {
                id: ConversationId::new(),
                messages: Vec::new(),
            });
        }
        if self.faults.drift_on_capture == Some(n) {
            for conversation in &mut snapshot.conversations {
                conversation.id = ConversationId::new();
            }
        }

        captures.push(snapshot.clone());
        Ok(snapshot)
    }
}

#[async_trait]
impl ActionApplier for FaultyWorld {
    async fn submit(&self, agent: AgentId, action: Action) -> CoreResult<ActionRecord> {
        self.submissions.lock().push((agent, action.clone()));

        if self.faults.mute_replies_from == Some(agent) && action.kind() == ActionKind::Talking {
            return Err(ParleyError::rejected(ActionKind::Talking, agent, "muted"));
        }

        let mut record = self.world.apply(agent, action)?;
        if self.faults.hide_start_outcome {
            if let ActionOutcome::ConversationStarted(id) = record.outcome {
                record.outcome = ActionOutcome::MessageSent { conversation_id: id };
            }
        }
        Ok(record)
    }
}

// ---------------------------------------------------------------------------
// Scripted decider
// ---------------------------------------------------------------------------

#[derive(Default)]
struct Scripted {
    /// `(agent, n)`: withdraw on that agent's n-th withdrawal question.
    withdraw_on: Option<(AgentId, usize)>,
    fail_opening: bool,
    calls: Mutex<Vec<(AgentId, &'static str)>>,
}

impl Scripted {
    fn withdrawing(agent: AgentId, on_call: usize) -> Self {
        Self {
            withdraw_on: Some((agent, on_call)),
            ..Self::default()
        }
    }

    fn calls(&self) -> Vec<(AgentId, &'static str)> {
        self.calls.lock().clone()
    }
}

#[async_trait]
impl ConversationDecider for Scripted {
    async fn begin_conversation(
        &self,
        participants: &[String],
        agent: &AgentRecord,
    ) -> CoreResult<String> {
        self.calls.lock().push((agent.id, "begin"));
        if self.fail_opening {
            return Err(ParleyError::Decision("no words".into()));
        }
        Ok(format!("Hello {}", participants.join(", ")))
    }

    async fn continue_conversation(
        &self,
        history: &[ChatMessage],
        agent: &AgentRecord,
        _nearby: &[NearbyAgent],
    ) -> CoreResult<String> {
        self.calls.lock().push((agent.id, "continue"));
        Ok(format!("{} reply #{}", agent.name, history.len()))
    }

    async fn should_withdraw(
        &self,
        _history: &[ChatMessage],
        agent: &AgentRecord,
    ) -> CoreResult<bool> {
        let mut calls = self.calls.lock();
        calls.push((agent.id, "withdraw"));
        let asked = calls
            .iter()
            .filter(|(a, what)| *a == agent.id && *what == "withdraw")
            .count();
        Ok(self.withdraw_on == Some((agent.id, asked)))
    }
}

// ---------------------------------------------------------------------------
// Harness
// ---------------------------------------------------------------------------

struct Harness {
    world: Arc<InMemoryWorld>,
    shim: Arc<FaultyWorld>,
    decider: Arc<Scripted>,
    memory: Arc<VolatileMemoryStore>,
    agents: Vec<AgentId>,
}

impl Harness {
    fn world(names: &[&str]) -> (Arc<InMemoryWorld>, Vec<AgentId>) {
        let world = Arc::new(InMemoryWorld::new());
        let agents = names
            .iter()
            .map(|n| world.register_agent(*n, format!("{n} from the village"), "meet people"))
            .collect();
        (world, agents)
    }

    fn build(
        world: Arc<InMemoryWorld>,
        agents: Vec<AgentId>,
        faults: Faults,
        decider: Scripted,
    ) -> Self {
        Self {
            shim: Arc::new(FaultyWorld::new(world.clone(), faults)),
            world,
            decider: Arc::new(decider),
            memory: Arc::new(VolatileMemoryStore::new()),
            agents,
        }
    }

    fn scheduler(&self, policy: SubmissionPolicy) -> TurnScheduler {
        TurnScheduler::new(
            self.shim.clone(),
            self.decider.clone(),
            self.shim.clone(),
            self.memory.clone(),
        )
        .with_config(SchedulerConfig {
            reply_submission: policy,
        })
    }

    async fn run(&self) -> Result<parley_sim::RunReport, SchedulerError> {
        self.scheduler(SubmissionPolicy::Fatal).run(&self.agents).await
    }
}

// ---------------------------------------------------------------------------
// Invariant 1: nobody nearby is mid-decision
// ---------------------------------------------------------------------------

#[tokio::test]
async fn thinking_neighbour_aborts_before_any_decision() {
    let (world, agents) = Harness::world(&["A", "B"]);
    // B has a cycle open outside the scheduler.
    world.capture_snapshot(agents[1]).expect("open B's cycle");
    let h = Harness::build(world, agents.clone(), Faults::default(), Scripted::default());

    let err = h.run().await.expect_err("must abort");
    assert!(matches!(
        err,
        SchedulerError::UnexpectedThinking { observer, thinking }
            if observer == agents[0] && thinking == agents[1]
    ));
    assert!(h.decider.calls().is_empty(), "no decision call may happen");
    assert!(h.shim.submitted().is_empty());
    // The marker recorded by the aborted capture stays behind as evidence.
    assert!(h.world.thinking(agents[0]).is_some());
}

#[tokio::test]
async fn thinking_flag_mid_run_aborts_that_cycle() {
    let (world, agents) = Harness::world(&["A", "B"]);
    let faults = Faults {
        thinking_on_capture: Some(3),
        ..Faults::default()
    };
    let h = Harness::build(world, agents.clone(), faults, Scripted::default());

    let err = h.run().await.expect_err("must abort");
    assert!(matches!(
        err,
        SchedulerError::UnexpectedThinking { observer, .. } if observer == agents[0]
    ));
    let decisions_by_a = h.decider.calls().iter().filter(|(a, _)| *a == agents[0]).count();
    assert_eq!(decisions_by_a, 1, "only the opening line, nothing in the aborted cycle");
}

// ---------------------------------------------------------------------------
// Invariant 2: first cycle sees no conversation
// ---------------------------------------------------------------------------

#[tokio::test]
async fn preexisting_conversation_aborts_opening_without_submissions() {
    let (world, agents) = Harness::world(&["A", "B", "C"]);
    world
        .apply(agents[2], Action::StartConversation {
            audience: vec![agents[0]],
        })
        .expect("side conversation");
    let h = Harness::build(world, agents[..2].to_vec(), Faults::default(), Scripted::default());

    let err = h.run().await.expect_err("must abort");
    assert!(matches!(
        err,
        SchedulerError::ConversationAlreadyVisible { agent, count: 1 } if agent == agents[0]
    ));
    assert!(h.shim.submitted().is_empty());
    assert!(h.decider.calls().is_empty());
    assert!(h.memory.memories().is_empty());
}

// ---------------------------------------------------------------------------
// Invariant 3: exactly the held conversation afterwards
// ---------------------------------------------------------------------------

#[tokio::test]
async fn second_visible_conversation_aborts_with_no_further_actions() {
    let (world, agents) = Harness::world(&["A", "B"]);
    let faults = Faults {
        extra_conversation_on_capture: Some(2),
        ..Faults::default()
    };
    let h = Harness::build(world, agents.clone(), faults, Scripted::default());

    let err = h.run().await.expect_err("must abort");
    assert!(matches!(
        err,
        SchedulerError::ConversationCount { agent, count: 2 } if agent == agents[1]
    ));
    assert!(
        h.shim.submitted().iter().all(|(a, _)| *a != agents[1]),
        "B must not act after the check fails"
    );
    assert!(h.decider.calls().iter().all(|(a, _)| *a != agents[1]));
}

#[tokio::test]
async fn drifted_conversation_id_is_fatal() {
    let (world, agents) = Harness::world(&["A", "B"]);
    let faults = Faults {
        drift_on_capture: Some(3),
        ..Faults::default()
    };
    let h = Harness::build(world, agents.clone(), faults, Scripted::default());

    let err = h.run().await.expect_err("must abort");
    let SchedulerError::ConversationDrift { agent, expected, found } = err else {
        panic!("expected a drift error");
    };
    assert_eq!(agent, agents[0]);
    assert_ne!(expected, found);
    let submitted = h.shim.submitted();
    assert!(matches!(submitted[0].1, Action::StartConversation { .. }));
    let opened = h.world.actions()[0].started_conversation().expect("start record");
    assert_eq!(expected, opened, "the held id is the one the applier created");
}

// ---------------------------------------------------------------------------
// Invariant 4: rejected submissions
// ---------------------------------------------------------------------------

#[tokio::test]
async fn start_without_conversation_record_is_fatal() {
    let (world, agents) = Harness::world(&["A", "B"]);
    let faults = Faults {
        hide_start_outcome: true,
        ..Faults::default()
    };
    let h = Harness::build(world, agents, faults, Scripted::default());

    let err = h.run().await.expect_err("must abort");
    assert_eq!(err.failed_action(), Some(ActionKind::StartConversation));
    assert!(h.decider.calls().is_empty(), "no opening line without a conversation");
}

#[tokio::test]
async fn rejected_reply_is_fatal_by_default() {
    let (world, agents) = Harness::world(&["A", "B"]);
    let faults = Faults {
        mute_replies_from: Some(agents[1]),
        ..Faults::default()
    };
    let h = Harness::build(world, agents.clone(), faults, Scripted::withdrawing(agents[0], 1));

    let err = h.run().await.expect_err("must abort");
    assert!(matches!(
        err,
        SchedulerError::SubmissionFailed { agent, action: ActionKind::Talking, .. }
            if agent == agents[1]
    ));
    assert!(h.memory.memories().is_empty());
}

#[tokio::test]
async fn rejected_reply_is_skipped_when_best_effort() {
    let (world, agents) = Harness::world(&["A", "B"]);
    let faults = Faults {
        mute_replies_from: Some(agents[1]),
        ..Faults::default()
    };
    let h = Harness::build(world, agents.clone(), faults, Scripted::withdrawing(agents[0], 1));

    let report = h
        .scheduler(SubmissionPolicy::BestEffort)
        .run(&agents)
        .await
        .expect("best effort completes");
    assert_eq!(report.messages_sent, 1, "only A's opening line landed");
    assert_eq!(report.withdrawn_by, Some(agents[0]));
    // B's cycle still closed after the rejected reply.
    assert!(h.world.thinking(agents[1]).is_none());
    assert_eq!(h.memory.memories().len(), 2);
}

#[tokio::test]
async fn failing_opening_line_is_a_collaborator_error() {
    let (world, agents) = Harness::world(&["A", "B"]);
    let decider = Scripted {
        fail_opening: true,
        ..Scripted::default()
    };
    let h = Harness::build(world, agents.clone(), Faults::default(), decider);

    let err = h.run().await.expect_err("must abort");
    assert!(matches!(
        err,
        SchedulerError::Collaborator { agent, stage: CycleStage::Opening, .. } if agent == agents[0]
    ));
}

// ---------------------------------------------------------------------------
// Scenarios
// ---------------------------------------------------------------------------

#[tokio::test]
async fn two_agent_opening_sequence() {
    let (world, agents) = Harness::world(&["A", "B"]);
    let (a, b) = (agents[0], agents[1]);
    let h = Harness::build(world, agents.clone(), Faults::default(), Scripted::withdrawing(b, 1));

    let report = h.run().await.expect("run");
    let x = report.conversation_id;
    let submitted = h.shim.submitted();

    assert_eq!(submitted[0], (a, Action::StartConversation { audience: vec![b] }));
    let (agent, Action::Talking { audience, conversation_id, .. }) = &submitted[1] else {
        panic!("second submission must be A talking");
    };
    assert_eq!(*agent, a);
    assert_eq!(audience, &vec![b]);
    assert_eq!(*conversation_id, x);
    assert!(matches!(submitted[2], (who, Action::Done { .. }) if who == a));

    let captures = h.shim.captures.lock();
    let seen_by_b = &captures[1];
    assert_eq!(seen_by_b.agent.id, b);
    assert_eq!(seen_by_b.conversations.len(), 1);
    assert_eq!(seen_by_b.conversations[0].id, x);
    assert_eq!(seen_by_b.conversations[0].messages[0].text, "Hello B");
}

#[tokio::test]
async fn withdrawal_truncates_the_pass() {
    let (world, agents) = Harness::world(&["A", "B", "C"]);
    let (a, b, c) = (agents[0], agents[1], agents[2]);
    let h = Harness::build(world, agents.clone(), Faults::default(), Scripted::withdrawing(b, 2));

    let report = h.run().await.expect("run");
    assert_eq!(h.shim.captured_agents(), vec![a, b, c, a, b]);
    assert_eq!(report.passes, 2);
    assert_eq!(report.withdrawn_by, Some(b));

    let submitted = h.shim.submitted();
    let last = submitted.last().expect("submissions");
    assert!(matches!(last, (who, Action::Done { .. }) if *who == b));
    let b_replies = h
        .decider
        .calls()
        .iter()
        .filter(|(who, what)| *who == b && *what == "continue")
        .count();
    assert_eq!(b_replies, 1, "B replies in pass one and leaves in pass two");
}

#[tokio::test]
async fn every_participant_remembers_the_conversation_once() {
    let (world, agents) = Harness::world(&["A", "B", "C"]);
    let decider = Scripted::withdrawing(agents[2], 1);
    let h = Harness::build(world, agents.clone(), Faults::default(), decider);

    let report = h.run().await.expect("run");
    for agent in &agents {
        let held = h.memory.memories_for(*agent);
        assert_eq!(held.len(), 1);
        assert_eq!(held[0].conversation, report.conversation_id);
    }
}

// ---------------------------------------------------------------------------
// Property: any withdrawal point ends the run cleanly
// ---------------------------------------------------------------------------

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn any_withdrawal_point_truncates_and_remembers(
        n in 1usize..=5,
        who in 0usize..5,
        on_call in 1usize..=3,
    ) {
        let who = who % n;
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .expect("runtime");

        let names: Vec<String> = (0..n).map(|i| format!("Agent{i}")).collect();
        let name_refs: Vec<&str> = names.iter().map(String::as_str).collect();
        let (world, agents) = Harness::world(&name_refs);
        let decider = Scripted::withdrawing(agents[who], on_call);
        let h = Harness::build(world, agents.clone(), Faults::default(), decider);

        let report = rt.block_on(h.run()).expect("run");

        // The opener is first asked in pass two; everyone else in pass one.
        let pass = if who == 0 { on_call + 1 } else { on_call };
        prop_assert_eq!(report.passes, pass);
        prop_assert_eq!(h.shim.captured_agents().len(), (pass - 1) * n + who + 1);
        prop_assert_eq!(report.withdrawn_by, Some(agents[who]));

        let memories = h.memory.memories();
        prop_assert_eq!(memories.len(), n);
        for agent in &agents {
            prop_assert_eq!(h.memory.memories_for(*agent).len(), 1);
        }
        prop_assert!(memories.iter().all(|m| m.conversation == report.conversation_id));
        for agent in &agents {
            prop_assert!(h.world.thinking(*agent).is_none());
        }
    }
}
