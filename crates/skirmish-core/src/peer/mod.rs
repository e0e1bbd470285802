//! Robot peers: the bridge between the engine and agent threads.
//!
//! A [`RobotPeer`] is shared between the battle loop and one agent thread.
//! It carries the robot's published state, its event queue, its output
//! stream, and the [`TurnSynchronizer`] that serializes the two sides.
//!
//! The engine keeps the authoritative [`RobotState`] in its own world. While
//! every agent is asleep it collects each robot's intent from the peer,
//! runs the turn, and publishes the new state back. An agent therefore only
//! ever sees state that was complete at the end of a turn.
//!
//! Robot code talks to its peer through an [`Agent`], which exists only on
//! the agent thread.

mod agent;
mod output;

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};

use tracing::{debug, warn};

use crate::entity::{Capabilities, RobotFlags, RobotId, RobotState, TeamId};
use crate::error::{AgentError, BattleError};
use crate::event::{Condition, Event, EventKind, EventManager, MAX_QUEUE_SIZE};
use crate::rules::BattleRules;
use crate::sync::TurnSynchronizer;

pub use agent::{Agent, Robot};
pub use output::{RobotOutput, MAX_OUTPUT_LINES};

/// Builds a fresh robot program for each round.
pub type RobotFactory = Arc<dyn Fn() -> Box<dyn Robot> + Send + Sync>;

// =============================================================================
// BattleContext
// =============================================================================

/// Name and team of a roster entry, visible to every agent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RosterEntry {
    /// Robot name
    pub name: String,
    /// Team membership
    pub team: Option<TeamId>,
}

/// Battle-wide values agents may read at any time.
#[derive(Debug)]
pub struct BattleContext {
    rules: BattleRules,
    roster: Vec<RosterEntry>,
    round: AtomicU32,
    time: AtomicU64,
    alive: AtomicU32,
}

impl BattleContext {
    /// Creates a context for a battle.
    #[must_use]
    pub fn new(rules: BattleRules, roster: Vec<RosterEntry>) -> Self {
        Self {
            rules,
            roster,
            round: AtomicU32::new(0),
            time: AtomicU64::new(0),
            alive: AtomicU32::new(0),
        }
    }

    /// Battle rules.
    #[must_use]
    pub fn rules(&self) -> &BattleRules {
        &self.rules
    }

    /// All robots in roster order.
    #[must_use]
    pub fn roster(&self) -> &[RosterEntry] {
        &self.roster
    }

    /// Current round, zero based.
    #[must_use]
    pub fn round(&self) -> u32 {
        self.round.load(Ordering::Acquire)
    }

    /// Current turn.
    #[must_use]
    pub fn time(&self) -> u64 {
        self.time.load(Ordering::Acquire)
    }

    /// Robots still alive.
    #[must_use]
    pub fn alive(&self) -> u32 {
        self.alive.load(Ordering::Acquire)
    }

    pub(crate) fn set_round(&self, round: u32) {
        self.round.store(round, Ordering::Release);
    }

    pub(crate) fn set_time(&self, time: u64) {
        self.time.store(time, Ordering::Release);
    }

    pub(crate) fn set_alive(&self, alive: u32) {
        self.alive.store(alive, Ordering::Release);
    }
}

// =============================================================================
// RobotPeer
// =============================================================================

/// Engine-side handle for one robot, shared with its agent thread.
#[derive(Debug)]
pub struct RobotPeer {
    id: RobotId,
    name: String,
    capabilities: Capabilities,
    team: Option<TeamId>,
    context: Arc<BattleContext>,
    state: Mutex<RobotState>,
    events: Mutex<EventManager>,
    output: Mutex<RobotOutput>,
    sync: TurnSynchronizer,
    calls: AtomicU32,
    testing_condition: AtomicBool,
    intent_pending: AtomicBool,
}

fn relock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl RobotPeer {
    /// Creates a peer for a robot's initial state.
    #[must_use]
    pub fn new(state: RobotState, context: Arc<BattleContext>) -> Self {
        Self {
            id: state.id,
            name: state.name.clone(),
            capabilities: state.capabilities,
            team: state.team,
            context,
            state: Mutex::new(state),
            events: Mutex::new(EventManager::new()),
            output: Mutex::new(RobotOutput::new()),
            sync: TurnSynchronizer::new(),
            calls: AtomicU32::new(0),
            testing_condition: AtomicBool::new(false),
            intent_pending: AtomicBool::new(false),
        }
    }

    /// Robot ID.
    #[must_use]
    pub fn id(&self) -> RobotId {
        self.id
    }

    /// Robot name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Declared capabilities.
    #[must_use]
    pub fn capabilities(&self) -> Capabilities {
        self.capabilities
    }

    /// Team membership.
    #[must_use]
    pub fn team(&self) -> Option<TeamId> {
        self.team
    }

    /// Shared battle context.
    #[must_use]
    pub fn context(&self) -> &BattleContext {
        &self.context
    }

    /// Turn synchronizer for this robot's agent thread.
    #[must_use]
    pub fn sync(&self) -> &TurnSynchronizer {
        &self.sync
    }

    /// Copy of the state last published to the agent.
    #[must_use]
    pub fn state(&self) -> RobotState {
        relock(&self.state).clone()
    }

    /// Copy of the robot's output stream.
    #[must_use]
    pub fn output(&self) -> RobotOutput {
        relock(&self.output).clone()
    }

    pub(crate) fn lock_state(&self) -> MutexGuard<'_, RobotState> {
        relock(&self.state)
    }

    pub(crate) fn lock_events(&self) -> MutexGuard<'_, EventManager> {
        relock(&self.events)
    }

    pub(crate) fn lock_output(&self) -> MutexGuard<'_, RobotOutput> {
        relock(&self.output)
    }

    // =========================================================================
    // Engine side
    // =========================================================================

    /// Marks the agent as running. Called once, before its thread is spawned.
    ///
    /// Peers live for a single round; a thread that outlives its round keeps
    /// a peer nobody reads any more.
    pub(crate) fn start(&self) {
        self.sync.start();
    }

    /// Copies what the agent asked for into the engine's copy of the robot.
    pub(crate) fn collect_intent(&self, robot: &mut RobotState) {
        let view = self.lock_state();
        self.intent_pending.store(false, Ordering::Release);
        robot.intent = view.intent.clone();
        robot.saved = view.saved;
        robot.colors = view.colors;
        if view.flags.contains(RobotFlags::DISABLED) && !robot.flags.contains(RobotFlags::DISABLED)
        {
            robot.flags |= RobotFlags::DISABLED;
            robot.set_energy(0.0, false);
        }
    }

    /// Publishes the engine's state of the robot to the agent.
    ///
    /// An agent that overran its turn may have recorded commands since the
    /// last collect. Those stay in its view until the next collect picks
    /// them up.
    pub(crate) fn publish(&self, robot: &RobotState) {
        let mut view = self.lock_state();
        if !self.intent_pending.load(Ordering::Acquire) {
            view.clone_from(robot);
            return;
        }
        let intent = view.intent.clone();
        let saved = view.saved;
        let colors = view.colors;
        let disabled = view.flags & RobotFlags::DISABLED;
        view.clone_from(robot);
        view.intent = intent;
        view.saved = saved;
        view.colors = colors;
        view.flags |= disabled;
    }

    /// Queues an event, noting an overflow in the robot's output.
    pub(crate) fn add_event(&self, event: Event, time: u64) {
        let kind = event.kind();
        let added = self.lock_events().add(event, time);
        if !added {
            self.report_overflow(kind);
        }
    }

    /// Queues the custom event of a condition that held this turn.
    pub(crate) fn add_custom_event(&self, condition: Arc<Condition>, time: u64) {
        let added = self.lock_events().add_custom(condition, time);
        if !added {
            self.report_overflow(EventKind::Custom);
        }
    }

    fn report_overflow(&self, kind: EventKind) {
        self.lock_output().system(format!(
            "Not adding {kind} to {}'s queue, exceeded {MAX_QUEUE_SIZE} events in queue.",
            self.name
        ));
    }

    /// Writes a `SYSTEM:` line to the robot's output.
    pub(crate) fn system_message(&self, message: impl AsRef<str>) {
        self.lock_output().system(message);
    }
}

// =============================================================================
// Agent thread
// =============================================================================

/// Starts a robot's agent thread for the current round.
pub(crate) fn spawn_agent(
    peer: Arc<RobotPeer>,
    factory: RobotFactory,
) -> Result<JoinHandle<()>, BattleError> {
    let name = peer.name().to_owned();
    thread::Builder::new()
        .name(format!("robot-{name}"))
        .spawn(move || agent_main(&peer, &factory))
        .map_err(|source| BattleError::Spawn { name, source })
}

fn agent_main(peer: &RobotPeer, factory: &RobotFactory) {
    let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
        let robot = factory();
        let agent = Agent::new(peer, robot.as_ref());
        agent.run_to_completion()
    }));
    match outcome {
        Ok(reason) => debug!(robot = %peer.name(), %reason, "agent finished"),
        Err(payload) => {
            let message = panic_message(payload.as_ref());
            warn!(robot = %peer.name(), %message, "agent thread panicked outside robot code");
            peer.system_message(format!("{} has crashed: {message}", peer.name()));
        }
    }
    peer.sync.finish();
}

/// Extracts the message from a panic payload.
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_owned()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_owned()
    }
}

/// Converts a panic in robot code into an agent fault.
fn guarded(f: impl FnOnce() -> Result<(), AgentError>) -> Result<(), AgentError> {
    panic::catch_unwind(AssertUnwindSafe(f))
        .unwrap_or_else(|payload| Err(AgentError::Fault(panic_message(payload.as_ref()))))
}
