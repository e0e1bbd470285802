//! Test helpers for building battles and watching them run.
//!
//! This module provides scripted robots, a recording listener and rule
//! presets that keep whole-battle tests short and readable.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use glam::DVec2;

use crate::battle::{BattleListener, RobotSpec, RoundReport};
use crate::entity::{Capabilities, RobotFlags, RobotId, RobotState};
use crate::error::AgentResult;
use crate::event::Event;
use crate::peer::{Agent, Robot};
use crate::rules::BattleRules;
use crate::snapshot::TurnSnapshot;
use crate::statistics::BattleResults;

// =============================================================================
// Rules
// =============================================================================

/// One round, capped at `max_turns`, with a generous turn budget.
pub fn quick_rules(max_turns: u64) -> BattleRules {
    BattleRules {
        num_rounds: 1,
        max_turns: Some(max_turns),
        turn_timeout_ms: 1000,
        ..BattleRules::default()
    }
}

// =============================================================================
// Recording listener
// =============================================================================

/// Everything a [`Recorder`] saw.
#[derive(Debug, Default)]
pub struct Recording {
    /// Rounds started, in order
    pub rounds_started: Vec<u32>,
    /// One snapshot per resolved turn
    pub snapshots: Vec<TurnSnapshot>,
    /// One report per finished round
    pub reports: Vec<RoundReport>,
    /// Final results
    pub completed: Option<BattleResults>,
}

/// Listener that keeps everything it is told.
///
/// Clones share the same recording, so a test keeps one clone and hands the
/// other to the battle.
#[derive(Debug, Clone, Default)]
pub struct Recorder(Arc<Mutex<Recording>>);

impl Recorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn recording(&self) -> MutexGuard<'_, Recording> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl BattleListener for Recorder {
    fn on_round_started(&mut self, round: u32) {
        self.recording().rounds_started.push(round);
    }

    fn on_turn_ended(&mut self, snapshot: &TurnSnapshot) {
        self.recording().snapshots.push(snapshot.clone());
    }

    fn on_round_ended(&mut self, report: &RoundReport) {
        self.recording().reports.push(report.clone());
    }

    fn on_battle_completed(&mut self, results: &BattleResults) {
        self.recording().completed = Some(results.clone());
    }
}

// =============================================================================
// Scripted robots
// =============================================================================

/// A robot main loop supplied by a test.
pub type Script = Arc<dyn Fn(&Agent<'_>) -> AgentResult<()> + Send + Sync>;

/// Events a [`Probe`] handled, with the turn it handled them on.
pub type EventLog = Arc<Mutex<Vec<(u64, Event)>>>;

/// Robot that runs a script and logs every event it is handed.
pub struct Probe {
    script: Script,
    log: EventLog,
}

impl Robot for Probe {
    fn run(&self, agent: &Agent<'_>) -> AgentResult<()> {
        (self.script)(agent)
    }

    fn on_event(&self, agent: &Agent<'_>, event: &Event) -> AgentResult<()> {
        let time = agent.time();
        self.log
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((time, event.clone()));
        Ok(())
    }
}

/// Roster entry for an advanced robot running `script`, plus its event log.
pub fn probe<F>(name: &str, script: F) -> (RobotSpec, EventLog)
where
    F: Fn(&Agent<'_>) -> AgentResult<()> + Send + Sync + 'static,
{
    let log: EventLog = Arc::default();
    let script: Script = Arc::new(script);
    let shared = Arc::clone(&log);
    let spec = RobotSpec::new(name, move || Probe {
        script: Arc::clone(&script),
        log: Arc::clone(&shared),
    })
    .with_capabilities(Capabilities::advanced());
    (spec, log)
}

/// Copy of everything logged so far.
pub fn logged(log: &EventLog) -> Vec<(u64, Event)> {
    log.lock().unwrap_or_else(PoisonError::into_inner).clone()
}

/// Script body that ends turns until the round is over.
pub fn idle(agent: &Agent<'_>) -> AgentResult<()> {
    loop {
        agent.do_nothing()?;
    }
}

/// Script body that disables the robot before its first turn.
pub fn self_destruct(agent: &Agent<'_>) -> AgentResult<()> {
    agent.set_move(f64::NAN)
}

// =============================================================================
// World setup
// =============================================================================

/// An advanced robot with a cold gun, ready to fire.
pub fn armed_robot(id: u32, position: DVec2, heading: f64) -> RobotState {
    let mut robot = RobotState::new(
        RobotId::new(id),
        format!("robot-{id}"),
        None,
        Capabilities::advanced(),
        RobotFlags::empty(),
        position,
        heading,
    );
    robot.gun_heat = 0.0;
    robot
}
