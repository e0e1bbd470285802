//! The engine side of one round.
//!
//! A round alternates between two phases until it is over:
//!
//! 1. **Engine**: every agent is asleep. Intents are collected, the turn is
//!    resolved, events and state are published.
//! 2. **Agents**: every running agent is woken and the engine waits, up to
//!    the turn budget, for all of them to go back to sleep.

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Instant;

use tracing::{debug, error, info, warn};

use super::{BattleListener, Entrant};
use crate::entity::{RobotFlags, RobotId, RobotState};
use crate::error::BattleError;
use crate::event::{Event, SkippedTurnEvent};
use crate::peer::{panic_message, spawn_agent, BattleContext, RobotOutput, RobotPeer};
use crate::resolver::{Resolver, World};
use crate::rules::BattleRules;
use crate::snapshot::TurnSnapshot;
use crate::statistics::RobotStatistics;

use super::placement::place_robots;

/// Everything a round borrows from its battle.
pub(super) struct Arena<'a> {
    pub rules: &'a BattleRules,
    pub context: &'a Arc<BattleContext>,
    pub entrants: &'a [Entrant],
    pub resolvers: &'a [Box<dyn Resolver>],
}

/// What a finished round hands back to the battle.
pub(super) struct Played {
    pub statistics: Vec<RobotStatistics>,
    pub turns: u64,
    pub outputs: Vec<(String, RobotOutput)>,
}

pub(super) struct Round<'a> {
    number: u32,
    arena: &'a Arena<'a>,
    world: World,
    peers: Vec<Arc<RobotPeer>>,
    agents: Vec<JoinHandle<()>>,
    halted: bool,
}

impl<'a> Round<'a> {
    /// Places the robots and prepares their peers. No agent runs yet.
    pub(super) fn new(
        number: u32,
        arena: &'a Arena<'a>,
        mut statistics: Vec<RobotStatistics>,
    ) -> Result<Self, BattleError> {
        let requests: Vec<_> = arena
            .entrants
            .iter()
            .map(|e| (e.spec.name(), e.spec.start))
            .collect();
        let starts = place_robots(arena.rules, number, &requests)?;

        let robots: Vec<RobotState> = arena
            .entrants
            .iter()
            .zip(starts)
            .enumerate()
            .map(|(index, (entrant, start))| entrant.state(index, start))
            .collect();
        statistics.iter_mut().for_each(RobotStatistics::reset);

        let peers = robots
            .iter()
            .map(|robot| Arc::new(RobotPeer::new(robot.clone(), Arc::clone(arena.context))))
            .collect();

        arena.context.set_round(number);
        arena.context.set_time(0);
        arena
            .context
            .set_alive(u32::try_from(robots.len()).unwrap_or(u32::MAX));

        Ok(Self {
            number,
            arena,
            world: World::new(arena.rules.clone(), robots, statistics),
            peers,
            agents: Vec::new(),
            halted: false,
        })
    }

    /// Plays the round to the end and hands back the statistics.
    pub(super) fn play(
        mut self,
        listeners: &mut [Box<dyn BattleListener>],
    ) -> Result<Played, BattleError> {
        info!(
            round = self.number + 1,
            of = self.arena.rules.num_rounds,
            robots = self.peers.len(),
            "round started"
        );
        for listener in listeners.iter_mut() {
            listener.on_round_started(self.number);
        }

        let outcome = self.start_agents().and_then(|()| self.turn_loop(listeners));
        self.shutdown_agents();
        outcome?;

        let turns = self.world.time();
        let outputs = self
            .peers
            .iter()
            .map(|peer| (peer.name().to_owned(), peer.output()))
            .collect();
        let mut statistics = self.world.into_statistics();
        statistics
            .iter_mut()
            .for_each(RobotStatistics::generate_totals);
        info!(round = self.number + 1, turns, "round ended");

        Ok(Played {
            statistics,
            turns,
            outputs,
        })
    }

    // =========================================================================
    // Agent threads
    // =========================================================================

    fn start_agents(&mut self) -> Result<(), BattleError> {
        for (peer, entrant) in self.peers.iter().zip(self.arena.entrants) {
            peer.start();
            let handle = spawn_agent(Arc::clone(peer), Arc::clone(&entrant.spec.factory));
            match handle {
                Ok(handle) => self.agents.push(handle),
                Err(err) => {
                    peer.sync().finish();
                    return Err(err);
                }
            }
        }

        let budget = self.arena.rules.startup_timeout();
        let deadline = Instant::now() + budget;
        for peer in &self.peers {
            if !peer.sync().wait_for_sleep(deadline) {
                warn!(robot = %peer.name(), ?budget, "robot did not reach its first turn in time");
                peer.system_message(format!(
                    "{} still has not started after {} ms",
                    peer.name(),
                    budget.as_millis()
                ));
            }
        }
        Ok(())
    }

    /// Wakes every running agent and waits for them to finish their turn.
    fn run_agents(&mut self) {
        let deadline = Instant::now() + self.arena.rules.turn_timeout();
        let awake: Vec<usize> = (0..self.peers.len())
            .filter(|&i| {
                let sync = self.peers[i].sync();
                sync.is_running() && !sync.is_halted()
            })
            .collect();

        for &index in &awake {
            self.peers[index].sync().wake_up();
        }
        for index in awake {
            if self.peers[index].sync().wait_for_sleep(deadline) {
                self.world.robots_mut()[index].skipped_turns = 0;
            } else {
                self.skip_turn(index);
            }
        }
    }

    fn skip_turn(&mut self, index: usize) {
        let time = self.world.time();
        let peer = &self.peers[index];
        let robot = &mut self.world.robots_mut()[index];
        robot.skipped_turns += 1;
        let skipped = robot.skipped_turns;
        let alive = robot.is_alive();

        peer.add_event(
            Event::SkippedTurn(SkippedTurnEvent { skipped_turn: time }),
            time,
        );
        debug!(robot = %peer.name(), turn = time, skipped, "turn skipped");

        if alive && skipped > self.arena.rules.max_skipped_turns {
            warn!(robot = %peer.name(), skipped, "removing robot that stopped taking turns");
            peer.system_message(format!(
                "{} has not performed any actions in a reasonable amount of time.",
                peer.name()
            ));
            peer.system_message("No score will be generated.");
            peer.sync().halt();
            self.world.statistics_mut()[index].set_inactive();
            self.world.robots_mut()[index].flags |= RobotFlags::NO_SCORING;
            self.world.kill(index);
        }
    }

    fn halt_agents(&mut self) {
        if self.halted {
            return;
        }
        self.halted = true;
        debug!(round = self.number + 1, turn = self.world.time(), "halting agents");
        for (peer, robot) in self.peers.iter().zip(self.world.robots_mut()) {
            robot.flags |= RobotFlags::HALTED;
            peer.publish(robot);
            peer.sync().halt();
        }
    }

    /// Stops every agent thread, detaching the ones that do not stop in time.
    fn shutdown_agents(&mut self) {
        for peer in &self.peers {
            peer.sync().halt();
        }
        let deadline = Instant::now() + self.arena.rules.shutdown_timeout();
        for (peer, handle) in self.peers.iter().zip(self.agents.drain(..)) {
            if !peer.sync().wait_for_finish(deadline) {
                warn!(robot = %peer.name(), "robot is not stopping, detaching its thread");
                peer.system_message(format!("{} is not stopping. Detaching its thread.", peer.name()));
                continue;
            }
            if handle.join().is_err() {
                warn!(robot = %peer.name(), "agent thread panicked while stopping");
            }
        }
    }

    // =========================================================================
    // Engine phase
    // =========================================================================

    fn turn_loop(&mut self, listeners: &mut [Box<dyn BattleListener>]) -> Result<(), BattleError> {
        loop {
            let turn = self.world.time() + 1;
            self.collect_intents(turn);
            self.resolve(turn)?;
            self.publish();

            if !listeners.is_empty() {
                let snapshot = TurnSnapshot::capture(self.number, &self.world);
                for listener in listeners.iter_mut() {
                    listener.on_turn_ended(&snapshot);
                }
            }

            if self.world.should_halt() {
                self.halt_agents();
            }
            if self.world.is_round_finished() {
                return Ok(());
            }
            self.run_agents();
        }
    }

    fn collect_intents(&mut self, turn: u64) {
        self.world.set_time(turn);
        self.arena.context.set_time(turn);
        for (peer, robot) in self.peers.iter().zip(self.world.robots_mut()) {
            if robot.is_alive() {
                peer.collect_intent(robot);
            }
        }
    }

    fn resolve(&mut self, turn: u64) -> Result<(), BattleError> {
        let resolvers = self.arena.resolvers;
        let world = &mut self.world;
        panic::catch_unwind(AssertUnwindSafe(|| world.step(resolvers))).map_err(|payload| {
            let message = panic_message(payload.as_ref());
            error!(round = self.number + 1, turn, %message, "engine fault");
            BattleError::EngineFault {
                round: self.number,
                turn,
                message,
            }
        })
    }

    fn publish(&mut self) {
        let time = self.world.time();
        for (robot, event) in self.world.take_events() {
            self.peer(robot).add_event(event, time);
        }
        for (robot, message) in self.world.take_notices() {
            self.peer(robot).system_message(message);
        }
        for (peer, robot) in self.peers.iter().zip(self.world.robots()) {
            peer.publish(robot);
        }
        let alive = u32::try_from(self.world.alive_count()).unwrap_or(u32::MAX);
        self.arena.context.set_alive(alive);
    }

    fn peer(&self, robot: RobotId) -> &RobotPeer {
        &self.peers[robot.index()]
    }
}
