//! Battles: rosters, rounds and results.
//!
//! A [`Battle`] is built from robots and teams, then [`run`](Battle::run)
//! plays every round on the calling thread, which becomes the engine
//! thread. Each robot program runs on its own agent thread and is rebuilt
//! from its factory at the start of every round.
//!
//! # Example
//!
//! ```no_run
//! use skirmish_core::battle::Battle;
//! use skirmish_core::rules::BattleRules;
//! use skirmish_core::samples::{SittingDuck, SpinBot};
//!
//! let rules = BattleRules {
//!     num_rounds: 3,
//!     ..BattleRules::default()
//! };
//! let results = Battle::new(rules)
//!     .with_robot(SpinBot::spec("spinner"))
//!     .with_robot(SittingDuck::spec("duck"))
//!     .run()?;
//! println!("{} wins", results.contestants[0].name);
//! # Ok::<(), skirmish_core::BattleError>(())
//! ```

mod placement;
mod round;

pub use placement::{StartPosition, MAX_PLACEMENT_ATTEMPTS};

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use tracing::info;

use crate::entity::{Capabilities, RobotFlags, RobotId, RobotState, TeamId};
use crate::error::BattleError;
use crate::peer::{BattleContext, Robot, RobotFactory, RobotOutput, RosterEntry};
use crate::resolver::{default_resolvers, Resolver};
use crate::rules::BattleRules;
use crate::snapshot::TurnSnapshot;
use crate::statistics::{BattleResults, ContestantResult, RobotStatistics};

use round::{Arena, Round};

// =============================================================================
// Roster
// =============================================================================

/// One robot entered into a battle.
#[derive(Clone)]
pub struct RobotSpec {
    name: String,
    capabilities: Capabilities,
    flags: RobotFlags,
    start: Option<StartPosition>,
    factory: RobotFactory,
}

impl RobotSpec {
    /// A standard-capability robot built by `factory` every round.
    #[must_use]
    pub fn new<R, F>(name: impl Into<String>, factory: F) -> Self
    where
        R: Robot + 'static,
        F: Fn() -> R + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            capabilities: Capabilities::standard(),
            flags: RobotFlags::empty(),
            start: None,
            factory: Arc::new(move || Box::new(factory()) as Box<dyn Robot>),
        }
    }

    /// Declares the API tiers the robot uses.
    #[must_use]
    pub fn with_capabilities(mut self, capabilities: Capabilities) -> Self {
        self.capabilities = capabilities;
        self
    }

    /// Makes the robot a droid: no radar, extra energy.
    #[must_use]
    pub fn droid(mut self) -> Self {
        self.flags |= RobotFlags::DROID;
        self
    }

    /// Makes the robot its team's leader. Ignored outside a team.
    #[must_use]
    pub fn leader(mut self) -> Self {
        self.flags |= RobotFlags::LEADER;
        self
    }

    /// Starts the robot at a fixed position every round.
    #[must_use]
    pub fn at(mut self, start: StartPosition) -> Self {
        self.start = Some(start);
        self
    }

    /// Robot name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Debug for RobotSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RobotSpec")
            .field("name", &self.name)
            .field("capabilities", &self.capabilities)
            .field("flags", &self.flags)
            .field("start", &self.start)
            .finish_non_exhaustive()
    }
}

/// Robots that fight as one contestant and share their score.
#[derive(Debug, Clone)]
pub struct TeamSpec {
    name: String,
    members: Vec<RobotSpec>,
}

impl TeamSpec {
    /// An empty team.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            members: Vec::new(),
        }
    }

    /// Adds a member.
    #[must_use]
    pub fn with_member(mut self, member: RobotSpec) -> Self {
        self.members.push(member);
        self
    }

    /// Team name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }
}

/// A roster entry with its team resolved.
struct Entrant {
    spec: RobotSpec,
    team: Option<TeamId>,
}

impl Entrant {
    fn state(&self, index: usize, start: StartPosition) -> RobotState {
        let mut flags = self.spec.flags;
        if self.team.is_none() {
            flags.remove(RobotFlags::LEADER);
        }
        RobotState::new(
            RobotId::new(u32::try_from(index).unwrap_or(u32::MAX)),
            self.spec.name.clone(),
            self.team,
            self.spec.capabilities,
            flags,
            start.position,
            start.heading,
        )
    }
}

/// A contestant in the results: a robot without a team, or a team.
#[derive(Debug, Clone)]
struct Contestant {
    name: String,
    members: Vec<usize>,
}

// =============================================================================
// Listener
// =============================================================================

/// What happened in a finished round.
#[derive(Debug, Clone)]
pub struct RoundReport {
    /// Round, zero based
    pub round: u32,
    /// Turns played
    pub turns: u64,
    /// Standings after this round
    pub standings: BattleResults,
    /// Every robot's output stream, in roster order
    pub outputs: Vec<(String, RobotOutput)>,
}

impl RoundReport {
    /// Output stream of the named robot.
    #[must_use]
    pub fn output(&self, name: &str) -> Option<&RobotOutput> {
        self.outputs
            .iter()
            .find(|(robot, _)| robot == name)
            .map(|(_, output)| output)
    }
}

/// Observer of a running battle, called on the engine thread.
///
/// Every method has an empty default, so listeners implement only what they
/// need.
#[allow(unused_variables)]
pub trait BattleListener {
    /// A round is about to start. Rounds are zero based.
    fn on_round_started(&mut self, round: u32) {}

    /// A turn has been resolved; no agent is running.
    fn on_turn_ended(&mut self, snapshot: &TurnSnapshot) {}

    /// A round is over and its agents have stopped.
    fn on_round_ended(&mut self, report: &RoundReport) {}

    /// The last round is over.
    fn on_battle_completed(&mut self, results: &BattleResults) {}
}

// =============================================================================
// Battle
// =============================================================================

/// A battle between robots and teams.
pub struct Battle {
    rules: BattleRules,
    entrants: Vec<Entrant>,
    contestants: Vec<Contestant>,
    team_count: u32,
    resolvers: Vec<Box<dyn Resolver>>,
    listeners: Vec<Box<dyn BattleListener>>,
}

impl fmt::Debug for Battle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Battle")
            .field("rules", &self.rules)
            .field("robots", &self.entrants.len())
            .field("contestants", &self.contestants)
            .field("resolvers", &format!("[{} resolvers]", self.resolvers.len()))
            .field("listeners", &format!("[{} listeners]", self.listeners.len()))
            .finish()
    }
}

impl Battle {
    /// An empty battle using the standard turn resolvers.
    #[must_use]
    pub fn new(rules: BattleRules) -> Self {
        Self {
            rules,
            entrants: Vec::new(),
            contestants: Vec::new(),
            team_count: 0,
            resolvers: default_resolvers(),
            listeners: Vec::new(),
        }
    }

    /// Enters a robot that fights on its own.
    #[must_use]
    pub fn with_robot(mut self, spec: RobotSpec) -> Self {
        self.contestants.push(Contestant {
            name: spec.name.clone(),
            members: vec![self.entrants.len()],
        });
        self.entrants.push(Entrant { spec, team: None });
        self
    }

    /// Enters a team.
    ///
    /// Only the first member marked as leader keeps the role.
    #[must_use]
    pub fn with_team(mut self, team: TeamSpec) -> Self {
        let id = TeamId(self.team_count);
        self.team_count += 1;

        let mut members = Vec::with_capacity(team.members.len());
        let mut has_leader = false;
        for mut spec in team.members {
            if spec.flags.contains(RobotFlags::LEADER) {
                if has_leader {
                    spec.flags.remove(RobotFlags::LEADER);
                }
                has_leader = true;
            }
            members.push(self.entrants.len());
            self.entrants.push(Entrant {
                spec,
                team: Some(id),
            });
        }
        self.contestants.push(Contestant {
            name: team.name,
            members,
        });
        self
    }

    /// Adds an observer.
    #[must_use]
    pub fn with_listener(mut self, listener: impl BattleListener + 'static) -> Self {
        self.listeners.push(Box::new(listener));
        self
    }

    /// Replaces the turn resolvers.
    #[must_use]
    pub fn with_resolvers(mut self, resolvers: Vec<Box<dyn Resolver>>) -> Self {
        self.resolvers = resolvers;
        self
    }

    /// Battle rules.
    #[must_use]
    pub fn rules(&self) -> &BattleRules {
        &self.rules
    }

    fn validate(&self) -> Result<(), BattleError> {
        self.rules.validate()?;
        if self.entrants.is_empty() {
            return Err(BattleError::EmptyRoster);
        }
        if let Some(team) = self.contestants.iter().find(|c| c.members.is_empty()) {
            return Err(BattleError::EmptyTeam(team.name.clone()));
        }
        let mut names = HashSet::new();
        for entrant in &self.entrants {
            let name = entrant.spec.name();
            if !names.insert(name) {
                return Err(BattleError::DuplicateName(name.to_owned()));
            }
            if entrant.spec.start.is_some_and(|s| !s.fits(&self.rules)) {
                return Err(BattleError::StartPosition(name.to_owned()));
            }
        }
        Ok(())
    }

    /// The robot whose statistics record its side's first places: the
    /// leader of a team, else its first member.
    fn captains(&self) -> Vec<bool> {
        let mut captains = vec![false; self.entrants.len()];
        for contestant in &self.contestants {
            let leader = contestant
                .members
                .iter()
                .copied()
                .find(|&i| {
                    let entrant = &self.entrants[i];
                    entrant.team.is_some() && entrant.spec.flags.contains(RobotFlags::LEADER)
                })
                .or_else(|| contestant.members.first().copied());
            if let Some(index) = leader {
                captains[index] = true;
            }
        }
        captains
    }

    fn initial_statistics(&self) -> Vec<RobotStatistics> {
        let robots = u32::try_from(self.entrants.len()).unwrap_or(u32::MAX);
        let mut team_sizes = vec![1; self.entrants.len()];
        for contestant in &self.contestants {
            let size = u32::try_from(contestant.members.len()).unwrap_or(u32::MAX);
            for &member in &contestant.members {
                team_sizes[member] = size;
            }
        }
        self.captains()
            .into_iter()
            .zip(team_sizes)
            .map(|(captain, size)| RobotStatistics::new(robots, size, captain))
            .collect()
    }

    fn standings(&self, rounds: u32, statistics: &[RobotStatistics]) -> BattleResults {
        let contestants = self
            .contestants
            .iter()
            .map(|c| {
                ContestantResult::aggregate(c.name.clone(), c.members.iter().map(|&i| &statistics[i]))
            })
            .collect();
        BattleResults::ranked(rounds, contestants)
    }

    /// Plays every round and ranks the contestants.
    ///
    /// # Errors
    ///
    /// Returns a [`BattleError`] if the rules or roster are invalid, a robot
    /// cannot be placed or spawned, or a turn resolver panics. Faults in
    /// robot code never fail the battle.
    pub fn run(mut self) -> Result<BattleResults, BattleError> {
        self.validate()?;

        let roster = self
            .entrants
            .iter()
            .map(|e| RosterEntry {
                name: e.spec.name.clone(),
                team: e.team,
            })
            .collect();
        let context = Arc::new(BattleContext::new(self.rules.clone(), roster));
        let mut statistics = self.initial_statistics();
        let mut listeners = std::mem::take(&mut self.listeners);

        info!(
            robots = self.entrants.len(),
            contestants = self.contestants.len(),
            rounds = self.rules.num_rounds,
            seed = self.rules.seed,
            "battle started"
        );

        let arena = Arena {
            rules: &self.rules,
            context: &context,
            entrants: &self.entrants,
            resolvers: &self.resolvers,
        };
        for number in 0..self.rules.num_rounds {
            let played = Round::new(number, &arena, statistics)?.play(&mut listeners)?;
            statistics = played.statistics;

            if !listeners.is_empty() {
                let report = RoundReport {
                    round: number,
                    turns: played.turns,
                    standings: self.standings(number + 1, &statistics),
                    outputs: played.outputs,
                };
                for listener in &mut listeners {
                    listener.on_round_ended(&report);
                }
            }
        }

        let results = self.standings(self.rules.num_rounds, &statistics);
        if let Some(winner) = results.winner() {
            info!(winner = %winner.name, score = winner.score.round(), "battle completed");
        }
        for listener in &mut listeners {
            listener.on_battle_completed(&results);
        }
        Ok(results)
    }
}
