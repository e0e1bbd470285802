//! Turn resolution: the engine's write phase.
//!
//! A turn is resolved by running a fixed list of [`Resolver`]s over the
//! [`World`] while every agent is asleep. Each resolver owns one stage of
//! the turn:
//!
//! 1. [`PhysicsResolver`]: pending shots, gun cooling, turning, movement,
//!    wall and robot collisions
//! 2. [`ScanResolver`]: radar sweeps and team message delivery
//! 3. [`CombatResolver`]: bullet flight and bullet collisions
//! 4. [`LifecycleResolver`]: inactivity zap, death handling, round end
//!
//! # Invariants
//!
//! - Robots are always visited in ID order and bullets in firing order, so a
//!   turn is a pure function of the world and the robots' intents.
//! - Resolvers only queue events; delivery to agents happens after the
//!   whole turn is resolved.

mod combat;
mod lifecycle;
mod physics;
mod scan;

pub use combat::CombatResolver;
pub use lifecycle::LifecycleResolver;
pub use physics::PhysicsResolver;
pub use scan::ScanResolver;

use tracing::debug;

use crate::entity::{BulletId, BulletState, RobotFlags, RobotId, RobotState};
use crate::event::{BulletInfo, Event};
use crate::rules::{BattleRules, INACTIVITY_ENERGY_THRESHOLD, LEADER_DEATH_DAMAGE};
use crate::statistics::{kill_bonus, RobotStatistics};

/// Resolves one stage of a turn.
///
/// # Example
///
/// ```
/// use skirmish_core::resolver::{Resolver, World};
///
/// struct CountTurns;
///
/// impl Resolver for CountTurns {
///     fn name(&self) -> &'static str {
///         "count"
///     }
///
///     fn resolve(&self, world: &mut World) {
///         let _ = world.time();
///     }
/// }
/// ```
pub trait Resolver: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    /// Applies this stage to the world.
    ///
    /// Must be deterministic given the same world.
    fn resolve(&self, world: &mut World);
}

/// The resolvers that make up a turn, in order.
#[must_use]
pub fn default_resolvers() -> Vec<Box<dyn Resolver>> {
    vec![
        Box::new(PhysicsResolver::new()),
        Box::new(ScanResolver::new()),
        Box::new(CombatResolver::new()),
        Box::new(LifecycleResolver::new()),
    ]
}

// =============================================================================
// World
// =============================================================================

/// Authoritative state of a round, owned by the engine thread.
#[derive(Debug, Clone)]
pub struct World {
    rules: BattleRules,
    time: u64,
    robots: Vec<RobotState>,
    bullets: Vec<BulletState>,
    statistics: Vec<RobotStatistics>,
    outbox: Vec<(RobotId, Event)>,
    notices: Vec<(RobotId, String)>,
    deaths: Vec<RobotId>,
    inactive_turns: u64,
    inactivity_energy: f64,
    end_timer: u32,
}

impl World {
    /// Creates a world for one round.
    ///
    /// `statistics` must hold one entry per robot, in ID order.
    #[must_use]
    pub fn new(rules: BattleRules, robots: Vec<RobotState>, statistics: Vec<RobotStatistics>) -> Self {
        Self {
            rules,
            time: 0,
            robots,
            bullets: Vec::new(),
            statistics,
            outbox: Vec::new(),
            notices: Vec::new(),
            deaths: Vec::new(),
            inactive_turns: 0,
            inactivity_energy: 0.0,
            end_timer: 0,
        }
    }

    /// Creates a world whose statistics track robots without teams.
    #[must_use]
    pub fn standalone(rules: BattleRules, robots: Vec<RobotState>) -> Self {
        let count = u32::try_from(robots.len()).unwrap_or(u32::MAX);
        let statistics = robots
            .iter()
            .map(|_| {
                let mut stats = RobotStatistics::new(count, 1, true);
                stats.reset();
                stats
            })
            .collect();
        Self::new(rules, robots, statistics)
    }

    /// Runs one turn through `resolvers`.
    pub fn step(&mut self, resolvers: &[Box<dyn Resolver>]) {
        for resolver in resolvers {
            resolver.resolve(self);
        }
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    /// Battle rules.
    #[must_use]
    pub fn rules(&self) -> &BattleRules {
        &self.rules
    }

    /// Current turn.
    #[must_use]
    pub fn time(&self) -> u64 {
        self.time
    }

    /// Sets the current turn.
    pub fn set_time(&mut self, time: u64) {
        self.time = time;
    }

    /// Robots in ID order.
    #[must_use]
    pub fn robots(&self) -> &[RobotState] {
        &self.robots
    }

    /// Mutable robots in ID order.
    pub fn robots_mut(&mut self) -> &mut [RobotState] {
        &mut self.robots
    }

    /// Bullets in firing order.
    #[must_use]
    pub fn bullets(&self) -> &[BulletState] {
        &self.bullets
    }

    /// Per-robot statistics in ID order.
    #[must_use]
    pub fn statistics(&self) -> &[RobotStatistics] {
        &self.statistics
    }

    /// Hands the statistics back at the end of a round.
    #[must_use]
    pub fn into_statistics(self) -> Vec<RobotStatistics> {
        self.statistics
    }

    /// Mutable statistics.
    pub fn statistics_mut(&mut self) -> &mut [RobotStatistics] {
        &mut self.statistics
    }

    /// Drains the events queued this turn.
    pub fn take_events(&mut self) -> Vec<(RobotId, Event)> {
        std::mem::take(&mut self.outbox)
    }

    /// Drains the `SYSTEM:` notices queued this turn.
    pub fn take_notices(&mut self) -> Vec<(RobotId, String)> {
        std::mem::take(&mut self.notices)
    }

    /// Number of living robots.
    #[must_use]
    pub fn alive_count(&self) -> usize {
        self.robots.iter().filter(|r| r.is_alive()).count()
    }

    /// Turns since the battle last saw enough energy being lost.
    #[must_use]
    pub fn inactive_turns(&self) -> u64 {
        self.inactive_turns
    }

    /// Turns since one side was left standing.
    #[must_use]
    pub fn end_timer(&self) -> u32 {
        self.end_timer
    }

    /// Returns `true` once surviving agents should be stopped.
    #[must_use]
    pub fn should_halt(&self) -> bool {
        self.end_timer > crate::rules::END_TIMER_HALT
    }

    /// Returns `true` once the round is over.
    #[must_use]
    pub fn is_round_finished(&self) -> bool {
        self.end_timer > crate::rules::END_TIMER_FINISH
            || self.rules.max_turns.is_some_and(|max| self.time >= max)
    }

    /// Returns `true` when at most one side is left alive.
    #[must_use]
    pub fn is_one_side_left(&self) -> bool {
        let mut living = self.robots.iter().filter(|r| r.is_alive());
        let Some(first) = living.next() else {
            return true;
        };
        living.all(|r| first.is_teammate(r))
    }

    // =========================================================================
    // Shared rules of engagement
    // =========================================================================

    /// Queues an event for a robot.
    pub fn emit(&mut self, robot: RobotId, event: Event) {
        self.outbox.push((robot, event));
    }

    /// Queues a `SYSTEM:` notice for a robot's output.
    pub fn notify(&mut self, robot: RobotId, message: impl Into<String>) {
        self.notices.push((robot, message.into()));
    }

    /// Counts energy lost toward the inactivity reset.
    pub fn note_activity(&mut self, energy_lost: f64) {
        if energy_lost < 0.0 {
            return;
        }
        self.inactivity_energy += energy_lost;
        while self.inactivity_energy >= INACTIVITY_ENERGY_THRESHOLD {
            self.inactivity_energy -= INACTIVITY_ENERGY_THRESHOLD;
            self.inactive_turns = 0;
        }
    }

    /// Takes `amount` energy from a robot, counting it as battle activity.
    pub fn drain(&mut self, index: usize, amount: f64) {
        let robot = &mut self.robots[index];
        let lost = robot.set_energy(robot.energy - amount, true);
        self.note_activity(lost);
    }

    /// Allocates the next bullet ID for a robot.
    pub(crate) fn next_bullet_id(&mut self, index: usize) -> BulletId {
        let robot = &mut self.robots[index];
        let id = BulletId::new(robot.id, robot.shots_fired);
        robot.shots_fired += 1;
        id
    }

    /// A bullet as reported in events.
    #[must_use]
    pub fn bullet_info(&self, bullet: &BulletState) -> BulletInfo {
        BulletInfo {
            id: bullet.id,
            owner: self.robots[bullet.owner.index()].name.clone(),
            victim: bullet.victim.map(|v| self.robots[v.index()].name.clone()),
            heading: bullet.heading,
            position: bullet.position,
            power: bullet.power,
            active: bullet.is_active(),
        }
    }

    /// Kills a robot. Killing a dead robot does nothing.
    ///
    /// A dying team leader deals damage to every living teammate.
    pub fn kill(&mut self, index: usize) {
        if !self.robots[index].is_alive() {
            return;
        }
        self.note_activity(INACTIVITY_ENERGY_THRESHOLD);
        let id = self.robots[index].id;
        self.emit(id, Event::Death);

        if self.robots[index].is_leader() {
            for mate in 0..self.robots.len() {
                if mate != index
                    && self.robots[mate].is_alive()
                    && self.robots[mate].is_teammate(&self.robots[index])
                {
                    self.drain(mate, LEADER_DEATH_DAMAGE);
                    let bullet_id = self.next_bullet_id(index);
                    let at = self.robots[mate].position;
                    let victim = self.robots[mate].id;
                    self.bullets.push(BulletState::explosion(
                        bullet_id,
                        id,
                        Some(victim),
                        4.0,
                        at,
                    ));
                }
            }
        }

        let bullet_id = self.next_bullet_id(index);
        let at = self.robots[index].position;
        self.bullets
            .push(BulletState::explosion(bullet_id, id, None, 1.0, at));

        let time = self.time;
        let robot = &mut self.robots[index];
        robot.set_energy(0.0, false);
        robot.flags |= RobotFlags::DEAD;
        robot.death_turn = Some(time);
        self.deaths.push(id);
        debug!(robot = %robot.name, turn = time, "robot died");
    }

    /// Kill bonus earned by `killer` for finishing off `victim`, counting
    /// the damage dealt by the killer's whole team.
    pub(crate) fn side_kill_bonus(&self, killer: usize, victim: usize, ratio: f64) -> f64 {
        if !self.statistics[killer].is_active() {
            return 0.0;
        }
        let shooter = &self.robots[killer];
        let side = self
            .robots
            .iter()
            .zip(&self.statistics)
            .filter(|(r, _)| r.id == shooter.id || r.is_teammate(shooter))
            .map(|(_, s)| s);
        kill_bonus(side, victim, ratio)
    }

    pub(crate) fn bullets_mut(&mut self) -> &mut Vec<BulletState> {
        &mut self.bullets
    }

    pub(crate) fn take_deaths(&mut self) -> Vec<RobotId> {
        std::mem::take(&mut self.deaths)
    }
}
