//! Scoring and battle results.
//!
//! Each robot keeps a [`RobotStatistics`] for the whole battle. Scores earned
//! in the running round are kept apart from the accumulated totals until
//! [`RobotStatistics::generate_totals`] folds them in at the end of the
//! round; a ranking taken mid-round adds both.
//!
//! Team results are the sums of their members' results.

use serde::{Deserialize, Serialize};

use crate::rules::{LAST_SURVIVOR_SCORE, ROBOT_HIT_BONUS, ROBOT_HIT_DAMAGE, SURVIVAL_SCORE};

/// Score components.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Scores {
    /// Points for outliving other robots
    pub survival: f64,
    /// Points for being the last robot or team standing
    pub last_survivor_bonus: f64,
    /// Points for bullet damage dealt
    pub bullet_damage: f64,
    /// Points for finishing robots off with bullets
    pub bullet_kill_bonus: f64,
    /// Points for ramming
    pub ram_damage: f64,
    /// Points for finishing robots off by ramming
    pub ram_kill_bonus: f64,
}

impl Scores {
    /// Sum of all components.
    #[must_use]
    pub fn total(&self) -> f64 {
        self.survival
            + self.last_survivor_bonus
            + self.bullet_damage
            + self.bullet_kill_bonus
            + self.ram_damage
            + self.ram_kill_bonus
    }

    fn accumulate(&mut self, other: &Scores) {
        self.survival += other.survival;
        self.last_survivor_bonus += other.last_survivor_bonus;
        self.bullet_damage += other.bullet_damage;
        self.bullet_kill_bonus += other.bullet_kill_bonus;
        self.ram_damage += other.ram_damage;
        self.ram_kill_bonus += other.ram_kill_bonus;
    }
}

/// Battle-long statistics for one robot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RobotStatistics {
    robots: u32,
    team_size: u32,
    takes_firsts: bool,
    active: bool,
    in_round: bool,
    current: Scores,
    totals: Scores,
    robot_damage: Vec<f64>,
    firsts: u32,
    seconds: u32,
    thirds: u32,
}

impl RobotStatistics {
    /// Creates statistics for a robot in a battle of `robots` robots.
    ///
    /// `team_size` is 1 for robots without a team. `takes_firsts` is set for
    /// robots without a team and for team leaders; they record the team's
    /// first places.
    #[must_use]
    pub fn new(robots: u32, team_size: u32, takes_firsts: bool) -> Self {
        Self {
            robots,
            team_size: team_size.max(1),
            takes_firsts,
            active: true,
            in_round: false,
            current: Scores::default(),
            totals: Scores::default(),
            robot_damage: vec![0.0; robots as usize],
            firsts: 0,
            seconds: 0,
            thirds: 0,
        }
    }

    /// Starts a new round.
    pub fn reset(&mut self) {
        self.reset_scores();
        self.active = true;
        self.in_round = true;
    }

    fn reset_scores(&mut self) {
        self.current = Scores::default();
        self.robot_damage.iter_mut().for_each(|d| *d = 0.0);
    }

    /// Stops scoring for the rest of the round and discards this round's points.
    pub fn set_inactive(&mut self) {
        self.reset_scores();
        self.active = false;
    }

    /// Returns `true` while the robot earns points.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Returns `true` between [`reset`](Self::reset) and
    /// [`generate_totals`](Self::generate_totals).
    #[must_use]
    pub fn is_in_round(&self) -> bool {
        self.in_round
    }

    /// Folds this round's scores into the totals.
    pub fn generate_totals(&mut self) {
        let current = self.current;
        self.totals.accumulate(&current);
        self.in_round = false;
    }

    // =========================================================================
    // Scoring
    // =========================================================================

    /// Another robot died while this one lived.
    pub fn score_survival(&mut self) {
        if self.active {
            self.current.survival += SURVIVAL_SCORE;
        }
    }

    /// This robot's side won the round.
    pub fn score_last_survivor(&mut self) {
        if self.active {
            let enemies = self.robots.saturating_sub(self.team_size);
            self.current.last_survivor_bonus += LAST_SURVIVOR_SCORE * f64::from(enemies);
            if self.takes_firsts {
                self.firsts += 1;
            }
        }
    }

    /// A bullet from this robot dealt `damage` to `victim`.
    pub fn score_bullet_damage(&mut self, victim: usize, damage: f64) {
        if self.active {
            self.add_robot_damage(victim, damage);
            self.current.bullet_damage += damage;
        }
    }

    /// This robot rammed `victim`.
    pub fn score_ram_damage(&mut self, victim: usize) {
        if self.active {
            self.add_robot_damage(victim, ROBOT_HIT_DAMAGE);
            self.current.ram_damage += ROBOT_HIT_BONUS;
        }
    }

    /// Records a bullet kill bonus computed by [`kill_bonus`].
    pub fn add_bullet_kill_bonus(&mut self, bonus: f64) {
        if self.active {
            self.current.bullet_kill_bonus += bonus;
        }
    }

    /// Records a ram kill bonus computed by [`kill_bonus`].
    pub fn add_ram_kill_bonus(&mut self, bonus: f64) {
        if self.active {
            self.current.ram_kill_bonus += bonus;
        }
    }

    /// This robot (or the last of its team) died with `enemies_remaining`
    /// enemy contestants still alive.
    pub fn score_robot_death(&mut self, enemies_remaining: usize, is_winner: bool) {
        match enemies_remaining {
            0 if !is_winner => self.firsts += 1,
            1 => self.seconds += 1,
            2 => self.thirds += 1,
            _ => {}
        }
    }

    /// Awards a first place directly.
    pub fn score_first(&mut self) {
        if self.active {
            self.firsts += 1;
        }
    }

    fn add_robot_damage(&mut self, victim: usize, damage: f64) {
        if let Some(slot) = self.robot_damage.get_mut(victim) {
            *slot += damage;
        }
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    /// Returns `true` if this robot records first places for its side.
    #[must_use]
    pub fn takes_firsts(&self) -> bool {
        self.takes_firsts
    }

    /// Damage dealt to `victim` this round.
    #[must_use]
    pub fn robot_damage(&self, victim: usize) -> f64 {
        self.robot_damage.get(victim).copied().unwrap_or(0.0)
    }

    /// This round's scores.
    #[must_use]
    pub fn current(&self) -> &Scores {
        &self.current
    }

    /// Accumulated scores of finished rounds.
    #[must_use]
    pub fn totals(&self) -> &Scores {
        &self.totals
    }

    /// Totals plus the running round's scores while a round is in progress.
    #[must_use]
    pub fn combined(&self) -> Scores {
        let mut scores = self.totals;
        if self.in_round {
            scores.accumulate(&self.current);
        }
        scores
    }

    /// Number of first places.
    #[must_use]
    pub fn firsts(&self) -> u32 {
        self.firsts
    }

    /// Number of second places.
    #[must_use]
    pub fn seconds(&self) -> u32 {
        self.seconds
    }

    /// Number of third places.
    #[must_use]
    pub fn thirds(&self) -> u32 {
        self.thirds
    }
}

/// Kill bonus for finishing off `victim`: `ratio` of the damage the killer's
/// whole side dealt to it this round.
#[must_use]
pub fn kill_bonus<'a>(
    side: impl IntoIterator<Item = &'a RobotStatistics>,
    victim: usize,
    ratio: f64,
) -> f64 {
    side.into_iter().map(|s| s.robot_damage(victim) * ratio).sum()
}

// =============================================================================
// Results
// =============================================================================

/// Final standing of one contestant: a robot without a team, or a team.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContestantResult {
    /// Robot or team name
    pub name: String,
    /// 1-based rank
    pub rank: u32,
    /// Total score
    pub score: f64,
    /// Survival points
    pub survival: f64,
    /// Last survivor bonus
    pub last_survivor_bonus: f64,
    /// Bullet damage points
    pub bullet_damage: f64,
    /// Bullet kill bonus
    pub bullet_kill_bonus: f64,
    /// Ram damage points
    pub ram_damage: f64,
    /// Ram kill bonus
    pub ram_kill_bonus: f64,
    /// First places
    pub firsts: u32,
    /// Second places
    pub seconds: u32,
    /// Third places
    pub thirds: u32,
}

impl ContestantResult {
    /// Aggregates member statistics under a contestant name.
    #[must_use]
    pub fn aggregate<'a>(
        name: impl Into<String>,
        members: impl IntoIterator<Item = &'a RobotStatistics>,
    ) -> Self {
        let mut scores = Scores::default();
        let (mut firsts, mut seconds, mut thirds) = (0, 0, 0);
        for member in members {
            scores.accumulate(&member.combined());
            firsts += member.firsts();
            seconds += member.seconds();
            thirds += member.thirds();
        }
        Self {
            name: name.into(),
            rank: 0,
            score: scores.total(),
            survival: scores.survival,
            last_survivor_bonus: scores.last_survivor_bonus,
            bullet_damage: scores.bullet_damage,
            bullet_kill_bonus: scores.bullet_kill_bonus,
            ram_damage: scores.ram_damage,
            ram_kill_bonus: scores.ram_kill_bonus,
            firsts,
            seconds,
            thirds,
        }
    }
}

/// Ranked results of a battle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BattleResults {
    /// Rounds actually played
    pub rounds: u32,
    /// Contestants, best first
    pub contestants: Vec<ContestantResult>,
}

impl BattleResults {
    /// Ranks contestants by descending rounded score.
    ///
    /// Contestants with equal rounded scores keep their roster order.
    #[must_use]
    pub fn ranked(rounds: u32, mut contestants: Vec<ContestantResult>) -> Self {
        contestants.sort_by(|a, b| b.score.round().total_cmp(&a.score.round()));
        for (rank, contestant) in (1u32..).zip(contestants.iter_mut()) {
            contestant.rank = rank;
        }
        Self {
            rounds,
            contestants,
        }
    }

    /// Looks up a contestant by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&ContestantResult> {
        self.contestants.iter().find(|c| c.name == name)
    }

    /// The top ranked contestant.
    #[must_use]
    pub fn winner(&self) -> Option<&ContestantResult> {
        self.contestants.first()
    }
}
