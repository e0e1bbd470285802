//! Physical constants, game formulas, and battle configuration.
//!
//! The constants and formula functions here fix the game physics; every
//! robot sees the same values. [`BattleRules`] carries the per-battle
//! configuration supplied by the caller and is immutable once a battle starts.
//!
//! # Example
//!
//! ```
//! use skirmish_core::rules::{self, BattleRules};
//!
//! assert!((rules::bullet_damage(3.0) - 16.0).abs() < 1e-12);
//! assert!((rules::bullet_speed(3.0) - 11.0).abs() < 1e-12);
//!
//! let rules = BattleRules::default();
//! assert!(rules.validate().is_ok());
//! ```

use std::f64::consts::PI;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::RulesError;

// =============================================================================
// Physical constants
// =============================================================================

/// Velocity gained per turn when speeding up.
pub const ACCELERATION: f64 = 1.0;

/// Velocity lost per turn when braking.
pub const DECELERATION: f64 = 2.0;

/// Absolute speed limit for robots.
pub const MAX_VELOCITY: f64 = 8.0;

/// Fastest body turn rate (10°), reached only while standing still.
pub const MAX_TURN_RATE: f64 = 10.0 / 180.0 * PI;

/// Gun turn rate (20°) per turn.
pub const GUN_TURN_RATE: f64 = 20.0 / 180.0 * PI;

/// Radar turn rate (45°) per turn.
pub const RADAR_TURN_RATE: f64 = 45.0 / 180.0 * PI;

/// Radar beam length.
pub const RADAR_SCAN_RADIUS: f64 = 1200.0;

/// Weakest bullet a robot can fire.
pub const MIN_BULLET_POWER: f64 = 0.1;

/// Strongest bullet a robot can fire.
pub const MAX_BULLET_POWER: f64 = 3.0;

/// Energy both robots lose when one rams the other.
pub const ROBOT_HIT_DAMAGE: f64 = 0.6;

/// Score the ramming robot earns per collision.
pub const ROBOT_HIT_BONUS: f64 = 1.2;

/// Side length of a robot's square bounding box.
pub const ROBOT_SIZE: f64 = 36.0;

/// Width of a bullet, used for wall hits.
pub const BULLET_WIDTH: f64 = 3.0;

/// Starting energy of a regular robot.
pub const INITIAL_ENERGY: f64 = 100.0;

/// Extra starting energy for droids.
pub const DROID_ENERGY_BONUS: f64 = 20.0;

/// Extra starting energy for team leaders.
pub const LEADER_ENERGY_BONUS: f64 = 100.0;

/// Gun heat every robot starts a round with.
pub const INITIAL_GUN_HEAT: f64 = 3.0;

/// Damage dealt to each living teammate when a team leader dies.
pub const LEADER_DEATH_DAMAGE: f64 = 30.0;

/// Energy drained per turn from every robot once the battle is inactive.
pub const INACTIVITY_ZAP: f64 = 0.1;

/// Cumulative energy loss that counts as activity.
pub const INACTIVITY_ENERGY_THRESHOLD: f64 = 10.0;

/// Score awarded for each enemy death survived.
pub const SURVIVAL_SCORE: f64 = 50.0;

/// Score per defeated enemy for the last survivor.
pub const LAST_SURVIVOR_SCORE: f64 = 10.0;

/// Share of damage dealt that is paid out for a bullet kill.
pub const BULLET_KILL_BONUS_RATIO: f64 = 0.2;

/// Share of damage dealt that is paid out for a ramming kill.
pub const RAM_KILL_BONUS_RATIO: f64 = 0.3;

/// Turns after the round is decided before surviving robots are halted.
pub const END_TIMER_HALT: u32 = 120;

/// Turns after the round is decided before the round stops.
pub const END_TIMER_FINISH: u32 = 150;

// =============================================================================
// Formulas
// =============================================================================

/// Damage a bullet of the given power deals on impact.
#[must_use]
pub fn bullet_damage(power: f64) -> f64 {
    4.0 * power + 2.0 * (power - 1.0).max(0.0)
}

/// Energy a shooter regains when its bullet hits.
#[must_use]
pub fn bullet_hit_bonus(power: f64) -> f64 {
    3.0 * power
}

/// Distance a bullet of the given power covers per turn.
#[must_use]
pub fn bullet_speed(power: f64) -> f64 {
    20.0 - 3.0 * power
}

/// Gun heat generated by firing a bullet of the given power.
#[must_use]
pub fn gun_heat(power: f64) -> f64 {
    1.0 + power / 5.0
}

/// Energy an advanced robot loses when it drives into a wall.
#[must_use]
pub fn wall_hit_damage(velocity: f64) -> f64 {
    (velocity.abs() / 2.0 - 1.0).max(0.0)
}

/// Body turn rate at the given velocity; turning slows as speed increases.
#[must_use]
pub fn turn_rate(velocity: f64) -> f64 {
    (0.4 + 0.6 * (1.0 - velocity.abs() / MAX_VELOCITY)) * MAX_TURN_RATE
}

/// Velocity after one turn of driving toward a target `distance` away.
///
/// Accelerates by [`ACCELERATION`], brakes by up to [`DECELERATION`], and
/// picks the fastest speed from which the robot can still stop exactly at
/// the target. A negative distance drives backwards.
///
/// # Example
///
/// ```
/// use skirmish_core::rules::{new_velocity, MAX_VELOCITY};
///
/// // From standstill a robot gains one unit of speed
/// assert_eq!(new_velocity(0.0, 100.0, MAX_VELOCITY), 1.0);
/// // Half a unit away it only moves half a unit
/// assert_eq!(new_velocity(0.0, 0.5, MAX_VELOCITY), 0.5);
/// ```
#[must_use]
pub fn new_velocity(velocity: f64, distance: f64, max_velocity: f64) -> f64 {
    if distance < 0.0 {
        return -new_velocity(-velocity, -distance, max_velocity);
    }

    let goal = if distance.is_infinite() {
        max_velocity
    } else {
        max_velocity_for(distance).min(max_velocity)
    };

    if velocity >= 0.0 {
        (velocity - DECELERATION).max(goal.min(velocity + ACCELERATION))
    } else {
        (velocity - ACCELERATION).max(goal.min(velocity + max_deceleration(-velocity)))
    }
}

/// Fastest speed from which a robot can still brake to a stop within `distance`.
#[must_use]
pub fn max_velocity_for(distance: f64) -> f64 {
    // Smallest braking time t whose triangular sum of decelerations covers the distance.
    let decel_time = (((4.0 * 2.0 / DECELERATION * distance + 1.0).sqrt() - 1.0) / 2.0)
        .ceil()
        .max(1.0);
    if decel_time.is_infinite() {
        return MAX_VELOCITY;
    }
    let decel_distance = (decel_time / 2.0) * (decel_time - 1.0) * DECELERATION;
    (decel_time - 1.0) * DECELERATION + (distance - decel_distance) / decel_time
}

/// Distance covered while braking from `velocity` to a standstill.
#[must_use]
pub fn distance_until_stop(velocity: f64, max_velocity: f64) -> f64 {
    let mut speed = velocity.abs();
    let mut distance = 0.0;
    while speed > 0.0 {
        speed = new_velocity(speed, 0.0, max_velocity);
        distance += speed;
    }
    distance
}

/// Largest speed change available while reversing from `speed`: braking to
/// zero first, then accelerating with whatever part of the turn is left.
fn max_deceleration(speed: f64) -> f64 {
    let decel_time = speed / DECELERATION;
    let accel_time = 1.0 - decel_time;
    decel_time.min(1.0) * DECELERATION + accel_time.max(0.0) * ACCELERATION
}

// =============================================================================
// BattleRules
// =============================================================================

/// Per-battle configuration.
///
/// Loaded once before the battle and shared read-only with the engine and
/// every robot for the battle's duration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BattleRules {
    /// Battlefield width
    pub battlefield_width: f64,
    /// Battlefield height
    pub battlefield_height: f64,
    /// Number of rounds in the battle
    pub num_rounds: u32,
    /// Gun heat removed per turn
    pub gun_cooling_rate: f64,
    /// Turns without significant energy loss before robots start being zapped
    pub inactivity_time: u64,
    /// Seed for start positions
    pub seed: u64,
    /// Time an agent has to finish its turn, in milliseconds
    pub turn_timeout_ms: u64,
    /// Time an agent has to reach its first blocking call, in milliseconds
    pub startup_timeout_ms: u64,
    /// Time to wait for agent threads to exit after a round, in milliseconds
    pub shutdown_timeout_ms: u64,
    /// Consecutive skipped turns tolerated before a robot is removed
    pub max_skipped_turns: u32,
    /// Non-blocking calls allowed between two blocking calls
    pub max_calls_per_turn: u32,
    /// Hard cap on turns per round
    pub max_turns: Option<u64>,
}

impl Default for BattleRules {
    fn default() -> Self {
        Self {
            battlefield_width: 800.0,
            battlefield_height: 600.0,
            num_rounds: 10,
            gun_cooling_rate: 0.1,
            inactivity_time: 450,
            seed: 0,
            turn_timeout_ms: 50,
            startup_timeout_ms: 1000,
            shutdown_timeout_ms: 1000,
            max_skipped_turns: 30,
            max_calls_per_turn: 10_000,
            max_turns: None,
        }
    }
}

impl BattleRules {
    /// Smallest allowed battlefield side.
    pub const MIN_BATTLEFIELD_SIZE: f64 = 400.0;

    /// Checks that the configuration describes a playable battle.
    ///
    /// # Errors
    ///
    /// Returns a [`RulesError`] naming the first invalid field.
    pub fn validate(&self) -> Result<(), RulesError> {
        let min = Self::MIN_BATTLEFIELD_SIZE;
        if !(self.battlefield_width >= min && self.battlefield_height >= min)
            || !self.battlefield_width.is_finite()
            || !self.battlefield_height.is_finite()
        {
            return Err(RulesError::Battlefield {
                width: self.battlefield_width,
                height: self.battlefield_height,
                min,
            });
        }
        if self.num_rounds == 0 {
            return Err(RulesError::NoRounds);
        }
        if !(self.gun_cooling_rate > 0.0 && self.gun_cooling_rate <= 0.7) {
            return Err(RulesError::GunCoolingRate(self.gun_cooling_rate));
        }
        if self.turn_timeout_ms == 0 {
            return Err(RulesError::ZeroLimit("turn_timeout_ms"));
        }
        if self.startup_timeout_ms == 0 {
            return Err(RulesError::ZeroLimit("startup_timeout_ms"));
        }
        if self.max_calls_per_turn == 0 {
            return Err(RulesError::ZeroLimit("max_calls_per_turn"));
        }
        if self.max_turns == Some(0) {
            return Err(RulesError::ZeroLimit("max_turns"));
        }
        Ok(())
    }

    /// Per-turn agent budget.
    #[must_use]
    pub fn turn_timeout(&self) -> Duration {
        Duration::from_millis(self.turn_timeout_ms)
    }

    /// Budget for an agent to reach its first blocking call.
    #[must_use]
    pub fn startup_timeout(&self) -> Duration {
        Duration::from_millis(self.startup_timeout_ms)
    }

    /// Grace period for agent threads to exit after a round.
    #[must_use]
    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_millis(self.shutdown_timeout_ms)
    }
}
