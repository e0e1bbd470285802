//! Read-only per-turn views of the battle for displays and recorders.
//!
//! A [`TurnSnapshot`] is taken after a turn has been fully resolved and
//! before any agent is woken, so it always shows a consistent world.
//!
//! # Example
//!
//! ```
//! use glam::DVec2;
//! use skirmish_core::entity::{Capabilities, RobotFlags, RobotId, RobotState};
//! use skirmish_core::resolver::World;
//! use skirmish_core::rules::BattleRules;
//! use skirmish_core::snapshot::TurnSnapshot;
//!
//! let robot = RobotState::new(
//!     RobotId::new(0),
//!     "duck",
//!     None,
//!     Capabilities::standard(),
//!     RobotFlags::empty(),
//!     DVec2::new(100.0, 100.0),
//!     0.0,
//! );
//! let world = World::standalone(BattleRules::default(), vec![robot]);
//! let snapshot = TurnSnapshot::capture(0, &world);
//! assert_eq!(snapshot.robots[0].name, "duck");
//! assert!(snapshot.bullets.is_empty());
//! ```

use serde::{Deserialize, Serialize};
use skirmish_geom::ScanArc;

use crate::entity::{BulletId, BulletPhase, BulletState, RobotColors, RobotId, RobotState};
use crate::resolver::World;

/// What a display needs to draw one robot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RobotSnapshot {
    /// Robot ID
    pub id: RobotId,
    /// Robot name
    pub name: String,
    /// X coordinate of the center
    pub x: f64,
    /// Y coordinate of the center
    pub y: f64,
    /// Body heading in radians
    pub heading: f64,
    /// Gun heading in radians
    pub gun_heading: f64,
    /// Radar heading in radians
    pub radar_heading: f64,
    /// Remaining energy
    pub energy: f64,
    /// Paint job
    pub colors: RobotColors,
    /// Area swept by the radar this turn
    pub scan_arc: Option<ScanArc>,
    /// Whether the robot is still in the round
    pub alive: bool,
    /// Frame of the robot's death explosion, once it has died
    pub explosion_frame: Option<u32>,
}

impl RobotSnapshot {
    fn capture(robot: &RobotState, bullets: &[BulletState]) -> Self {
        let explosion_frame = bullets
            .iter()
            .find(|b| b.effect && b.owner == robot.id && b.victim.is_none())
            .map(|b| b.frame);
        Self {
            id: robot.id,
            name: robot.name.clone(),
            x: robot.position.x,
            y: robot.position.y,
            heading: robot.heading,
            gun_heading: robot.gun_heading,
            radar_heading: robot.radar_heading,
            energy: robot.energy,
            colors: robot.colors,
            scan_arc: robot.scan_arc,
            alive: robot.is_alive(),
            explosion_frame,
        }
    }
}

/// What a display needs to draw one bullet or explosion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BulletSnapshot {
    /// Bullet ID
    pub id: BulletId,
    /// Robot that fired it
    pub owner: RobotId,
    /// X coordinate
    pub x: f64,
    /// Y coordinate
    pub y: f64,
    /// Firepower
    pub power: f64,
    /// Life cycle stage
    pub phase: BulletPhase,
    /// Explosion frame
    pub frame: u32,
}

impl From<&BulletState> for BulletSnapshot {
    fn from(bullet: &BulletState) -> Self {
        Self {
            id: bullet.id,
            owner: bullet.owner,
            x: bullet.position.x,
            y: bullet.position.y,
            power: bullet.power,
            phase: bullet.phase,
            frame: bullet.frame,
        }
    }
}

/// The whole battlefield at the end of a turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TurnSnapshot {
    /// Round, zero based
    pub round: u32,
    /// Turn within the round
    pub turn: u64,
    /// Every robot, dead or alive, in ID order
    pub robots: Vec<RobotSnapshot>,
    /// Bullets and explosions in firing order
    pub bullets: Vec<BulletSnapshot>,
}

impl TurnSnapshot {
    /// Captures the world as it stands.
    #[must_use]
    pub fn capture(round: u32, world: &World) -> Self {
        let bullets = world.bullets();
        Self {
            round,
            turn: world.time(),
            robots: world
                .robots()
                .iter()
                .map(|r| RobotSnapshot::capture(r, bullets))
                .collect(),
            bullets: bullets.iter().map(BulletSnapshot::from).collect(),
        }
    }

    /// Looks up a robot by name.
    #[must_use]
    pub fn robot(&self, name: &str) -> Option<&RobotSnapshot> {
        self.robots.iter().find(|r| r.name == name)
    }
}
