//! Game events delivered to robots.
//!
//! The engine produces [`Event`]s during its turn pass and queues them on
//! each robot's [`EventManager`]. The robot's agent thread drains the queue
//! after every wake, in delivery order:
//!
//! 1. Higher priority first
//! 2. Then newer events first
//! 3. Then a kind-specific tiebreak: closer scanned robots first, at-fault
//!    collisions first
//! 4. Then insertion order
//!
//! Priorities come from a per-robot table ([`EventKind::default_priority`]
//! until the robot changes it). System events (skipped turn, win, death) are
//! pinned at [`SYSTEM_PRIORITY`].

mod condition;
mod manager;

use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;

use glam::DVec2;
use serde::{Deserialize, Serialize};

use crate::entity::BulletId;

pub use condition::Condition;
pub use manager::{Delivery, Dispatch, EventManager, MAX_QUEUE_SIZE};

/// Priority of system events; robots cannot change it.
pub const SYSTEM_PRIORITY: u8 = 100;

/// Highest priority a robot may assign.
pub const MAX_USER_PRIORITY: u8 = 99;

// =============================================================================
// Event payloads
// =============================================================================

/// A bullet as seen by a robot at the moment of an event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BulletInfo {
    /// Bullet ID
    pub id: BulletId,
    /// Name of the robot that fired it
    pub owner: String,
    /// Name of the robot it hit
    pub victim: Option<String>,
    /// Flight heading
    pub heading: f64,
    /// Position
    pub position: DVec2,
    /// Power
    pub power: f64,
    /// Still in flight
    pub active: bool,
}

/// The radar swept over another robot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScannedRobotEvent {
    /// Scanned robot's name
    pub name: String,
    /// Its energy
    pub energy: f64,
    /// Bearing relative to the scanner's body heading
    pub bearing: f64,
    /// Center-to-center distance
    pub distance: f64,
    /// Its body heading
    pub heading: f64,
    /// Its velocity
    pub velocity: f64,
}

/// The robot was struck by a bullet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HitByBulletEvent {
    /// Bearing of the incoming bullet relative to the body heading
    pub bearing: f64,
    /// The bullet
    pub bullet: BulletInfo,
}

/// The robot drove into a wall.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HitWallEvent {
    /// Bearing of the wall relative to the body heading
    pub bearing: f64,
}

/// The robot collided with another robot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HitRobotEvent {
    /// Other robot's name
    pub name: String,
    /// Bearing to the other robot relative to the body heading
    pub bearing: f64,
    /// Other robot's energy after the collision
    pub energy: f64,
    /// This robot drove into the other one
    pub at_fault: bool,
}

/// One of the robot's bullets hit another robot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BulletHitEvent {
    /// Victim's name
    pub name: String,
    /// Victim's energy after the hit
    pub energy: f64,
    /// The bullet
    pub bullet: BulletInfo,
}

/// One of the robot's bullets collided with another bullet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BulletHitBulletEvent {
    /// The robot's own bullet
    pub bullet: BulletInfo,
    /// The bullet it collided with
    pub hit_bullet: BulletInfo,
}

/// One of the robot's bullets left the battlefield.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BulletMissedEvent {
    /// The bullet
    pub bullet: BulletInfo,
}

/// Another robot died.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RobotDeathEvent {
    /// Dead robot's name
    pub name: String,
}

/// A teammate sent a message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageEvent {
    /// Sender's name
    pub sender: String,
    /// Message body
    pub message: String,
}

/// A registered condition tested true.
#[derive(Clone)]
pub struct CustomEvent {
    /// The condition that fired
    pub condition: Arc<Condition>,
}

impl fmt::Debug for CustomEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CustomEvent")
            .field("condition", &self.condition.name())
            .finish()
    }
}

/// The agent failed to finish a turn in time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkippedTurnEvent {
    /// Turn that was skipped
    pub skipped_turn: u64,
}

// =============================================================================
// Event
// =============================================================================

/// An event queued for a robot.
#[derive(Debug, Clone)]
pub enum Event {
    /// Radar found a robot
    ScannedRobot(ScannedRobotEvent),
    /// Hit by a bullet
    HitByBullet(HitByBulletEvent),
    /// Drove into a wall
    HitWall(HitWallEvent),
    /// Collided with a robot
    HitRobot(HitRobotEvent),
    /// Own bullet hit a robot
    BulletHit(BulletHitEvent),
    /// Own bullet hit a bullet
    BulletHitBullet(BulletHitBulletEvent),
    /// Own bullet missed
    BulletMissed(BulletMissedEvent),
    /// Another robot died
    RobotDeath(RobotDeathEvent),
    /// Team message arrived
    Message(MessageEvent),
    /// Custom condition fired
    Custom(CustomEvent),
    /// Turn skipped
    SkippedTurn(SkippedTurnEvent),
    /// Robot won the round
    Win,
    /// Robot died
    Death,
}

impl Event {
    /// The event's kind.
    #[must_use]
    pub fn kind(&self) -> EventKind {
        match self {
            Self::ScannedRobot(_) => EventKind::ScannedRobot,
            Self::HitByBullet(_) => EventKind::HitByBullet,
            Self::HitWall(_) => EventKind::HitWall,
            Self::HitRobot(_) => EventKind::HitRobot,
            Self::BulletHit(_) => EventKind::BulletHit,
            Self::BulletHitBullet(_) => EventKind::BulletHitBullet,
            Self::BulletMissed(_) => EventKind::BulletMissed,
            Self::RobotDeath(_) => EventKind::RobotDeath,
            Self::Message(_) => EventKind::Message,
            Self::Custom(_) => EventKind::Custom,
            Self::SkippedTurn(_) => EventKind::SkippedTurn,
            Self::Win => EventKind::Win,
            Self::Death => EventKind::Death,
        }
    }

    /// Kind-specific ordering between two events of equal priority and time.
    fn tiebreak(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Self::ScannedRobot(a), Self::ScannedRobot(b)) => a.distance.total_cmp(&b.distance),
            (Self::HitRobot(a), Self::HitRobot(b)) => b.at_fault.cmp(&a.at_fault),
            _ => Ordering::Equal,
        }
    }
}

/// Event classes, used for the priority table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventKind {
    /// [`Event::ScannedRobot`]
    ScannedRobot,
    /// [`Event::HitByBullet`]
    HitByBullet,
    /// [`Event::HitWall`]
    HitWall,
    /// [`Event::HitRobot`]
    HitRobot,
    /// [`Event::BulletHit`]
    BulletHit,
    /// [`Event::BulletHitBullet`]
    BulletHitBullet,
    /// [`Event::BulletMissed`]
    BulletMissed,
    /// [`Event::RobotDeath`]
    RobotDeath,
    /// [`Event::Message`]
    Message,
    /// [`Event::Custom`]
    Custom,
    /// [`Event::SkippedTurn`]
    SkippedTurn,
    /// [`Event::Win`]
    Win,
    /// [`Event::Death`]
    Death,
}

impl EventKind {
    /// Number of event kinds.
    pub const COUNT: usize = 13;

    /// Every kind, in table order.
    pub const ALL: [Self; Self::COUNT] = [
        Self::ScannedRobot,
        Self::HitByBullet,
        Self::HitWall,
        Self::HitRobot,
        Self::BulletHit,
        Self::BulletHitBullet,
        Self::BulletMissed,
        Self::RobotDeath,
        Self::Message,
        Self::Custom,
        Self::SkippedTurn,
        Self::Win,
        Self::Death,
    ];

    /// Priority before the robot changes it.
    #[must_use]
    pub const fn default_priority(self) -> u8 {
        match self {
            Self::ScannedRobot => 10,
            Self::HitByBullet => 20,
            Self::HitWall => 30,
            Self::HitRobot => 40,
            Self::BulletHit => 50,
            Self::BulletHitBullet => 55,
            Self::BulletMissed => 60,
            Self::RobotDeath => 70,
            Self::Message => 75,
            Self::Custom => 80,
            Self::SkippedTurn | Self::Win | Self::Death => SYSTEM_PRIORITY,
        }
    }

    /// Returns `true` for events whose priority is fixed and which survive
    /// queue clearing.
    #[must_use]
    pub const fn is_system(self) -> bool {
        matches!(self, Self::SkippedTurn | Self::Win | Self::Death)
    }

    const fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::ScannedRobot => "ScannedRobotEvent",
            Self::HitByBullet => "HitByBulletEvent",
            Self::HitWall => "HitWallEvent",
            Self::HitRobot => "HitRobotEvent",
            Self::BulletHit => "BulletHitEvent",
            Self::BulletHitBullet => "BulletHitBulletEvent",
            Self::BulletMissed => "BulletMissedEvent",
            Self::RobotDeath => "RobotDeathEvent",
            Self::Message => "MessageEvent",
            Self::Custom => "CustomEvent",
            Self::SkippedTurn => "SkippedTurnEvent",
            Self::Win => "WinEvent",
            Self::Death => "DeathEvent",
        };
        f.write_str(name)
    }
}

// =============================================================================
// QueuedEvent
// =============================================================================

/// An event stamped with its priority, time, and insertion sequence.
///
/// `Ord` follows delivery order: the event that compares least is delivered
/// first.
#[derive(Debug, Clone)]
pub struct QueuedEvent {
    /// The event
    pub event: Event,
    /// Priority at the time it was queued
    pub priority: u8,
    /// Turn it was queued on
    pub time: u64,
    /// Insertion counter
    pub sequence: u64,
}

impl PartialEq for QueuedEvent {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for QueuedEvent {}

impl PartialOrd for QueuedEvent {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for QueuedEvent {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .priority
            .cmp(&self.priority)
            .then_with(|| other.time.cmp(&self.time))
            .then_with(|| self.event.tiebreak(&other.event))
            .then_with(|| self.sequence.cmp(&other.sequence))
    }
}
