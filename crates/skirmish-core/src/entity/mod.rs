//! Entity types for the battle engine.
//!
//! This module provides the identifiers and flag sets shared by every part
//! of the engine:
//! - [`RobotId`], [`BulletId`], [`TeamId`]: typed identifiers
//! - [`Capabilities`]: the API tiers a robot declares
//! - [`RobotFlags`]: per-round status bits
//! - [`RobotState`] and [`BulletState`]: the authoritative per-entity state
//!
//! # Example
//!
//! ```
//! use skirmish_core::entity::{BulletId, Capabilities, RobotId};
//!
//! let id = RobotId::new(2);
//! let bullet = BulletId::new(id, 7);
//! assert_eq!(bullet.owner(), id);
//! assert_eq!(bullet.sequence(), 7);
//!
//! let caps = Capabilities::advanced();
//! assert!(caps.contains(Capabilities::STANDARD));
//! ```

mod bullet;
mod robot;

use std::fmt;

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

pub use bullet::{BulletPhase, BulletState};
pub use robot::{Intent, RobotState, SavedMotion, TeamMessage};

// =============================================================================
// Identifiers
// =============================================================================

/// Index of a robot in the battle roster.
///
/// Robot IDs are assigned in roster order starting at zero and are stable for
/// the whole battle. Every per-turn pass iterates robots in ID order.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RobotId(u32);

impl RobotId {
    /// Creates a robot ID from its roster index.
    #[must_use]
    pub const fn new(index: u32) -> Self {
        Self(index)
    }

    /// Returns the roster index.
    #[must_use]
    pub const fn index(self) -> usize {
        self.0 as usize
    }

    /// Returns the raw value.
    #[must_use]
    pub const fn as_u32(self) -> u32 {
        self.0
    }
}

impl fmt::Debug for RobotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RobotId({})", self.0)
    }
}

impl fmt::Display for RobotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u32> for RobotId {
    fn from(id: u32) -> Self {
        Self::new(id)
    }
}

impl From<RobotId> for u32 {
    fn from(id: RobotId) -> Self {
        id.0
    }
}

/// Identifier of a bullet: the owner's ID plus the owner's shot counter.
///
/// Composing the ID from the owner keeps allocation deterministic even
/// though robots fire from their own threads.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct BulletId(u64);

impl BulletId {
    /// Creates a bullet ID for the `sequence`-th shot of `owner`.
    #[must_use]
    pub const fn new(owner: RobotId, sequence: u32) -> Self {
        Self(((owner.0 as u64) << 32) | sequence as u64)
    }

    /// Robot that fired the bullet.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub const fn owner(self) -> RobotId {
        RobotId((self.0 >> 32) as u32)
    }

    /// Per-owner shot counter.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub const fn sequence(self) -> u32 {
        self.0 as u32
    }

    /// Returns the raw value.
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Debug for BulletId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BulletId({}:{})", self.owner().0, self.sequence())
    }
}

impl fmt::Display for BulletId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.owner().0, self.sequence())
    }
}

/// Index of a team in the battle roster.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TeamId(pub u32);

impl fmt::Display for TeamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "team {}", self.0)
    }
}

// =============================================================================
// Flags
// =============================================================================

bitflags! {
    /// API tiers a robot declares.
    ///
    /// Each tier unlocks a group of peer operations. The flags are
    /// independent bits; use [`Capabilities::standard`] or
    /// [`Capabilities::advanced`] for the usual cumulative sets.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub struct Capabilities: u8 {
        /// Blocking movement, turning, firing, and getters
        const BASIC = 1 << 0;
        /// Colors, stop/resume, scan, adjust flags, wait for conditions
        const STANDARD = 1 << 1;
        /// Non-blocking setters, event priorities, custom events
        const ADVANCED = 1 << 2;
        /// Simplified robots; may set colors
        const JUNIOR = 1 << 3;
        /// Team messaging
        const TEAM = 1 << 4;
        /// Receives input events (no engine behavior)
        const INTERACTIVE = 1 << 5;
        /// May paint debug graphics (no engine behavior)
        const PAINT = 1 << 6;
    }
}

impl Capabilities {
    /// Junior robot tier.
    #[must_use]
    pub const fn junior() -> Self {
        Self::BASIC.union(Self::JUNIOR)
    }

    /// Standard robot tier.
    #[must_use]
    pub const fn standard() -> Self {
        Self::BASIC.union(Self::STANDARD)
    }

    /// Advanced robot tier.
    #[must_use]
    pub const fn advanced() -> Self {
        Self::standard().union(Self::ADVANCED)
    }

    /// Team robot tier.
    #[must_use]
    pub const fn team() -> Self {
        Self::advanced().union(Self::TEAM)
    }
}

impl Default for Capabilities {
    fn default() -> Self {
        Self::standard()
    }
}

bitflags! {
    /// Per-round robot status.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
    pub struct RobotFlags: u16 {
        /// Robot is dead for the rest of the round
        const DEAD = 1 << 0;
        /// Robot won the round
        const WINNER = 1 << 1;
        /// Robot hit a wall this turn
        const HIT_WALL = 1 << 2;
        /// Robot rammed another robot this turn
        const HIT_ROBOT = 1 << 3;
        /// Robot has no radar
        const DROID = 1 << 4;
        /// Robot leads its team
        const LEADER = 1 << 5;
        /// Robot broke a rule and was disabled
        const DISABLED = 1 << 6;
        /// Robot earns no score for the rest of the battle
        const NO_SCORING = 1 << 7;
        /// Robot thread has been told to stop
        const HALTED = 1 << 8;
    }
}

// =============================================================================
// Colors
// =============================================================================

/// An RGB color.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Color {
    /// Red
    pub r: u8,
    /// Green
    pub g: u8,
    /// Blue
    pub b: u8,
}

impl Color {
    /// Creates a color.
    #[must_use]
    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }
}

/// Display colors a robot chose for itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RobotColors {
    /// Body color
    pub body: Color,
    /// Gun color
    pub gun: Color,
    /// Radar color
    pub radar: Color,
    /// Bullet color
    pub bullet: Color,
    /// Scan arc color
    pub scan: Color,
}

impl Default for RobotColors {
    fn default() -> Self {
        Self {
            body: Color::rgb(0x18, 0x5A, 0x1E),
            gun: Color::rgb(0x18, 0x5A, 0x1E),
            radar: Color::rgb(0x18, 0x5A, 0x1E),
            bullet: Color::rgb(0xFF, 0xFF, 0xFF),
            scan: Color::rgb(0x00, 0x00, 0xFF),
        }
    }
}
