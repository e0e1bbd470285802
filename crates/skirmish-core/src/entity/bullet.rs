//! Bullet state and its life cycle.

use glam::DVec2;
use serde::{Deserialize, Serialize};
use skirmish_geom::{heading_vector, LineSegment};

use super::{BulletId, RobotId};
use crate::rules::bullet_speed;

/// Stage of a bullet's life.
///
/// ```text
/// Fired -> Moving -> { HitVictim | HitBullet | HitWall } -> Exploded -> Done
/// ```
///
/// Every stage except `Moving` lasts exactly one turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BulletPhase {
    /// Just left the gun
    Fired,
    /// In flight
    Moving,
    /// Struck a robot
    HitVictim,
    /// Struck another bullet
    HitBullet,
    /// Left the battlefield
    HitWall,
    /// Explosion playing out
    Exploded,
    /// Finished; dropped before the next turn
    Done,
}

impl BulletPhase {
    /// Returns `true` while the bullet can still hit something.
    #[must_use]
    pub fn is_active(self) -> bool {
        matches!(self, Self::Fired | Self::Moving)
    }

    /// Returns `true` while the bullet is showing an impact or explosion.
    #[must_use]
    pub fn is_exploding(self) -> bool {
        matches!(
            self,
            Self::HitVictim | Self::HitBullet | Self::HitWall | Self::Exploded
        )
    }

    /// The phase that follows this one at the end of a turn.
    #[must_use]
    pub fn next(self) -> Self {
        match self {
            Self::Fired | Self::Moving => Self::Moving,
            Self::HitVictim | Self::HitBullet | Self::HitWall => Self::Exploded,
            Self::Exploded | Self::Done => Self::Done,
        }
    }
}

/// A bullet in flight or exploding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BulletState {
    /// Bullet ID
    pub id: BulletId,
    /// Robot that fired it; the robot may already be dead
    pub owner: RobotId,
    /// Power between the minimum and maximum bullet power
    pub power: f64,
    /// Flight heading
    pub heading: f64,
    /// Current position
    pub position: DVec2,
    /// Position at the start of the turn
    pub last_position: DVec2,
    /// Life-cycle stage
    pub phase: BulletPhase,
    /// Robot that was hit
    pub victim: Option<RobotId>,
    /// Offset of the impact from the victim's center
    pub victim_offset: DVec2,
    /// Turns spent in the current non-moving phase sequence
    pub frame: u32,
    /// Visual effect only; never collides
    pub effect: bool,
}

impl BulletState {
    /// A bullet leaving the gun.
    #[must_use]
    pub fn fired(id: BulletId, owner: RobotId, power: f64, heading: f64, position: DVec2) -> Self {
        Self {
            id,
            owner,
            power,
            heading,
            position,
            last_position: position,
            phase: BulletPhase::Fired,
            victim: None,
            victim_offset: DVec2::ZERO,
            frame: 0,
            effect: false,
        }
    }

    /// A non-colliding explosion, such as a dying robot or a leader's death blast.
    #[must_use]
    pub fn explosion(
        id: BulletId,
        owner: RobotId,
        victim: Option<RobotId>,
        power: f64,
        position: DVec2,
    ) -> Self {
        Self {
            phase: if victim.is_some() {
                BulletPhase::HitVictim
            } else {
                BulletPhase::Exploded
            },
            victim,
            effect: true,
            ..Self::fired(id, owner, power, 0.0, position)
        }
    }

    /// Returns `true` while the bullet can still hit something.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.phase.is_active()
    }

    /// Distance covered per turn.
    #[must_use]
    pub fn speed(&self) -> f64 {
        bullet_speed(self.power)
    }

    /// Segment swept during the current turn.
    #[must_use]
    pub fn path(&self) -> LineSegment {
        LineSegment::new(self.last_position, self.position)
    }

    /// Advances the bullet one turn along its heading.
    pub fn advance(&mut self) {
        self.last_position = self.position;
        self.position += heading_vector(self.heading) * self.speed();
    }

    /// Moves to the next phase at the end of a turn.
    pub fn finish_turn(&mut self) {
        if !self.phase.is_active() {
            self.frame += 1;
        }
        self.phase = self.phase.next();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bullet() -> BulletState {
        BulletState::fired(
            BulletId::new(RobotId::new(0), 0),
            RobotId::new(0),
            3.0,
            0.0,
            DVec2::new(100.0, 100.0),
        )
    }

    #[test]
    fn fired_bullet_moves_next_turn() {
        let mut b = bullet();
        assert!(b.is_active());
        b.finish_turn();
        assert_eq!(b.phase, BulletPhase::Moving);
        b.finish_turn();
        assert_eq!(b.phase, BulletPhase::Moving);
    }

    #[test]
    fn impact_lasts_one_turn_then_explodes_then_finishes() {
        let mut b = bullet();
        b.phase = BulletPhase::HitWall;
        assert!(!b.is_active());
        assert!(b.phase.is_exploding());
        b.finish_turn();
        assert_eq!(b.phase, BulletPhase::Exploded);
        b.finish_turn();
        assert_eq!(b.phase, BulletPhase::Done);
        assert!(!b.phase.is_exploding());
        assert_eq!(b.frame, 2);
    }

    #[test]
    fn advance_moves_along_heading() {
        let mut b = bullet();
        b.advance();
        // Power 3 travels 11 per turn, heading north
        assert!((b.position.y - 111.0).abs() < 1e-12);
        assert!((b.path().length() - 11.0).abs() < 1e-12);
    }

    #[test]
    fn explosion_effects_never_collide() {
        let id = BulletId::new(RobotId::new(1), 0);
        let blast = BulletState::explosion(id, RobotId::new(1), Some(RobotId::new(2)), 4.0, DVec2::ZERO);
        assert_eq!(blast.phase, BulletPhase::HitVictim);
        assert!(blast.effect);
        assert!(!blast.is_active());

        let own = BulletState::explosion(id, RobotId::new(1), None, 1.0, DVec2::ZERO);
        assert_eq!(own.phase, BulletPhase::Exploded);
    }
}
