//! Authoritative robot state.

use glam::DVec2;
use serde::{Deserialize, Serialize};
use skirmish_geom::{BoundingRect, ScanArc};

use super::{Capabilities, RobotColors, RobotFlags, RobotId, TeamId};
use crate::rules::{
    DROID_ENERGY_BONUS, INITIAL_ENERGY, INITIAL_GUN_HEAT, LEADER_ENERGY_BONUS, MAX_TURN_RATE,
    MAX_VELOCITY, ROBOT_SIZE,
};

/// What a robot asked to do this turn.
///
/// Written by the robot's agent thread while it is awake and read by the
/// engine while the agent sleeps.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Intent {
    /// Distance left to drive; negative drives backwards
    pub distance_remaining: f64,
    /// Body rotation left, in radians; positive is clockwise
    pub body_turn_remaining: f64,
    /// Gun rotation left
    pub gun_turn_remaining: f64,
    /// Radar rotation left
    pub radar_turn_remaining: f64,
    /// Speed cap the robot imposed on itself
    pub max_velocity: f64,
    /// Body turn rate cap the robot imposed on itself
    pub max_turn_rate: f64,
    /// Requested bullet power for this turn
    pub fire_power: Option<f64>,
    /// Keep the gun still in world space while the body turns
    pub adjust_gun_for_body_turn: bool,
    /// Keep the radar still in world space while the gun turns
    pub adjust_radar_for_gun_turn: bool,
    /// Keep the radar still in world space while the body turns
    pub adjust_radar_for_body_turn: bool,
    /// Set once the robot chose `adjust_radar_for_body_turn` itself
    pub adjust_radar_for_body_turn_set: bool,
    /// Scan this turn even if nothing moved
    pub scan: bool,
    /// Team messages queued for delivery
    pub messages: Vec<TeamMessage>,
}

impl Default for Intent {
    fn default() -> Self {
        Self {
            distance_remaining: 0.0,
            body_turn_remaining: 0.0,
            gun_turn_remaining: 0.0,
            radar_turn_remaining: 0.0,
            max_velocity: MAX_VELOCITY,
            max_turn_rate: MAX_TURN_RATE,
            fire_power: None,
            adjust_gun_for_body_turn: false,
            adjust_radar_for_gun_turn: false,
            adjust_radar_for_body_turn: false,
            adjust_radar_for_body_turn_set: false,
            scan: false,
            messages: Vec::new(),
        }
    }
}

/// Remaining movement saved by a stop, restored by a resume.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct SavedMotion {
    /// Saved distance remaining
    pub distance: f64,
    /// Saved body turn remaining
    pub body_turn: f64,
    /// Saved gun turn remaining
    pub gun_turn: f64,
    /// Saved radar turn remaining
    pub radar_turn: f64,
}

/// A message from one team member to others.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeamMessage {
    /// Sender's name
    pub sender: String,
    /// Recipient name prefix; `None` broadcasts to every teammate
    pub recipient: Option<String>,
    /// Message body
    pub body: String,
}

/// State of one robot for the current round.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RobotState {
    /// Roster ID
    pub id: RobotId,
    /// Unique name
    pub name: String,
    /// Team membership
    pub team: Option<TeamId>,
    /// Declared API tiers
    pub capabilities: Capabilities,
    /// Status bits
    pub flags: RobotFlags,

    /// Center of the robot
    pub position: DVec2,
    /// Body heading in `[0, 2π)`
    pub heading: f64,
    /// Gun heading in `[0, 2π)`
    pub gun_heading: f64,
    /// Radar heading in `[0, 2π)`
    pub radar_heading: f64,
    /// Signed speed along the body heading
    pub velocity: f64,
    /// Energy; zero means the robot is dead or about to die
    pub energy: f64,
    /// Gun heat; the gun fires only at zero
    pub gun_heat: f64,

    /// Position at the start of the current turn
    pub last_position: DVec2,
    /// Body heading at the start of the current turn
    pub last_heading: f64,
    /// Gun heading at the start of the current turn
    pub last_gun_heading: f64,
    /// Radar heading at the start of the current turn
    pub last_radar_heading: f64,

    /// Pending actions
    pub intent: Intent,
    /// Motion parked by a stop
    pub saved: Option<SavedMotion>,
    /// Braking distance exceeds the remaining distance
    pub overdriving: bool,
    /// Rammed another robot last turn; body turning is suspended
    pub in_collision: bool,
    /// Radar should sweep this turn
    pub scan_due: bool,
    /// Sweep covered by the radar this turn
    pub scan_arc: Option<ScanArc>,

    /// Display colors
    pub colors: RobotColors,
    /// Bullet IDs issued this round, explosion effects included
    pub shots_fired: u32,
    /// Consecutive turns the agent failed to finish in time
    pub skipped_turns: u32,
    /// Turn on which the robot died
    pub death_turn: Option<u64>,
}

impl RobotState {
    /// Creates a robot at the start of a round.
    ///
    /// Energy depends on the droid and leader flags: droids carry extra
    /// armor in place of a radar, leaders carry extra energy for the team.
    #[must_use]
    pub fn new(
        id: RobotId,
        name: impl Into<String>,
        team: Option<TeamId>,
        capabilities: Capabilities,
        flags: RobotFlags,
        position: DVec2,
        heading: f64,
    ) -> Self {
        let mut energy = INITIAL_ENERGY;
        if flags.contains(RobotFlags::DROID) {
            energy += DROID_ENERGY_BONUS;
        }
        if flags.contains(RobotFlags::LEADER) {
            energy += LEADER_ENERGY_BONUS;
        }

        Self {
            id,
            name: name.into(),
            team,
            capabilities,
            flags: flags & (RobotFlags::DROID | RobotFlags::LEADER | RobotFlags::NO_SCORING),
            position,
            heading,
            gun_heading: heading,
            radar_heading: heading,
            velocity: 0.0,
            energy,
            gun_heat: INITIAL_GUN_HEAT,
            last_position: position,
            last_heading: heading,
            last_gun_heading: heading,
            last_radar_heading: heading,
            intent: Intent::default(),
            saved: None,
            overdriving: false,
            in_collision: false,
            scan_due: false,
            scan_arc: None,
            colors: RobotColors::default(),
            shots_fired: 0,
            skipped_turns: 0,
            death_turn: None,
        }
    }

    /// Returns `true` until the robot dies.
    #[must_use]
    pub fn is_alive(&self) -> bool {
        !self.flags.contains(RobotFlags::DEAD)
    }

    /// Returns `true` if the robot has no radar.
    #[must_use]
    pub fn is_droid(&self) -> bool {
        self.flags.contains(RobotFlags::DROID)
    }

    /// Returns `true` if the robot leads its team.
    #[must_use]
    pub fn is_leader(&self) -> bool {
        self.flags.contains(RobotFlags::LEADER)
    }

    /// Returns `true` if both robots belong to the same team.
    #[must_use]
    pub fn is_teammate(&self, other: &RobotState) -> bool {
        self.team.is_some() && self.team == other.team
    }

    /// The robot's square bounding box.
    #[must_use]
    pub fn bounding_box(&self) -> BoundingRect {
        BoundingRect::centered(self.position, ROBOT_SIZE, ROBOT_SIZE)
    }

    /// Sets the energy, flooring tiny remainders to zero.
    ///
    /// A robot drained to zero loses its remaining movement and body turn.
    /// Returns the energy lost, which the caller counts toward battle
    /// activity when `counts_as_activity` is set.
    pub fn set_energy(&mut self, energy: f64, counts_as_activity: bool) -> f64 {
        let lost = if counts_as_activity && self.energy != energy {
            self.energy - energy
        } else {
            0.0
        };
        self.energy = energy;
        if self.energy < 0.01 {
            self.energy = 0.0;
            self.intent.distance_remaining = 0.0;
            self.intent.body_turn_remaining = 0.0;
        }
        lost
    }

    /// Parks remaining movement and turning.
    ///
    /// An existing saved motion is kept unless `overwrite` is set.
    pub fn stop(&mut self, overwrite: bool) {
        if self.saved.is_none() || overwrite {
            self.saved = Some(SavedMotion {
                distance: self.intent.distance_remaining,
                body_turn: self.intent.body_turn_remaining,
                gun_turn: self.intent.gun_turn_remaining,
                radar_turn: self.intent.radar_turn_remaining,
            });
        }
        self.intent.distance_remaining = 0.0;
        self.intent.body_turn_remaining = 0.0;
        self.intent.gun_turn_remaining = 0.0;
        self.intent.radar_turn_remaining = 0.0;
    }

    /// Restores motion parked by [`stop`](Self::stop).
    pub fn resume(&mut self) {
        if let Some(saved) = self.saved.take() {
            self.intent.distance_remaining = saved.distance;
            self.intent.body_turn_remaining = saved.body_turn;
            self.intent.gun_turn_remaining = saved.gun_turn;
            self.intent.radar_turn_remaining = saved.radar_turn;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn robot(flags: RobotFlags) -> RobotState {
        RobotState::new(
            RobotId::new(0),
            "r",
            None,
            Capabilities::advanced(),
            flags,
            DVec2::new(100.0, 100.0),
            0.0,
        )
    }

    #[test]
    fn starting_energy_depends_on_role() {
        assert!((robot(RobotFlags::empty()).energy - 100.0).abs() < 1e-12);
        assert!((robot(RobotFlags::DROID).energy - 120.0).abs() < 1e-12);
        assert!((robot(RobotFlags::LEADER).energy - 200.0).abs() < 1e-12);
        assert!((robot(RobotFlags::LEADER | RobotFlags::DROID).energy - 220.0).abs() < 1e-12);
    }

    #[test]
    fn round_flags_are_not_carried_over() {
        let r = robot(RobotFlags::DEAD | RobotFlags::WINNER | RobotFlags::DROID);
        assert!(r.is_alive());
        assert!(r.is_droid());
        assert!(!r.flags.contains(RobotFlags::WINNER));
    }

    #[test]
    fn tiny_energy_floors_to_zero_and_stops_motion() {
        let mut r = robot(RobotFlags::empty());
        r.intent.distance_remaining = 50.0;
        r.intent.body_turn_remaining = 1.0;
        let lost = r.set_energy(0.005, true);
        assert!((lost - 99.995).abs() < 1e-9);
        assert_eq!(r.energy, 0.0);
        assert_eq!(r.intent.distance_remaining, 0.0);
        assert_eq!(r.intent.body_turn_remaining, 0.0);
    }

    #[test]
    fn energy_loss_only_reported_when_counted() {
        let mut r = robot(RobotFlags::empty());
        assert_eq!(r.set_energy(90.0, false), 0.0);
        assert!((r.set_energy(80.0, true) - 10.0).abs() < 1e-12);
    }

    #[test]
    fn stop_and_resume_round_trip() {
        let mut r = robot(RobotFlags::empty());
        r.intent.distance_remaining = 40.0;
        r.intent.gun_turn_remaining = 0.5;
        r.stop(false);
        assert_eq!(r.intent.distance_remaining, 0.0);

        // A second stop without overwrite keeps the first save
        r.intent.distance_remaining = 5.0;
        r.stop(false);
        r.resume();
        assert!((r.intent.distance_remaining - 40.0).abs() < 1e-12);
        assert!((r.intent.gun_turn_remaining - 0.5).abs() < 1e-12);
        assert!(r.saved.is_none());
    }

    #[test]
    fn teammates_share_a_team() {
        let mut a = robot(RobotFlags::empty());
        let mut b = robot(RobotFlags::empty());
        assert!(!a.is_teammate(&b));
        a.team = Some(TeamId(1));
        b.team = Some(TeamId(1));
        assert!(a.is_teammate(&b));
    }
}
