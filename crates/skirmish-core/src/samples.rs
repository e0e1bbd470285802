//! Sample robots.
//!
//! Small, well-known robot programs for demos and tests. Each sample has a
//! `spec` constructor that declares the capabilities it needs.
//!
//! | Robot           | Tier     | Behavior                                    |
//! |-----------------|----------|---------------------------------------------|
//! | [`SittingDuck`] | standard | does nothing                                |
//! | [`SpinBot`]     | advanced | circles, fires on anything it scans         |
//! | [`Walls`]       | standard | drives along the walls, gun facing inward   |
//! | [`Fire`]        | standard | spins its gun in place, dodges when hit     |
//! | [`RamFire`]     | standard | turns toward its target and rams it         |

use std::cell::Cell;
use std::f64::consts::FRAC_PI_2;

use skirmish_geom::normal_relative_angle;

use crate::battle::RobotSpec;
use crate::entity::{Capabilities, Color, RobotColors};
use crate::error::AgentResult;
use crate::event::{HitByBulletEvent, HitRobotEvent, ScannedRobotEvent};
use crate::peer::{Agent, Robot};

fn colors(body: Color, gun: Color, radar: Color) -> RobotColors {
    RobotColors {
        body,
        gun,
        radar,
        ..RobotColors::default()
    }
}

// =============================================================================
// SittingDuck
// =============================================================================

/// A robot that sits still for the whole round.
#[derive(Debug, Clone, Copy, Default)]
pub struct SittingDuck;

impl SittingDuck {
    /// Roster entry for a sitting duck.
    #[must_use]
    pub fn spec(name: impl Into<String>) -> RobotSpec {
        RobotSpec::new(name, || SittingDuck)
    }
}

impl Robot for SittingDuck {
    fn run(&self, agent: &Agent<'_>) -> AgentResult<()> {
        let yellow = Color::rgb(0xFF, 0xFF, 0x00);
        agent.set_colors(colors(yellow, yellow, yellow))?;
        loop {
            agent.do_nothing()?;
        }
    }
}

// =============================================================================
// SpinBot
// =============================================================================

/// Drives in circles and fires at full power at whatever it scans.
#[derive(Debug, Clone, Copy, Default)]
pub struct SpinBot;

impl SpinBot {
    /// Roster entry for a spin bot.
    #[must_use]
    pub fn spec(name: impl Into<String>) -> RobotSpec {
        RobotSpec::new(name, || SpinBot).with_capabilities(Capabilities::advanced())
    }
}

impl Robot for SpinBot {
    fn run(&self, agent: &Agent<'_>) -> AgentResult<()> {
        agent.set_colors(colors(
            Color::rgb(0x00, 0x00, 0xFF),
            Color::rgb(0x00, 0x00, 0xFF),
            Color::rgb(0x00, 0x00, 0x00),
        ))?;
        loop {
            // A very long turn keeps the body spinning
            agent.set_turn_body(10_000.0)?;
            agent.set_max_velocity(5.0)?;
            agent.move_ahead(10_000.0)?;
        }
    }

    fn on_scanned_robot(&self, agent: &Agent<'_>, _event: &ScannedRobotEvent) -> AgentResult<()> {
        agent.fire(3.0).map(|_| ())
    }

    fn on_hit_robot(&self, agent: &Agent<'_>, event: &HitRobotEvent) -> AgentResult<()> {
        if event.bearing.abs() < 10f64.to_radians() {
            agent.fire(3.0)?;
        }
        if event.at_fault {
            agent.turn_body(10f64.to_radians())?;
        }
        Ok(())
    }
}

// =============================================================================
// Walls
// =============================================================================

/// Drives along the walls with its gun pointing at the middle.
///
/// While driving it peeks: a scan stops the current move so the robot fires
/// before continuing.
#[derive(Debug, Default)]
pub struct Walls {
    peek: Cell<bool>,
}

impl Walls {
    /// Roster entry for a wall crawler.
    #[must_use]
    pub fn spec(name: impl Into<String>) -> RobotSpec {
        RobotSpec::new(name, Walls::default)
    }
}

impl Robot for Walls {
    fn run(&self, agent: &Agent<'_>) -> AgentResult<()> {
        agent.set_colors(colors(
            Color::rgb(0x00, 0x00, 0x00),
            Color::rgb(0x00, 0x00, 0x00),
            Color::rgb(0xFF, 0xA5, 0x00),
        ))?;
        let distance = agent.battlefield_width().max(agent.battlefield_height());

        // Square up with the walls, then find one
        agent.turn_body(-(agent.heading() % FRAC_PI_2))?;
        agent.move_ahead(distance)?;
        self.peek.set(true);
        agent.turn_gun(FRAC_PI_2)?;
        agent.turn_body(FRAC_PI_2)?;

        loop {
            self.peek.set(true);
            agent.move_ahead(distance)?;
            self.peek.set(false);
            agent.turn_body(FRAC_PI_2)?;
        }
    }

    fn on_hit_robot(&self, agent: &Agent<'_>, event: &HitRobotEvent) -> AgentResult<()> {
        if event.bearing.abs() < FRAC_PI_2 {
            agent.move_back(100.0)
        } else {
            agent.move_ahead(100.0)
        }
    }

    fn on_scanned_robot(&self, agent: &Agent<'_>, _event: &ScannedRobotEvent) -> AgentResult<()> {
        agent.fire(2.0)?;
        if self.peek.get() {
            agent.scan()?;
        }
        Ok(())
    }
}

// =============================================================================
// Fire
// =============================================================================

/// Sits still spinning its gun, and hops sideways when hit.
#[derive(Debug)]
pub struct Fire {
    hop: Cell<f64>,
}

impl Default for Fire {
    fn default() -> Self {
        Self {
            hop: Cell::new(50.0),
        }
    }
}

impl Fire {
    /// Roster entry for a turret.
    #[must_use]
    pub fn spec(name: impl Into<String>) -> RobotSpec {
        RobotSpec::new(name, Fire::default)
    }
}

impl Robot for Fire {
    fn run(&self, agent: &Agent<'_>) -> AgentResult<()> {
        agent.set_colors(colors(
            Color::rgb(0xFF, 0xA5, 0x00),
            Color::rgb(0xFF, 0xA5, 0x00),
            Color::rgb(0xFF, 0x00, 0x00),
        ))?;
        loop {
            agent.turn_gun(5f64.to_radians())?;
        }
    }

    fn on_scanned_robot(&self, agent: &Agent<'_>, event: &ScannedRobotEvent) -> AgentResult<()> {
        let power = if event.distance < 50.0 && agent.energy() > 50.0 {
            3.0
        } else {
            1.0
        };
        agent.fire(power)?;
        agent.scan()
    }

    fn on_hit_by_bullet(&self, agent: &Agent<'_>, event: &HitByBulletEvent) -> AgentResult<()> {
        // Turn across the bullet's path
        let turn = normal_relative_angle(FRAC_PI_2 - (agent.heading() - event.bullet.heading));
        agent.turn_body(turn)?;
        let hop = self.hop.get();
        agent.move_ahead(hop)?;
        self.hop.set(-hop);
        agent.scan()
    }

    fn on_hit_robot(&self, agent: &Agent<'_>, event: &HitRobotEvent) -> AgentResult<()> {
        let turn = normal_relative_angle(event.bearing + agent.heading() - agent.gun_heading());
        agent.turn_gun(turn)?;
        agent.fire(3.0).map(|_| ())
    }
}

// =============================================================================
// RamFire
// =============================================================================

/// Turns toward the first robot it sees, rams it, and fires point blank.
#[derive(Debug)]
pub struct RamFire {
    direction: Cell<f64>,
}

impl Default for RamFire {
    fn default() -> Self {
        Self {
            direction: Cell::new(1.0),
        }
    }
}

impl RamFire {
    /// Roster entry for a rammer.
    #[must_use]
    pub fn spec(name: impl Into<String>) -> RobotSpec {
        RobotSpec::new(name, RamFire::default)
    }

    fn face(&self, bearing: f64) {
        self.direction.set(if bearing >= 0.0 { 1.0 } else { -1.0 });
    }

    /// Weakest shot that still finishes off a robot with `energy` left.
    fn finishing_power(energy: f64) -> Option<f64> {
        if energy > 16.0 {
            Some(3.0)
        } else if energy > 10.0 {
            Some(2.0)
        } else if energy > 4.0 {
            Some(1.0)
        } else if energy > 2.0 {
            Some(0.5)
        } else if energy > 0.4 {
            Some(0.1)
        } else {
            None
        }
    }
}

impl Robot for RamFire {
    fn run(&self, agent: &Agent<'_>) -> AgentResult<()> {
        agent.set_colors(colors(
            Color::rgb(0x80, 0x80, 0x80),
            Color::rgb(0xFF, 0xFF, 0xFF),
            Color::rgb(0x80, 0x80, 0x80),
        ))?;
        loop {
            agent.turn_body(5f64.to_radians() * self.direction.get())?;
        }
    }

    fn on_scanned_robot(&self, agent: &Agent<'_>, event: &ScannedRobotEvent) -> AgentResult<()> {
        self.face(event.bearing);
        agent.turn_body(event.bearing)?;
        agent.move_ahead(event.distance + 5.0)?;
        agent.scan()
    }

    fn on_hit_robot(&self, agent: &Agent<'_>, event: &HitRobotEvent) -> AgentResult<()> {
        self.face(event.bearing);
        agent.turn_body(event.bearing)?;
        if let Some(power) = Self::finishing_power(event.energy) {
            agent.fire(power)?;
        }
        // Keep pushing
        agent.move_ahead(40.0)
    }
}
