//! Physics resolver: firing, turning, driving and robot collisions.
//!
//! Robots are processed one at a time in ID order. Each robot:
//!
//! 1. cools its gun
//! 2. turns its body (unless it rammed something last turn), then its gun,
//!    then its radar; each part carries the ones mounted on it
//! 3. drives along its body heading
//! 4. is pushed back inside the walls
//! 5. is checked against every other living robot for a ram
//!
//! Before that, bullets from the previous turn move on to their next phase
//! and finished ones are dropped. Pending shots for all robots are then
//! fired before anyone moves, so a bullet always leaves from where the
//! robot stood when it asked to fire.

use std::f64::consts::{FRAC_PI_2, PI};

use skirmish_geom::{
    bearing_to, heading_vector, is_near, normal_absolute_angle, normal_near_absolute_angle,
    normal_relative_angle,
};
use tracing::debug;

use crate::entity::{BulletPhase, BulletState, Capabilities, RobotFlags, RobotState};
use crate::event::{Event, HitRobotEvent, HitWallEvent};
use crate::rules::{
    distance_until_stop, gun_heat, new_velocity, turn_rate, wall_hit_damage, GUN_TURN_RATE,
    MAX_BULLET_POWER, MIN_BULLET_POWER, RADAR_TURN_RATE, RAM_KILL_BONUS_RATIO, ROBOT_HIT_DAMAGE,
    ROBOT_SIZE,
};

use super::{Resolver, World};

/// Resolver for everything robots do with their own bodies.
///
/// # Example
///
/// ```
/// use skirmish_core::resolver::{PhysicsResolver, Resolver};
///
/// assert_eq!(PhysicsResolver::new().name(), "physics");
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct PhysicsResolver;

impl PhysicsResolver {
    /// Creates a physics resolver.
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Fires the shot a robot asked for, if its gun is ready.
    ///
    /// The request is consumed either way.
    fn fire(world: &mut World, index: usize) {
        let robot = &mut world.robots[index];
        let Some(requested) = robot.intent.fire_power.take() else {
            return;
        };
        if robot.gun_heat > 0.0 || robot.energy <= 0.0 {
            return;
        }

        let power = robot
            .energy
            .min(requested.clamp(MIN_BULLET_POWER, MAX_BULLET_POWER));
        robot.gun_heat += gun_heat(power);
        let (owner, heading, position) = (robot.id, robot.gun_heading, robot.position);

        world.drain(index, power);
        let id = world.next_bullet_id(index);
        world
            .bullets
            .push(BulletState::fired(id, owner, power, heading, position));
    }

    /// Turns, drives and walls in one robot.
    fn move_robot(world: &mut World, index: usize) {
        let cooling = world.rules.gun_cooling_rate;
        let (width, height) = (world.rules.battlefield_width, world.rules.battlefield_height);

        let robot = &mut world.robots[index];
        robot.flags.remove(RobotFlags::HIT_WALL | RobotFlags::HIT_ROBOT);
        robot.gun_heat = (robot.gun_heat - cooling).max(0.0);

        robot.last_position = robot.position;
        robot.last_heading = robot.heading;
        robot.last_gun_heading = robot.gun_heading;
        robot.last_radar_heading = robot.radar_heading;

        if !robot.in_collision {
            turn_body(robot);
        }
        turn_gun(robot);
        turn_radar(robot);
        drive(robot);

        let wall = push_inside_walls(robot, width, height);
        if let Some(bearing) = wall {
            let id = robot.id;
            world.emit(id, Event::HitWall(HitWallEvent { bearing }));
        }
    }

    /// Resolves rams by one robot against every other living robot.
    fn check_robot_collisions(world: &mut World, index: usize) {
        world.robots[index].in_collision = false;

        for other in 0..world.robots.len() {
            if other == index
                || !world.robots[other].is_alive()
                || !world.robots[index]
                    .bounding_box()
                    .intersects(&world.robots[other].bounding_box())
            {
                continue;
            }

            let me = &world.robots[index];
            let angle = bearing_to(me.position, world.robots[other].position);
            let bearing = normal_relative_angle(angle - me.heading);
            let at_fault = (me.velocity > 0.0 && bearing > -FRAC_PI_2 && bearing < FRAC_PI_2)
                || (me.velocity < 0.0 && (bearing < -FRAC_PI_2 || bearing > FRAC_PI_2));
            if !at_fault {
                continue;
            }

            let team_fire = me.is_teammate(&world.robots[other]);
            let robot = &mut world.robots[index];
            let moved = heading_vector(robot.heading) * robot.velocity;
            robot.in_collision = true;
            robot.velocity = 0.0;
            robot.intent.distance_remaining = 0.0;
            robot.position -= moved;

            if !team_fire {
                world.statistics[index].score_ram_damage(other);
            }
            world.drain(index, ROBOT_HIT_DAMAGE);
            world.drain(other, ROBOT_HIT_DAMAGE);

            if world.robots[other].energy <= 0.0 && world.robots[other].is_alive() {
                world.kill(other);
                if !team_fire {
                    let bonus = world.side_kill_bonus(index, other, RAM_KILL_BONUS_RATIO);
                    world.statistics[index].add_ram_kill_bonus(bonus);
                    if bonus > 0.0 {
                        let message = format!(
                            "Ram bonus for killing {}: {}",
                            world.robots[other].name,
                            bonus.round()
                        );
                        let id = world.robots[index].id;
                        world.notify(id, message);
                    }
                }
            }

            let me = &world.robots[index];
            let them = &world.robots[other];
            debug!(robot = %me.name, other = %them.name, "ram");
            let mine = HitRobotEvent {
                name: them.name.clone(),
                bearing,
                energy: them.energy,
                at_fault: true,
            };
            let theirs = HitRobotEvent {
                name: me.name.clone(),
                bearing: normal_relative_angle(PI + angle - them.heading),
                energy: me.energy,
                at_fault: false,
            };
            let (my_id, their_id) = (me.id, them.id);
            world.emit(my_id, Event::HitRobot(mine));
            world.emit(their_id, Event::HitRobot(theirs));
        }

        let robot = &mut world.robots[index];
        if robot.in_collision {
            robot.flags |= RobotFlags::HIT_ROBOT;
        }
    }
}

impl Resolver for PhysicsResolver {
    fn name(&self) -> &'static str {
        "physics"
    }

    fn resolve(&self, world: &mut World) {
        world.bullets.retain_mut(|bullet| {
            bullet.finish_turn();
            bullet.phase != BulletPhase::Done
        });

        for index in 0..world.robots.len() {
            if world.robots[index].flags.contains(RobotFlags::DISABLED) {
                world.kill(index);
            }
        }

        for index in 0..world.robots.len() {
            if world.robots[index].is_alive() {
                Self::fire(world, index);
            }
        }

        for index in 0..world.robots.len() {
            if !world.robots[index].is_alive() {
                continue;
            }
            Self::move_robot(world, index);
            Self::check_robot_collisions(world, index);

            let robot = &mut world.robots[index];
            let requested = std::mem::take(&mut robot.intent.scan);
            #[allow(clippy::float_cmp)]
            let moved = robot.last_heading != robot.heading
                || robot.last_gun_heading != robot.gun_heading
                || robot.last_radar_heading != robot.radar_heading
                || robot.last_position != robot.position;
            robot.scan_due = requested || moved;
        }
    }
}

// =============================================================================
// Per-robot motion
// =============================================================================

/// Portion of `remaining` that can be covered this turn at `rate`.
fn step(remaining: f64, rate: f64) -> f64 {
    if remaining > 0.0 {
        remaining.min(rate)
    } else {
        remaining.max(-rate)
    }
}

fn turn_body(robot: &mut RobotState) {
    let remaining = robot.intent.body_turn_remaining;
    if remaining == 0.0 {
        return;
    }
    let rate = robot.intent.max_turn_rate.min(turn_rate(robot.velocity));
    let delta = step(remaining, rate);

    robot.heading += delta;
    robot.gun_heading += delta;
    robot.radar_heading += delta;
    robot.intent.body_turn_remaining -= delta;
    if robot.intent.adjust_gun_for_body_turn {
        robot.intent.gun_turn_remaining -= delta;
    }
    if robot.intent.adjust_radar_for_body_turn {
        robot.intent.radar_turn_remaining -= delta;
    }

    robot.heading = if robot.intent.body_turn_remaining == 0.0 {
        normal_near_absolute_angle(robot.heading)
    } else {
        normal_absolute_angle(robot.heading)
    };
}

fn turn_gun(robot: &mut RobotState) {
    let delta = step(robot.intent.gun_turn_remaining, GUN_TURN_RATE);
    if delta != 0.0 {
        robot.gun_heading += delta;
        robot.radar_heading += delta;
        robot.intent.gun_turn_remaining -= delta;
        if robot.intent.adjust_radar_for_gun_turn {
            robot.intent.radar_turn_remaining -= delta;
        }
    }
    robot.gun_heading = normal_absolute_angle(robot.gun_heading);
}

fn turn_radar(robot: &mut RobotState) {
    let delta = step(robot.intent.radar_turn_remaining, RADAR_TURN_RATE);
    if delta != 0.0 {
        robot.radar_heading += delta;
        robot.intent.radar_turn_remaining -= delta;
    }
    robot.radar_heading = normal_absolute_angle(robot.radar_heading);
}

/// Accelerates or brakes toward the remaining distance and moves.
fn drive(robot: &mut RobotState) {
    let max_velocity = robot.intent.max_velocity;
    let mut distance = robot.intent.distance_remaining;
    if distance.is_nan() {
        distance = 0.0;
    }

    robot.velocity = new_velocity(robot.velocity, distance, max_velocity);

    // Overshot while braking from full speed; the robot has stopped.
    if is_near(robot.velocity, 0.0) && robot.overdriving {
        distance = 0.0;
        robot.overdriving = false;
    }

    if distance * robot.velocity >= 0.0 {
        robot.overdriving = distance_until_stop(robot.velocity, max_velocity) > distance.abs();
    }

    robot.intent.distance_remaining = distance - robot.velocity;
    if robot.velocity != 0.0 {
        robot.position += heading_vector(robot.heading) * robot.velocity;
    }
}

/// Moves a robot that drove through a wall back along its heading until it
/// touches the wall.
///
/// Returns the bearing of the wall if one was hit.
fn push_inside_walls(robot: &mut RobotState, width: f64, height: f64) -> Option<f64> {
    let half = ROBOT_SIZE / 2.0;
    let min_x = half;
    let min_y = half;
    let max_x = width.floor() - half;
    let max_y = height.floor() - half;

    let (x, y) = (robot.position.x, robot.position.y);
    let (mut adjust_x, mut adjust_y) = (0.0, 0.0);
    let bearing = if x < min_x {
        adjust_x = min_x - x;
        normal_relative_angle(3.0 * FRAC_PI_2 - robot.heading)
    } else if x > max_x {
        adjust_x = max_x - x;
        normal_relative_angle(FRAC_PI_2 - robot.heading)
    } else if y < min_y {
        adjust_y = min_y - y;
        normal_relative_angle(PI - robot.heading)
    } else if y > max_y {
        adjust_y = max_y - y;
        normal_relative_angle(-robot.heading)
    } else {
        return None;
    };

    // Slide back along the heading, not straight out of the wall.
    if robot.heading % FRAC_PI_2 != 0.0 {
        let tan = robot.heading.tan();
        if adjust_x == 0.0 {
            adjust_x = adjust_y * tan;
        } else if adjust_y == 0.0 {
            adjust_y = adjust_x / tan;
        } else if (adjust_x / tan).abs() > adjust_y.abs() {
            adjust_y = adjust_x / tan;
        } else if (adjust_y * tan).abs() > adjust_x.abs() {
            adjust_x = adjust_y * tan;
        }
    }
    robot.position.x = (x + adjust_x).clamp(min_x, max_x);
    robot.position.y = (y + adjust_y).clamp(min_y, max_y);

    if robot.capabilities.contains(Capabilities::ADVANCED) {
        let energy = robot.energy - wall_hit_damage(robot.velocity);
        robot.set_energy(energy, false);
    }
    robot.intent.distance_remaining = 0.0;
    robot.velocity = 0.0;
    robot.flags |= RobotFlags::HIT_WALL;
    Some(bearing)
}
