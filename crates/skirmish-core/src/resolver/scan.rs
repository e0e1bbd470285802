//! Scan resolver: radar sweeps and team message delivery.
//!
//! Every robot that turned, moved or asked to scan sweeps its radar from
//! last turn's radar heading to the current one. Sweeps only read the
//! world, so they run in parallel; the resulting events are queued in robot
//! ID order afterwards.

use rayon::prelude::*;
use skirmish_geom::{bearing_to, normal_relative_angle, ScanArc};

use crate::entity::{RobotId, RobotState};
use crate::event::{Event, MessageEvent, ScannedRobotEvent};
use crate::rules::RADAR_SCAN_RADIUS;

use super::{Resolver, World};

/// Resolver for radar and team radio.
#[derive(Debug, Clone, Copy, Default)]
pub struct ScanResolver;

impl ScanResolver {
    /// Creates a scan resolver.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

/// Result of one robot's radar sweep.
struct Sweep {
    arc: Option<ScanArc>,
    found: Vec<ScannedRobotEvent>,
}

fn sweep(scanner: &RobotState, robots: &[RobotState]) -> Sweep {
    if !scanner.is_alive() || !scanner.scan_due || scanner.is_droid() {
        return Sweep {
            arc: None,
            found: Vec::new(),
        };
    }

    let arc = ScanArc::from_sweep(
        scanner.position,
        RADAR_SCAN_RADIUS,
        scanner.last_radar_heading,
        scanner.radar_heading,
    );
    let found = robots
        .iter()
        .filter(|other| other.id != scanner.id && other.is_alive())
        .filter(|other| arc.intersects_rect(&other.bounding_box()))
        .map(|other| {
            let angle = bearing_to(scanner.position, other.position);
            ScannedRobotEvent {
                name: other.name.clone(),
                energy: other.energy,
                bearing: normal_relative_angle(angle - scanner.heading),
                distance: scanner.position.distance(other.position),
                heading: other.heading,
                velocity: other.velocity,
            }
        })
        .collect();

    Sweep {
        arc: Some(arc),
        found,
    }
}

/// Returns `true` if a message addressed to `recipient` reaches `member`.
///
/// Broadcasts reach every teammate but the sender; addressed messages reach
/// every teammate whose name starts with the recipient.
fn is_addressed_to(member: &RobotState, sender: RobotId, recipient: Option<&str>) -> bool {
    match recipient {
        None => member.id != sender,
        Some(prefix) => member.name.starts_with(prefix),
    }
}

impl Resolver for ScanResolver {
    fn name(&self) -> &'static str {
        "scan"
    }

    fn resolve(&self, world: &mut World) {
        let sweeps: Vec<Sweep> = world
            .robots
            .par_iter()
            .map(|scanner| sweep(scanner, &world.robots))
            .collect();

        for (index, result) in sweeps.into_iter().enumerate() {
            let robot = &mut world.robots[index];
            robot.scan_arc = result.arc;
            robot.scan_due = false;
            let id = robot.id;
            for event in result.found {
                world.emit(id, Event::ScannedRobot(event));
            }
        }

        for index in 0..world.robots.len() {
            if !world.robots[index].is_alive() {
                continue;
            }
            let messages = std::mem::take(&mut world.robots[index].intent.messages);
            let sender = &world.robots[index];
            if sender.team.is_none() {
                continue;
            }

            let mut deliveries = Vec::new();
            for message in messages {
                for member in world.robots.iter().filter(|m| m.is_alive() && m.is_teammate(sender)) {
                    if is_addressed_to(member, sender.id, message.recipient.as_deref()) {
                        deliveries.push((
                            member.id,
                            MessageEvent {
                                sender: message.sender.clone(),
                                message: message.body.clone(),
                            },
                        ));
                    }
                }
            }
            for (to, event) in deliveries {
                world.emit(to, Event::Message(event));
            }
        }
    }
}
