//! Combat resolver: bullet flight and bullet collisions.
//!
//! Bullets are processed in firing order. Each active bullet moves one step
//! along its heading and is then checked, in order, against:
//!
//! 1. other players' bullets (both bullets are destroyed)
//! 2. living robots other than its owner (damage, energy bonus, scoring)
//! 3. the battlefield walls (a miss)
//!
//! The first collision found ends the bullet's flight.

use std::f64::consts::PI;

use skirmish_geom::normal_relative_angle;
use tracing::debug;

use crate::entity::BulletPhase;
use crate::event::{
    BulletHitBulletEvent, BulletHitEvent, BulletMissedEvent, Event, HitByBulletEvent,
};
use crate::rules::{bullet_damage, bullet_hit_bonus, BULLET_KILL_BONUS_RATIO, BULLET_WIDTH};

use super::{Resolver, World};

/// Resolver for bullets in flight.
///
/// # Example
///
/// ```
/// use skirmish_core::resolver::{CombatResolver, Resolver};
///
/// assert_eq!(CombatResolver::new().name(), "combat");
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct CombatResolver;

impl CombatResolver {
    /// Creates a combat resolver.
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Checks a bullet against every other player's bullet.
    fn hit_bullet(world: &mut World, index: usize) -> bool {
        let path = world.bullets[index].path();
        let owner = world.bullets[index].owner;
        let Some(other) = (0..world.bullets.len()).find(|&other| {
            let b = &world.bullets[other];
            other != index && b.owner != owner && b.is_active() && !b.effect && path.intersects(&b.path())
        }) else {
            return false;
        };

        for i in [index, other] {
            let bullet = &mut world.bullets[i];
            bullet.phase = BulletPhase::HitBullet;
            bullet.frame = 0;
            bullet.position = bullet.last_position;
        }

        let mine = world.bullet_info(&world.bullets[index]);
        let theirs = world.bullet_info(&world.bullets[other]);
        let other_owner = world.bullets[other].owner;
        world.emit(
            owner,
            Event::BulletHitBullet(BulletHitBulletEvent {
                bullet: mine.clone(),
                hit_bullet: theirs.clone(),
            }),
        );
        world.emit(
            other_owner,
            Event::BulletHitBullet(BulletHitBulletEvent {
                bullet: theirs,
                hit_bullet: mine,
            }),
        );
        true
    }

    /// Checks a bullet against every living robot but its owner.
    fn hit_robot(world: &mut World, index: usize) -> bool {
        let path = world.bullets[index].path();
        let owner = world.bullets[index].owner;
        let Some(victim) = (0..world.robots.len()).find(|&i| {
            let robot = &world.robots[i];
            robot.id != owner && robot.is_alive() && robot.bounding_box().intersects_line(&path)
        }) else {
            return false;
        };
        let shooter = owner.index();
        let victim_id = world.robots[victim].id;

        let power = world.bullets[index].power;
        let damage = bullet_damage(power);
        let score = damage.min(world.robots[victim].energy);
        let team_fire = world.robots[shooter].is_teammate(&world.robots[victim]);

        world.drain(victim, damage);
        if !team_fire {
            world.statistics[shooter].score_bullet_damage(victim, score);
        }
        if world.robots[victim].energy <= 0.0 && world.robots[victim].is_alive() {
            world.kill(victim);
            if !team_fire {
                let bonus = world.side_kill_bonus(shooter, victim, BULLET_KILL_BONUS_RATIO);
                world.statistics[shooter].add_bullet_kill_bonus(bonus);
                if bonus > 0.0 {
                    let message = format!(
                        "Bonus for killing {}: {}",
                        world.robots[victim].name,
                        bonus.round()
                    );
                    world.notify(owner, message);
                }
            }
        }
        if world.robots[shooter].is_alive() {
            let robot = &mut world.robots[shooter];
            let energy = robot.energy + bullet_hit_bonus(power);
            robot.set_energy(energy, false);
        }

        let target = &world.robots[victim];
        let (center, victim_box, victim_heading) =
            (target.position, target.bounding_box(), target.heading);
        let bullet = &mut world.bullets[index];
        bullet.phase = BulletPhase::HitVictim;
        bullet.frame = 0;
        bullet.victim = Some(victim_id);
        if victim_box.contains_point(bullet.last_position) {
            bullet.position = bullet.last_position;
        }
        bullet.victim_offset = bullet.position - center;
        let heading = bullet.heading;

        let info = world.bullet_info(&world.bullets[index]);
        debug!(bullet = info.id.as_u64(), victim = %world.robots[victim].name, damage, "bullet hit");
        world.emit(
            victim_id,
            Event::HitByBullet(HitByBulletEvent {
                bearing: normal_relative_angle(heading + PI - victim_heading),
                bullet: info.clone(),
            }),
        );
        let event = BulletHitEvent {
            name: world.robots[victim].name.clone(),
            energy: world.robots[victim].energy,
            bullet: info,
        };
        world.emit(owner, Event::BulletHit(event));
        true
    }

    /// Checks whether a bullet has left the battlefield.
    fn hit_wall(world: &mut World, index: usize) {
        let radius = BULLET_WIDTH / 2.0;
        let (width, height) = (world.rules.battlefield_width, world.rules.battlefield_height);
        let bullet = &mut world.bullets[index];
        let p = bullet.position;
        if p.x - radius > 0.0
            && p.y - radius > 0.0
            && p.x + radius < width
            && p.y + radius < height
        {
            return;
        }

        bullet.phase = BulletPhase::HitWall;
        bullet.frame = 0;
        let owner = bullet.owner;
        let info = world.bullet_info(&world.bullets[index]);
        world.emit(owner, Event::BulletMissed(BulletMissedEvent { bullet: info }));
    }
}

impl Resolver for CombatResolver {
    fn name(&self) -> &'static str {
        "combat"
    }

    fn resolve(&self, world: &mut World) {
        for index in 0..world.bullets.len() {
            let bullet = &mut world.bullets[index];
            if !bullet.is_active() || bullet.effect {
                continue;
            }
            bullet.advance();
            if !Self::hit_bullet(world, index) && !Self::hit_robot(world, index) {
                Self::hit_wall(world, index);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::{BulletId, BulletState, Capabilities, RobotFlags, RobotId, RobotState};
    use crate::rules::BattleRules;
    use glam::DVec2;

    fn robot(id: u32, x: f64, y: f64) -> RobotState {
        RobotState::new(
            RobotId::new(id),
            format!("r{id}"),
            None,
            Capabilities::advanced(),
            RobotFlags::empty(),
            DVec2::new(x, y),
            0.0,
        )
    }

    fn shoot(world: &mut World, owner: usize, power: f64, heading: f64, at: DVec2) {
        let id = world.next_bullet_id(owner);
        let owner = world.robots()[owner].id;
        world
            .bullets_mut()
            .push(BulletState::fired(id, owner, power, heading, at));
    }

    fn run(world: &mut World) {
        CombatResolver::new().resolve(world);
    }

    mod robot_hit_tests {
        use super::*;

        #[test]
        fn power_three_hit_deals_sixteen() {
            let mut world = World::standalone(
                BattleRules::default(),
                vec![robot(0, 400.0, 100.0), robot(1, 400.0, 140.0)],
            );
            shoot(&mut world, 0, 3.0, 0.0, DVec2::new(400.0, 115.0));
            run(&mut world);

            assert!((world.robots()[1].energy - 84.0).abs() < 1e-9);
            // Firing cost is charged elsewhere; the hit returns 3 x power
            assert!((world.robots()[0].energy - 109.0).abs() < 1e-9);
            assert_eq!(world.bullets()[0].phase, BulletPhase::HitVictim);
            assert_eq!(world.bullets()[0].victim, Some(RobotId::new(1)));
            assert!((world.statistics()[0].current().bullet_damage - 16.0).abs() < 1e-9);

            let events = world.take_events();
            assert!(events
                .iter()
                .any(|(id, e)| id.index() == 1 && matches!(e, Event::HitByBullet(h) if (h.bearing.abs() - PI).abs() < 1e-9)));
            assert!(events
                .iter()
                .any(|(id, e)| id.index() == 0 && matches!(e, Event::BulletHit(h) if h.name == "r1")));
        }

        #[test]
        fn score_is_capped_by_victim_energy() {
            let mut world = World::standalone(
                BattleRules::default(),
                vec![robot(0, 400.0, 100.0), robot(1, 400.0, 140.0)],
            );
            world.robots_mut()[1].energy = 5.0;
            shoot(&mut world, 0, 3.0, 0.0, DVec2::new(400.0, 115.0));
            run(&mut world);

            assert!(!world.robots()[1].is_alive());
            let scores = world.statistics()[0].current();
            assert!((scores.bullet_damage - 5.0).abs() < 1e-9);
            assert!((scores.bullet_kill_bonus - 1.0).abs() < 1e-9);
        }

        #[test]
        fn bullets_pass_over_dead_robots_and_owner() {
            let mut world = World::standalone(
                BattleRules::default(),
                vec![robot(0, 400.0, 100.0), robot(1, 400.0, 140.0)],
            );
            world.kill(1);
            shoot(&mut world, 0, 1.0, 0.0, DVec2::new(400.0, 115.0));
            run(&mut world);
            let bullet = world.bullets().iter().find(|b| !b.effect).cloned();
            assert_eq!(bullet.map(|b| b.phase), Some(BulletPhase::Fired));
        }
    }

    mod bullet_hit_tests {
        use super::*;

        #[test]
        fn crossing_bullets_destroy_each_other() {
            let mut world = World::standalone(
                BattleRules::default(),
                vec![robot(0, 100.0, 100.0), robot(1, 700.0, 500.0)],
            );
            // Both paths cross at (400, 300)
            shoot(&mut world, 0, 1.0, 0.0, DVec2::new(400.0, 290.0));
            shoot(&mut world, 1, 1.0, PI / 2.0, DVec2::new(390.0, 300.0));
            world.bullets_mut()[1].advance();
            run(&mut world);

            assert_eq!(world.bullets()[0].phase, BulletPhase::HitBullet);
            assert_eq!(world.bullets()[1].phase, BulletPhase::HitBullet);
            let hits = world
                .take_events()
                .into_iter()
                .filter(|(_, e)| matches!(e, Event::BulletHitBullet(_)))
                .count();
            assert_eq!(hits, 2);
        }

        #[test]
        fn own_bullets_never_collide() {
            let mut world = World::standalone(
                BattleRules::default(),
                vec![robot(0, 100.0, 100.0), robot(1, 700.0, 500.0)],
            );
            shoot(&mut world, 0, 1.0, 0.0, DVec2::new(400.0, 290.0));
            shoot(&mut world, 0, 1.0, PI / 2.0, DVec2::new(390.0, 300.0));
            world.bullets_mut()[1].advance();
            run(&mut world);
            assert!(world.bullets().iter().all(BulletState::is_active));
        }
    }

    mod wall_tests {
        use super::*;

        #[test]
        fn bullet_leaving_field_is_a_miss() {
            let mut world = World::standalone(BattleRules::default(), vec![robot(0, 400.0, 100.0)]);
            shoot(&mut world, 0, 3.0, PI, DVec2::new(400.0, 10.0));
            run(&mut world);
            assert_eq!(world.bullets()[0].phase, BulletPhase::HitWall);
            let events = world.take_events();
            assert!(matches!(&events[..], [(_, Event::BulletMissed(m))] if m.bullet.id == BulletId::new(RobotId::new(0), 0)));
        }

        #[test]
        fn bullet_in_flight_keeps_moving() {
            let mut world = World::standalone(BattleRules::default(), vec![robot(0, 400.0, 100.0)]);
            shoot(&mut world, 0, 1.0, 0.0, DVec2::new(400.0, 100.0));
            for _ in 0..5 {
                run(&mut world);
            }
            // 17 per turn
            assert!((world.bullets()[0].position.y - 185.0).abs() < 1e-9);
            assert!(world.bullets()[0].is_active());
        }
    }
}
