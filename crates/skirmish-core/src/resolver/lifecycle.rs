//! Lifecycle resolver: inactivity zap, deaths and the end of the round.

use std::collections::BTreeSet;

use tracing::{debug, info};

use crate::entity::{RobotFlags, TeamId};
use crate::event::{Event, RobotDeathEvent};
use crate::rules::INACTIVITY_ZAP;

use super::{Resolver, World};

/// Resolver for the last stage of a turn.
///
/// Runs after every robot and bullet has moved:
///
/// 1. drains every robot while the battle has been inactive for too long
/// 2. kills robots left without energy, repeating while deaths cause more
///    deaths (a dying team leader hurts its teammates)
/// 3. records placements and survival for this turn's deaths
/// 4. declares the winners once a single side is left
#[derive(Debug, Clone, Copy, Default)]
pub struct LifecycleResolver;

impl LifecycleResolver {
    /// Creates a lifecycle resolver.
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    fn zap(world: &mut World) {
        if world.inactive_turns <= world.rules.inactivity_time {
            return;
        }
        for robot in world.robots.iter_mut().filter(|r| r.is_alive()) {
            let energy = robot.energy - INACTIVITY_ZAP;
            if energy < INACTIVITY_ZAP {
                robot.set_energy(0.0, false);
            } else {
                robot.energy = energy;
            }
        }
    }

    fn kill_drained(world: &mut World) {
        loop {
            let drained: Vec<usize> = (0..world.robots.len())
                .filter(|&i| world.robots[i].is_alive() && world.robots[i].energy <= 0.0)
                .collect();
            if drained.is_empty() {
                return;
            }
            for index in drained {
                world.kill(index);
            }
        }
    }

    /// Robots without a team plus teams other than `team` that still have a
    /// living member.
    fn contestants_left(world: &World, team: Option<TeamId>) -> usize {
        let mut teams = BTreeSet::new();
        let mut loners = 0;
        for robot in world.robots.iter().filter(|r| r.is_alive()) {
            match robot.team {
                None => loners += 1,
                Some(t) if Some(t) != team => {
                    teams.insert(t);
                }
                Some(_) => {}
            }
        }
        loners + teams.len()
    }

    fn handle_deaths(world: &mut World) {
        let mut deaths = world.take_deaths();
        deaths.sort();

        for dead in deaths {
            let index = dead.index();
            let robot = &world.robots[index];
            let last_of_side = !world
                .robots
                .iter()
                .any(|r| r.id != dead && r.is_alive() && r.is_teammate(robot));
            if last_of_side {
                let left = Self::contestants_left(world, robot.team);
                let winner = robot.flags.contains(RobotFlags::WINNER);
                world.statistics[index].score_robot_death(left, winner);
            }

            let name = world.robots[index].name.clone();
            for other in 0..world.robots.len() {
                if !world.robots[other].is_alive() {
                    continue;
                }
                if !world.robots[other].is_teammate(&world.robots[index]) {
                    world.statistics[other].score_survival();
                }
                let id = world.robots[other].id;
                world.emit(id, Event::RobotDeath(RobotDeathEvent { name: name.clone() }));
            }
            world.notify(dead, format!("{name} has died"));
        }
    }

    fn declare_winners(world: &mut World) {
        let mut captain_won = false;
        let mut winning_team = None;

        for index in 0..world.robots.len() {
            let robot = &world.robots[index];
            if !robot.is_alive() || robot.flags.contains(RobotFlags::WINNER) {
                continue;
            }
            let (id, team) = (robot.id, robot.team);
            let message = format!("{} wins the round.", robot.name);
            info!(robot = %robot.name, turn = world.time, "round won");

            world.statistics[index].score_last_survivor();
            world.robots[index].flags |= RobotFlags::WINNER;
            world.notify(id, message);
            world.emit(id, Event::Win);
            if team.is_some() {
                if world.statistics[index].takes_firsts() {
                    captain_won = true;
                } else {
                    winning_team = team;
                }
            }
        }

        if captain_won {
            return;
        }
        if let Some(team) = winning_team {
            let captain = (0..world.robots.len()).find(|&i| {
                world.robots[i].team == Some(team) && world.statistics[i].takes_firsts()
            });
            if let Some(captain) = captain {
                world.statistics[captain].score_first();
            }
        }
    }
}

impl Resolver for LifecycleResolver {
    fn name(&self) -> &'static str {
        "lifecycle"
    }

    fn resolve(&self, world: &mut World) {
        Self::zap(world);
        Self::kill_drained(world);
        Self::handle_deaths(world);

        if world.is_one_side_left() {
            if world.end_timer == 0 {
                Self::declare_winners(world);
                debug!(turn = world.time, "one side left");
            }
            world.end_timer += 1;
        }
        world.inactive_turns += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::{Capabilities, RobotId, RobotState};
    use crate::rules::BattleRules;
    use crate::statistics::RobotStatistics;
    use glam::DVec2;

    fn robot(id: u32, team: Option<u32>) -> RobotState {
        RobotState::new(
            RobotId::new(id),
            format!("r{id}"),
            team.map(TeamId),
            Capabilities::advanced(),
            RobotFlags::empty(),
            DVec2::new(100.0 + 100.0 * f64::from(id), 100.0),
            0.0,
        )
    }

    fn run(world: &mut World) {
        LifecycleResolver::new().resolve(world);
    }

    fn deaths_seen_by(world: &mut World, index: usize) -> Vec<String> {
        world
            .take_events()
            .into_iter()
            .filter(|(id, _)| id.index() == index)
            .filter_map(|(_, e)| match e {
                Event::RobotDeath(d) => Some(d.name),
                _ => None,
            })
            .collect()
    }

    /// Two teams of two; robot 0 captains team 0 and robot 2 team 1.
    fn team_world() -> World {
        let robots = vec![
            robot(0, Some(0)),
            robot(1, Some(0)),
            robot(2, Some(1)),
            robot(3, Some(1)),
        ];
        let statistics = (0..4)
            .map(|i| {
                let mut s = RobotStatistics::new(4, 2, i % 2 == 0);
                s.reset();
                s
            })
            .collect();
        World::new(BattleRules::default(), robots, statistics)
    }

    mod zap_tests {
        use super::*;

        #[test]
        fn inactivity_drains_everyone() {
            let mut world = World::standalone(BattleRules::default(), vec![robot(0, None), robot(1, None)]);
            world.inactive_turns = 451;
            run(&mut world);
            assert!((world.robots()[0].energy - 99.9).abs() < 1e-9);
            assert!((world.robots()[1].energy - 99.9).abs() < 1e-9);
        }

        #[test]
        fn no_drain_within_limit() {
            let mut world = World::standalone(BattleRules::default(), vec![robot(0, None), robot(1, None)]);
            world.inactive_turns = 450;
            run(&mut world);
            assert!((world.robots()[0].energy - 100.0).abs() < 1e-12);
            assert_eq!(world.inactive_turns(), 451);
        }

        #[test]
        fn last_sliver_of_energy_is_lethal() {
            let mut world = World::standalone(BattleRules::default(), vec![robot(0, None), robot(1, None)]);
            world.inactive_turns = 500;
            world.robots_mut()[0].energy = 0.15;
            run(&mut world);
            assert!(!world.robots()[0].is_alive());
        }
    }

    mod death_tests {
        use super::*;

        #[test]
        fn drained_robot_dies_and_survivors_score() {
            let mut world = World::standalone(
                BattleRules::default(),
                vec![robot(0, None), robot(1, None), robot(2, None)],
            );
            world.robots_mut()[2].energy = 0.0;
            run(&mut world);

            assert!(!world.robots()[2].is_alive());
            assert_eq!(world.robots()[2].death_turn, Some(0));
            // Two contestants left: a third place
            assert_eq!(world.statistics()[2].thirds(), 1);
            assert!((world.statistics()[0].current().survival - 50.0).abs() < 1e-12);
            assert!((world.statistics()[1].current().survival - 50.0).abs() < 1e-12);
            assert_eq!(deaths_seen_by(&mut world, 0), vec!["r2".to_owned()]);
            assert_eq!(world.end_timer(), 0);
        }

        #[test]
        fn death_notice_goes_to_output() {
            let mut world = World::standalone(
                BattleRules::default(),
                vec![robot(0, None), robot(1, None), robot(2, None)],
            );
            world.robots_mut()[1].energy = 0.0;
            run(&mut world);
            let notices = world.take_notices();
            assert!(notices
                .iter()
                .any(|(id, m)| id.index() == 1 && m == "r1 has died"));
        }

        #[test]
        fn teammates_do_not_score_survival() {
            let mut world = team_world();
            world.robots_mut()[1].energy = 0.0;
            run(&mut world);
            assert_eq!(world.statistics()[0].current().survival, 0.0);
            assert!((world.statistics()[2].current().survival - 50.0).abs() < 1e-12);
            // Robot 0 is still alive, so no placement yet
            assert_eq!(world.statistics()[1].thirds(), 0);
            assert_eq!(world.statistics()[1].seconds(), 0);
        }

        #[test]
        fn leader_death_cascades() {
            let mut world = team_world();
            world.robots_mut()[0].flags |= RobotFlags::LEADER;
            world.robots_mut()[0].energy = 0.0;
            world.robots_mut()[1].energy = 20.0;
            run(&mut world);
            assert!(!world.robots()[0].is_alive());
            assert!(!world.robots()[1].is_alive());
            // Team 0 wiped out with one team left: second place
            assert_eq!(world.statistics()[1].seconds(), 1);
        }
    }

    mod round_end_tests {
        use super::*;

        #[test]
        fn last_survivor_wins() {
            let mut world = World::standalone(BattleRules::default(), vec![robot(0, None), robot(1, None)]);
            world.robots_mut()[1].energy = 0.0;
            run(&mut world);

            let winner = &world.robots()[0];
            assert!(winner.flags.contains(RobotFlags::WINNER));
            let stats = &world.statistics()[0];
            assert!((stats.current().last_survivor_bonus - 10.0).abs() < 1e-12);
            assert_eq!(stats.firsts(), 1);
            assert_eq!(world.statistics()[1].seconds(), 1);
            assert_eq!(world.end_timer(), 1);

            let wins = world
                .take_events()
                .into_iter()
                .filter(|(id, e)| id.index() == 0 && matches!(e, Event::Win))
                .count();
            assert_eq!(wins, 1);
            assert!(world
                .take_notices()
                .iter()
                .any(|(_, m)| m == "r0 wins the round."));
        }

        #[test]
        fn winners_are_declared_once() {
            let mut world = World::standalone(BattleRules::default(), vec![robot(0, None), robot(1, None)]);
            world.robots_mut()[1].energy = 0.0;
            run(&mut world);
            run(&mut world);
            assert_eq!(world.statistics()[0].firsts(), 1);
            assert_eq!(world.end_timer(), 2);
        }

        #[test]
        fn team_first_goes_to_captain_once() {
            let mut world = team_world();
            world.kill(0);
            world.kill(2);
            world.kill(3);
            run(&mut world);

            // Robot 1 survives for team 0; its captain records the first place
            assert!(world.robots()[1].flags.contains(RobotFlags::WINNER));
            assert_eq!(world.statistics()[0].firsts(), 1);
            assert_eq!(world.statistics()[1].firsts(), 0);
            // 2 enemies
            assert!((world.statistics()[1].current().last_survivor_bonus - 20.0).abs() < 1e-12);
        }

        #[test]
        fn finishes_after_end_timer() {
            let mut world = World::standalone(BattleRules::default(), vec![robot(0, None), robot(1, None)]);
            world.robots_mut()[1].energy = 0.0;
            for _ in 0..=crate::rules::END_TIMER_HALT {
                assert!(!world.should_halt());
                run(&mut world);
            }
            assert!(world.should_halt());
            assert!(!world.is_round_finished());
            for _ in 0..30 {
                run(&mut world);
            }
            assert!(world.is_round_finished());
        }
    }
}
