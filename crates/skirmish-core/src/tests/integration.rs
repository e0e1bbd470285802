//! Integration tests for whole battles.
//!
//! These tests run real agent threads against the engine loop, testing:
//! - Collisions and bullets as robots see them through events
//! - The turn barrier between engine and agents
//! - Skipped turns, disabling and removal of misbehaving robots
//! - Interruptible handlers and custom conditions
//! - Team leader deaths and the end of a round

use std::f64::consts::FRAC_PI_2;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use crate::battle::{Battle, RobotSpec, StartPosition, TeamSpec};
use crate::entity::Capabilities;
use crate::error::AgentResult;
use crate::event::{Condition, CustomEvent, Event, ScannedRobotEvent};
use crate::peer::{Agent, Robot};
use crate::rules::BattleRules;
use crate::samples::SittingDuck;

use super::helpers::{idle, logged, probe, quick_rules, self_destruct, Recorder};

// =============================================================================
// Combat
// =============================================================================

#[test]
fn test_ramming_reports_fault_to_the_rammer() {
    let (rammer, log) = probe("rammer", |agent| {
        agent.move_ahead(200.0)?;
        idle(agent)
    });
    let results = Battle::new(quick_rules(40))
        .with_robot(rammer.at(StartPosition::new(300.0, 300.0, FRAC_PI_2)))
        .with_robot(SittingDuck::spec("duck").at(StartPosition::new(400.0, 300.0, 0.0)))
        .run()
        .unwrap();

    let hit = logged(&log).into_iter().find_map(|(_, e)| match e {
        Event::HitRobot(hit) => Some(hit),
        _ => None,
    });
    let hit = hit.expect("rammer never hit the duck");
    assert_eq!(hit.name, "duck");
    assert!(hit.at_fault);
    assert!(hit.bearing.abs() < 1e-9);

    assert!(results.get("rammer").unwrap().ram_damage > 0.0);
    assert_eq!(results.get("duck").unwrap().ram_damage, 0.0);
}

#[test]
fn test_bullet_hit_moves_energy_from_victim_to_shooter() {
    let (shooter, log) = probe("shooter", |agent| {
        while agent.gun_heat() > 0.0 {
            agent.do_nothing()?;
        }
        agent.fire(3.0)?;
        idle(agent)
    });
    let recorder = Recorder::new();
    Battle::new(quick_rules(100))
        .with_robot(shooter.at(StartPosition::new(400.0, 100.0, 0.0)))
        .with_robot(SittingDuck::spec("duck").at(StartPosition::new(400.0, 300.0, 0.0)))
        .with_listener(recorder.clone())
        .run()
        .unwrap();

    let recording = recorder.recording();
    let last = recording.snapshots.last().unwrap();
    // 4 * 3 + 2 * (3 - 1) damage, 3 * 3 returned to the shooter
    assert!((last.robot("duck").unwrap().energy - 84.0).abs() < 1e-9);
    assert!((last.robot("shooter").unwrap().energy - 106.0).abs() < 1e-9);

    let bullet_hits: Vec<_> = logged(&log)
        .into_iter()
        .filter_map(|(_, e)| match e {
            Event::BulletHit(hit) => Some(hit),
            _ => None,
        })
        .collect();
    assert_eq!(bullet_hits.len(), 1);
    assert_eq!(bullet_hits[0].name, "duck");
}

// =============================================================================
// Turn barrier
// =============================================================================

#[test]
fn test_unsatisfiable_wait_does_not_stall_the_battle() {
    let (waiter, _) = probe("waiter", |agent| {
        let never = Condition::new("never", 80, |_| false);
        agent.wait_for(&never)
    });
    let recorder = Recorder::new();
    Battle::new(quick_rules(50))
        .with_robot(waiter)
        .with_robot(SittingDuck::spec("duck"))
        .with_listener(recorder.clone())
        .run()
        .unwrap();

    let recording = recorder.recording();
    assert_eq!(recording.reports.len(), 1);
    assert_eq!(recording.reports[0].turns, 50);
    assert_eq!(recording.snapshots.last().unwrap().turn, 50);
}

#[test]
fn test_published_state_is_stable_while_awake() {
    const ROBOTS: usize = 16;
    const TURNS: usize = 20;

    let checks = Arc::new(AtomicUsize::new(0));
    let violations = Arc::new(AtomicUsize::new(0));
    let mut battle = Battle::new(quick_rules(30));

    for i in 0..ROBOTS {
        let (checks, violations) = (Arc::clone(&checks), Arc::clone(&violations));
        let (spec, _) = probe(&format!("robot-{i}"), move |agent| {
            for _ in 0..TURNS {
                agent.set_move(50.0)?;
                agent.set_turn_body(1.0)?;
                let (time, position, energy) = (agent.time(), agent.position(), agent.energy());
                thread::yield_now();
                if agent.time() != time || agent.position() != position || agent.energy() != energy
                {
                    violations.fetch_add(1, Ordering::SeqCst);
                }
                agent.execute()?;
                if agent.time() != time + 1 {
                    violations.fetch_add(1, Ordering::SeqCst);
                }
                checks.fetch_add(1, Ordering::SeqCst);
            }
            idle(agent)
        });
        battle = battle.with_robot(spec);
    }
    battle.run().unwrap();

    assert_eq!(checks.load(Ordering::SeqCst), ROBOTS * TURNS);
    assert_eq!(violations.load(Ordering::SeqCst), 0);
}

// =============================================================================
// Misbehaving robots
// =============================================================================

#[test]
fn test_robot_that_keeps_skipping_turns_is_removed() {
    let rules = BattleRules {
        num_rounds: 1,
        turn_timeout_ms: 20,
        max_skipped_turns: 3,
        max_turns: Some(400),
        ..BattleRules::default()
    };
    let (skipper, log) = probe("skipper", |agent| loop {
        thread::sleep(Duration::from_millis(300));
        agent.execute()?;
    });
    let recorder = Recorder::new();
    let results = Battle::new(rules)
        .with_robot(skipper)
        .with_robot(SittingDuck::spec("duck"))
        .with_listener(recorder.clone())
        .run()
        .unwrap();

    let recording = recorder.recording();
    let output = recording.reports[0].output("skipper").unwrap();
    assert!(output.contains("skipper has not performed any actions in a reasonable amount of time."));
    assert!(output.contains("No score will be generated."));

    let last = recording.snapshots.last().unwrap();
    assert!(!last.robot("skipper").unwrap().alive);
    assert!(last.robot("duck").unwrap().alive);
    assert_eq!(results.get("duck").unwrap().firsts, 1);
    assert_eq!(results.get("skipper").unwrap().score, 0.0);

    let skipped = logged(&log)
        .iter()
        .filter(|(_, e)| matches!(e, Event::SkippedTurn(_)))
        .count();
    assert!(skipped <= 4);
}

#[test]
fn test_commands_recorded_during_a_skipped_turn_are_applied() {
    let rules = BattleRules {
        num_rounds: 1,
        turn_timeout_ms: 20,
        max_skipped_turns: 50,
        max_turns: Some(80),
        ..BattleRules::default()
    };
    let (late, log) = probe("late", |agent| {
        agent.do_nothing()?;
        thread::sleep(Duration::from_millis(100));
        agent.set_move(100.0)?;
        idle(agent)
    });
    let recorder = Recorder::new();
    Battle::new(rules)
        .with_robot(late.at(StartPosition::new(400.0, 200.0, 0.0)))
        .with_robot(SittingDuck::spec("duck").at(StartPosition::new(100.0, 500.0, 0.0)))
        .with_listener(recorder.clone())
        .run()
        .unwrap();

    assert!(logged(&log)
        .iter()
        .any(|(_, e)| matches!(e, Event::SkippedTurn(_))));
    let recording = recorder.recording();
    let robot = recording.snapshots.last().unwrap().robot("late").unwrap();
    assert!(robot.alive);
    assert!((robot.y - 300.0).abs() < 1e-6);
    assert!((robot.x - 400.0).abs() < 1e-9);
}

#[test]
fn test_nan_argument_disables_robot() {
    let (broken, _) = probe("broken", self_destruct);
    let recorder = Recorder::new();
    Battle::new(quick_rules(20))
        .with_robot(broken)
        .with_robot(SittingDuck::spec("duck"))
        .with_listener(recorder.clone())
        .run()
        .unwrap();

    let recording = recorder.recording();
    let first = &recording.snapshots[0];
    assert_eq!(first.turn, 1);
    let robot = first.robot("broken").unwrap();
    assert!(!robot.alive);
    assert_eq!(robot.energy, 0.0);
    assert!(recording.reports[0]
        .output("broken")
        .unwrap()
        .contains("NaN passed to set_move"));
}

// =============================================================================
// Teams and round end
// =============================================================================

#[test]
fn test_leader_death_damages_teammates() {
    let (leader, _) = probe("blue-leader", self_destruct);
    let team = TeamSpec::new("blue")
        .with_member(leader.leader())
        .with_member(SittingDuck::spec("blue-mate"));
    let recorder = Recorder::new();
    Battle::new(quick_rules(10))
        .with_team(team)
        .with_robot(SittingDuck::spec("red"))
        .with_listener(recorder.clone())
        .run()
        .unwrap();

    let recording = recorder.recording();
    let first = &recording.snapshots[0];
    assert!(!first.robot("blue-leader").unwrap().alive);
    assert!((first.robot("blue-mate").unwrap().energy - 70.0).abs() < 1e-9);
    assert!((first.robot("red").unwrap().energy - 100.0).abs() < 1e-9);
}

#[test]
fn test_round_runs_on_after_last_death() {
    let (survivor, log) = probe("survivor", idle);
    let (broken, _) = probe("broken", self_destruct);
    let rules = BattleRules {
        num_rounds: 2,
        turn_timeout_ms: 1000,
        ..BattleRules::default()
    };
    let recorder = Recorder::new();
    let results = Battle::new(rules)
        .with_robot(survivor)
        .with_robot(broken)
        .with_listener(recorder.clone())
        .run()
        .unwrap();

    assert_eq!(results.rounds, 2);
    assert_eq!(results.winner().unwrap().name, "survivor");
    assert_eq!(results.get("survivor").unwrap().firsts, 2);

    let recording = recorder.recording();
    assert_eq!(recording.rounds_started, vec![0, 1]);
    let turns: Vec<u64> = recording.reports.iter().map(|r| r.turns).collect();
    assert_eq!(turns, vec![151, 151]);
    assert_eq!(recording.completed.as_ref(), Some(&results));

    let wins: Vec<u64> = logged(&log)
        .into_iter()
        .filter(|(_, e)| matches!(e, Event::Win))
        .map(|(time, _)| time)
        .collect();
    assert_eq!(wins, vec![1, 1]);
}

// =============================================================================
// Handlers
// =============================================================================

/// Sweeps its radar and turns the gun a long way on every scan.
struct Sweeper {
    entries: Arc<Mutex<Vec<u64>>>,
    resumed: Arc<AtomicUsize>,
}

impl Robot for Sweeper {
    fn run(&self, agent: &Agent<'_>) -> AgentResult<()> {
        agent.set_turn_radar(1_000.0)?;
        idle(agent)
    }

    fn on_scanned_robot(&self, agent: &Agent<'_>, _event: &ScannedRobotEvent) -> AgentResult<()> {
        self.entries.lock().unwrap().push(agent.time());
        agent.set_interruptible(true)?;
        agent.turn_gun(4.0 * std::f64::consts::PI)?;
        self.resumed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[test]
fn test_interruptible_handler_restarts_on_newer_scan() {
    let entries = Arc::new(Mutex::new(Vec::new()));
    let resumed = Arc::new(AtomicUsize::new(0));
    let (shared_entries, shared_resumed) = (Arc::clone(&entries), Arc::clone(&resumed));
    let sweeper = RobotSpec::new("sweeper", move || Sweeper {
        entries: Arc::clone(&shared_entries),
        resumed: Arc::clone(&shared_resumed),
    })
    .with_capabilities(Capabilities::advanced());

    Battle::new(quick_rules(60))
        .with_robot(sweeper.at(StartPosition::new(300.0, 300.0, 0.0)))
        .with_robot(SittingDuck::spec("duck").at(StartPosition::new(500.0, 300.0, 0.0)))
        .run()
        .unwrap();

    let entries = entries.lock().unwrap().clone();
    assert!(entries.len() >= 2, "handler entered {entries:?}");
    assert!(entries.windows(2).all(|pair| pair[0] < pair[1]));
    assert_eq!(resumed.load(Ordering::SeqCst), 0);
}

/// Registers a condition that holds on one turn only.
struct Watcher {
    fired: Arc<Mutex<Vec<(u64, String, u8)>>>,
}

impl Robot for Watcher {
    fn run(&self, agent: &Agent<'_>) -> AgentResult<()> {
        agent.add_custom_event(Arc::new(Condition::new("turn-five", 60, |a| a.time() == 5)))?;
        idle(agent)
    }

    fn on_custom(&self, agent: &Agent<'_>, event: &CustomEvent) -> AgentResult<()> {
        let condition = &event.condition;
        self.fired.lock().unwrap().push((
            agent.time(),
            condition.name().to_owned(),
            condition.priority(),
        ));
        Ok(())
    }
}

#[test]
fn test_custom_condition_fires_on_the_turn_it_holds() {
    let fired = Arc::new(Mutex::new(Vec::new()));
    let shared = Arc::clone(&fired);
    let watcher = RobotSpec::new("watcher", move || Watcher {
        fired: Arc::clone(&shared),
    })
    .with_capabilities(Capabilities::advanced());

    Battle::new(quick_rules(20))
        .with_robot(watcher)
        .with_robot(SittingDuck::spec("duck"))
        .run()
        .unwrap();

    let fired = fired.lock().unwrap().clone();
    assert_eq!(fired, vec![(5, "turn-five".to_owned(), 60)]);
}
