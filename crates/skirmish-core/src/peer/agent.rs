//! The robot program interface and its agent-thread façade.

use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::Ordering;
use std::sync::Arc;

use glam::DVec2;
use tracing::warn;

use super::{guarded, panic_message, RobotPeer};
use crate::entity::{BulletId, Capabilities, RobotColors, RobotFlags, RobotState, TeamMessage};
use crate::error::{AgentError, AgentResult};
use crate::event::{
    BulletHitBulletEvent, BulletHitEvent, BulletInfo, BulletMissedEvent, Condition, CustomEvent,
    Dispatch, Event, EventKind, HitByBulletEvent, HitRobotEvent, HitWallEvent, MessageEvent,
    RobotDeathEvent, ScannedRobotEvent, SkippedTurnEvent,
};
use crate::rules::{BattleRules, MAX_BULLET_POWER, MAX_TURN_RATE, MAX_VELOCITY, MIN_BULLET_POWER};
use crate::sync::Wake;

// =============================================================================
// Robot
// =============================================================================

/// A robot program.
///
/// [`run`](Robot::run) is the robot's main loop; it runs on the robot's own
/// agent thread and drives the robot through the blocking calls on
/// [`Agent`]. Each blocking call ends the robot's turn. Events are delivered
/// through [`on_event`](Robot::on_event), whose default implementation fans
/// out to the typed handlers below.
///
/// Control transfers such as [`AgentError::Death`] and
/// [`AgentError::RoundOver`] arrive as errors from blocking calls; robots
/// should let them propagate with `?`.
///
/// # Example
///
/// ```
/// use skirmish_core::peer::{Agent, Robot};
/// use skirmish_core::event::ScannedRobotEvent;
/// use skirmish_core::AgentResult;
///
/// struct Turret;
///
/// impl Robot for Turret {
///     fn run(&self, agent: &Agent<'_>) -> AgentResult<()> {
///         loop {
///             agent.turn_gun(std::f64::consts::PI)?;
///         }
///     }
///
///     fn on_scanned_robot(&self, agent: &Agent<'_>, _event: &ScannedRobotEvent) -> AgentResult<()> {
///         agent.fire(1.0).map(|_| ())
///     }
/// }
/// ```
#[allow(unused_variables)]
pub trait Robot: Send {
    /// The robot's main loop.
    fn run(&self, agent: &Agent<'_>) -> AgentResult<()>;

    /// Handles one event.
    fn on_event(&self, agent: &Agent<'_>, event: &Event) -> AgentResult<()> {
        match event {
            Event::ScannedRobot(e) => self.on_scanned_robot(agent, e),
            Event::HitByBullet(e) => self.on_hit_by_bullet(agent, e),
            Event::HitWall(e) => self.on_hit_wall(agent, e),
            Event::HitRobot(e) => self.on_hit_robot(agent, e),
            Event::BulletHit(e) => self.on_bullet_hit(agent, e),
            Event::BulletHitBullet(e) => self.on_bullet_hit_bullet(agent, e),
            Event::BulletMissed(e) => self.on_bullet_missed(agent, e),
            Event::RobotDeath(e) => self.on_robot_death(agent, e),
            Event::Message(e) => self.on_message(agent, e),
            Event::Custom(e) => self.on_custom(agent, e),
            Event::SkippedTurn(e) => self.on_skipped_turn(agent, e),
            Event::Win => self.on_win(agent),
            Event::Death => self.on_death(agent),
        }
    }

    /// The radar swept over a robot.
    fn on_scanned_robot(&self, agent: &Agent<'_>, event: &ScannedRobotEvent) -> AgentResult<()> {
        Ok(())
    }

    /// Hit by a bullet.
    fn on_hit_by_bullet(&self, agent: &Agent<'_>, event: &HitByBulletEvent) -> AgentResult<()> {
        Ok(())
    }

    /// Drove into a wall.
    fn on_hit_wall(&self, agent: &Agent<'_>, event: &HitWallEvent) -> AgentResult<()> {
        Ok(())
    }

    /// Collided with a robot.
    fn on_hit_robot(&self, agent: &Agent<'_>, event: &HitRobotEvent) -> AgentResult<()> {
        Ok(())
    }

    /// Own bullet hit a robot.
    fn on_bullet_hit(&self, agent: &Agent<'_>, event: &BulletHitEvent) -> AgentResult<()> {
        Ok(())
    }

    /// Own bullet hit another bullet.
    fn on_bullet_hit_bullet(
        &self,
        agent: &Agent<'_>,
        event: &BulletHitBulletEvent,
    ) -> AgentResult<()> {
        Ok(())
    }

    /// Own bullet left the battlefield.
    fn on_bullet_missed(&self, agent: &Agent<'_>, event: &BulletMissedEvent) -> AgentResult<()> {
        Ok(())
    }

    /// Another robot died.
    fn on_robot_death(&self, agent: &Agent<'_>, event: &RobotDeathEvent) -> AgentResult<()> {
        Ok(())
    }

    /// A teammate sent a message.
    fn on_message(&self, agent: &Agent<'_>, event: &MessageEvent) -> AgentResult<()> {
        Ok(())
    }

    /// A custom condition held.
    fn on_custom(&self, agent: &Agent<'_>, event: &CustomEvent) -> AgentResult<()> {
        Ok(())
    }

    /// The robot missed a turn.
    fn on_skipped_turn(&self, agent: &Agent<'_>, event: &SkippedTurnEvent) -> AgentResult<()> {
        Ok(())
    }

    /// The robot won the round.
    fn on_win(&self, agent: &Agent<'_>) -> AgentResult<()> {
        Ok(())
    }

    /// The robot died.
    fn on_death(&self, agent: &Agent<'_>) -> AgentResult<()> {
        Ok(())
    }
}

// =============================================================================
// Agent
// =============================================================================

/// A robot's handle on the battle, usable only on its own agent thread.
///
/// `Agent` borrows the robot program, which is not `Sync`, so the handle can
/// neither be sent to nor shared with another thread.
///
/// Operations fall in three groups:
///
/// - **Getters** read the state published at the end of the last turn.
/// - **Setters** (`set_*`) record intent for the next turn without yielding.
/// - **Blocking calls** record intent, end the turn, and return once the
///   engine has run it and this robot's events have been handled.
///
/// Getters and setters count toward a per-turn call limit; a robot that
/// exceeds it without yielding is disabled.
pub struct Agent<'a> {
    peer: &'a RobotPeer,
    robot: &'a dyn Robot,
}

impl<'a> Agent<'a> {
    pub(crate) fn new(peer: &'a RobotPeer, robot: &'a dyn Robot) -> Self {
        Self { peer, robot }
    }

    // =========================================================================
    // Internals
    // =========================================================================

    fn view<R>(&self, f: impl FnOnce(&RobotState) -> R) -> R {
        f(&self.peer.lock_state())
    }

    fn view_mut<R>(&self, f: impl FnOnce(&mut RobotState) -> R) -> R {
        let mut view = self.peer.lock_state();
        self.peer.intent_pending.store(true, Ordering::Release);
        f(&mut view)
    }

    fn rules(&self) -> &BattleRules {
        self.peer.context().rules()
    }

    fn count_call(&self) {
        let limit = self.rules().max_calls_per_turn;
        let calls = self.peer.calls.fetch_add(1, Ordering::AcqRel) + 1;
        if calls == limit.saturating_add(1) {
            self.disable(&format!(
                "{calls} calls to getters or setters without yielding a turn"
            ));
        }
    }

    fn get<R>(&self, f: impl FnOnce(&RobotState) -> R) -> R {
        self.count_call();
        self.view(f)
    }

    fn require(&self, required: Capabilities, operation: &'static str) -> AgentResult<()> {
        if self.peer.capabilities().intersects(required) {
            Ok(())
        } else {
            Err(AgentError::NotPermitted {
                operation,
                required,
            })
        }
    }

    fn setter(&self, required: Capabilities, operation: &'static str) -> AgentResult<()> {
        self.count_call();
        self.require(required, operation)
    }

    fn disable(&self, reason: &str) {
        self.view_mut(|s| {
            s.flags |= RobotFlags::DISABLED;
            s.set_energy(0.0, false);
        });
        warn!(robot = %self.peer.name(), reason, "robot disabled");
        self.peer
            .system_message(format!("Robot disabled: {reason}"));
    }

    fn finite(&self, value: f64, operation: &str) -> AgentResult<f64> {
        if value.is_nan() {
            let reason = format!("NaN passed to {operation}");
            self.disable(&reason);
            Err(AgentError::Disabled(reason))
        } else {
            Ok(value)
        }
    }

    fn move_intent(&self, distance: f64, operation: &str) -> AgentResult<()> {
        let distance = self.finite(distance, operation)?;
        self.view_mut(|s| {
            if s.energy > 0.0 {
                s.intent.distance_remaining = distance;
            }
        });
        Ok(())
    }

    fn body_turn_intent(&self, radians: f64, operation: &str) -> AgentResult<()> {
        let radians = self.finite(radians, operation)?;
        self.view_mut(|s| {
            if s.energy > 0.0 {
                s.intent.body_turn_remaining = radians;
            }
        });
        Ok(())
    }

    fn gun_turn_intent(&self, radians: f64, operation: &str) -> AgentResult<()> {
        let radians = self.finite(radians, operation)?;
        self.view_mut(|s| s.intent.gun_turn_remaining = radians);
        Ok(())
    }

    fn radar_turn_intent(&self, radians: f64, operation: &str) -> AgentResult<()> {
        let radians = self.finite(radians, operation)?;
        self.view_mut(|s| s.intent.radar_turn_remaining = radians);
        Ok(())
    }

    fn fire_intent(&self, power: f64, operation: &str) -> AgentResult<Option<BulletInfo>> {
        let power = self.finite(power, operation)?;
        let owner = self.peer.name().to_owned();
        Ok(self.view_mut(|s| {
            if s.gun_heat > 0.0 || s.energy <= 0.0 || s.intent.fire_power.is_some() {
                return None;
            }
            let power = power.clamp(MIN_BULLET_POWER, MAX_BULLET_POWER).min(s.energy);
            s.intent.fire_power = Some(power);
            Some(BulletInfo {
                id: BulletId::new(s.id, s.shots_fired),
                owner,
                victim: None,
                heading: s.gun_heading,
                position: s.position,
                power,
                active: true,
            })
        }))
    }

    /// Ends the turn and handles this robot's events.
    fn yield_turn(&self) -> AgentResult<()> {
        self.refuse_inside_condition()?;
        let flags = self.view(|s| s.flags);
        if flags.contains(RobotFlags::DISABLED) {
            return Err(AgentError::Disabled("robot has been disabled".into()));
        }
        if flags.contains(RobotFlags::DEAD) {
            return Err(AgentError::Death);
        }

        self.peer.calls.store(0, Ordering::Release);
        match self.peer.sync().sleep() {
            Wake::Woken => {}
            Wake::Halted => return Err(self.halt_reason()),
            Wake::TimedOut => {
                warn!(robot = %self.peer.name(), "no wake from the engine, abandoning round");
                return Err(AgentError::RoundOver);
            }
        }

        self.process_events()?;
        if self.view(RobotState::is_alive) {
            Ok(())
        } else {
            Err(AgentError::Death)
        }
    }

    fn refuse_inside_condition(&self) -> AgentResult<()> {
        if self.peer.testing_condition.load(Ordering::Acquire) {
            self.peer.system_message(
                "You cannot take action inside a condition test. \
                 Blocking calls are not allowed there.",
            );
            return Err(AgentError::ConditionReentry);
        }
        Ok(())
    }

    fn halt_reason(&self) -> AgentError {
        let flags = self.view(|s| s.flags);
        if flags.contains(RobotFlags::DEAD) {
            AgentError::Death
        } else if flags.contains(RobotFlags::WINNER) {
            AgentError::Win
        } else {
            AgentError::RoundOver
        }
    }

    fn test_condition(&self, condition: &Condition) -> bool {
        let testing = &self.peer.testing_condition;
        let outer = testing.swap(true, Ordering::AcqRel);
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| condition.test(self)));
        testing.store(outer, Ordering::Release);
        outcome.unwrap_or_else(|payload| {
            self.peer.system_message(format!(
                "Condition {} failed: {}",
                condition.name(),
                panic_message(payload.as_ref())
            ));
            false
        })
    }

    /// Tests custom conditions and drains the event queue.
    fn process_events(&self) -> AgentResult<()> {
        let now = self.peer.context().time();
        let conditions = {
            let mut events = self.peer.lock_events();
            events.clear_old(now);
            events.conditions()
        };
        for condition in conditions {
            if self.test_condition(&condition) {
                self.peer.add_custom_event(condition, now);
            }
        }

        loop {
            let step = self.peer.lock_events().next_dispatch(now);
            let delivery = match step {
                Dispatch::Idle => return Ok(()),
                Dispatch::Interrupt { priority } => {
                    return Err(AgentError::Interrupted { priority })
                }
                Dispatch::Deliver(delivery) => delivery,
            };

            let result = guarded(|| self.robot.on_event(self, &delivery.event));
            let completed = !matches!(result, Err(AgentError::Interrupted { .. }));
            self.peer
                .lock_events()
                .finish_dispatch(&delivery, completed);

            match result {
                Ok(()) | Err(AgentError::Interrupted { .. }) => {}
                Err(e) if e.is_terminal() => return Err(e),
                Err(e) => self.peer.system_message(format!(
                    "Error in handler for {}: {e}",
                    delivery.event.kind()
                )),
            }
            if matches!(delivery.event, Event::Death) {
                return Err(AgentError::Death);
            }
        }
    }

    /// Runs the robot's main loop, then idles until the round is over for it.
    ///
    /// Returns the terminal error that ended the robot's participation.
    pub(crate) fn run_to_completion(&self) -> AgentError {
        let mut result = guarded(|| self.robot.run(self));
        loop {
            match result {
                Err(e) if e.is_terminal() => return e,
                Err(e) => self
                    .peer
                    .system_message(format!("{} has stopped: {e}", self.peer.name())),
                Ok(()) => {}
            }
            result = guarded(|| self.yield_turn());
        }
    }

    fn until(&self, done: impl Fn(&RobotState) -> bool) -> AgentResult<()> {
        loop {
            self.yield_turn()?;
            if self.view(&done) {
                return Ok(());
            }
        }
    }

    // =========================================================================
    // Getters
    // =========================================================================

    /// Robot name.
    #[must_use]
    pub fn name(&self) -> String {
        self.count_call();
        self.peer.name().to_owned()
    }

    /// X coordinate of the robot's center.
    #[must_use]
    pub fn x(&self) -> f64 {
        self.get(|s| s.position.x)
    }

    /// Y coordinate of the robot's center.
    #[must_use]
    pub fn y(&self) -> f64 {
        self.get(|s| s.position.y)
    }

    /// Center of the robot.
    #[must_use]
    pub fn position(&self) -> DVec2 {
        self.get(|s| s.position)
    }

    /// Body heading in radians.
    #[must_use]
    pub fn heading(&self) -> f64 {
        self.get(|s| s.heading)
    }

    /// Gun heading in radians.
    #[must_use]
    pub fn gun_heading(&self) -> f64 {
        self.get(|s| s.gun_heading)
    }

    /// Radar heading in radians.
    #[must_use]
    pub fn radar_heading(&self) -> f64 {
        self.get(|s| s.radar_heading)
    }

    /// Signed velocity.
    #[must_use]
    pub fn velocity(&self) -> f64 {
        self.get(|s| s.velocity)
    }

    /// Energy.
    #[must_use]
    pub fn energy(&self) -> f64 {
        self.get(|s| s.energy)
    }

    /// Gun heat; the gun can fire at zero.
    #[must_use]
    pub fn gun_heat(&self) -> f64 {
        self.get(|s| s.gun_heat)
    }

    /// Distance left to drive.
    #[must_use]
    pub fn distance_remaining(&self) -> f64 {
        self.get(|s| s.intent.distance_remaining)
    }

    /// Body turn left, in radians.
    #[must_use]
    pub fn turn_remaining(&self) -> f64 {
        self.get(|s| s.intent.body_turn_remaining)
    }

    /// Gun turn left, in radians.
    #[must_use]
    pub fn gun_turn_remaining(&self) -> f64 {
        self.get(|s| s.intent.gun_turn_remaining)
    }

    /// Radar turn left, in radians.
    #[must_use]
    pub fn radar_turn_remaining(&self) -> f64 {
        self.get(|s| s.intent.radar_turn_remaining)
    }

    /// Returns `true` once the robot has been disabled.
    #[must_use]
    pub fn is_disabled(&self) -> bool {
        self.get(|s| s.flags.contains(RobotFlags::DISABLED))
    }

    /// Current turn.
    #[must_use]
    pub fn time(&self) -> u64 {
        self.count_call();
        self.peer.context().time()
    }

    /// Number of other robots still alive.
    #[must_use]
    pub fn others(&self) -> u32 {
        self.count_call();
        let alive = self.peer.context().alive();
        if self.view(RobotState::is_alive) {
            alive.saturating_sub(1)
        } else {
            alive
        }
    }

    /// Current round, zero based.
    #[must_use]
    pub fn round_num(&self) -> u32 {
        self.count_call();
        self.peer.context().round()
    }

    /// Rounds in the battle.
    #[must_use]
    pub fn num_rounds(&self) -> u32 {
        self.count_call();
        self.rules().num_rounds
    }

    /// Battlefield width.
    #[must_use]
    pub fn battlefield_width(&self) -> f64 {
        self.count_call();
        self.rules().battlefield_width
    }

    /// Battlefield height.
    #[must_use]
    pub fn battlefield_height(&self) -> f64 {
        self.count_call();
        self.rules().battlefield_height
    }

    /// Gun heat lost per turn.
    #[must_use]
    pub fn gun_cooling_rate(&self) -> f64 {
        self.count_call();
        self.rules().gun_cooling_rate
    }

    /// Names of the robot's teammates, in roster order.
    #[must_use]
    pub fn teammates(&self) -> Vec<String> {
        self.count_call();
        let Some(team) = self.peer.team() else {
            return Vec::new();
        };
        self.peer
            .context()
            .roster()
            .iter()
            .filter(|entry| entry.team == Some(team) && entry.name != self.peer.name())
            .map(|entry| entry.name.clone())
            .collect()
    }

    /// Returns `true` if `name` is on the robot's team.
    #[must_use]
    pub fn is_teammate(&self, name: &str) -> bool {
        self.count_call();
        let Some(team) = self.peer.team() else {
            return false;
        };
        self.peer
            .context()
            .roster()
            .iter()
            .any(|entry| entry.team == Some(team) && entry.name == name)
    }

    /// Current priority of an event kind.
    #[must_use]
    pub fn event_priority(&self, kind: EventKind) -> u8 {
        self.count_call();
        self.peer.lock_events().priority(kind)
    }

    /// Writes a line to the robot's output.
    pub fn print(&self, line: impl Into<String>) {
        self.peer.lock_output().push(line);
    }

    // =========================================================================
    // Setters
    // =========================================================================

    /// Sets the distance to drive; negative drives backwards.
    ///
    /// # Errors
    ///
    /// Requires [`Capabilities::ADVANCED`]; NaN disables the robot.
    pub fn set_move(&self, distance: f64) -> AgentResult<()> {
        self.setter(Capabilities::ADVANCED, "set_move")?;
        self.move_intent(distance, "set_move")
    }

    /// Sets the body turn in radians; positive turns clockwise.
    ///
    /// # Errors
    ///
    /// Requires [`Capabilities::ADVANCED`]; NaN disables the robot.
    pub fn set_turn_body(&self, radians: f64) -> AgentResult<()> {
        self.setter(Capabilities::ADVANCED, "set_turn_body")?;
        self.body_turn_intent(radians, "set_turn_body")
    }

    /// Sets the gun turn in radians.
    ///
    /// # Errors
    ///
    /// Requires [`Capabilities::ADVANCED`]; NaN disables the robot.
    pub fn set_turn_gun(&self, radians: f64) -> AgentResult<()> {
        self.setter(Capabilities::ADVANCED, "set_turn_gun")?;
        self.gun_turn_intent(radians, "set_turn_gun")
    }

    /// Sets the radar turn in radians.
    ///
    /// # Errors
    ///
    /// Requires [`Capabilities::ADVANCED`]; NaN disables the robot.
    pub fn set_turn_radar(&self, radians: f64) -> AgentResult<()> {
        self.setter(Capabilities::ADVANCED, "set_turn_radar")?;
        self.radar_turn_intent(radians, "set_turn_radar")
    }

    /// Requests a shot on the next turn.
    ///
    /// Returns the bullet that will be fired, or `None` if the gun is hot,
    /// the robot has no energy, or a shot is already pending.
    ///
    /// # Errors
    ///
    /// Requires [`Capabilities::ADVANCED`]; NaN disables the robot.
    pub fn set_fire(&self, power: f64) -> AgentResult<Option<BulletInfo>> {
        self.setter(Capabilities::ADVANCED, "set_fire")?;
        self.fire_intent(power, "set_fire")
    }

    /// Caps the robot's speed.
    ///
    /// # Errors
    ///
    /// Requires [`Capabilities::ADVANCED`]; NaN disables the robot.
    pub fn set_max_velocity(&self, velocity: f64) -> AgentResult<()> {
        self.setter(Capabilities::ADVANCED, "set_max_velocity")?;
        let velocity = self.finite(velocity, "set_max_velocity")?;
        self.view_mut(|s| s.intent.max_velocity = velocity.clamp(0.0, MAX_VELOCITY));
        Ok(())
    }

    /// Caps the robot's body turn rate, in radians per turn.
    ///
    /// # Errors
    ///
    /// Requires [`Capabilities::ADVANCED`]; NaN disables the robot.
    pub fn set_max_turn_rate(&self, radians: f64) -> AgentResult<()> {
        self.setter(Capabilities::ADVANCED, "set_max_turn_rate")?;
        let radians = self.finite(radians, "set_max_turn_rate")?;
        self.view_mut(|s| s.intent.max_turn_rate = radians.clamp(0.0, MAX_TURN_RATE));
        Ok(())
    }

    /// Keeps the gun still in world space while the body turns.
    ///
    /// # Errors
    ///
    /// Requires [`Capabilities::STANDARD`].
    pub fn set_adjust_gun_for_body_turn(&self, adjust: bool) -> AgentResult<()> {
        self.setter(Capabilities::STANDARD, "set_adjust_gun_for_body_turn")?;
        self.view_mut(|s| s.intent.adjust_gun_for_body_turn = adjust);
        Ok(())
    }

    /// Keeps the radar still in world space while the gun turns.
    ///
    /// Also applies to body turns unless
    /// [`set_adjust_radar_for_body_turn`](Self::set_adjust_radar_for_body_turn)
    /// was called.
    ///
    /// # Errors
    ///
    /// Requires [`Capabilities::STANDARD`].
    pub fn set_adjust_radar_for_gun_turn(&self, adjust: bool) -> AgentResult<()> {
        self.setter(Capabilities::STANDARD, "set_adjust_radar_for_gun_turn")?;
        self.view_mut(|s| {
            s.intent.adjust_radar_for_gun_turn = adjust;
            if !s.intent.adjust_radar_for_body_turn_set {
                s.intent.adjust_radar_for_body_turn = adjust;
            }
        });
        Ok(())
    }

    /// Keeps the radar still in world space while the body turns.
    ///
    /// # Errors
    ///
    /// Requires [`Capabilities::STANDARD`].
    pub fn set_adjust_radar_for_body_turn(&self, adjust: bool) -> AgentResult<()> {
        self.setter(Capabilities::STANDARD, "set_adjust_radar_for_body_turn")?;
        self.view_mut(|s| {
            s.intent.adjust_radar_for_body_turn = adjust;
            s.intent.adjust_radar_for_body_turn_set = true;
        });
        Ok(())
    }

    /// Parks remaining movement; see [`RobotState::stop`].
    ///
    /// # Errors
    ///
    /// Requires [`Capabilities::ADVANCED`].
    pub fn set_stop(&self, overwrite: bool) -> AgentResult<()> {
        self.setter(Capabilities::ADVANCED, "set_stop")?;
        self.view_mut(|s| s.stop(overwrite));
        Ok(())
    }

    /// Restores movement parked by a stop.
    ///
    /// # Errors
    ///
    /// Requires [`Capabilities::ADVANCED`].
    pub fn set_resume(&self) -> AgentResult<()> {
        self.setter(Capabilities::ADVANCED, "set_resume")?;
        self.view_mut(RobotState::resume);
        Ok(())
    }

    /// Scans on the next turn even if the radar does not move.
    ///
    /// # Errors
    ///
    /// Requires [`Capabilities::ADVANCED`].
    pub fn set_scan(&self) -> AgentResult<()> {
        self.setter(Capabilities::ADVANCED, "set_scan")?;
        self.view_mut(|s| s.intent.scan = true);
        Ok(())
    }

    /// Sets the robot's display colors.
    ///
    /// # Errors
    ///
    /// Requires [`Capabilities::STANDARD`] or [`Capabilities::JUNIOR`].
    pub fn set_colors(&self, colors: RobotColors) -> AgentResult<()> {
        self.setter(Capabilities::STANDARD | Capabilities::JUNIOR, "set_colors")?;
        self.view_mut(|s| s.colors = colors);
        Ok(())
    }

    /// Changes the priority of an event kind for this robot.
    ///
    /// Values outside `0..=99` are clamped; system events keep their priority.
    ///
    /// # Errors
    ///
    /// Requires [`Capabilities::ADVANCED`].
    pub fn set_event_priority(&self, kind: EventKind, priority: i32) -> AgentResult<()> {
        self.setter(Capabilities::ADVANCED, "set_event_priority")?;
        match self.peer.lock_events().set_priority(kind, priority) {
            None => self.peer.system_message(format!(
                "Changing the priority of {kind} is not allowed."
            )),
            Some(stored) if i32::from(stored) != priority => self.peer.system_message(format!(
                "Priority for {kind} must be between 0 and 99; using {stored}."
            )),
            Some(_) => {}
        }
        Ok(())
    }

    /// Lets newer events at the running handler's priority interrupt it.
    ///
    /// # Errors
    ///
    /// Requires [`Capabilities::ADVANCED`].
    pub fn set_interruptible(&self, interruptible: bool) -> AgentResult<()> {
        self.setter(Capabilities::ADVANCED, "set_interruptible")?;
        self.peer.lock_events().set_interruptible(interruptible);
        Ok(())
    }

    /// Registers a condition tested every turn.
    ///
    /// # Errors
    ///
    /// Requires [`Capabilities::ADVANCED`].
    pub fn add_custom_event(&self, condition: Arc<Condition>) -> AgentResult<()> {
        self.setter(Capabilities::ADVANCED, "add_custom_event")?;
        self.peer.lock_events().add_condition(condition);
        Ok(())
    }

    /// Unregisters a condition.
    ///
    /// # Errors
    ///
    /// Requires [`Capabilities::ADVANCED`].
    pub fn remove_custom_event(&self, condition: &Arc<Condition>) -> AgentResult<()> {
        self.setter(Capabilities::ADVANCED, "remove_custom_event")?;
        self.peer.lock_events().remove_condition(condition);
        Ok(())
    }

    /// Drops every queued event except system events.
    ///
    /// # Errors
    ///
    /// Requires [`Capabilities::ADVANCED`].
    pub fn clear_all_events(&self) -> AgentResult<()> {
        self.setter(Capabilities::ADVANCED, "clear_all_events")?;
        self.peer.lock_events().clear(false);
        Ok(())
    }

    /// Queued events in delivery order.
    ///
    /// # Errors
    ///
    /// Requires [`Capabilities::ADVANCED`].
    pub fn all_events(&self) -> AgentResult<Vec<Event>> {
        self.setter(Capabilities::ADVANCED, "all_events")?;
        Ok(self.peer.lock_events().events().cloned().collect())
    }

    /// Sends a message to every teammate.
    ///
    /// # Errors
    ///
    /// Requires [`Capabilities::TEAM`].
    pub fn broadcast_message(&self, message: impl Into<String>) -> AgentResult<()> {
        self.queue_message(None, message.into(), "broadcast_message")
    }

    /// Sends a message to the teammates whose names start with `recipient`.
    ///
    /// # Errors
    ///
    /// Requires [`Capabilities::TEAM`].
    pub fn send_message(&self, recipient: &str, message: impl Into<String>) -> AgentResult<()> {
        self.queue_message(Some(recipient.to_owned()), message.into(), "send_message")
    }

    fn queue_message(
        &self,
        recipient: Option<String>,
        body: String,
        operation: &'static str,
    ) -> AgentResult<()> {
        self.setter(Capabilities::TEAM, operation)?;
        let sender = self.peer.name().to_owned();
        self.view_mut(|s| {
            s.intent.messages.push(TeamMessage {
                sender,
                recipient,
                body,
            });
        });
        Ok(())
    }

    // =========================================================================
    // Blocking calls
    // =========================================================================

    /// Ends the turn with whatever intent is set.
    ///
    /// # Errors
    ///
    /// Returns the control transfer that ended the robot's round, or
    /// [`AgentError::Interrupted`] inside an interruptible handler.
    pub fn execute(&self) -> AgentResult<()> {
        self.require(Capabilities::BASIC, "execute")?;
        self.yield_turn()
    }

    /// Ends the turn without changing anything.
    ///
    /// # Errors
    ///
    /// As for [`execute`](Self::execute).
    pub fn do_nothing(&self) -> AgentResult<()> {
        self.execute()
    }

    /// Drives forward until the distance is covered.
    ///
    /// # Errors
    ///
    /// As for [`execute`](Self::execute); NaN disables the robot.
    pub fn move_ahead(&self, distance: f64) -> AgentResult<()> {
        self.require(Capabilities::BASIC, "move_ahead")?;
        self.move_intent(distance, "move_ahead")?;
        self.until(|s| s.intent.distance_remaining == 0.0)
    }

    /// Drives backwards until the distance is covered.
    ///
    /// # Errors
    ///
    /// As for [`execute`](Self::execute); NaN disables the robot.
    pub fn move_back(&self, distance: f64) -> AgentResult<()> {
        self.require(Capabilities::BASIC, "move_back")?;
        self.move_intent(-distance, "move_back")?;
        self.until(|s| s.intent.distance_remaining == 0.0)
    }

    /// Turns the body until the turn is complete.
    ///
    /// # Errors
    ///
    /// As for [`execute`](Self::execute); NaN disables the robot.
    pub fn turn_body(&self, radians: f64) -> AgentResult<()> {
        self.require(Capabilities::BASIC, "turn_body")?;
        self.body_turn_intent(radians, "turn_body")?;
        self.until(|s| s.intent.body_turn_remaining == 0.0)
    }

    /// Turns the gun until the turn is complete.
    ///
    /// # Errors
    ///
    /// As for [`execute`](Self::execute); NaN disables the robot.
    pub fn turn_gun(&self, radians: f64) -> AgentResult<()> {
        self.require(Capabilities::BASIC, "turn_gun")?;
        self.gun_turn_intent(radians, "turn_gun")?;
        self.until(|s| s.intent.gun_turn_remaining == 0.0)
    }

    /// Turns the radar until the turn is complete.
    ///
    /// # Errors
    ///
    /// As for [`execute`](Self::execute); NaN disables the robot.
    pub fn turn_radar(&self, radians: f64) -> AgentResult<()> {
        self.require(Capabilities::BASIC, "turn_radar")?;
        self.radar_turn_intent(radians, "turn_radar")?;
        self.until(|s| s.intent.radar_turn_remaining == 0.0)
    }

    /// Fires and ends the turn.
    ///
    /// Returns the bullet, or `None` if the gun could not fire.
    ///
    /// # Errors
    ///
    /// As for [`execute`](Self::execute); NaN disables the robot.
    pub fn fire(&self, power: f64) -> AgentResult<Option<BulletInfo>> {
        self.require(Capabilities::BASIC, "fire")?;
        let bullet = self.fire_intent(power, "fire")?;
        self.yield_turn()?;
        Ok(bullet)
    }

    /// Ends turns until the condition holds.
    ///
    /// # Errors
    ///
    /// Requires [`Capabilities::STANDARD`]; otherwise as for
    /// [`execute`](Self::execute).
    pub fn wait_for(&self, condition: &Condition) -> AgentResult<()> {
        self.require(Capabilities::STANDARD, "wait_for")?;
        self.refuse_inside_condition()?;
        while !self.test_condition(condition) {
            self.yield_turn()?;
        }
        Ok(())
    }

    /// Stops and ends the turn.
    ///
    /// # Errors
    ///
    /// Requires [`Capabilities::STANDARD`]; otherwise as for
    /// [`execute`](Self::execute).
    pub fn stop(&self, overwrite: bool) -> AgentResult<()> {
        self.require(Capabilities::STANDARD, "stop")?;
        self.view_mut(|s| s.stop(overwrite));
        self.yield_turn()
    }

    /// Resumes parked movement and ends the turn.
    ///
    /// # Errors
    ///
    /// Requires [`Capabilities::STANDARD`]; otherwise as for
    /// [`execute`](Self::execute).
    pub fn resume(&self) -> AgentResult<()> {
        self.require(Capabilities::STANDARD, "resume")?;
        self.view_mut(RobotState::resume);
        self.yield_turn()
    }

    /// Scans and ends the turn.
    ///
    /// Called from a scanned-robot handler, a new scan result restarts that
    /// handler.
    ///
    /// # Errors
    ///
    /// Requires [`Capabilities::STANDARD`]; otherwise as for
    /// [`execute`](Self::execute).
    pub fn scan(&self) -> AgentResult<()> {
        self.require(Capabilities::STANDARD, "scan")?;
        let restore = {
            let mut events = self.peer.lock_events();
            let priority = events.priority(EventKind::ScannedRobot);
            (events.current_top() == Some(priority)).then(|| {
                let previous = events.is_interruptible(priority);
                events.set_interruptible_at(priority, true);
                (priority, previous)
            })
        };
        self.view_mut(|s| s.intent.scan = true);
        let result = self.yield_turn();
        if let Some((priority, previous)) = restore {
            self.peer
                .lock_events()
                .set_interruptible_at(priority, previous);
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::RobotId;
    use crate::peer::{BattleContext, RosterEntry};
    use crate::rules::BattleRules;
    use std::cell::Cell;
    use std::sync::Mutex;

    struct Idle;

    impl Robot for Idle {
        fn run(&self, _agent: &Agent<'_>) -> AgentResult<()> {
            Ok(())
        }
    }

    fn peer_with(capabilities: Capabilities, rules: BattleRules) -> RobotPeer {
        let state = RobotState::new(
            RobotId::new(0),
            "alpha",
            None,
            capabilities,
            RobotFlags::empty(),
            DVec2::new(100.0, 100.0),
            0.0,
        );
        let context = Arc::new(BattleContext::new(
            rules,
            vec![RosterEntry {
                name: "alpha".into(),
                team: None,
            }],
        ));
        RobotPeer::new(state, context)
    }

    #[test]
    fn setters_record_intent() {
        let peer = peer_with(Capabilities::advanced(), BattleRules::default());
        let agent = Agent::new(&peer, &Idle);
        agent.set_move(100.0).unwrap();
        agent.set_turn_gun(0.5).unwrap();
        agent.set_max_velocity(12.0).unwrap();
        let state = peer.state();
        assert!((state.intent.distance_remaining - 100.0).abs() < 1e-12);
        assert!((state.intent.gun_turn_remaining - 0.5).abs() < 1e-12);
        assert!((state.intent.max_velocity - MAX_VELOCITY).abs() < 1e-12);
    }

    #[test]
    fn standard_robot_cannot_use_advanced_setters() {
        let peer = peer_with(Capabilities::standard(), BattleRules::default());
        let agent = Agent::new(&peer, &Idle);
        assert!(matches!(
            agent.set_move(10.0),
            Err(AgentError::NotPermitted {
                operation: "set_move",
                ..
            })
        ));
        assert!(agent.set_adjust_gun_for_body_turn(true).is_ok());
        assert!(matches!(
            agent.broadcast_message("hi"),
            Err(AgentError::NotPermitted { .. })
        ));
    }

    #[test]
    fn nan_disables_robot() {
        let peer = peer_with(Capabilities::advanced(), BattleRules::default());
        let agent = Agent::new(&peer, &Idle);
        assert!(matches!(agent.set_turn_body(f64::NAN), Err(AgentError::Disabled(_))));
        assert!(agent.is_disabled());
        assert_eq!(agent.energy(), 0.0);
        assert!(peer.output().contains("Robot disabled"));
        // Blocking calls refuse to run once disabled
        assert!(matches!(agent.execute(), Err(AgentError::Disabled(_))));
    }

    #[test]
    fn call_limit_disables_robot() {
        let rules = BattleRules {
            max_calls_per_turn: 5,
            ..BattleRules::default()
        };
        let peer = peer_with(Capabilities::advanced(), rules);
        let agent = Agent::new(&peer, &Idle);
        for _ in 0..5 {
            let _ = agent.x();
        }
        assert!(!peer.state().flags.contains(RobotFlags::DISABLED));
        let _ = agent.y();
        assert!(peer.state().flags.contains(RobotFlags::DISABLED));
    }

    #[test]
    fn fire_respects_gun_heat_and_pending_shot() {
        let peer = peer_with(Capabilities::advanced(), BattleRules::default());
        let agent = Agent::new(&peer, &Idle);
        // Initial gun heat blocks the first shot
        assert_eq!(agent.set_fire(1.0).unwrap(), None);

        peer.lock_state().gun_heat = 0.0;
        let bullet = agent.set_fire(5.0).unwrap().unwrap();
        assert!((bullet.power - MAX_BULLET_POWER).abs() < 1e-12);
        assert_eq!(bullet.id.owner(), RobotId::new(0));
        assert_eq!(agent.set_fire(1.0).unwrap(), None);
    }

    #[test]
    fn adjust_radar_for_gun_follows_body_until_set() {
        let peer = peer_with(Capabilities::advanced(), BattleRules::default());
        let agent = Agent::new(&peer, &Idle);
        agent.set_adjust_radar_for_gun_turn(true).unwrap();
        assert!(peer.state().intent.adjust_radar_for_body_turn);

        agent.set_adjust_radar_for_body_turn(false).unwrap();
        agent.set_adjust_radar_for_gun_turn(true).unwrap();
        assert!(!peer.state().intent.adjust_radar_for_body_turn);
    }

    #[test]
    fn blocking_call_inside_condition_is_rejected() {
        let peer = peer_with(Capabilities::advanced(), BattleRules::default());
        let agent = Agent::new(&peer, &Idle);
        let seen = Cell::new(None);
        let condition = Condition::new("nested", 50, |a| {
            let _ = a.execute();
            true
        });
        // The nested execute must fail without sleeping
        peer.testing_condition.store(true, Ordering::Release);
        seen.set(Some(agent.execute()));
        peer.testing_condition.store(false, Ordering::Release);
        assert_eq!(seen.take(), Some(Err(AgentError::ConditionReentry)));
        assert!(agent.test_condition(&condition));
        assert!(peer.output().contains("inside a condition test"));
    }

    #[test]
    fn nested_condition_keeps_blocking_calls_refused() {
        let peer = peer_with(Capabilities::advanced(), BattleRules::default());
        let agent = Agent::new(&peer, &Idle);
        // A blocking call that got through would return at once
        peer.sync().halt();

        let seen = Arc::new(Mutex::new(None));
        let record = Arc::clone(&seen);
        let outer = Condition::new("outer", 50, move |a| {
            let waited = a.wait_for(&Condition::new("inner", 50, |_| false));
            let tested = a.test_condition(&Condition::new("inner", 50, |_| true));
            // The inner test must not clear the outer guard
            let executed = a.execute();
            *record.lock().unwrap() = Some((waited, tested, executed));
            true
        });
        assert!(agent.test_condition(&outer));

        let (waited, tested, executed) = seen.lock().unwrap().take().unwrap();
        assert_eq!(waited, Err(AgentError::ConditionReentry));
        assert!(tested);
        assert_eq!(executed, Err(AgentError::ConditionReentry));
        assert!(!peer.testing_condition.load(Ordering::Acquire));
    }

    #[test]
    fn late_commands_survive_publish() {
        let peer = peer_with(Capabilities::advanced(), BattleRules::default());
        let agent = Agent::new(&peer, &Idle);
        let mut engine = peer.state();
        peer.collect_intent(&mut engine);

        // Recorded after the engine collected this turn's intent
        agent.set_move(100.0).unwrap();
        engine.position = DVec2::new(120.0, 100.0);
        peer.publish(&engine);
        let view = peer.state();
        assert_eq!(view.position, DVec2::new(120.0, 100.0));
        assert!((view.intent.distance_remaining - 100.0).abs() < 1e-12);

        peer.collect_intent(&mut engine);
        assert!((engine.intent.distance_remaining - 100.0).abs() < 1e-12);

        engine.intent.distance_remaining = 92.0;
        peer.publish(&engine);
        assert!((peer.state().intent.distance_remaining - 92.0).abs() < 1e-12);
    }

    #[test]
    fn system_priority_change_is_refused() {
        let peer = peer_with(Capabilities::advanced(), BattleRules::default());
        let agent = Agent::new(&peer, &Idle);
        agent.set_event_priority(EventKind::Death, 1).unwrap();
        assert_eq!(agent.event_priority(EventKind::Death), 100);
        assert!(peer.output().contains("not allowed"));
        agent.set_event_priority(EventKind::ScannedRobot, 40).unwrap();
        assert_eq!(agent.event_priority(EventKind::ScannedRobot), 40);
    }

    #[test]
    fn stop_and_resume_setters() {
        let peer = peer_with(Capabilities::advanced(), BattleRules::default());
        let agent = Agent::new(&peer, &Idle);
        agent.set_move(80.0).unwrap();
        agent.set_stop(false).unwrap();
        assert_eq!(agent.distance_remaining(), 0.0);
        agent.set_resume().unwrap();
        assert!((agent.distance_remaining() - 80.0).abs() < 1e-12);
    }
}
