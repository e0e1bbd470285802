//! Per-robot event queue and dispatch bookkeeping.
//!
//! The manager holds the queue, the robot's priority table, the registered
//! custom conditions, and the "current top" priority of the handler being
//! run. It never calls robot code itself: the agent thread asks for the next
//! [`Dispatch`] step, runs the handler without holding the lock, then reports
//! back through [`EventManager::finish_dispatch`]. That split lets a handler
//! make blocking calls that re-enter dispatch for higher priority events.

use std::sync::Arc;

use super::{Condition, CustomEvent, Event, EventKind, QueuedEvent, MAX_USER_PRIORITY, SYSTEM_PRIORITY};

/// Events older than this many turns are discarded unless they are system events.
const MAX_EVENT_AGE: u64 = 2;

/// Largest number of events a robot may have queued.
pub const MAX_QUEUE_SIZE: usize = 256;

/// What the agent should do next while draining its queue.
#[derive(Debug)]
pub enum Dispatch {
    /// Nothing left to deliver at or above the current handler's priority.
    Idle,
    /// A new event arrived at the running handler's priority and that
    /// handler is interruptible; abandon it.
    Interrupt {
        /// Priority of the abandoned handler
        priority: u8,
    },
    /// Run the handler for this event.
    Deliver(Delivery),
}

/// An event taken off the queue for delivery.
#[derive(Debug)]
pub struct Delivery {
    /// The event
    pub event: Event,
    /// Priority it was queued at
    pub priority: u8,
    previous_top: Option<u8>,
}

/// A robot's event queue.
#[derive(Debug)]
pub struct EventManager {
    queue: Vec<QueuedEvent>,
    priorities: [u8; EventKind::COUNT],
    interruptible: [bool; SYSTEM_PRIORITY as usize + 1],
    current_top: Option<u8>,
    conditions: Vec<Arc<Condition>>,
    next_sequence: u64,
}

impl Default for EventManager {
    fn default() -> Self {
        Self::new()
    }
}

impl EventManager {
    /// Creates an empty manager with default priorities.
    #[must_use]
    pub fn new() -> Self {
        Self {
            queue: Vec::new(),
            priorities: EventKind::ALL.map(EventKind::default_priority),
            interruptible: [false; SYSTEM_PRIORITY as usize + 1],
            current_top: None,
            conditions: Vec::new(),
            next_sequence: 0,
        }
    }

    // =========================================================================
    // Queue
    // =========================================================================

    /// Queues an event at the robot's priority for its kind.
    ///
    /// Returns `false` and drops the event when the queue is full.
    pub fn add(&mut self, event: Event, time: u64) -> bool {
        if self.queue.len() >= MAX_QUEUE_SIZE {
            return false;
        }
        let priority = match &event {
            Event::Custom(custom) => custom.condition.priority(),
            other => self.priorities[other.kind().index()],
        };
        let queued = QueuedEvent {
            event,
            priority,
            time,
            sequence: self.next_sequence,
        };
        self.next_sequence += 1;
        let at = self.queue.partition_point(|e| *e <= queued);
        self.queue.insert(at, queued);
        true
    }

    /// Number of queued events.
    #[must_use]
    pub fn len(&self) -> usize {
        self.queue.len()
    }

    /// Returns `true` if nothing is queued.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Queued events in delivery order.
    pub fn events(&self) -> impl Iterator<Item = &Event> {
        self.queue.iter().map(|q| &q.event)
    }

    /// Discards non-system events at least [`MAX_EVENT_AGE`] turns old.
    pub fn clear_old(&mut self, now: u64) {
        if let Some(cutoff) = now.checked_sub(MAX_EVENT_AGE) {
            self.queue
                .retain(|q| q.event.kind().is_system() || q.time > cutoff);
        }
    }

    /// Empties the queue, keeping system events unless `include_system`.
    pub fn clear(&mut self, include_system: bool) {
        if include_system {
            self.queue.clear();
        } else {
            self.queue.retain(|q| q.event.kind().is_system());
        }
    }

    /// Forgets everything at the end of a round.
    pub fn reset(&mut self) {
        *self = Self::new();
    }

    // =========================================================================
    // Priorities
    // =========================================================================

    /// Current priority for an event kind.
    #[must_use]
    pub fn priority(&self, kind: EventKind) -> u8 {
        self.priorities[kind.index()]
    }

    /// Changes the priority of an event kind.
    ///
    /// The value is clamped to `0..=99`. Returns the priority actually
    /// stored, or `None` if the kind is a system event and cannot change.
    pub fn set_priority(&mut self, kind: EventKind, priority: i32) -> Option<u8> {
        if kind.is_system() {
            return None;
        }
        let clamped = u8::try_from(priority.clamp(0, i32::from(MAX_USER_PRIORITY))).unwrap_or(0);
        self.priorities[kind.index()] = clamped;
        Some(clamped)
    }

    /// Priority of the handler currently running, if any.
    #[must_use]
    pub fn current_top(&self) -> Option<u8> {
        self.current_top
    }

    /// Marks the running handler's priority as interruptible by newer events
    /// of the same priority. Has no effect outside a handler.
    pub fn set_interruptible(&mut self, interruptible: bool) {
        if let Some(top) = self.current_top {
            self.interruptible[usize::from(top)] = interruptible;
        }
    }

    /// Returns `true` if handlers at `priority` may be interrupted.
    #[must_use]
    pub fn is_interruptible(&self, priority: u8) -> bool {
        self.interruptible
            .get(usize::from(priority))
            .copied()
            .unwrap_or(false)
    }

    /// Sets the interruptible flag for a specific priority.
    pub fn set_interruptible_at(&mut self, priority: u8, interruptible: bool) {
        if let Some(slot) = self.interruptible.get_mut(usize::from(priority)) {
            *slot = interruptible;
        }
    }

    // =========================================================================
    // Custom conditions
    // =========================================================================

    /// Registers a condition; registering the same condition twice is a no-op.
    pub fn add_condition(&mut self, condition: Arc<Condition>) {
        if !self.conditions.iter().any(|c| Arc::ptr_eq(c, &condition)) {
            self.conditions.push(condition);
        }
    }

    /// Unregisters a condition.
    pub fn remove_condition(&mut self, condition: &Arc<Condition>) {
        self.conditions.retain(|c| !Arc::ptr_eq(c, condition));
    }

    /// Snapshot of the registered conditions, for testing off the lock.
    #[must_use]
    pub fn conditions(&self) -> Vec<Arc<Condition>> {
        self.conditions.clone()
    }

    /// Queues a custom event for a condition that held.
    pub fn add_custom(&mut self, condition: Arc<Condition>, time: u64) -> bool {
        self.add(Event::Custom(CustomEvent { condition }), time)
    }

    // =========================================================================
    // Dispatch
    // =========================================================================

    /// Takes the next dispatch step.
    pub fn next_dispatch(&mut self, now: u64) -> Dispatch {
        loop {
            let Some(head) = self.queue.first() else {
                return Dispatch::Idle;
            };
            let priority = head.priority;
            if let Some(top) = self.current_top {
                if priority < top {
                    return Dispatch::Idle;
                }
                if priority == top {
                    let slot = &mut self.interruptible[usize::from(top)];
                    if *slot {
                        *slot = false;
                        return Dispatch::Interrupt { priority };
                    }
                    return Dispatch::Idle;
                }
            }

            let head = self.queue.remove(0);
            let stale = now.saturating_sub(head.time) >= MAX_EVENT_AGE;
            if stale && !head.event.kind().is_system() {
                continue;
            }
            let previous_top = self.current_top.replace(priority);
            return Dispatch::Deliver(Delivery {
                event: head.event,
                priority,
                previous_top,
            });
        }
    }

    /// Records the end of a delivery.
    ///
    /// `completed` is `false` when the handler was interrupted or failed.
    pub fn finish_dispatch(&mut self, delivery: &Delivery, completed: bool) {
        if completed {
            self.interruptible[usize::from(delivery.priority)] = false;
        }
        self.current_top = delivery.previous_top;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{HitWallEvent, RobotDeathEvent};

    fn wall() -> Event {
        Event::HitWall(HitWallEvent { bearing: 0.0 })
    }

    fn death_of(name: &str) -> Event {
        Event::RobotDeath(RobotDeathEvent { name: name.into() })
    }

    fn deliver(manager: &mut EventManager, now: u64) -> Delivery {
        match manager.next_dispatch(now) {
            Dispatch::Deliver(d) => d,
            other => panic!("expected a delivery, got {other:?}"),
        }
    }

    #[test]
    fn delivers_highest_priority_first() {
        let mut m = EventManager::new();
        m.add(wall(), 5);
        m.add(death_of("a"), 5);
        m.add(Event::Death, 5);

        let kinds: Vec<_> = m.events().map(Event::kind).collect();
        assert_eq!(
            kinds,
            vec![EventKind::Death, EventKind::RobotDeath, EventKind::HitWall]
        );
    }

    #[test]
    fn queue_is_capped() {
        let mut m = EventManager::new();
        for _ in 0..MAX_QUEUE_SIZE {
            assert!(m.add(wall(), 1));
        }
        assert!(!m.add(wall(), 1));
        assert_eq!(m.len(), MAX_QUEUE_SIZE);
    }

    #[test]
    fn old_events_are_cleared_but_system_events_kept() {
        let mut m = EventManager::new();
        m.add(wall(), 3);
        m.add(Event::Win, 3);
        m.add(wall(), 4);
        m.clear_old(5);
        let kinds: Vec<_> = m.events().map(Event::kind).collect();
        assert_eq!(kinds, vec![EventKind::Win, EventKind::HitWall]);
    }

    #[test]
    fn system_priority_cannot_change() {
        let mut m = EventManager::new();
        assert_eq!(m.set_priority(EventKind::Death, 5), None);
        assert_eq!(m.priority(EventKind::Death), SYSTEM_PRIORITY);
        assert_eq!(m.set_priority(EventKind::HitWall, 150), Some(99));
        assert_eq!(m.set_priority(EventKind::HitWall, -4), Some(0));
        assert_eq!(m.priority(EventKind::HitWall), 0);
    }

    #[test]
    fn lower_priority_waits_for_running_handler() {
        let mut m = EventManager::new();
        m.add(death_of("a"), 5);
        let d = deliver(&mut m, 5);
        assert_eq!(m.current_top(), Some(70));

        // A lower priority event arrives while the handler runs
        m.add(wall(), 5);
        assert!(matches!(m.next_dispatch(5), Dispatch::Idle));

        m.finish_dispatch(&d, true);
        assert_eq!(m.current_top(), None);
        let next = deliver(&mut m, 5);
        assert_eq!(next.event.kind(), EventKind::HitWall);
    }

    #[test]
    fn higher_priority_nests() {
        let mut m = EventManager::new();
        m.add(wall(), 5);
        let outer = deliver(&mut m, 5);
        m.add(Event::Death, 5);
        let inner = deliver(&mut m, 5);
        assert_eq!(m.current_top(), Some(SYSTEM_PRIORITY));
        m.finish_dispatch(&inner, true);
        assert_eq!(m.current_top(), Some(30));
        m.finish_dispatch(&outer, true);
        assert_eq!(m.current_top(), None);
    }

    #[test]
    fn same_priority_interrupts_only_when_allowed() {
        let mut m = EventManager::new();
        m.add(wall(), 5);
        let d = deliver(&mut m, 5);
        m.add(wall(), 6);
        assert!(matches!(m.next_dispatch(6), Dispatch::Idle));

        m.set_interruptible(true);
        assert!(matches!(
            m.next_dispatch(6),
            Dispatch::Interrupt { priority: 30 }
        ));
        // The flag is consumed by the interrupt
        assert!(matches!(m.next_dispatch(6), Dispatch::Idle));

        m.finish_dispatch(&d, false);
        assert_eq!(m.current_top(), None);
        assert_eq!(deliver(&mut m, 6).event.kind(), EventKind::HitWall);
    }

    #[test]
    fn stale_events_are_skipped() {
        let mut m = EventManager::new();
        m.add(wall(), 1);
        m.add(Event::Death, 1);
        assert_eq!(deliver(&mut m, 10).event.kind(), EventKind::Death);
        let mut fresh = EventManager::new();
        fresh.add(wall(), 1);
        assert!(matches!(fresh.next_dispatch(10), Dispatch::Idle));
        assert!(fresh.is_empty());
    }

    #[test]
    fn custom_events_use_condition_priority() {
        let mut m = EventManager::new();
        let c = Arc::new(Condition::new("c", 12, |_| true));
        m.add_condition(Arc::clone(&c));
        m.add_condition(Arc::clone(&c));
        assert_eq!(m.conditions().len(), 1);

        m.add_custom(Arc::clone(&c), 3);
        m.add(wall(), 3);
        let first = deliver(&mut m, 3);
        assert_eq!(first.event.kind(), EventKind::HitWall);
        assert_eq!(m.events().next().map(Event::kind), Some(EventKind::Custom));

        m.remove_condition(&c);
        assert!(m.conditions().is_empty());
    }

    #[test]
    fn clear_keeps_system_events() {
        let mut m = EventManager::new();
        m.add(wall(), 1);
        m.add(Event::Death, 1);
        m.clear(false);
        assert_eq!(m.len(), 1);
        m.clear(true);
        assert!(m.is_empty());
    }
}
