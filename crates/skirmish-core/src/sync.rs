//! Turn barrier between the engine and one agent thread.
//!
//! The engine and an agent take strict turns. The agent runs until it calls
//! [`TurnSynchronizer::sleep`], the engine then advances the battle, and
//! [`TurnSynchronizer::wake_up`] lets the agent run again. A generation
//! counter distinguishes "asleep for this turn" from "asleep for an earlier
//! turn", so a late sleep from a slow agent is never mistaken for progress.

use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

/// Longest an agent waits for a wake before giving up on the round.
pub const SLEEP_GUARD: Duration = Duration::from_secs(10);

/// How an agent's sleep ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Wake {
    /// The engine finished a turn.
    Woken,
    /// The engine stopped the agent.
    Halted,
    /// No wake arrived within [`SLEEP_GUARD`].
    TimedOut,
}

#[derive(Debug, Default)]
struct SyncState {
    sleeping: bool,
    running: bool,
    halted: bool,
    generation: u64,
    slept_at: Option<u64>,
}

/// Condition-variable barrier for one agent.
#[derive(Debug, Default)]
pub struct TurnSynchronizer {
    state: Mutex<SyncState>,
    signal: Condvar,
}

impl TurnSynchronizer {
    /// Creates a synchronizer for an agent that has not started yet.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, SyncState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Marks the agent as running. Called before its thread starts.
    pub fn start(&self) {
        let mut state = self.lock();
        *state = SyncState {
            running: true,
            ..SyncState::default()
        };
    }

    // =========================================================================
    // Agent side
    // =========================================================================

    /// Yields the rest of the turn and blocks until the engine wakes the agent.
    pub fn sleep(&self) -> Wake {
        let mut state = self.lock();
        if state.halted {
            return Wake::Halted;
        }
        let generation = state.generation;
        state.sleeping = true;
        state.slept_at = Some(generation);
        self.signal.notify_all();

        let (state, timeout) = self
            .signal
            .wait_timeout_while(state, SLEEP_GUARD, |s| {
                s.generation == generation && !s.halted
            })
            .unwrap_or_else(PoisonError::into_inner);

        if state.halted {
            Wake::Halted
        } else if timeout.timed_out() {
            Wake::TimedOut
        } else {
            Wake::Woken
        }
    }

    /// Marks the agent thread as finished and releases any waiting engine.
    pub fn finish(&self) {
        let mut state = self.lock();
        state.running = false;
        state.sleeping = false;
        self.signal.notify_all();
    }

    /// Returns `true` once the engine has stopped the agent.
    #[must_use]
    pub fn is_halted(&self) -> bool {
        self.lock().halted
    }

    // =========================================================================
    // Engine side
    // =========================================================================

    /// Starts the agent's next turn.
    pub fn wake_up(&self) {
        let mut state = self.lock();
        state.generation += 1;
        state.sleeping = false;
        self.signal.notify_all();
    }

    /// Waits until the agent sleeps for the current generation or finishes.
    ///
    /// Returns `false` if the deadline passes first.
    pub fn wait_for_sleep(&self, deadline: Instant) -> bool {
        let mut state = self.lock();
        loop {
            if !state.running || (state.sleeping && state.slept_at == Some(state.generation)) {
                return true;
            }
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            state = self
                .signal
                .wait_timeout(state, deadline - now)
                .map(|(guard, _)| guard)
                .unwrap_or_else(|e| e.into_inner().0);
        }
    }

    /// Waits until the agent thread has finished.
    ///
    /// Returns `false` if the deadline passes first.
    pub fn wait_for_finish(&self, deadline: Instant) -> bool {
        let mut state = self.lock();
        loop {
            if !state.running {
                return true;
            }
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            state = self
                .signal
                .wait_timeout(state, deadline - now)
                .map(|(guard, _)| guard)
                .unwrap_or_else(|e| e.into_inner().0);
        }
    }

    /// Tells the agent to stop; any current or future sleep returns
    /// [`Wake::Halted`].
    pub fn halt(&self) {
        let mut state = self.lock();
        state.halted = true;
        self.signal.notify_all();
    }

    /// Returns `true` while the agent thread is running.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.lock().running
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;
    use std::thread;

    fn soon() -> Instant {
        Instant::now() + Duration::from_secs(5)
    }

    #[test]
    fn agent_and_engine_alternate() {
        let sync = Arc::new(TurnSynchronizer::new());
        let turns = Arc::new(AtomicU32::new(0));
        sync.start();

        let agent = {
            let sync = Arc::clone(&sync);
            let turns = Arc::clone(&turns);
            thread::spawn(move || loop {
                turns.fetch_add(1, Ordering::SeqCst);
                if sync.sleep() != Wake::Woken {
                    sync.finish();
                    break;
                }
            })
        };

        assert!(sync.wait_for_sleep(soon()));
        for expected in 2..=5 {
            sync.wake_up();
            assert!(sync.wait_for_sleep(soon()));
            // The agent is asleep, so the count is stable here
            assert_eq!(turns.load(Ordering::SeqCst), expected);
        }

        sync.halt();
        assert!(sync.wait_for_finish(soon()));
        agent.join().unwrap();
        assert!(!sync.is_running());
    }

    #[test]
    fn stale_sleep_does_not_count() {
        let sync = TurnSynchronizer::new();
        sync.start();
        {
            let mut state = sync.lock();
            state.sleeping = true;
            state.slept_at = Some(0);
        }
        sync.wake_up();
        // Sleeping flag was cleared by the wake, and generation moved on
        assert!(!sync.wait_for_sleep(Instant::now() + Duration::from_millis(20)));
    }

    #[test]
    fn halted_sleep_returns_immediately() {
        let sync = TurnSynchronizer::new();
        sync.start();
        sync.halt();
        assert!(sync.is_halted());
        assert_eq!(sync.sleep(), Wake::Halted);
    }

    #[test]
    fn finished_agent_never_blocks_engine() {
        let sync = TurnSynchronizer::new();
        sync.start();
        sync.finish();
        assert!(sync.wait_for_sleep(Instant::now()));
        assert!(sync.wait_for_finish(Instant::now()));
    }
}
