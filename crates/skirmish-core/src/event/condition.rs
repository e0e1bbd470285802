//! Custom event conditions.

use std::fmt;

use crate::peer::Agent;

type Predicate = dyn Fn(&Agent<'_>) -> bool + Send + Sync;

/// A named predicate over a robot's view of the battle.
///
/// Registered conditions are tested once per turn on the agent thread before
/// events are dispatched; each one that holds queues a custom event at the
/// condition's priority. The predicate may call getters on the agent but any
/// blocking call fails.
pub struct Condition {
    name: String,
    priority: u8,
    test: Box<Predicate>,
}

impl Condition {
    /// Creates a condition. Priority is clamped to the user range.
    pub fn new<F>(name: impl Into<String>, priority: u8, test: F) -> Self
    where
        F: Fn(&Agent<'_>) -> bool + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            priority: priority.min(super::MAX_USER_PRIORITY),
            test: Box::new(test),
        }
    }

    /// Condition name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Priority of the custom events this condition produces.
    #[must_use]
    pub fn priority(&self) -> u8 {
        self.priority
    }

    /// Evaluates the predicate.
    #[must_use]
    pub fn test(&self, agent: &Agent<'_>) -> bool {
        (self.test)(agent)
    }
}

impl fmt::Debug for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Condition")
            .field("name", &self.name)
            .field("priority", &self.priority)
            .finish_non_exhaustive()
    }
}
