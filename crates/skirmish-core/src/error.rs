//! Error types for agents, rules, and the battle engine.
//!
//! Agent-side failures and control transfers share one type, [`AgentError`],
//! so that a robot's blocking calls can be chained with `?` and a death or a
//! round end unwinds straight out of user code to the agent thread boundary.

use thiserror::Error;

use crate::entity::Capabilities;

/// Result of an agent-side peer operation.
pub type AgentResult<T> = Result<T, AgentError>;

/// Control transfers and faults raised on a robot's agent thread.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum AgentError {
    /// The robot died. Not resumable.
    #[error("robot has died")]
    Death,

    /// The robot won and the round has been stopped. Not resumable.
    #[error("robot has won the round")]
    Win,

    /// The round ended while the robot was still running. Not resumable.
    #[error("round is over")]
    RoundOver,

    /// The robot broke a rule and was disabled for the rest of the round.
    #[error("robot disabled: {0}")]
    Disabled(String),

    /// A newer event at the same priority abandoned the running handler.
    ///
    /// Only meaningful inside an event handler; the dispatch loop catches it
    /// and restarts from the top of the queue.
    #[error("event handler interrupted at priority {priority}")]
    Interrupted {
        /// Priority of the handler being abandoned
        priority: u8,
    },

    /// A blocking call was made from inside a condition test.
    #[error("blocking calls are not allowed while a condition is being tested")]
    ConditionReentry,

    /// The robot lacks the capability an operation requires.
    #[error("{operation} requires the {required:?} capability")]
    NotPermitted {
        /// Name of the rejected operation
        operation: &'static str,
        /// Capability the robot would need
        required: Capabilities,
    },

    /// A runtime fault raised by robot code.
    #[error("{0}")]
    Fault(String),
}

impl AgentError {
    /// Returns `true` if the robot may not continue running after this error.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Death | Self::Win | Self::RoundOver | Self::Disabled(_)
        )
    }
}

/// Invalid battle configuration.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RulesError {
    /// Battlefield dimensions are too small to hold a robot.
    #[error("battlefield {width}x{height} is smaller than the {min}x{min} minimum")]
    Battlefield {
        /// Requested width
        width: f64,
        /// Requested height
        height: f64,
        /// Smallest allowed side
        min: f64,
    },

    /// The battle must run at least one round.
    #[error("number of rounds must be at least 1")]
    NoRounds,

    /// Gun cooling rate must be positive and finite.
    #[error("gun cooling rate must be in (0, 0.7], got {0}")]
    GunCoolingRate(f64),

    /// A timeout or turn limit was zero.
    #[error("{0} must be greater than zero")]
    ZeroLimit(&'static str),
}

/// Engine-level battle failures.
#[derive(Debug, Error)]
pub enum BattleError {
    /// The rules failed validation.
    #[error("invalid rules: {0}")]
    InvalidRules(#[from] RulesError),

    /// No robots were added.
    #[error("battle has no robots")]
    EmptyRoster,

    /// Two robots share a name.
    #[error("duplicate robot name {0:?}")]
    DuplicateName(String),

    /// A team was added with no members.
    #[error("team {0:?} has no members")]
    EmptyTeam(String),

    /// A fixed start position lies outside the battlefield.
    #[error("start position of {0:?} is outside the battlefield")]
    StartPosition(String),

    /// No free start position could be found.
    #[error("no free start position for {name:?} after {attempts} attempts")]
    Placement {
        /// Robot being placed
        name: String,
        /// Attempts made
        attempts: u32,
    },

    /// An agent thread could not be started.
    #[error("failed to spawn agent thread for {name:?}")]
    Spawn {
        /// Robot whose thread failed
        name: String,
        /// Underlying OS error
        #[source]
        source: std::io::Error,
    },

    /// The engine itself failed during a turn.
    #[error("engine fault in round {round} at turn {turn}: {message}")]
    EngineFault {
        /// Round number
        round: u32,
        /// Turn number
        turn: u64,
        /// Panic message
        message: String,
    },
}
