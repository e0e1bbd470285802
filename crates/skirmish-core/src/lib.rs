//! # Skirmish Core
//!
//! Turn-synchronized tank battle engine.
//!
//! Robots are programs that run on their own threads and steer a tank
//! through blocking calls such as "move ahead 100" or "fire". The engine
//! owns the battlefield. It lets every robot think until it blocks, then
//! resolves a turn of movement, radar, bullets and deaths while all robots
//! are asleep, and finally wakes them with the turn's events.
//!
//! ## Architecture
//!
//! - **Entities** ([`entity`]): robot and bullet state, IDs, capability tiers
//! - **Resolvers** ([`resolver`]): the stages of a turn over a [`World`]
//! - **Peers** ([`peer`]): the bridge between engine and agent threads,
//!   and the [`Agent`] API robots program against
//! - **Synchronization** ([`sync`]): the per-agent turn barrier
//! - **Events** ([`event`]): prioritized per-robot event queues and custom
//!   conditions
//! - **Battle** ([`battle`]): rosters, rounds, placement and results
//!
//! ## Usage
//!
//! ```no_run
//! use skirmish_core::battle::Battle;
//! use skirmish_core::rules::BattleRules;
//! use skirmish_core::samples::{RamFire, Walls};
//!
//! let results = Battle::new(BattleRules::default())
//!     .with_robot(Walls::spec("walls"))
//!     .with_robot(RamFire::spec("rammer"))
//!     .run()?;
//! for contestant in &results.contestants {
//!     println!("{}. {} {:.0}", contestant.rank, contestant.name, contestant.score);
//! }
//! # Ok::<(), skirmish_core::BattleError>(())
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod battle;
pub mod entity;
pub mod error;
pub mod event;
pub mod peer;
pub mod resolver;
pub mod rules;
pub mod samples;
pub mod snapshot;
pub mod statistics;
pub mod sync;

#[cfg(test)]
mod tests;

// Re-exports for convenience
pub use battle::{Battle, BattleListener, RobotSpec, RoundReport, StartPosition, TeamSpec};
pub use error::{AgentError, AgentResult, BattleError, RulesError};
pub use peer::{Agent, Robot};
pub use resolver::World;
pub use rules::BattleRules;
pub use snapshot::TurnSnapshot;
pub use statistics::{BattleResults, ContestantResult};
