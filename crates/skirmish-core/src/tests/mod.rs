//! Crate-level tests that drive whole battles or many turns of a world.

mod helpers;
mod integration;

#[allow(unused_imports)]
pub use helpers::*;
