//! The optimizer: dead-store and dead-assignment elimination.
//!
//! Passes run on the whole program block. Loop init hoisting runs first
//! and establishes the shape the tracking walk requires; the two
//! eliminators then alternate until a round removes nothing or the round
//! budget runs out.

pub mod assign_elim;
pub mod loop_init;
pub mod remover;
pub mod store_elim;
pub mod tracking;

#[cfg(test)]
mod tests;

use crate::diagnostic::InternalError;
use crate::dialect::Dialect;
use crate::ir::Block;

#[derive(Clone, Copy, Debug)]
pub struct Settings {
    /// Maximum number of eliminate-assignments/eliminate-stores rounds.
    pub rounds: usize,
    /// Allow removal of memory stores. Storage elimination is always on.
    pub eliminate_memory_stores: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            rounds: 2,
            eliminate_memory_stores: true,
        }
    }
}

/// What a run of the optimizer removed.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Outcome {
    pub removed_assignments: usize,
    pub removed_stores: usize,
}

/// Optimize `block` in place.
pub fn optimize(
    dialect: &Dialect,
    block: &mut Block,
    settings: &Settings,
) -> Result<Outcome, InternalError> {
    loop_init::hoist_loop_init(block);
    let mut outcome = Outcome::default();
    for _ in 0..settings.rounds.max(1) {
        let assignments = assign_elim::eliminate_unused_assignments(dialect, block)?;
        let stores = store_elim::eliminate_unused_stores(
            dialect,
            block,
            settings.eliminate_memory_stores,
        )?;
        outcome.removed_assignments += assignments;
        outcome.removed_stores += stores;
        if assignments == 0 && stores == 0 {
            break;
        }
    }
    Ok(outcome)
}
