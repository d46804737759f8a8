//! Whole-program analyses the optimizer consumes.
//!
//! All of these run once, before a pass walks the tree, and produce
//! immutable data the pass reads: the call graph, per-function abstract
//! side effects, per-function control-flow side effects, the SSA value
//! snapshot, and the memory-size-query flag. The knowledge base wraps the
//! SSA snapshot to answer symbolic alias queries.

pub mod call_graph;
pub mod control_flow;
pub mod knowledge;
pub mod msize;
pub mod side_effects;
pub mod ssa;

#[cfg(test)]
mod tests;

pub use call_graph::CallGraph;
pub use control_flow::function_control_flow;
pub use knowledge::{Knowledge, Term};
pub use msize::contains_msize;
pub use side_effects::function_side_effects;
pub use ssa::SsaValues;
