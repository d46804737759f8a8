//! Per-function abstract side effects, propagated over the call graph.

use std::collections::BTreeMap;

use crate::diagnostic::InternalError;
use crate::dialect::{Dialect, SideEffects};

use super::CallGraph;

/// Compute the abstract side effects of every user-defined function: the
/// join of the effects of every builtin it transitively calls. Functions in
/// one strongly connected component share their effects; components are
/// processed callees-first so one sweep suffices.
///
/// An unknown callee name is an internal error: the call graph is expected
/// to be total over all reachable functions.
pub fn function_side_effects(
    dialect: &Dialect,
    graph: &CallGraph,
) -> Result<BTreeMap<String, SideEffects>, InternalError> {
    let mut result: BTreeMap<String, SideEffects> = BTreeMap::new();

    for component in graph.sccs() {
        let mut effects = SideEffects::default();
        for &name in &component {
            for callee in &graph.calls[name] {
                if let Some(builtin) = dialect.builtin(callee) {
                    effects = effects.join(builtin.side_effects);
                } else if let Some(known) = result.get(callee.as_str()) {
                    effects = effects.join(*known);
                } else if component.iter().any(|&member| member == callee) {
                    // Recursive edge within this component; the joined
                    // component effects already account for it.
                } else {
                    return Err(InternalError::new(format!(
                        "call to undefined function '{}' in side-effect propagation",
                        callee
                    )));
                }
            }
        }
        for &name in &component {
            result.insert(name.to_string(), effects);
        }
    }

    Ok(result)
}
