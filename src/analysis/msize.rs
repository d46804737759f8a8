//! Detection of memory-extent queries.

use crate::dialect::Dialect;
use crate::ir::{Block, ExprKind};

/// True if the program calls `msize` anywhere. The memory extent observes
/// every store that grew memory, so memory-store elimination is disabled
/// outright when this returns true.
pub fn contains_msize(dialect: &Dialect, block: &Block) -> bool {
    let mut found = false;
    crate::ir::visit::walk_exprs(block, &mut |expr| {
        if let ExprKind::Call { name, .. } = &expr.kind {
            if name == "msize" && dialect.is_builtin(name) {
                found = true;
            }
        }
    });
    found
}
