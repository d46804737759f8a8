//! Elimination of assignments whose value is overwritten before any read.
//!
//! The variable-keyed sibling of store elimination: an assignment with a
//! side-effect-free value stays active until the variable is read. A later
//! assignment to the same variable retires it; a read promotes it to used.
//! Assignments that never become used are deleted. Assignments whose value
//! has effects are never candidates, but they still retire earlier pending
//! assignments to their targets.

use std::collections::BTreeSet;

use crate::diagnostic::InternalError;
use crate::dialect::Dialect;
use crate::ir::{Block, Expr, ExprKind, FunctionDef, Stmt, StmtId, StmtKind};

use super::remover;
use super::tracking::{self, ActiveState, TrackedPass};

/// Remove unused assignments from `block`. Returns how many statements
/// were deleted.
pub fn eliminate_unused_assignments(
    dialect: &Dialect,
    block: &mut Block,
) -> Result<usize, InternalError> {
    let mut pass = AssignEliminator {
        dialect,
        all_stores: BTreeSet::new(),
        used_stores: BTreeSet::new(),
    };
    // Assignments pending at program end are unobservable; dropping the
    // final state leaves them unused.
    tracking::run(&mut pass, block)?;

    let unused: BTreeSet<StmtId> = pass
        .all_stores
        .difference(&pass.used_stores)
        .copied()
        .collect();
    remover::erase_statements(block, &unused);
    Ok(unused.len())
}

struct AssignEliminator<'a> {
    dialect: &'a Dialect,
    all_stores: BTreeSet<StmtId>,
    used_stores: BTreeSet<StmtId>,
}

impl TrackedPass for AssignEliminator<'_> {
    type Key = String;

    fn visit_leaf(
        &mut self,
        stmt: &Stmt,
        active: &mut ActiveState<String>,
    ) -> Result<(), InternalError> {
        match &stmt.kind {
            StmtKind::Expr(expr) => self.visit_expr(expr, active),
            StmtKind::Let { value, .. } => match value {
                Some(expr) => self.visit_expr(expr, active),
                None => Ok(()),
            },
            StmtKind::Assign { targets, value } => {
                self.visit_expr(value, active)?;
                let candidate = targets.len() == 1 && is_movable(self.dialect, value);
                for target in targets {
                    let pending = active.entry(target.clone()).or_default();
                    // Retired without being read; stays unused unless a
                    // later path revives it through a join.
                    pending.clear();
                    if candidate {
                        pending.insert(stmt.id);
                    }
                }
                if candidate {
                    self.all_stores.insert(stmt.id);
                }
                Ok(())
            }
            _ => Ok(()),
        }
    }

    fn visit_expr(
        &mut self,
        expr: &Expr,
        active: &mut ActiveState<String>,
    ) -> Result<(), InternalError> {
        match &expr.kind {
            ExprKind::Literal(_) => {}
            ExprKind::Ident(name) => self.mark_used(name, active),
            ExprKind::Call { args, .. } => {
                for arg in args {
                    self.visit_expr(arg, active)?;
                }
            }
        }
        Ok(())
    }

    fn visit_leave(&mut self, func: &FunctionDef, active: &mut ActiveState<String>) {
        for name in &func.returns {
            self.mark_used(name, active);
        }
    }

    fn finalize_function(&mut self, func: &FunctionDef, active: &mut ActiveState<String>) {
        // Falling off the end returns the return variables' final values.
        for name in &func.returns {
            self.mark_used(name, active);
        }
    }

    fn shortcut_nested_loop(
        &mut self,
        zero_runs: &ActiveState<String>,
        active: &mut ActiveState<String>,
    ) {
        // Keep every assignment the skipped second run could have read:
        // everything that became active inside the loop body.
        for (name, stores) in active.iter() {
            let before = zero_runs.get(name);
            for id in stores {
                if !before.is_some_and(|stores| stores.contains(id)) {
                    self.used_stores.insert(*id);
                }
            }
        }
    }

    fn leave_scope(&mut self, block: &Block, active: &mut ActiveState<String>) {
        for stmt in &block.stmts {
            if let StmtKind::Let { vars, .. } = &stmt.kind {
                for name in vars {
                    active.remove(name);
                }
            }
        }
    }
}

impl AssignEliminator<'_> {
    fn mark_used(&mut self, name: &str, active: &mut ActiveState<String>) {
        if let Some(stores) = active.get_mut(name) {
            self.used_stores.extend(stores.iter().copied());
            stores.clear();
        }
    }
}

/// Movable expressions can be deleted without losing effects: literals,
/// variables, and calls to movable builtins over movable arguments.
fn is_movable(dialect: &Dialect, expr: &Expr) -> bool {
    match &expr.kind {
        ExprKind::Literal(_) | ExprKind::Ident(_) => true,
        ExprKind::Call { name, args } => {
            dialect.builtin(name).is_some_and(|builtin| builtin.movable)
                && args.iter().all(|arg| is_movable(dialect, arg))
        }
    }
}
