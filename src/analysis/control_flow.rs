//! Per-function control-flow side effects: can a call return normally,
//! and can it halt the whole execution in a committing way.

use std::collections::BTreeMap;

use crate::diagnostic::InternalError;
use crate::dialect::{ControlFlowEffects, Dialect};
use crate::ir::{Block, Expr, ExprKind, FunctionDef, Stmt, StmtKind};

/// Compute {can_continue, can_terminate} for every user-defined function.
///
/// `can_terminate` is a least fixed point: it becomes true once any call
/// to a terminating builtin (or to a function already known to terminate)
/// appears anywhere in the body. `can_continue` becomes false only when
/// the exit analysis proves no path through the body reaches a normal
/// function exit. Both updates are monotone toward the conservative side,
/// so recursive cycles settle on `can_continue = true` unless the proof
/// goes through anyway.
pub fn function_control_flow(
    dialect: &Dialect,
    block: &Block,
) -> Result<BTreeMap<String, ControlFlowEffects>, InternalError> {
    let mut functions: BTreeMap<String, &FunctionDef> = BTreeMap::new();
    collect_functions(block, &mut functions);

    let mut flags: BTreeMap<String, ControlFlowEffects> = functions
        .keys()
        .map(|name| (name.clone(), ControlFlowEffects::NORMAL))
        .collect();

    loop {
        let mut changed = false;
        for (name, func) in &functions {
            let current = flags[name];
            let analysis = BodyAnalysis {
                dialect,
                flags: &flags,
            };
            let can_terminate = current.can_terminate || analysis.block_terminates(&func.body)?;
            let exits = analysis.block_exits(&func.body)?;
            let can_continue = current.can_continue && exits.reaches_function_exit();
            let updated = ControlFlowEffects {
                can_continue,
                can_terminate,
            };
            if updated != current {
                flags.insert(name.clone(), updated);
                changed = true;
            }
        }
        if !changed {
            return Ok(flags);
        }
    }
}

fn collect_functions<'a>(block: &'a Block, out: &mut BTreeMap<String, &'a FunctionDef>) {
    crate::ir::visit::walk_stmts(block, &mut |stmt| {
        if let StmtKind::FnDef(func) = &stmt.kind {
            out.insert(func.name.clone(), func);
        }
    });
}

/// The ways execution might leave a block.
#[derive(Clone, Copy, Debug, Default)]
struct Exits {
    /// Past the last statement.
    fallthrough: bool,
    leave: bool,
    breaks: bool,
    continues: bool,
}

impl Exits {
    fn absorb_escapes(&mut self, other: Exits) {
        self.leave |= other.leave;
        self.breaks |= other.breaks;
        self.continues |= other.continues;
    }

    /// As a function body: some path returns to the caller. Loop escapes
    /// cannot legally reach a function boundary, but counting them keeps
    /// the answer conservative if they do.
    fn reaches_function_exit(self) -> bool {
        self.fallthrough || self.leave || self.breaks || self.continues
    }
}

struct BodyAnalysis<'a> {
    dialect: &'a Dialect,
    flags: &'a BTreeMap<String, ControlFlowEffects>,
}

impl BodyAnalysis<'_> {
    fn callee_flags(&self, name: &str) -> Result<ControlFlowEffects, InternalError> {
        if let Some(builtin) = self.dialect.builtin(name) {
            Ok(builtin.control_flow)
        } else if let Some(flags) = self.flags.get(name) {
            Ok(*flags)
        } else {
            Err(InternalError::new(format!(
                "call to undefined function '{}' in control-flow analysis",
                name
            )))
        }
    }

    /// True if some call reachable in the block can terminate execution.
    /// Reachability is over-approximated (every call in the body counts),
    /// which errs toward keeping stores.
    fn block_terminates(&self, block: &Block) -> Result<bool, InternalError> {
        for stmt in &block.stmts {
            if self.stmt_terminates(stmt)? {
                return Ok(true);
            }
        }
        Ok(false)
    }

    fn stmt_terminates(&self, stmt: &Stmt) -> Result<bool, InternalError> {
        Ok(match &stmt.kind {
            StmtKind::Expr(expr) => self.expr_terminates(expr)?,
            StmtKind::Let { value, .. } => match value {
                Some(expr) => self.expr_terminates(expr)?,
                None => false,
            },
            StmtKind::Assign { value, .. } => self.expr_terminates(value)?,
            StmtKind::If { cond, body } => {
                self.expr_terminates(cond)? || self.block_terminates(body)?
            }
            StmtKind::Switch {
                expr,
                cases,
                default,
            } => {
                let mut found = self.expr_terminates(expr)?;
                for case in cases {
                    found = found || self.block_terminates(&case.body)?;
                }
                if let Some(default) = default {
                    found = found || self.block_terminates(default)?;
                }
                found
            }
            StmtKind::For {
                init,
                cond,
                post,
                body,
            } => {
                self.block_terminates(init)?
                    || self.expr_terminates(cond)?
                    || self.block_terminates(post)?
                    || self.block_terminates(body)?
            }
            StmtKind::Break | StmtKind::Continue | StmtKind::Leave => false,
            // Defining a function does not run it.
            StmtKind::FnDef(_) => false,
            StmtKind::Block(inner) => self.block_terminates(inner)?,
        })
    }

    fn expr_terminates(&self, expr: &Expr) -> Result<bool, InternalError> {
        if let ExprKind::Call { name, args } = &expr.kind {
            if self.callee_flags(name)?.can_terminate {
                return Ok(true);
            }
            for arg in args {
                if self.expr_terminates(arg)? {
                    return Ok(true);
                }
            }
        }
        Ok(false)
    }

    /// Exit analysis for a statement sequence. The scan stops at the
    /// first point the current path provably dies: an unconditional
    /// escape or a call that never returns.
    fn block_exits(&self, block: &Block) -> Result<Exits, InternalError> {
        let mut exits = Exits::default();
        for stmt in &block.stmts {
            match &stmt.kind {
                StmtKind::Break => {
                    exits.breaks = true;
                    return Ok(exits);
                }
                StmtKind::Continue => {
                    exits.continues = true;
                    return Ok(exits);
                }
                StmtKind::Leave => {
                    exits.leave = true;
                    return Ok(exits);
                }
                StmtKind::Expr(expr) => {
                    if self.expr_diverges(expr)? {
                        return Ok(exits);
                    }
                }
                StmtKind::Let { value, .. } => {
                    if let Some(expr) = value {
                        if self.expr_diverges(expr)? {
                            return Ok(exits);
                        }
                    }
                }
                StmtKind::Assign { value, .. } => {
                    if self.expr_diverges(value)? {
                        return Ok(exits);
                    }
                }
                StmtKind::If { cond, body } => {
                    if self.expr_diverges(cond)? {
                        return Ok(exits);
                    }
                    // The skipped-body path always falls through.
                    exits.absorb_escapes(self.block_exits(body)?);
                }
                StmtKind::Switch {
                    expr,
                    cases,
                    default,
                } => {
                    if self.expr_diverges(expr)? {
                        return Ok(exits);
                    }
                    let mut any_fallthrough = default.is_none();
                    for case in cases {
                        let case_exits = self.block_exits(&case.body)?;
                        exits.absorb_escapes(case_exits);
                        any_fallthrough |= case_exits.fallthrough;
                    }
                    if let Some(default) = default {
                        let default_exits = self.block_exits(default)?;
                        exits.absorb_escapes(default_exits);
                        any_fallthrough |= default_exits.fallthrough;
                    }
                    if !any_fallthrough {
                        return Ok(exits);
                    }
                }
                StmtKind::For {
                    init,
                    cond,
                    post,
                    body,
                } => {
                    let init_exits = self.block_exits(init)?;
                    exits.absorb_escapes(init_exits);
                    if !init_exits.fallthrough {
                        return Ok(exits);
                    }
                    if self.expr_diverges(cond)? {
                        return Ok(exits);
                    }
                    // A false condition skips the loop entirely, so the
                    // loop as a whole can always fall through. Its own
                    // break/continue are consumed here; leave escapes.
                    exits.leave |= self.block_exits(body)?.leave;
                    exits.leave |= self.block_exits(post)?.leave;
                }
                StmtKind::FnDef(_) => {}
                StmtKind::Block(inner) => {
                    let inner_exits = self.block_exits(inner)?;
                    exits.absorb_escapes(inner_exits);
                    if !inner_exits.fallthrough {
                        return Ok(exits);
                    }
                }
            }
        }
        exits.fallthrough = true;
        Ok(exits)
    }

    fn expr_diverges(&self, expr: &Expr) -> Result<bool, InternalError> {
        if let ExprKind::Call { name, args } = &expr.kind {
            if !self.callee_flags(name)?.can_continue {
                return Ok(true);
            }
            for arg in args {
                if self.expr_diverges(arg)? {
                    return Ok(true);
                }
            }
        }
        Ok(false)
    }
}
