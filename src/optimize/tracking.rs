//! Shared control-flow walk for the two store-tracking passes.
//!
//! Both eliminators track "active" stores: writes whose value has not been
//! observed yet and whose statements are still candidates for removal. The
//! walker owns the join semantics over control flow and delegates the
//! actual store bookkeeping to the pass:
//!
//! * `if`: the body may be skipped, so the post-state is the union of the
//!   pre-state and the state after the body.
//! * `switch`: every case runs from the pre-state; the results are joined,
//!   and the pre-state joins in too when there is no default case.
//! * `for`: the body and post run zero or more times. Running them twice
//!   from the pre-state covers the back edge, because the only information
//!   tracked per store is whether it is used. Beyond a nesting depth of
//!   six the second run is skipped and the pass is asked to degrade the
//!   state conservatively instead, which keeps the walk linear.
//! * `break`/`continue` stash the current state into the innermost loop
//!   frame; it joins back in at the merge point.
//! * A function body starts from an empty state, and the state around the
//!   definition is untouched.

use std::collections::{BTreeMap, BTreeSet};
use std::mem;

use crate::diagnostic::{ensure, InternalError};
use crate::ir::{Block, Expr, FunctionDef, Stmt, StmtId, StmtKind};

/// Active stores per key: the statement ids of pending writes.
pub type ActiveState<K> = BTreeMap<K, BTreeSet<StmtId>>;

/// Loop nesting depth at which the second body run is skipped.
pub const SHORTCUT_LOOP_DEPTH: usize = 6;

/// Join `from` into `into`, key by key.
pub fn merge<K: Ord>(into: &mut ActiveState<K>, from: ActiveState<K>) {
    for (key, stores) in from {
        into.entry(key).or_default().extend(stores);
    }
}

/// The pass-specific half of the walk.
pub trait TrackedPass {
    type Key: Ord + Clone;

    /// An expression statement, declaration, or assignment.
    fn visit_leaf(
        &mut self,
        stmt: &Stmt,
        active: &mut ActiveState<Self::Key>,
    ) -> Result<(), InternalError>;

    /// A condition or switch scrutinee; reads inside it count.
    fn visit_expr(
        &mut self,
        expr: &Expr,
        active: &mut ActiveState<Self::Key>,
    ) -> Result<(), InternalError>;

    /// `leave` reached inside `func` with the given pending stores.
    fn visit_leave(&mut self, func: &FunctionDef, active: &mut ActiveState<Self::Key>);

    /// The body of `func` has been walked to its end.
    fn finalize_function(&mut self, func: &FunctionDef, active: &mut ActiveState<Self::Key>);

    /// The second loop run was skipped; `zero_runs` is the state from
    /// before the first body run.
    fn shortcut_nested_loop(
        &mut self,
        zero_runs: &ActiveState<Self::Key>,
        active: &mut ActiveState<Self::Key>,
    );

    /// A block scope closed; passes keyed by variable drop the keys that
    /// went out of scope here.
    fn leave_scope(&mut self, block: &Block, active: &mut ActiveState<Self::Key>) {
        let _ = (block, active);
    }
}

/// Walk the whole program and return the state pending at its end.
pub fn run<'ast, P: TrackedPass>(
    pass: &mut P,
    block: &'ast Block,
) -> Result<ActiveState<P::Key>, InternalError> {
    let mut walker = Walker {
        pass,
        active: ActiveState::new(),
        frames: Vec::new(),
        functions: Vec::new(),
        loop_depth: 0,
    };
    walker.walk_block(block)?;
    Ok(walker.active)
}

struct LoopFrame<K: Ord> {
    pending_break: ActiveState<K>,
    pending_continue: ActiveState<K>,
}

// Derived `Default` would demand `K: Default`.
impl<K: Ord> Default for LoopFrame<K> {
    fn default() -> Self {
        Self {
            pending_break: ActiveState::new(),
            pending_continue: ActiveState::new(),
        }
    }
}

struct Walker<'a, 'ast, P: TrackedPass> {
    pass: &'a mut P,
    active: ActiveState<P::Key>,
    frames: Vec<LoopFrame<P::Key>>,
    functions: Vec<&'ast FunctionDef>,
    loop_depth: usize,
}

impl<'ast, P: TrackedPass> Walker<'_, 'ast, P> {
    fn walk_block(&mut self, block: &'ast Block) -> Result<(), InternalError> {
        for stmt in &block.stmts {
            self.walk_stmt(stmt)?;
        }
        self.pass.leave_scope(block, &mut self.active);
        Ok(())
    }

    fn walk_stmt(&mut self, stmt: &'ast Stmt) -> Result<(), InternalError> {
        match &stmt.kind {
            StmtKind::Expr(_) | StmtKind::Let { .. } | StmtKind::Assign { .. } => {
                self.pass.visit_leaf(stmt, &mut self.active)?;
            }
            StmtKind::If { cond, body } => {
                self.pass.visit_expr(cond, &mut self.active)?;
                let skipped = self.active.clone();
                self.walk_block(body)?;
                merge(&mut self.active, skipped);
            }
            StmtKind::Switch {
                expr,
                cases,
                default,
            } => {
                self.pass.visit_expr(expr, &mut self.active)?;
                let pre = mem::take(&mut self.active);
                let mut joined = ActiveState::new();
                for case in cases {
                    self.active = pre.clone();
                    self.walk_block(&case.body)?;
                    merge(&mut joined, mem::take(&mut self.active));
                }
                match default {
                    Some(default) => {
                        self.active = pre;
                        self.walk_block(default)?;
                        merge(&mut joined, mem::take(&mut self.active));
                    }
                    // No default: the switch can fall through untouched.
                    None => merge(&mut joined, pre),
                }
                self.active = joined;
            }
            StmtKind::For {
                init,
                cond,
                post,
                body,
            } => {
                ensure(
                    init.stmts.is_empty(),
                    "loop init blocks must be hoisted before store tracking",
                )?;
                self.frames.push(LoopFrame::default());
                self.loop_depth += 1;
                let result = self.walk_loop(cond, post, body);
                self.loop_depth -= 1;
                let frame = self.frames.pop().unwrap_or_default();
                let zero_runs = result?;
                merge(&mut self.active, frame.pending_break);
                merge(&mut self.active, zero_runs);
            }
            StmtKind::Break => {
                let pending = mem::take(&mut self.active);
                let frame = self
                    .frames
                    .last_mut()
                    .ok_or_else(|| InternalError::new("break outside of a loop"))?;
                merge(&mut frame.pending_break, pending);
            }
            StmtKind::Continue => {
                let pending = mem::take(&mut self.active);
                let frame = self
                    .frames
                    .last_mut()
                    .ok_or_else(|| InternalError::new("continue outside of a loop"))?;
                merge(&mut frame.pending_continue, pending);
            }
            StmtKind::Leave => {
                let func = self
                    .functions
                    .last()
                    .ok_or_else(|| InternalError::new("leave outside of a function"))?;
                self.pass.visit_leave(func, &mut self.active);
            }
            StmtKind::FnDef(func) => {
                let outer_active = mem::take(&mut self.active);
                let outer_frames = mem::take(&mut self.frames);
                let outer_depth = mem::replace(&mut self.loop_depth, 0);
                self.functions.push(func);
                let result = self.walk_block(&func.body);
                if result.is_ok() {
                    self.pass.finalize_function(func, &mut self.active);
                }
                self.functions.pop();
                self.active = outer_active;
                self.frames = outer_frames;
                self.loop_depth = outer_depth;
                result?;
            }
            StmtKind::Block(inner) => self.walk_block(inner)?,
        }
        Ok(())
    }

    /// Runs condition, then body/post/condition up to twice. Returns the
    /// zero-run state for the caller to join back in.
    fn walk_loop(
        &mut self,
        cond: &'ast Expr,
        post: &'ast Block,
        body: &'ast Block,
    ) -> Result<ActiveState<P::Key>, InternalError> {
        self.pass.visit_expr(cond, &mut self.active)?;
        let zero_runs = self.active.clone();

        self.walk_block(body)?;
        self.merge_pending_continue();
        self.walk_block(post)?;
        self.pass.visit_expr(cond, &mut self.active)?;

        if self.loop_depth < SHORTCUT_LOOP_DEPTH {
            self.walk_block(body)?;
            self.merge_pending_continue();
            self.walk_block(post)?;
            self.pass.visit_expr(cond, &mut self.active)?;
        } else {
            self.pass.shortcut_nested_loop(&zero_runs, &mut self.active);
        }
        Ok(zero_runs)
    }

    fn merge_pending_continue(&mut self) {
        if let Some(frame) = self.frames.last_mut() {
            let pending = mem::take(&mut frame.pending_continue);
            merge(&mut self.active, pending);
        }
    }
}
