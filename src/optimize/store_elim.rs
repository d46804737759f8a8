//! Elimination of memory and storage stores whose value is never observed.
//!
//! A store statement stays "active" from the point it executes until
//! something might read the written range. A read that cannot be proven
//! unrelated promotes the store to used; a later write that provably
//! covers the whole range silently retires it; everything in between
//! leaves it active. After the walk, every store that never became used is
//! deleted.
//!
//! The pass is conservative by construction: alias questions it cannot
//! answer count as "maybe related" for reads and "not covered" for
//! writes, both of which keep the store.

use std::collections::{BTreeMap, BTreeSet};

use crate::analysis::{
    contains_msize, function_control_flow, function_side_effects, CallGraph, Knowledge, SsaValues,
    Term,
};
use crate::diagnostic::{ensure, InternalError};
use crate::dialect::{
    Builtin, ControlFlowEffects, Dialect, Effect, Location, OpSignature, SideEffects, WORD_SIZE,
};
use crate::ir::{Block, Expr, ExprKind, FunctionDef, Stmt, StmtId, StmtKind};

use super::remover;
use super::tracking::{self, ActiveState, TrackedPass};

/// One concrete read or write against an address space. `start` and
/// `length` are `None` when the extent is not expressible as a variable or
/// constant; such an operation relates to everything at its location.
#[derive(Clone, Debug)]
pub struct Operation {
    pub location: Location,
    pub effect: Effect,
    pub start: Option<Term>,
    pub length: Option<Term>,
}

/// Remove unused stores from `block`. Returns how many statements were
/// deleted. `eliminate_memory` disables the memory half when false; it is
/// also disabled automatically when the program queries the memory extent.
pub fn eliminate_unused_stores(
    dialect: &Dialect,
    block: &mut Block,
    eliminate_memory: bool,
) -> Result<usize, InternalError> {
    let graph = CallGraph::build(block);
    let side_effects = function_side_effects(dialect, &graph)?;
    let control_flow = function_control_flow(dialect, block)?;
    let ssa = SsaValues::collect(block);
    let ignore_memory = !eliminate_memory || contains_msize(dialect, block);

    let mut pass = StoreEliminator {
        dialect,
        side_effects: &side_effects,
        control_flow: &control_flow,
        knowledge: Knowledge::new(&ssa),
        ignore_memory,
        operations: BTreeMap::new(),
        all_stores: BTreeSet::new(),
        used_stores: BTreeSet::new(),
    };
    let mut active = tracking::run(&mut pass, block)?;

    // End of the program: storage survives it, so pending storage stores
    // are observable. Memory is only observable when the target says so.
    pass.mark_active_as_used(Location::Storage, &mut active);
    if dialect.memory_observable_at_exit {
        pass.mark_active_as_used(Location::Memory, &mut active);
    }

    let unused: BTreeSet<StmtId> = pass
        .all_stores
        .difference(&pass.used_stores)
        .copied()
        .collect();
    remover::erase_statements(block, &unused);
    Ok(unused.len())
}

struct StoreEliminator<'a> {
    dialect: &'a Dialect,
    side_effects: &'a BTreeMap<String, SideEffects>,
    control_flow: &'a BTreeMap<String, ControlFlowEffects>,
    knowledge: Knowledge<'a>,
    ignore_memory: bool,
    /// The write operation of each store candidate.
    operations: BTreeMap<StmtId, Operation>,
    all_stores: BTreeSet<StmtId>,
    used_stores: BTreeSet<StmtId>,
}

impl TrackedPass for StoreEliminator<'_> {
    type Key = Location;

    fn visit_leaf(
        &mut self,
        stmt: &Stmt,
        active: &mut ActiveState<Location>,
    ) -> Result<(), InternalError> {
        match &stmt.kind {
            StmtKind::Expr(expr) => {
                self.visit_expr(expr, active)?;
                if let ExprKind::Call { name, args } = &expr.kind {
                    if let Some(op) = self.removal_candidate(name, args)? {
                        if op.location == Location::Memory && self.ignore_memory {
                            return Ok(());
                        }
                        active.entry(op.location).or_default().insert(stmt.id);
                        self.all_stores.insert(stmt.id);
                        self.operations.insert(stmt.id, op);
                    }
                }
                Ok(())
            }
            StmtKind::Let { value, .. } => match value {
                Some(expr) => self.visit_expr(expr, active),
                None => Ok(()),
            },
            StmtKind::Assign { value, .. } => self.visit_expr(value, active),
            _ => Ok(()),
        }
    }

    fn visit_expr(
        &mut self,
        expr: &Expr,
        active: &mut ActiveState<Location>,
    ) -> Result<(), InternalError> {
        if let ExprKind::Call { name, args } = &expr.kind {
            for arg in args {
                self.visit_expr(arg, active)?;
            }
            let flow = if let Some(builtin) = self.dialect.builtin(name) {
                for signature in &builtin.operations {
                    let op = operation_from_signature(signature, args);
                    self.apply_operation(&op, active)?;
                }
                builtin.control_flow
            } else {
                let effects = self.side_effects.get(name).ok_or_else(|| {
                    InternalError::new(format!(
                        "call to undefined function '{}' in store elimination",
                        name
                    ))
                })?;
                for (location, effect) in [
                    (Location::Memory, effects.memory),
                    (Location::Storage, effects.storage),
                ] {
                    // Unknown extent: a read relates to every active store.
                    // A write with unknown extent covers nothing, so it is
                    // not modeled at all.
                    if effect >= Effect::Read {
                        self.apply_operation(
                            &Operation {
                                location,
                                effect: Effect::Read,
                                start: None,
                                length: None,
                            },
                            active,
                        )?;
                    }
                }
                *self.control_flow.get(name).ok_or_else(|| {
                    InternalError::new(format!(
                        "missing control-flow data for function '{}'",
                        name
                    ))
                })?
            };

            if flow.can_terminate {
                // A committing halt makes pending storage writes final.
                self.mark_active_as_used(Location::Storage, active);
            }
            if !flow.can_continue {
                active.entry(Location::Memory).or_default().clear();
                if !flow.can_terminate {
                    active.entry(Location::Storage).or_default().clear();
                }
            }
        }
        Ok(())
    }

    fn visit_leave(&mut self, _func: &FunctionDef, active: &mut ActiveState<Location>) {
        self.mark_active_as_used(Location::Memory, active);
        self.mark_active_as_used(Location::Storage, active);
    }

    fn finalize_function(&mut self, _func: &FunctionDef, active: &mut ActiveState<Location>) {
        // The caller resumes after the body, so pending stores stay live.
        self.mark_active_as_used(Location::Memory, active);
        self.mark_active_as_used(Location::Storage, active);
    }

    fn shortcut_nested_loop(
        &mut self,
        _zero_runs: &ActiveState<Location>,
        active: &mut ActiveState<Location>,
    ) {
        self.mark_active_as_used(Location::Memory, active);
        self.mark_active_as_used(Location::Storage, active);
    }
}

impl StoreEliminator<'_> {
    fn mark_active_as_used(&mut self, location: Location, active: &mut ActiveState<Location>) {
        if let Some(stores) = active.get(&location) {
            self.used_stores.extend(stores.iter().copied());
        }
    }

    fn apply_operation(
        &mut self,
        op: &Operation,
        active: &mut ActiveState<Location>,
    ) -> Result<(), InternalError> {
        let stores = active.entry(op.location).or_default();
        let ids: Vec<StmtId> = stores.iter().copied().collect();
        match op.effect {
            Effect::Read => {
                for id in ids {
                    if !self.known_unrelated(&self.operations[&id], op)? {
                        self.used_stores.insert(id);
                        active.entry(op.location).or_default().remove(&id);
                    }
                }
            }
            Effect::Write => {
                for id in ids {
                    if self.known_covered(&self.operations[&id], op) {
                        active.entry(op.location).or_default().remove(&id);
                    }
                }
            }
            Effect::None => {}
        }
        Ok(())
    }

    /// True if the two accesses can never touch a common address.
    fn known_unrelated(&self, a: &Operation, b: &Operation) -> Result<bool, InternalError> {
        if a.location != b.location {
            return Ok(true);
        }
        let k = &self.knowledge;
        match a.location {
            Location::Storage => {
                // Storage operations always span exactly one slot.
                for op in [a, b] {
                    ensure(
                        op.length.is_none() || op.length == Some(Term::Const(1)),
                        "storage operation spans more than one slot",
                    )?;
                }
                Ok(match (&a.start, &b.start) {
                    (Some(sa), Some(sb)) => k.known_different(sa, sb),
                    _ => false,
                })
            }
            Location::Memory => {
                let zero_length =
                    |op: &Operation| op.length.as_ref().is_some_and(|len| k.known_zero(len));
                if zero_length(a) || zero_length(b) {
                    return Ok(true);
                }
                if self.ends_before(a, b) || self.ends_before(b, a) {
                    return Ok(true);
                }
                // Word-sized accesses a full word apart cannot overlap.
                let word_sized = |op: &Operation| {
                    op.length
                        .as_ref()
                        .and_then(|len| k.const_value(len))
                        .is_some_and(|len| len <= WORD_SIZE)
                };
                if word_sized(a) && word_sized(b) {
                    if let (Some(sa), Some(sb)) = (&a.start, &b.start) {
                        if k.known_different_by_at_least(sa, sb, WORD_SIZE) {
                            return Ok(true);
                        }
                    }
                }
                Ok(false)
            }
        }
    }

    /// True if `first` provably ends at or before `second` starts, without
    /// wrapping around the address space.
    fn ends_before(&self, first: &Operation, second: &Operation) -> bool {
        let k = &self.knowledge;
        let constant = |term: &Option<Term>| term.as_ref().and_then(|t| k.const_value(t));
        let (Some(start1), Some(len1), Some(start2)) = (
            constant(&first.start),
            constant(&first.length),
            constant(&second.start),
        ) else {
            return false;
        };
        match start1.checked_add(len1) {
            Some(end1) => end1 <= start2,
            None => false,
        }
    }

    /// True if every address `covered` writes is also written by
    /// `covering`, so the earlier store is fully shadowed.
    fn known_covered(&self, covered: &Operation, covering: &Operation) -> bool {
        if covered.location != covering.location {
            return false;
        }
        let k = &self.knowledge;
        if covered.location == Location::Memory
            && covered
                .length
                .as_ref()
                .is_some_and(|len| k.known_zero(len))
        {
            return true;
        }
        if let (Some(covered_start), Some(covering_start)) = (&covered.start, &covering.start) {
            if k.known_equal(covered_start, covering_start) {
                if let (Some(covered_len), Some(covering_len)) = (&covered.length, &covering.length)
                {
                    if k.known_equal(covered_len, covering_len) {
                        return true;
                    }
                    if covered.location == Location::Memory {
                        if let (Some(covered_len), Some(covering_len)) =
                            (k.const_value(covered_len), k.const_value(covering_len))
                        {
                            if covered_len <= covering_len {
                                return true;
                            }
                        }
                    }
                }
            }
        }
        // Constant intervals with containment. Storage slots are only
        // covered via the identity rules above.
        if covered.location == Location::Memory {
            let constant = |term: &Option<Term>| term.as_ref().and_then(|t| k.const_value(t));
            if let (Some(covered_start), Some(covered_len), Some(covering_start), Some(covering_len)) = (
                constant(&covered.start),
                constant(&covered.length),
                constant(&covering.start),
                constant(&covering.length),
            ) {
                let covered_end = covered_start.checked_add(covered_len);
                let covering_end = covering_start.checked_add(covering_len);
                if let (Some(covered_end), Some(covering_end)) = (covered_end, covering_end) {
                    if covering_start <= covered_start && covered_end <= covering_end {
                        return true;
                    }
                }
            }
        }
        false
    }

    /// Decide whether `name(args)` as a bare expression statement is a
    /// store whose removal this pass may consider. Returns its write
    /// operation if so.
    fn removal_candidate(
        &self,
        name: &str,
        args: &[Expr],
    ) -> Result<Option<Operation>, InternalError> {
        let Some(builtin) = self.dialect.builtin(name) else {
            return Ok(None);
        };
        let semantic = semantic_store_candidate(builtin);
        let listed = listed_store_candidate(name);
        ensure(
            semantic == listed.is_some(),
            "builtin table disagrees with the store-candidate list",
        )?;
        if !semantic {
            return Ok(None);
        }
        // Removing the statement drops its argument expressions too, so
        // every argument must be a plain literal or variable.
        if !args.iter().all(Expr::is_simple) {
            return Ok(None);
        }
        // returndatacopy traps when it reads past the end of the return
        // data, so removing it is only sound when the copy provably stays
        // in bounds: source offset zero and length exactly the size of
        // the return data.
        if name == "returndatacopy" && !self.copies_whole_returndata(args) {
            return Ok(None);
        }
        Ok(Some(operation_from_signature(&builtin.operations[0], args)))
    }

    fn copies_whole_returndata(&self, args: &[Expr]) -> bool {
        let Some(source) = term_for_arg(args, 1) else {
            return false;
        };
        if !self.knowledge.known_zero(&source) {
            return false;
        }
        let Some(ExprKind::Ident(length_var)) = args.get(2).map(|arg| &arg.kind) else {
            return false;
        };
        matches!(
            self.knowledge.definition(length_var),
            Some(ExprKind::Call { name, .. }) if name == "returndatasize"
        )
    }
}

/// Store instructions the candidate classifier must accept, kept as a
/// cross-check against the semantic derivation from the builtin table.
fn listed_store_candidate(name: &str) -> Option<Location> {
    match name {
        "sstore" => Some(Location::Storage),
        "mstore" | "mstore8" | "calldatacopy" | "codecopy" | "extcodecopy" | "returndatacopy" => {
            Some(Location::Memory)
        }
        _ => None,
    }
}

/// A builtin is a store candidate when deleting a call to it only loses
/// one write: no return value, no halting, exactly one declared operation
/// which is a write with a known start argument, and no observable effects
/// beyond that write (reading foreign state is fine, changing it is not).
fn semantic_store_candidate(builtin: &Builtin) -> bool {
    if builtin.return_count != 0 || builtin.control_flow != ControlFlowEffects::NORMAL {
        return false;
    }
    let [signature] = builtin.operations.as_slice() else {
        return false;
    };
    if signature.effect != Effect::Write || signature.start_param.is_none() {
        return false;
    }
    let effects = builtin.side_effects;
    let (own, other) = match signature.location {
        Location::Memory => (effects.memory, effects.storage),
        Location::Storage => (effects.storage, effects.memory),
    };
    own == Effect::Write && other == Effect::None && effects.other_state <= Effect::Read
}

fn operation_from_signature(signature: &OpSignature, args: &[Expr]) -> Operation {
    let length = match signature.length_constant {
        Some(constant) => Some(Term::Const(constant)),
        None => signature
            .length_param
            .and_then(|index| term_for_arg(args, index)),
    };
    Operation {
        location: signature.location,
        effect: signature.effect,
        start: signature.start_param.and_then(|index| term_for_arg(args, index)),
        length,
    }
}

/// The argument as a term, or `None` when it is a nested call and the
/// extent must stay unknown.
fn term_for_arg(args: &[Expr], index: usize) -> Option<Term> {
    match args.get(index).map(|arg| &arg.kind) {
        Some(ExprKind::Literal(value)) => Some(Term::Const(*value)),
        Some(ExprKind::Ident(name)) => Some(Term::Var(name.clone())),
        _ => None,
    }
}
