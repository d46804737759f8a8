//! Snapshot of variables that are assigned exactly once.

use std::collections::{BTreeMap, BTreeSet};

use crate::ir::{Block, Expr, ExprKind, StmtKind};
use crate::span::Span;

/// Maps every variable that is declared exactly once with a value and never
/// reassigned to a clone of its defining expression. Variables declared
/// without a value count as bound to the literal zero, matching the
/// zero-init semantics of `let x`, but only while they stay unassigned.
///
/// Names are not unique across scopes, so a name declared more than once
/// anywhere in the program is excluded outright: its occurrences may refer
/// to different variables. Function parameters and return variables are
/// excluded the same way (parameters are bound per call, return variables
/// are assigned implicitly).
#[derive(Clone, Debug, Default)]
pub struct SsaValues {
    values: BTreeMap<String, Expr>,
}

impl SsaValues {
    pub fn collect(block: &Block) -> SsaValues {
        let mut candidates: BTreeMap<String, Expr> = BTreeMap::new();
        let mut declared: BTreeSet<String> = BTreeSet::new();
        let mut excluded: BTreeSet<String> = BTreeSet::new();

        crate::ir::visit::walk_stmts(block, &mut |stmt| match &stmt.kind {
            StmtKind::Let { vars, value } => {
                for var in vars {
                    if !declared.insert(var.clone()) {
                        excluded.insert(var.clone());
                    }
                }
                match value {
                    Some(expr) if vars.len() == 1 => {
                        candidates.insert(vars[0].clone(), expr.clone());
                    }
                    Some(_) => {}
                    None => {
                        for var in vars {
                            candidates.insert(
                                var.clone(),
                                Expr {
                                    span: Span::dummy(),
                                    kind: ExprKind::Literal(0),
                                },
                            );
                        }
                    }
                }
            }
            StmtKind::Assign { targets, .. } => {
                for target in targets {
                    excluded.insert(target.clone());
                }
            }
            StmtKind::FnDef(func) => {
                for name in func.params.iter().chain(&func.returns) {
                    declared.insert(name.clone());
                    excluded.insert(name.clone());
                }
            }
            _ => {}
        });

        for name in &excluded {
            candidates.remove(name);
        }
        SsaValues { values: candidates }
    }

    /// The defining expression of a single-assignment variable.
    pub fn value(&self, name: &str) -> Option<&Expr> {
        self.values.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }
}
