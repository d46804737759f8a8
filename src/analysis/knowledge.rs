//! Symbolic value queries over the SSA snapshot.
//!
//! Offsets and lengths of store operations are captured as terms: a plain
//! variable reference or a word constant. The knowledge base chases a term
//! through single-assignment definitions, folding chains of `add`/`sub`
//! with one constant operand into `base + offset` form, and answers the
//! alias questions the store eliminator asks. Every query errs toward
//! "don't know", which keeps stores alive.

use crate::analysis::SsaValues;
use crate::ir::{Expr, ExprKind};

/// A store offset or length as the eliminator sees it: either the name of
/// the variable holding it or a compile-time constant.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Term {
    Var(String),
    Const(u64),
}

/// `base + offset` with wraparound, where `base` is an unresolved variable
/// or absent for a pure constant.
#[derive(Clone, Debug, PartialEq, Eq)]
struct Linear {
    base: Option<String>,
    offset: u64,
}

/// Bound on definition-chasing depth; chains longer than this stay opaque.
const MAX_RESOLUTION_DEPTH: usize = 32;

pub struct Knowledge<'a> {
    ssa: &'a SsaValues,
}

impl<'a> Knowledge<'a> {
    pub fn new(ssa: &'a SsaValues) -> Self {
        Self { ssa }
    }

    /// The defining expression of a single-assignment variable, undigested.
    pub fn definition(&self, name: &str) -> Option<&ExprKind> {
        self.ssa.value(name).map(|expr| &expr.kind)
    }

    pub fn const_value(&self, term: &Term) -> Option<u64> {
        let linear = self.resolve(term);
        match linear.base {
            None => Some(linear.offset),
            Some(_) => None,
        }
    }

    pub fn known_zero(&self, term: &Term) -> bool {
        self.const_value(term) == Some(0)
    }

    /// True if the two terms always hold the same value.
    pub fn known_equal(&self, a: &Term, b: &Term) -> bool {
        let a = self.resolve(a);
        let b = self.resolve(b);
        a == b && self.stable_base(&a)
    }

    /// True if the two terms never hold the same value.
    pub fn known_different(&self, a: &Term, b: &Term) -> bool {
        let a = self.resolve(a);
        let b = self.resolve(b);
        a.base == b.base && a.offset != b.offset && self.stable_base(&a)
    }

    /// True if the two terms always differ by at least `distance`, in both
    /// wraparound directions.
    pub fn known_different_by_at_least(&self, a: &Term, b: &Term, distance: u64) -> bool {
        let a = self.resolve(a);
        let b = self.resolve(b);
        if a.base != b.base || a.offset == b.offset || !self.stable_base(&a) {
            return false;
        }
        a.offset.wrapping_sub(b.offset) >= distance && b.offset.wrapping_sub(a.offset) >= distance
    }

    /// A shared base only supports a conclusion when it names a variable
    /// with a single fixed value. Reassigned, duplicated, or implicitly
    /// bound names can denote different values at the two occurrences, so
    /// structurally equal resolutions through them prove nothing.
    fn stable_base(&self, linear: &Linear) -> bool {
        match &linear.base {
            None => true,
            Some(name) => self.ssa.contains(name),
        }
    }

    fn resolve(&self, term: &Term) -> Linear {
        match term {
            Term::Const(value) => Linear {
                base: None,
                offset: *value,
            },
            Term::Var(name) => self.resolve_name(name, MAX_RESOLUTION_DEPTH),
        }
    }

    fn resolve_name(&self, name: &str, depth: usize) -> Linear {
        let opaque = Linear {
            base: Some(name.to_string()),
            offset: 0,
        };
        if depth == 0 {
            return opaque;
        }
        let Some(value) = self.ssa.value(name) else {
            return opaque;
        };
        self.resolve_expr(value, depth - 1).unwrap_or(opaque)
    }

    fn resolve_expr(&self, expr: &Expr, depth: usize) -> Option<Linear> {
        match &expr.kind {
            ExprKind::Literal(value) => Some(Linear {
                base: None,
                offset: *value,
            }),
            ExprKind::Ident(name) => Some(self.resolve_name(name, depth)),
            ExprKind::Call { name, args } if args.len() == 2 => {
                let lhs = self.resolve_expr(&args[0], depth)?;
                let rhs = self.resolve_expr(&args[1], depth)?;
                match name.as_str() {
                    // One side must be constant; base + base stays opaque.
                    "add" => match (&lhs.base, &rhs.base) {
                        (_, None) => Some(Linear {
                            base: lhs.base,
                            offset: lhs.offset.wrapping_add(rhs.offset),
                        }),
                        (None, _) => Some(Linear {
                            base: rhs.base,
                            offset: rhs.offset.wrapping_add(lhs.offset),
                        }),
                        _ => None,
                    },
                    "sub" => match &rhs.base {
                        None => Some(Linear {
                            base: lhs.base,
                            offset: lhs.offset.wrapping_sub(rhs.offset),
                        }),
                        Some(_) => None,
                    },
                    _ => None,
                }
            }
            ExprKind::Call { .. } => None,
        }
    }
}
