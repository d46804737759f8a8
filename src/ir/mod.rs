//! Block-structured intermediate representation.
//!
//! The IR is a tree of blocks and statements over call expressions, in the
//! shape produced by lowering for stack targets with two mutable address
//! spaces: byte-addressed scratch memory and key-addressed persistent
//! storage. All mutation of those spaces happens through builtin calls; the
//! statement forms only carry control flow and variable binding.

pub mod visit;

use crate::span::Span;

/// Stable identity of a statement, assigned once at parse time.
///
/// Passes collect sets of statement ids and the remover erases by id, so the
/// identity survives tree rewrites that move statements around.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct StmtId(pub u32);

/// A sequence of statements. The unit the optimizer operates on is the
/// top-level block of a program.
#[derive(Clone, Debug, Default)]
pub struct Block {
    pub stmts: Vec<Stmt>,
}

/// A statement: unique id plus kind.
#[derive(Clone, Debug)]
pub struct Stmt {
    pub id: StmtId,
    pub span: Span,
    pub kind: StmtKind,
}

#[derive(Clone, Debug)]
pub enum StmtKind {
    /// A call evaluated for its effects only, e.g. `mstore(p, v)`.
    Expr(Expr),
    /// `let a, b := f()` or `let x` (zero-initialized).
    Let {
        vars: Vec<String>,
        value: Option<Expr>,
    },
    /// `a, b := f()`.
    Assign { targets: Vec<String>, value: Expr },
    If {
        cond: Expr,
        body: Block,
    },
    Switch {
        expr: Expr,
        cases: Vec<SwitchCase>,
        default: Option<Block>,
    },
    /// `for { init } cond { post } { body }`.
    For {
        init: Block,
        cond: Expr,
        post: Block,
        body: Block,
    },
    Break,
    Continue,
    /// Early return from the enclosing function.
    Leave,
    FnDef(FunctionDef),
    /// A nested scope.
    Block(Block),
}

#[derive(Clone, Debug)]
pub struct SwitchCase {
    pub value: u64,
    pub body: Block,
}

#[derive(Clone, Debug)]
pub struct FunctionDef {
    pub name: String,
    pub params: Vec<String>,
    pub returns: Vec<String>,
    pub body: Block,
}

#[derive(Clone, Debug)]
pub struct Expr {
    pub span: Span,
    pub kind: ExprKind,
}

#[derive(Clone, Debug)]
pub enum ExprKind {
    /// A word literal.
    Literal(u64),
    Ident(String),
    Call { name: String, args: Vec<Expr> },
}

impl Expr {
    /// The identifier name, if this is a bare variable reference.
    pub fn as_ident(&self) -> Option<&str> {
        match &self.kind {
            ExprKind::Ident(name) => Some(name),
            _ => None,
        }
    }

    /// The literal value, if this is a constant.
    pub fn as_literal(&self) -> Option<u64> {
        match &self.kind {
            ExprKind::Literal(value) => Some(*value),
            _ => None,
        }
    }

    /// True for literals and bare variable references.
    pub fn is_simple(&self) -> bool {
        matches!(self.kind, ExprKind::Literal(_) | ExprKind::Ident(_))
    }
}

/// Allocates statement ids. The parser owns one; tests building IR by hand
/// use one directly.
#[derive(Debug, Default)]
pub struct StmtIdSource {
    next: u32,
}

impl StmtIdSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next_id(&mut self) -> StmtId {
        let id = StmtId(self.next);
        self.next += 1;
        id
    }
}
