//! Read-only traversal helpers for the analyses.

use super::{Block, Expr, ExprKind, Stmt, StmtKind};

/// Visit every statement in the block, including statements nested in
/// control flow and function definitions, in source order, parents first.
/// The callback receives borrows tied to the block, so it may retain them.
pub fn walk_stmts<'a>(block: &'a Block, f: &mut impl FnMut(&'a Stmt)) {
    for stmt in &block.stmts {
        f(stmt);
        match &stmt.kind {
            StmtKind::If { body, .. } => walk_stmts(body, f),
            StmtKind::Switch { cases, default, .. } => {
                for case in cases {
                    walk_stmts(&case.body, f);
                }
                if let Some(default) = default {
                    walk_stmts(default, f);
                }
            }
            StmtKind::For {
                init, post, body, ..
            } => {
                walk_stmts(init, f);
                walk_stmts(post, f);
                walk_stmts(body, f);
            }
            StmtKind::FnDef(func) => walk_stmts(&func.body, f),
            StmtKind::Block(inner) => walk_stmts(inner, f),
            StmtKind::Expr(_)
            | StmtKind::Let { .. }
            | StmtKind::Assign { .. }
            | StmtKind::Break
            | StmtKind::Continue
            | StmtKind::Leave => {}
        }
    }
}

/// Visit every expression in the block, including expressions nested in
/// control flow, call arguments, and function definitions.
pub fn walk_exprs<'a>(block: &'a Block, f: &mut impl FnMut(&'a Expr)) {
    walk_stmts(block, &mut |stmt| match &stmt.kind {
        StmtKind::Expr(expr) => walk_expr(expr, f),
        StmtKind::Let {
            value: Some(expr), ..
        } => walk_expr(expr, f),
        StmtKind::Let { value: None, .. } => {}
        StmtKind::Assign { value, .. } => walk_expr(value, f),
        StmtKind::If { cond, .. } => walk_expr(cond, f),
        StmtKind::Switch { expr, .. } => walk_expr(expr, f),
        StmtKind::For { cond, .. } => walk_expr(cond, f),
        StmtKind::Break
        | StmtKind::Continue
        | StmtKind::Leave
        | StmtKind::FnDef(_)
        | StmtKind::Block(_) => {}
    });
}

/// Visit one expression tree, parents first.
pub fn walk_expr<'a>(expr: &'a Expr, f: &mut impl FnMut(&'a Expr)) {
    f(expr);
    if let ExprKind::Call { args, .. } = &expr.kind {
        for arg in args {
            walk_expr(arg, f);
        }
    }
}
