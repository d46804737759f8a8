//! Hoisting of for-loop init blocks.
//!
//! The store-tracking walk requires every loop init block to be empty,
//! because a non-empty init runs exactly once and would need its own
//! scoping treatment on the back edge. This rewrite splices the init
//! statements into the enclosing block right before the loop. Variable
//! names are unique per program, so widening their scope is harmless.

use std::mem;

use crate::ir::{Block, StmtKind};

pub fn hoist_loop_init(block: &mut Block) {
    let stmts = mem::take(&mut block.stmts);
    let mut out = Vec::with_capacity(stmts.len());
    for mut stmt in stmts {
        match &mut stmt.kind {
            StmtKind::If { body, .. } => hoist_loop_init(body),
            StmtKind::Switch { cases, default, .. } => {
                for case in cases {
                    hoist_loop_init(&mut case.body);
                }
                if let Some(default) = default {
                    hoist_loop_init(default);
                }
            }
            StmtKind::For {
                init,
                post,
                body,
                ..
            } => {
                hoist_loop_init(init);
                hoist_loop_init(post);
                hoist_loop_init(body);
                out.append(&mut init.stmts);
            }
            StmtKind::FnDef(func) => hoist_loop_init(&mut func.body),
            StmtKind::Block(inner) => hoist_loop_init(inner),
            _ => {}
        }
        out.push(stmt);
    }
    block.stmts = out;
}
