//! Statement deletion by id.

use std::collections::BTreeSet;

use crate::ir::{Block, StmtId, StmtKind};

/// Delete every statement whose id is in `ids`, anywhere in the tree.
/// Nested blocks of surviving statements are processed too.
pub fn erase_statements(block: &mut Block, ids: &BTreeSet<StmtId>) {
    block.stmts.retain_mut(|stmt| {
        if ids.contains(&stmt.id) {
            return false;
        }
        match &mut stmt.kind {
            StmtKind::If { body, .. } => erase_statements(body, ids),
            StmtKind::Switch { cases, default, .. } => {
                for case in cases {
                    erase_statements(&mut case.body, ids);
                }
                if let Some(default) = default {
                    erase_statements(default, ids);
                }
            }
            StmtKind::For {
                init,
                post,
                body,
                ..
            } => {
                erase_statements(init, ids);
                erase_statements(post, ids);
                erase_statements(body, ids);
            }
            StmtKind::FnDef(func) => erase_statements(&mut func.body, ids),
            StmtKind::Block(inner) => erase_statements(inner, ids),
            _ => {}
        }
        true
    });
}
