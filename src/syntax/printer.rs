use crate::ir::*;

/// Print a program block in canonical form. The output re-parses to the
/// same tree, which makes it the comparison oracle for the pass tests.
pub fn print_program(block: &Block) -> String {
    let mut out = String::new();
    print_stmts(block, 0, &mut out);
    out
}

fn print_stmts(block: &Block, indent: usize, out: &mut String) {
    for stmt in &block.stmts {
        print_stmt(stmt, indent, out);
    }
}

fn print_stmt(stmt: &Stmt, indent: usize, out: &mut String) {
    let pad = "    ".repeat(indent);
    match &stmt.kind {
        StmtKind::Expr(expr) => {
            out.push_str(&format!("{}{}\n", pad, print_expr(expr)));
        }
        StmtKind::Let { vars, value } => {
            out.push_str(&format!("{}let {}", pad, vars.join(", ")));
            if let Some(value) = value {
                out.push_str(&format!(" := {}", print_expr(value)));
            }
            out.push('\n');
        }
        StmtKind::Assign { targets, value } => {
            out.push_str(&format!(
                "{}{} := {}\n",
                pad,
                targets.join(", "),
                print_expr(value)
            ));
        }
        StmtKind::If { cond, body } => {
            out.push_str(&format!("{}if {} {{\n", pad, print_expr(cond)));
            print_stmts(body, indent + 1, out);
            out.push_str(&format!("{}}}\n", pad));
        }
        StmtKind::Switch {
            expr,
            cases,
            default,
        } => {
            out.push_str(&format!("{}switch {}\n", pad, print_expr(expr)));
            for case in cases {
                out.push_str(&format!("{}case {} {{\n", pad, case.value));
                print_stmts(&case.body, indent + 1, out);
                out.push_str(&format!("{}}}\n", pad));
            }
            if let Some(default) = default {
                out.push_str(&format!("{}default {{\n", pad));
                print_stmts(default, indent + 1, out);
                out.push_str(&format!("{}}}\n", pad));
            }
        }
        StmtKind::For {
            init,
            cond,
            post,
            body,
        } => {
            out.push_str(&format!("{}for ", pad));
            print_inline_block(init, indent, out);
            out.push_str(&format!(" {} ", print_expr(cond)));
            print_inline_block(post, indent, out);
            out.push_str(" {\n");
            print_stmts(body, indent + 1, out);
            out.push_str(&format!("{}}}\n", pad));
        }
        StmtKind::Break => out.push_str(&format!("{}break\n", pad)),
        StmtKind::Continue => out.push_str(&format!("{}continue\n", pad)),
        StmtKind::Leave => out.push_str(&format!("{}leave\n", pad)),
        StmtKind::FnDef(func) => {
            out.push_str(&format!("{}function {}({})", pad, func.name, func.params.join(", ")));
            if !func.returns.is_empty() {
                out.push_str(&format!(" -> {}", func.returns.join(", ")));
            }
            out.push_str(" {\n");
            print_stmts(&func.body, indent + 1, out);
            out.push_str(&format!("{}}}\n", pad));
        }
        StmtKind::Block(inner) => {
            out.push_str(&format!("{}{{\n", pad));
            print_stmts(inner, indent + 1, out);
            out.push_str(&format!("{}}}\n", pad));
        }
    }
}

/// Loop init/post blocks print on one line: `{ i := add(i, 1) }`.
fn print_inline_block(block: &Block, indent: usize, out: &mut String) {
    if block.stmts.is_empty() {
        out.push_str("{ }");
        return;
    }
    // Multi-statement init/post blocks fall back to the nested form.
    if block.stmts.len() > 1 || !is_inline_printable(&block.stmts[0]) {
        out.push_str("{\n");
        print_stmts(block, indent + 1, out);
        out.push_str(&format!("{}}}", "    ".repeat(indent)));
        return;
    }
    let mut inner = String::new();
    print_stmt(&block.stmts[0], 0, &mut inner);
    out.push_str(&format!("{{ {} }}", inner.trim_end()));
}

fn is_inline_printable(stmt: &Stmt) -> bool {
    matches!(
        stmt.kind,
        StmtKind::Expr(_) | StmtKind::Let { .. } | StmtKind::Assign { .. }
    )
}

fn print_expr(expr: &Expr) -> String {
    match &expr.kind {
        ExprKind::Literal(value) => value.to_string(),
        ExprKind::Ident(name) => name.clone(),
        ExprKind::Call { name, args } => {
            let args: Vec<String> = args.iter().map(print_expr).collect();
            format!("{}({})", name, args.join(", "))
        }
    }
}
