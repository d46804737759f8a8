//! Call graph over user-defined functions.

use std::collections::{BTreeMap, BTreeSet};

use petgraph::graph::{DiGraph, NodeIndex};

use crate::ir::{Block, Expr, ExprKind, StmtKind};

/// Which names each function calls (builtins and user functions alike),
/// plus the calls made outside any function body.
#[derive(Clone, Debug, Default)]
pub struct CallGraph {
    pub calls: BTreeMap<String, BTreeSet<String>>,
    pub root_calls: BTreeSet<String>,
}

impl CallGraph {
    pub fn build(block: &Block) -> CallGraph {
        let mut graph = CallGraph::default();
        collect_block(block, None, &mut graph);
        graph
    }

    pub fn is_function(&self, name: &str) -> bool {
        self.calls.contains_key(name)
    }

    /// Strongly connected components of the user-function subgraph, in an
    /// order where callees come before callers (so effect propagation can
    /// run in a single sweep).
    pub fn sccs(&self) -> Vec<Vec<&str>> {
        let mut petgraph: DiGraph<&str, ()> = DiGraph::new();
        let mut nodes: BTreeMap<&str, NodeIndex> = BTreeMap::new();
        for name in self.calls.keys() {
            nodes.insert(name, petgraph.add_node(name));
        }
        for (caller, callees) in &self.calls {
            for callee in callees {
                if let Some(&to) = nodes.get(callee.as_str()) {
                    petgraph.add_edge(nodes[caller.as_str()], to, ());
                }
            }
        }
        // tarjan_scc returns components in reverse topological order:
        // every edge leads from a later component to an earlier one.
        petgraph::algo::tarjan_scc(&petgraph)
            .into_iter()
            .map(|component| component.into_iter().map(|ix| petgraph[ix]).collect())
            .collect()
    }
}

fn collect_block(block: &Block, current: Option<&str>, graph: &mut CallGraph) {
    for stmt in &block.stmts {
        match &stmt.kind {
            StmtKind::Expr(expr) => collect_expr(expr, current, graph),
            StmtKind::Let {
                value: Some(expr), ..
            } => collect_expr(expr, current, graph),
            StmtKind::Let { value: None, .. } => {}
            StmtKind::Assign { value, .. } => collect_expr(value, current, graph),
            StmtKind::If { cond, body } => {
                collect_expr(cond, current, graph);
                collect_block(body, current, graph);
            }
            StmtKind::Switch {
                expr,
                cases,
                default,
            } => {
                collect_expr(expr, current, graph);
                for case in cases {
                    collect_block(&case.body, current, graph);
                }
                if let Some(default) = default {
                    collect_block(default, current, graph);
                }
            }
            StmtKind::For {
                init,
                cond,
                post,
                body,
            } => {
                collect_block(init, current, graph);
                collect_expr(cond, current, graph);
                collect_block(post, current, graph);
                collect_block(body, current, graph);
            }
            StmtKind::Break | StmtKind::Continue | StmtKind::Leave => {}
            StmtKind::FnDef(func) => {
                // Calls inside a function definition belong to that
                // function, not to the surrounding scope.
                graph.calls.entry(func.name.clone()).or_default();
                collect_block(&func.body, Some(&func.name), graph);
            }
            StmtKind::Block(inner) => collect_block(inner, current, graph),
        }
    }
}

fn collect_expr(expr: &Expr, current: Option<&str>, graph: &mut CallGraph) {
    if let ExprKind::Call { name, args } = &expr.kind {
        match current {
            Some(caller) => {
                graph
                    .calls
                    .entry(caller.to_string())
                    .or_default()
                    .insert(name.clone());
            }
            None => {
                graph.root_calls.insert(name.clone());
            }
        }
        for arg in args {
            collect_expr(arg, current, graph);
        }
    }
}
