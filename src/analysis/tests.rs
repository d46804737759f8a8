use crate::dialect::{Dialect, Effect};
use crate::ir::Block;
use crate::parse_source;

use super::*;

fn parse(source: &str) -> Block {
    parse_source(source).expect("test program parses")
}

// ── Call graph ──

#[test]
fn call_graph_attributes_calls_to_the_enclosing_function() {
    let block = parse(
        "function outer() {\n    inner()\n    function inner() {\n        sstore(0, 1)\n    }\n}\nouter()\n",
    );
    let graph = CallGraph::build(&block);
    assert!(graph.calls["outer"].contains("inner"));
    assert!(graph.calls["inner"].contains("sstore"));
    assert!(graph.root_calls.contains("outer"));
    assert!(!graph.root_calls.contains("inner"));
}

#[test]
fn sccs_order_callees_before_callers() {
    let block = parse(
        "function a() {\n    b()\n}\nfunction b() {\n    c()\n}\nfunction c() {\n    stop()\n}\na()\n",
    );
    let graph = CallGraph::build(&block);
    let components = graph.sccs();
    let position = |name: &str| {
        components
            .iter()
            .position(|component| component.contains(&name))
            .expect("function present")
    };
    assert!(position("c") < position("b"));
    assert!(position("b") < position("a"));
}

#[test]
fn mutual_recursion_shares_a_component() {
    let block = parse(
        "function even(n) -> r {\n    r := 1\n    if n {\n        r := odd(sub(n, 1))\n    }\n}\nfunction odd(n) -> r {\n    if n {\n        r := even(sub(n, 1))\n    }\n}\nlet v := even(4)\nsstore(0, v)\n",
    );
    let graph = CallGraph::build(&block);
    let components = graph.sccs();
    let shared = components
        .iter()
        .find(|component| component.contains(&"even"))
        .expect("component exists");
    assert!(shared.contains(&"odd"));
}

// ── Side effects ──

#[test]
fn side_effects_propagate_through_calls() {
    let block = parse(
        "function write_slot() {\n    sstore(0, 1)\n}\nfunction wrapper() {\n    write_slot()\n}\nwrapper()\n",
    );
    let dialect = Dialect::new();
    let graph = CallGraph::build(&block);
    let effects = function_side_effects(&dialect, &graph).expect("analysis succeeds");
    assert_eq!(effects["write_slot"].storage, Effect::Write);
    assert_eq!(effects["wrapper"].storage, Effect::Write);
    assert_eq!(effects["wrapper"].memory, Effect::None);
}

#[test]
fn recursive_functions_join_component_effects() {
    let block = parse(
        "function ping(n) {\n    if n {\n        pong(sub(n, 1))\n    }\n    sstore(n, n)\n}\nfunction pong(n) {\n    if n {\n        ping(sub(n, 1))\n    }\n    let v := mload(0)\n    pop(v)\n}\nping(3)\n",
    );
    let dialect = Dialect::new();
    let graph = CallGraph::build(&block);
    let effects = function_side_effects(&dialect, &graph).expect("analysis succeeds");
    for name in ["ping", "pong"] {
        assert_eq!(effects[name].storage, Effect::Write);
        assert_eq!(effects[name].memory, Effect::Read);
    }
}

// ── Control flow ──

#[test]
fn reverting_function_cannot_continue_or_terminate() {
    let block = parse("function fail() {\n    revert(0, 0)\n}\nfail()\n");
    let dialect = Dialect::new();
    let flags = function_control_flow(&dialect, &block).expect("analysis succeeds");
    assert!(!flags["fail"].can_continue);
    assert!(!flags["fail"].can_terminate);
}

#[test]
fn returning_function_terminates_and_cannot_continue() {
    let block = parse("function halt() {\n    return(0, 0)\n}\nhalt()\n");
    let dialect = Dialect::new();
    let flags = function_control_flow(&dialect, &block).expect("analysis succeeds");
    assert!(!flags["halt"].can_continue);
    assert!(flags["halt"].can_terminate);
}

#[test]
fn conditional_halt_keeps_both_flags() {
    let block = parse(
        "function maybe_halt(n) {\n    if n {\n        stop()\n    }\n}\nmaybe_halt(1)\n",
    );
    let dialect = Dialect::new();
    let flags = function_control_flow(&dialect, &block).expect("analysis succeeds");
    assert!(flags["maybe_halt"].can_continue);
    assert!(flags["maybe_halt"].can_terminate);
}

#[test]
fn divergence_propagates_through_wrappers() {
    let block = parse(
        "function fail() {\n    revert(0, 0)\n}\nfunction wrapper() {\n    fail()\n}\nwrapper()\n",
    );
    let dialect = Dialect::new();
    let flags = function_control_flow(&dialect, &block).expect("analysis succeeds");
    assert!(!flags["wrapper"].can_continue);
}

#[test]
fn leave_counts_as_a_normal_exit() {
    let block = parse(
        "function bail(n) {\n    if n {\n        leave\n    }\n    revert(0, 0)\n}\nbail(1)\n",
    );
    let dialect = Dialect::new();
    let flags = function_control_flow(&dialect, &block).expect("analysis succeeds");
    assert!(flags["bail"].can_continue);
}

// ── SSA values ──

#[test]
fn single_assignments_are_recorded() {
    let block = parse("let x := add(1, 2)\nsstore(0, x)\n");
    let ssa = SsaValues::collect(&block);
    assert!(ssa.contains("x"));
}

#[test]
fn reassigned_variables_are_excluded() {
    let block = parse("let x := 1\nx := 2\nsstore(0, x)\n");
    let ssa = SsaValues::collect(&block);
    assert!(!ssa.contains("x"));
}

#[test]
fn duplicate_declarations_are_excluded() {
    let block = parse(
        "function f() {\n    let x := 0\n    sstore(x, 1)\n}\nfunction g() {\n    let x := 1\n    sstore(x, 2)\n}\nf()\ng()\n",
    );
    let ssa = SsaValues::collect(&block);
    assert!(!ssa.contains("x"));
}

#[test]
fn function_parameters_and_returns_are_excluded() {
    let block = parse("let v := 3\nfunction id(v) -> r {\n    r := v\n}\nsstore(0, id(v))\n");
    let ssa = SsaValues::collect(&block);
    assert!(!ssa.contains("v"));
    assert!(!ssa.contains("r"));
}

#[test]
fn declarations_without_value_count_as_zero() {
    let block = parse("let x\nsstore(0, x)\n");
    let ssa = SsaValues::collect(&block);
    let value = ssa.value("x").expect("x is single-assignment");
    assert_eq!(value.as_literal(), Some(0));
}

// ── Knowledge ──

#[test]
fn constants_resolve_through_definition_chains() {
    let block = parse("let a := 10\nlet b := add(a, 22)\nlet c := sub(b, 2)\nsstore(c, 1)\n");
    let ssa = SsaValues::collect(&block);
    let k = Knowledge::new(&ssa);
    assert_eq!(k.const_value(&Term::Var("c".into())), Some(30));
    assert!(k.known_equal(&Term::Var("c".into()), &Term::Const(30)));
}

#[test]
fn same_base_offsets_are_known_different() {
    let block = parse(
        "let p := calldataload(0)\nlet q := add(p, 32)\nmstore(p, 1)\nmstore(q, 2)\nreturn(p, 64)\n",
    );
    let ssa = SsaValues::collect(&block);
    let k = Knowledge::new(&ssa);
    let p = Term::Var("p".into());
    let q = Term::Var("q".into());
    assert!(k.known_different(&p, &q));
    assert!(k.known_different_by_at_least(&p, &q, 32));
    assert!(!k.known_different_by_at_least(&p, &q, 33));
    assert!(!k.known_equal(&p, &q));
}

#[test]
fn unrelated_bases_stay_unknown() {
    let block = parse("let p := calldataload(0)\nlet q := calldataload(32)\nsstore(p, q)\n");
    let ssa = SsaValues::collect(&block);
    let k = Knowledge::new(&ssa);
    let p = Term::Var("p".into());
    let q = Term::Var("q".into());
    assert!(!k.known_different(&p, &q));
    assert!(!k.known_equal(&p, &q));
    assert_eq!(k.const_value(&p), None);
}

#[test]
fn reassigned_bases_support_no_conclusions() {
    // q was defined as p + 32, but p has changed since, so neither
    // equality nor distinctness through p may be concluded.
    let block = parse("let p := calldataload(0)\nlet q := add(p, 32)\np := 0\nsstore(p, q)\n");
    let ssa = SsaValues::collect(&block);
    let k = Knowledge::new(&ssa);
    let p = Term::Var("p".into());
    let q = Term::Var("q".into());
    assert!(!k.known_equal(&p, &p));
    assert!(!k.known_different(&p, &q));
    assert!(!k.known_different_by_at_least(&p, &q, 32));
}

#[test]
fn wraparound_distance_is_checked_both_ways() {
    let block = parse("let p := calldataload(0)\nlet q := add(p, 16)\nsstore(p, q)\n");
    let ssa = SsaValues::collect(&block);
    let k = Knowledge::new(&ssa);
    assert!(!k.known_different_by_at_least(
        &Term::Var("p".into()),
        &Term::Var("q".into()),
        32
    ));
}

// ── msize ──

#[test]
fn msize_is_detected_anywhere_in_the_tree() {
    let dialect = Dialect::new();
    let with = parse("function probe() -> m {\n    m := msize()\n}\nlet v := probe()\nsstore(0, v)\n");
    let without = parse("mstore(0, 1)\nreturn(0, 32)\n");
    assert!(contains_msize(&dialect, &with));
    assert!(!contains_msize(&dialect, &without));
}
