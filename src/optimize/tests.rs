use pretty_assertions::assert_eq;

use crate::dialect::Dialect;
use crate::ir::Block;
use crate::parse_source;
use crate::syntax::printer::print_program;

use super::{assign_elim, loop_init, store_elim, optimize, Settings};

fn parse(source: &str) -> Block {
    parse_source(source).expect("test program parses")
}

fn after_store_elim(source: &str) -> String {
    after_store_elim_with(&Dialect::new(), source)
}

fn after_store_elim_with(dialect: &Dialect, source: &str) -> String {
    let mut block = parse(source);
    loop_init::hoist_loop_init(&mut block);
    store_elim::eliminate_unused_stores(dialect, &mut block, true).expect("pass succeeds");
    print_program(&block)
}

fn after_assign_elim(source: &str) -> String {
    let mut block = parse(source);
    loop_init::hoist_loop_init(&mut block);
    assign_elim::eliminate_unused_assignments(&Dialect::new(), &mut block)
        .expect("pass succeeds");
    print_program(&block)
}

fn after_optimize(source: &str) -> String {
    let mut block = parse(source);
    optimize(&Dialect::new(), &mut block, &Settings::default()).expect("optimizer succeeds");
    print_program(&block)
}

// ── Store elimination: storage ──

#[test]
fn overwritten_storage_store_is_removed() {
    let out = after_store_elim("sstore(0, 1)\nsstore(0, 2)\n");
    assert_eq!(out, "sstore(0, 2)\n");
}

#[test]
fn final_storage_store_is_kept() {
    let out = after_store_elim("sstore(0, 1)\n");
    assert_eq!(out, "sstore(0, 1)\n");
}

#[test]
fn read_slot_keeps_the_store() {
    let source = "sstore(0, 1)\nlet a := sload(0)\nsstore(0, a)\n";
    assert_eq!(after_store_elim(source), source);
}

#[test]
fn read_of_unrelated_slot_does_not_keep_the_store() {
    let out = after_store_elim("sstore(0, 1)\nlet a := sload(1)\nsstore(0, a)\n");
    assert_eq!(out, "let a := sload(1)\nsstore(0, a)\n");
}

#[test]
fn equal_symbolic_keys_cover() {
    let out = after_store_elim("let key := calldataload(0)\nsstore(key, 1)\nsstore(key, 2)\n");
    assert_eq!(out, "let key := calldataload(0)\nsstore(key, 2)\n");
}

#[test]
fn unknown_key_read_keeps_all_storage_stores() {
    let source = "let key := calldataload(0)\nsstore(0, 1)\nlet a := sload(key)\nsstore(0, 2)\n";
    assert_eq!(after_store_elim(source), source);
}

// ── Store elimination: memory ──

#[test]
fn overwritten_memory_store_is_removed() {
    let out = after_store_elim("mstore(0, 1)\nmstore(0, 2)\nreturn(0, 32)\n");
    assert_eq!(out, "mstore(0, 2)\nreturn(0, 32)\n");
}

#[test]
fn memory_store_dies_with_the_program() {
    assert_eq!(after_store_elim("mstore(0, 1)\n"), "");
}

#[test]
fn observable_memory_keeps_trailing_stores() {
    let dialect = Dialect::with_observable_memory();
    let out = after_store_elim_with(&dialect, "mstore(0, 1)\n");
    assert_eq!(out, "mstore(0, 1)\n");
}

#[test]
fn return_range_keeps_memory_stores() {
    let source = "mstore(0, 1)\nreturn(0, 32)\n";
    assert_eq!(after_store_elim(source), source);
}

#[test]
fn zero_length_return_does_not_keep_memory() {
    let out = after_store_elim("mstore(0, 1)\nreturn(0, 0)\n");
    assert_eq!(out, "return(0, 0)\n");
}

#[test]
fn revert_discards_pending_storage_stores() {
    let out = after_store_elim("sstore(0, 1)\nrevert(0, 0)\n");
    assert_eq!(out, "revert(0, 0)\n");
}

#[test]
fn stop_commits_pending_storage_stores() {
    let source = "sstore(0, 1)\nstop()\n";
    assert_eq!(after_store_elim(source), source);
}

#[test]
fn word_apart_accesses_do_not_alias() {
    let out = after_store_elim("mstore(0, 1)\nlet a := mload(32)\nmstore(0, a)\nreturn(0, 64)\n");
    assert_eq!(out, "let a := mload(32)\nmstore(0, a)\nreturn(0, 64)\n");
}

#[test]
fn small_store_is_covered_by_word_store() {
    let out = after_store_elim("mstore8(0, 1)\nmstore(0, 2)\nreturn(0, 32)\n");
    assert_eq!(out, "mstore(0, 2)\nreturn(0, 32)\n");
}

#[test]
fn symbolic_offset_store_survives_symbolic_read() {
    let source = "let p := calldataload(0)\nmstore(p, 1)\nreturn(p, 32)\n";
    assert_eq!(after_store_elim(source), source);
}

#[test]
fn offset_by_a_word_does_not_cover() {
    let source =
        "let p := calldataload(0)\nmstore(p, 1)\nlet q := add(p, 32)\nmstore(q, 2)\nreturn(p, 64)\n";
    assert_eq!(after_store_elim(source), source);
}

#[test]
fn msize_disables_memory_elimination() {
    let source = "mstore(0, 1)\nlet m := msize()\nsstore(0, m)\n";
    assert_eq!(after_store_elim(source), source);
}

#[test]
fn keccak_read_keeps_hashed_range() {
    let source = "mstore(0, 1)\nlet h := keccak256(0, 32)\nsstore(0, h)\n";
    assert_eq!(after_store_elim(source), source);
}

#[test]
fn log_read_keeps_logged_range() {
    let source = "mstore(0, 1)\nlog0(0, 32)\n";
    assert_eq!(after_store_elim(source), source);
}

#[test]
fn store_with_effectful_argument_is_kept() {
    // Deleting the store would delete the call in its argument too.
    let source = "function bump() -> v {\n    sstore(5, 1)\n    v := 2\n}\nmstore(0, bump())\n";
    assert_eq!(after_store_elim(source), source);
}

#[test]
fn shadowed_names_in_other_functions_do_not_prove_coverage() {
    // Two distinct variables named x; the second declaration must not make
    // sstore(x, 7) look like a store to slot 1.
    let source = "function f() {\n    let x := 0\n    sstore(x, 7)\n    sstore(1, 9)\n}\nfunction g() {\n    let x := 1\n    sstore(x, 3)\n}\nf()\ng()\n";
    assert_eq!(after_store_elim(source), source);
}

#[test]
fn reassigned_pointer_does_not_prove_coverage() {
    // p holds different addresses at the two stores.
    let source = "let p := calldataload(0)\nmstore(p, 1)\np := add(p, 32)\nmstore(p, 2)\nreturn(0, 64)\n";
    assert_eq!(after_store_elim(source), source);
}

#[test]
fn unknown_extent_callee_keeps_pending_stores() {
    let source = "function clobber() {\n    sstore(0, 9)\n}\nsstore(0, 1)\nclobber()\nlet a := sload(0)\nsstore(1, a)\n";
    assert_eq!(after_store_elim(source), source);
}

// ── Store elimination: returndatacopy ──

#[test]
fn whole_returndata_copy_is_removable() {
    let out = after_store_elim("let n := returndatasize()\nreturndatacopy(0, 0, n)\n");
    assert_eq!(out, "let n := returndatasize()\n");
}

#[test]
fn partial_returndata_copy_is_kept() {
    // Copying from a nonzero source offset can abort, so the statement
    // must stay even though nothing reads the bytes.
    let source = "let n := returndatasize()\nreturndatacopy(0, 1, n)\n";
    assert_eq!(after_store_elim(source), source);
}

#[test]
fn returndata_copy_with_unrelated_length_is_kept() {
    let source = "returndatacopy(0, 0, 32)\n";
    assert_eq!(after_store_elim(source), source);
}

// ── Store elimination: control flow ──

#[test]
fn branch_join_keeps_both_paths_consistent() {
    let out = after_store_elim(
        "sstore(0, 1)\nif calldataload(0) {\n    sstore(0, 2)\n}\nsstore(0, 3)\n",
    );
    assert_eq!(out, "if calldataload(0) {\n}\nsstore(0, 3)\n");
}

#[test]
fn store_read_in_branch_is_kept() {
    let source = "sstore(0, 1)\nif calldataload(0) {\n    let a := sload(0)\n    sstore(1, a)\n}\nsstore(0, 2)\n";
    assert_eq!(after_store_elim(source), source);
}

#[test]
fn switch_without_default_falls_through() {
    let source = "sstore(0, 1)\nswitch calldataload(0)\ncase 0 {\n    sstore(0, 2)\n}\nlet a := sload(0)\nsstore(1, a)\n";
    assert_eq!(after_store_elim(source), source);
}

#[test]
fn switch_covering_every_path_removes_the_store() {
    let out = after_store_elim(
        "sstore(0, 1)\nswitch calldataload(0)\ncase 0 {\n    sstore(0, 2)\n}\ndefault {\n    sstore(0, 3)\n}\n",
    );
    assert_eq!(
        out,
        "switch calldataload(0)\ncase 0 {\n    sstore(0, 2)\n}\ndefault {\n    sstore(0, 3)\n}\n"
    );
}

#[test]
fn store_written_each_iteration_is_kept() {
    let source = "let i := 0\nfor { } lt(i, 2) { i := add(i, 1) } {\n    sstore(0, i)\n}\n";
    assert_eq!(after_store_elim(source), source);
}

#[test]
fn loop_back_edge_read_keeps_the_store() {
    let source = "let i := 0\nfor { } lt(i, 2) { i := add(i, 1) } {\n    sstore(0, i)\n    let a := sload(0)\n    sstore(1, a)\n}\n";
    assert_eq!(after_store_elim(source), source);
}

#[test]
fn function_body_stores_stay_live_for_the_caller() {
    let source = "function store_one() {\n    sstore(0, 1)\n}\nstore_one()\n";
    assert_eq!(after_store_elim(source), source);
}

#[test]
fn function_side_effects_are_seen_at_the_call_site() {
    // The call reads storage with unknown extent, so the pending store
    // must be kept.
    let source = "function peek() -> v {\n    v := sload(0)\n}\nsstore(0, 1)\nlet a := peek()\nsstore(0, a)\n";
    assert_eq!(after_store_elim(source), source);
}

#[test]
fn reverting_function_discards_pending_storage() {
    let out = after_store_elim("function fail() {\n    revert(0, 0)\n}\nsstore(0, 1)\nfail()\n");
    assert_eq!(out, "function fail() {\n    revert(0, 0)\n}\nfail()\n");
}

#[test]
fn terminating_function_commits_pending_storage() {
    let source = "function halt() {\n    stop()\n}\nsstore(0, 1)\nhalt()\n";
    assert_eq!(after_store_elim(source), source);
}

#[test]
fn shallow_nesting_still_covers_across_loops() {
    let mut source = String::new();
    for _ in 0..5 {
        source.push_str("for { } 1 { } {\n");
    }
    source.push_str("sstore(0, 1)\n");
    for _ in 0..5 {
        source.push_str("}\n");
    }
    source.push_str("sstore(0, 2)\n");
    let out = after_store_elim(&source);
    assert!(!out.contains("sstore(0, 1)"));
    assert!(out.contains("sstore(0, 2)"));
}

#[test]
fn deep_nesting_shortcut_keeps_the_store() {
    let mut source = String::new();
    for _ in 0..7 {
        source.push_str("for { } 1 { } {\n");
    }
    source.push_str("sstore(0, 1)\n");
    for _ in 0..7 {
        source.push_str("}\n");
    }
    source.push_str("sstore(0, 2)\n");
    let out = after_store_elim(&source);
    assert!(out.contains("sstore(0, 1)"));
    assert!(out.contains("sstore(0, 2)"));
}

#[test]
fn break_outside_loop_is_an_internal_error() {
    let mut block = parse("break\n");
    let result = store_elim::eliminate_unused_stores(&Dialect::new(), &mut block, true);
    assert!(result.is_err());
}

// ── Assignment elimination ──

#[test]
fn overwritten_assignment_is_removed() {
    let out = after_assign_elim("let x := 0\nx := 1\nx := 2\nsstore(0, x)\n");
    assert_eq!(out, "let x := 0\nx := 2\nsstore(0, x)\n");
}

#[test]
fn assignment_unused_at_program_end_is_removed() {
    let out = after_assign_elim("let x := 0\nx := 7\n");
    assert_eq!(out, "let x := 0\n");
}

#[test]
fn assignment_read_in_branch_is_kept() {
    let source = "let x := 0\nx := 1\nif calldataload(0) {\n    sstore(0, x)\n}\nx := 2\nsstore(1, x)\n";
    assert_eq!(after_assign_elim(source), source);
}

#[test]
fn effectful_assignment_is_never_removed() {
    let source = "let x := 0\nx := sload(0)\nx := 1\nsstore(0, x)\n";
    assert_eq!(after_assign_elim(source), source);
}

#[test]
fn loop_carried_assignment_is_kept() {
    let source = "let x := 0\nlet i := 0\nfor { } lt(i, 2) { i := add(i, 1) } {\n    sstore(i, x)\n    x := add(x, 1)\n}\n";
    assert_eq!(after_assign_elim(source), source);
}

#[test]
fn continue_path_assignment_is_kept() {
    let source = "let x := 0\nlet i := 0\nfor { } lt(i, 10) { i := add(i, 1) } {\n    x := 1\n    if eq(i, 5) {\n        continue\n    }\n    x := 2\n}\nsstore(0, x)\n";
    assert_eq!(after_assign_elim(source), source);
}

#[test]
fn return_variable_assignment_is_kept() {
    let source = "function one() -> r {\n    r := 1\n}\nlet v := one()\nsstore(0, v)\n";
    assert_eq!(after_assign_elim(source), source);
}

#[test]
fn assignment_dead_inside_function_is_removed() {
    let out = after_assign_elim("function noop() {\n    let x := 0\n    x := 5\n}\nnoop()\n");
    assert_eq!(out, "function noop() {\n    let x := 0\n}\nnoop()\n");
}

#[test]
fn leave_keeps_return_assignment() {
    let source = "function pick() -> r {\n    r := 1\n    if calldataload(0) {\n        leave\n    }\n    r := 2\n}\nlet v := pick()\nsstore(0, v)\n";
    assert_eq!(after_assign_elim(source), source);
}

// ── Loop init hoisting ──

#[test]
fn loop_init_is_hoisted() {
    let mut block = parse("for { let i := 0 } lt(i, 2) { i := add(i, 1) } {\n    sstore(i, i)\n}\n");
    loop_init::hoist_loop_init(&mut block);
    assert_eq!(
        print_program(&block),
        "let i := 0\nfor { } lt(i, 2) { i := add(i, 1) } {\n    sstore(i, i)\n}\n"
    );
}

#[test]
fn nested_loop_inits_are_hoisted() {
    let mut block = parse(
        "for { let i := 0 } lt(i, 2) { i := add(i, 1) } {\n    for { let j := 0 } lt(j, 2) { j := add(j, 1) } {\n        sstore(i, j)\n    }\n}\n",
    );
    loop_init::hoist_loop_init(&mut block);
    assert_eq!(
        print_program(&block),
        "let i := 0\nfor { } lt(i, 2) { i := add(i, 1) } {\n    let j := 0\n    for { } lt(j, 2) { j := add(j, 1) } {\n        sstore(i, j)\n    }\n}\n"
    );
}

// ── Whole pipeline ──

#[test]
fn pipeline_cascades_between_passes() {
    // Round one removes the dead assignment and the covered store; round
    // two removes the assignment that store was the only reader of.
    let out = after_optimize("let x := 0\nx := 1\nsstore(0, x)\nx := 2\nsstore(0, 3)\n");
    assert_eq!(out, "let x := 0\nsstore(0, 3)\n");
}

#[test]
fn optimize_is_idempotent() {
    let source = "let x := 0\nx := 1\nmstore(0, x)\nmstore(0, 2)\nsstore(0, 1)\nsstore(0, 2)\nreturn(0, 32)\n";
    let once = after_optimize(source);
    let twice = after_optimize(&once);
    assert_eq!(once, twice);
}

#[test]
fn optimize_reports_removals() {
    let mut block = parse("sstore(0, 1)\nsstore(0, 2)\nlet x := 0\nx := 7\n");
    let outcome = optimize(&Dialect::new(), &mut block, &Settings::default())
        .expect("optimizer succeeds");
    assert_eq!(outcome.removed_stores, 1);
    assert_eq!(outcome.removed_assignments, 1);
}
