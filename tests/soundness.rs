//! Differential tests: optimizing a program must not change its
//! observable trace (halt outcome, final storage, logs).

use riptide::dialect::Dialect;
use riptide::interp::{self, Trace};
use riptide::optimize::{self, Settings};
use riptide::parse_source;

fn trace(source: &str, calldata: &[u8]) -> Trace {
    let block = parse_source(source).expect("program parses");
    interp::run(&block, calldata, interp::DEFAULT_STEP_LIMIT).expect("program runs")
}

/// Optimize and re-run; the trace must be identical. Returns how many
/// statements the optimizer removed.
fn check(source: &str, calldata: &[u8]) -> usize {
    let mut block = parse_source(source).expect("program parses");
    let before = interp::run(&block, calldata, interp::DEFAULT_STEP_LIMIT).expect("program runs");
    let outcome = optimize::optimize(&Dialect::new(), &mut block, &Settings::default())
        .expect("optimizer succeeds");
    let after = interp::run(&block, calldata, interp::DEFAULT_STEP_LIMIT)
        .expect("optimized program runs");
    assert_eq!(before, after, "optimization changed the trace");
    outcome.removed_stores + outcome.removed_assignments
}

#[test]
fn scratch_memory_overwrites() {
    let removed = check(
        "mstore(0, 1)\nmstore(32, 2)\nmstore(0, 3)\nreturn(0, 64)\n",
        &[],
    );
    assert_eq!(removed, 1);
}

#[test]
fn trailing_memory_stores_are_dropped() {
    let removed = check("mstore(0, 1)\nsstore(0, 2)\nmstore(64, 3)\n", &[]);
    assert_eq!(removed, 2);
}

#[test]
fn storage_counter_loop() {
    let removed = check(
        "sstore(0, 999)\nlet total := sload(7)\nfor { let i := 0 } lt(i, 5) { i := add(i, 1) } {\n    total := add(total, i)\n}\nsstore(0, total)\n",
        &[],
    );
    assert!(removed >= 1, "the initial store is overwritten unread");
}

#[test]
fn calldata_branches() {
    let source = "let selector := calldataload(0)\nsstore(0, 1)\nswitch selector\ncase 0 {\n    sstore(0, 2)\n}\ncase 1 {\n    revert(0, 0)\n}\ndefault {\n    sstore(0, selector)\n}\n";
    check(source, &[0u8; 32]);
    let mut one = [0u8; 32];
    one[31] = 1;
    check(source, &one);
    let mut nine = [0u8; 32];
    nine[31] = 9;
    check(source, &nine);
}

#[test]
fn functions_with_leave() {
    let removed = check(
        "function clamp(v, max) -> r {\n    r := v\n    if gt(v, max) {\n        r := max\n        leave\n    }\n}\nlet x := clamp(calldataload(0), 100)\nmstore(0, 7)\nmstore(0, x)\nreturn(0, 32)\n",
        &[0xff; 32],
    );
    assert_eq!(removed, 1);
}

#[test]
fn msize_observers_keep_memory_stores() {
    check("mstore(96, 1)\nlet m := msize()\nsstore(0, m)\n", &[]);
}

#[test]
fn hashed_ranges_stay_intact() {
    check(
        "mstore(0, calldataload(0))\nlet h := keccak256(0, 32)\nsstore(0, h)\nmstore(0, 0)\n",
        &[5u8; 32],
    );
}

#[test]
fn logs_observe_memory() {
    check("mstore(0, 77)\nlog1(0, 32, 123)\nmstore(0, 88)\n", &[]);
}

#[test]
fn returndata_copies() {
    check("let n := returndatasize()\nreturndatacopy(0, 0, n)\nsstore(0, 1)\n", &[]);
    check("returndatacopy(0, 0, 1)\nsstore(0, 1)\n", &[]);
}

#[test]
fn effectful_store_arguments_survive() {
    let removed = check(
        "function bump() -> v {\n    sstore(5, 1)\n    v := 2\n}\nmstore(0, bump())\n",
        &[],
    );
    assert_eq!(removed, 0);
}

#[test]
fn shadowed_declarations_across_functions() {
    let removed = check(
        "function f() {\n    let x := 0\n    sstore(x, 7)\n    sstore(1, 9)\n}\nfunction g() {\n    let x := 1\n    sstore(x, 3)\n}\nf()\ng()\n",
        &[],
    );
    assert_eq!(removed, 0);
}

#[test]
fn reassigned_pointers_keep_both_stores() {
    let removed = check(
        "let p := 0\nmstore(p, 1)\np := add(p, 32)\nmstore(p, 2)\nreturn(0, 64)\n",
        &[],
    );
    assert_eq!(removed, 0);
}

#[test]
fn dead_assignment_chains() {
    let removed = check(
        "let x := 0\nx := 1\nx := add(x, 1)\nx := 5\nsstore(0, x)\nx := 9\n",
        &[],
    );
    assert!(removed >= 2);
}

#[test]
fn nested_loop_shortcut_is_sound() {
    let mut source = String::from("let x := 0\n");
    for depth in 0..7 {
        source.push_str(&format!(
            "for {{ let i{depth} := 0 }} lt(i{depth}, 2) {{ i{depth} := add(i{depth}, 1) }} {{\n"
        ));
    }
    source.push_str("sstore(0, x)\nx := add(x, 1)\nsstore(0, x)\n");
    for _ in 0..7 {
        source.push_str("}\n");
    }
    check(&source, &[]);
}

#[test]
fn programs_load_from_disk() {
    use std::io::Write;

    let source = "sstore(0, 1)\nsstore(0, 2)\n";
    let mut file = tempfile::NamedTempFile::new().expect("temp file");
    file.write_all(source.as_bytes()).expect("write");
    let loaded = std::fs::read_to_string(file.path()).expect("read back");
    let reference = trace(source, &[]);
    assert_eq!(trace(&loaded, &[]), reference);
    assert_eq!(reference.storage.get(&0), Some(&2));
}
