//! Optimizer throughput benchmarks.
//!
//! Measures the full pipeline (parse + optimize) and the two passes
//! individually on synthetic programs with a controllable number of
//! stores and loops.

use criterion::{black_box, criterion_group, criterion_main, Criterion};

use riptide::dialect::Dialect;
use riptide::ir::Block;
use riptide::optimize::{self, assign_elim, loop_init, store_elim, Settings};
use riptide::parse_source;

/// A straight-line program: interleaved memory/storage stores over a few
/// slots, so most of them are covered by later ones, plus a tail read.
fn straight_line(stores: usize) -> String {
    let mut source = String::with_capacity(stores * 24);
    source.push_str("let base := calldataload(0)\n");
    for i in 0..stores {
        source.push_str(&format!("sstore({}, {})\n", i % 16, i));
        source.push_str(&format!("mstore({}, {})\n", (i % 8) * 32, i));
    }
    source.push_str("return(0, 256)\n");
    source
}

/// A program dominated by control flow: loops with branch-heavy bodies.
fn loop_heavy(loops: usize) -> String {
    let mut source = String::new();
    for l in 0..loops {
        source.push_str(&format!(
            "for {{ let i{l} := 0 }} lt(i{l}, 10) {{ i{l} := add(i{l}, 1) }} {{\n"
        ));
        source.push_str(&format!("    sstore(i{l}, {l})\n"));
        source.push_str(&format!("    if eq(i{l}, 5) {{\n        continue\n    }}\n"));
        source.push_str(&format!("    mstore(mul(i{l}, 32), {l})\n"));
        source.push_str("}\n");
    }
    source.push_str("return(0, 320)\n");
    source
}

fn parse(source: &str) -> Block {
    parse_source(source).expect("benchmark program parses")
}

fn bench_pipeline(c: &mut Criterion) {
    let dialect = Dialect::new();
    let small = straight_line(100);
    let large = straight_line(1000);

    let mut group = c.benchmark_group("pipeline");
    group.bench_function("100_stores", |b| {
        b.iter(|| {
            let mut block = parse(black_box(&small));
            optimize::optimize(&dialect, &mut block, &Settings::default()).unwrap()
        })
    });
    group.bench_function("1000_stores", |b| {
        b.iter(|| {
            let mut block = parse(black_box(&large));
            optimize::optimize(&dialect, &mut block, &Settings::default()).unwrap()
        })
    });
    group.finish();
}

fn bench_store_elimination(c: &mut Criterion) {
    let dialect = Dialect::new();
    let source = straight_line(500);

    c.bench_function("store_elim_500_stores", |b| {
        b.iter(|| {
            let mut block = parse(black_box(&source));
            store_elim::eliminate_unused_stores(&dialect, &mut block, true).unwrap()
        })
    });
}

fn bench_assign_elimination(c: &mut Criterion) {
    let dialect = Dialect::new();
    let source = loop_heavy(50);

    c.bench_function("assign_elim_50_loops", |b| {
        b.iter(|| {
            let mut block = parse(black_box(&source));
            loop_init::hoist_loop_init(&mut block);
            assign_elim::eliminate_unused_assignments(&dialect, &mut block).unwrap()
        })
    });
}

fn bench_loop_tracking(c: &mut Criterion) {
    let dialect = Dialect::new();
    let source = loop_heavy(100);

    c.bench_function("pipeline_100_loops", |b| {
        b.iter(|| {
            let mut block = parse(black_box(&source));
            optimize::optimize(&dialect, &mut block, &Settings::default()).unwrap()
        })
    });
}

criterion_group!(
    benches,
    bench_pipeline,
    bench_store_elimination,
    bench_assign_elimination,
    bench_loop_tracking,
);
criterion_main!(benches);
