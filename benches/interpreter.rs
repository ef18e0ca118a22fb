//! Interpreter benchmarks for Jolt.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use jolt::config::Config;
use jolt::interpreter::Interpreter;
use jolt::reader::Reader;
use std::fs;

/// Run a Jolt program from source code on the tree-walker.
fn run_program(source: &str) {
    let config = Config {
        vm_enabled: false,
        ..Config::default()
    };
    let mut interpreter = Interpreter::with_config(config);
    interpreter.eval_str(source).expect("runtime error");
}

/// Load a benchmark program file.
fn load_program(name: &str) -> String {
    let path = format!("benches/programs/{}.clj", name);
    fs::read_to_string(&path).unwrap_or_else(|_| panic!("failed to read {}", path))
}

fn fibonacci_benchmarks(c: &mut Criterion) {
    let mut group = c.benchmark_group("fibonacci");
    let source = load_program("fib_recursive");

    group.bench_function("recursive_fib20", |b| {
        b.iter(|| run_program(black_box(&source)))
    });

    group.finish();
}

fn loop_benchmarks(c: &mut Criterion) {
    let mut group = c.benchmark_group("loops");
    let source = load_program("loop_sum");

    group.bench_function("sum_10000", |b| b.iter(|| run_program(black_box(&source))));

    group.finish();
}

fn collection_benchmarks(c: &mut Criterion) {
    let mut group = c.benchmark_group("collections");
    let source = load_program("collections");

    group.bench_function("vector_map_1000", |b| {
        b.iter(|| run_program(black_box(&source)))
    });

    group.finish();
}

/// Benchmark reading and parsing only (no execution).
fn parsing_benchmarks(c: &mut Criterion) {
    let mut group = c.benchmark_group("parsing");
    let source = load_program("closures");

    group.bench_function("read_closures_program", |b| {
        b.iter(|| Reader::read_str(black_box(&source)).unwrap())
    });

    group.bench_function("parse_closures_program", |b| {
        b.iter(|| {
            let mut interpreter = Interpreter::new();
            interpreter.parse_str(black_box(&source)).unwrap()
        })
    });

    group.finish();
}

/// Parameterized fibonacci benchmark for different N values.
fn fibonacci_scaling(c: &mut Criterion) {
    let mut group = c.benchmark_group("fib_scaling");

    for n in [10, 15, 20].iter() {
        let source = format!(
            "(defn fib [n] (if (< n 2) n (+ (fib (- n 1)) (fib (- n 2))))) (fib {})",
            n
        );

        group.bench_with_input(BenchmarkId::new("recursive", n), &source, |b, src| {
            b.iter(|| run_program(black_box(src)))
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    fibonacci_benchmarks,
    loop_benchmarks,
    collection_benchmarks,
    parsing_benchmarks,
    fibonacci_scaling,
);

criterion_main!(benches);
