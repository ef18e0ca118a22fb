//! Benchmarks comparing the tree-walking interpreter with the bytecode VM.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use jolt::config::Config;
use jolt::interpreter::Interpreter;
use jolt::vm::Compiler;
use jolt::ExecutionMode;
use std::fs;

/// Run via the tree-walking interpreter.
fn run_treewalk(source: &str) {
    let mut interpreter = Interpreter::new().with_mode(ExecutionMode::TreeWalk);
    interpreter.eval_str(source).expect("runtime error");
}

/// Run with eligible functions compiled to bytecode (compile + execute).
fn run_vm(source: &str) {
    let mut interpreter =
        Interpreter::with_config(Config::default()).with_mode(ExecutionMode::Hybrid);
    interpreter.eval_str(source).expect("vm runtime error");
}

fn load_program(name: &str) -> String {
    let path = format!("benches/programs/{}.clj", name);
    fs::read_to_string(&path).unwrap_or_else(|_| panic!("failed to read {}", path))
}

fn compare(c: &mut Criterion, group_name: &str, program: &str) {
    let mut group = c.benchmark_group(group_name);
    let source = load_program(program);

    group.bench_function("treewalk", |b| {
        b.iter(|| run_treewalk(black_box(&source)))
    });
    group.bench_function("vm", |b| b.iter(|| run_vm(black_box(&source))));

    group.finish();
}

fn fibonacci_comparison(c: &mut Criterion) {
    compare(c, "fib_recursive_comparison", "fib_recursive");
}

fn loop_comparison(c: &mut Criterion) {
    compare(c, "loop_sum_comparison", "loop_sum");
}

fn closure_comparison(c: &mut Criterion) {
    compare(c, "closure_comparison", "closures");
}

fn fib_scaling_comparison(c: &mut Criterion) {
    let mut group = c.benchmark_group("fib_scaling_comparison");

    for n in [10, 15, 20].iter() {
        let source = format!(
            "(defn fib [n] (if (< n 2) n (+ (fib (- n 1)) (fib (- n 2))))) (fib {})",
            n
        );

        group.bench_with_input(BenchmarkId::new("treewalk", n), &source, |b, src| {
            b.iter(|| run_treewalk(black_box(src)))
        });
        group.bench_with_input(BenchmarkId::new("vm", n), &source, |b, src| {
            b.iter(|| run_vm(black_box(src)))
        });
    }

    group.finish();
}

/// Benchmark compilation time alone (not execution).
fn compilation_overhead(c: &mut Criterion) {
    let mut group = c.benchmark_group("compilation_overhead");

    for name in ["fib_recursive", "loop_sum", "closures"] {
        let source = load_program(name);
        let mut interpreter = Interpreter::new().with_mode(ExecutionMode::TreeWalk);
        let exprs = interpreter.parse_str(&source).expect("parser error");

        group.bench_function(format!("compile_{}", name), |b| {
            b.iter(|| {
                for expr in &exprs {
                    let _ = Compiler::compile_top_level(black_box(expr), "bench");
                }
            })
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    fibonacci_comparison,
    loop_comparison,
    closure_comparison,
    fib_scaling_comparison,
    compilation_overhead,
);

criterion_main!(benches);
