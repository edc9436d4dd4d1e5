//! Benchmarks for the Makrell language implementation.
//!
//! Run with: `cargo bench --package makrell_language`

use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};
use makrell_language::{Context, Diagnostics, parse_source, tokenize};

const NESTED: &str = "{fun f [x] {if x < 2 x {f x - 1} + {f x - 2}}}";

const PROGRAM: &str = r#"
{class Point []
    {fun __init__ [self x y]
        self.x = x
        self.y = y}
    {fun norm1 [self] {abs self.x} + {abs self.y}}}
points = [1 2 3 4 5] |* [i] -> {Point i i * 2}
total = {sum points |* [p] -> {p.norm1}}
{when total > 10 "big"}
"#;

// =============================================================================
// Lexer Benchmarks
// =============================================================================

fn bench_lexer(c: &mut Criterion) {
    let mut group = c.benchmark_group("lexer");

    for (name, source) in [("simple", "42"), ("expression", "a + b * c"), ("nested", NESTED), ("program", PROGRAM)] {
        group.throughput(Throughput::Bytes(source.len() as u64));
        group.bench_with_input(BenchmarkId::new(name, source.len()), source, |b, s| {
            b.iter(|| tokenize(black_box(s)));
        });
    }

    group.finish();
}

// =============================================================================
// Tree Benchmarks
// =============================================================================

fn bench_tree(c: &mut Criterion) {
    let mut group = c.benchmark_group("tree");

    for (name, source) in [("nested", NESTED), ("program", PROGRAM)] {
        group.throughput(Throughput::Bytes(source.len() as u64));
        group.bench_with_input(BenchmarkId::new(name, source.len()), source, |b, s| {
            b.iter(|| {
                let mut diagnostics = Diagnostics::new();
                parse_source(black_box(s), &mut diagnostics)
            });
        });
    }

    group.finish();
}

// =============================================================================
// Compiler Benchmarks
// =============================================================================

fn bench_compiler(c: &mut Criterion) {
    let mut group = c.benchmark_group("compiler");

    group.bench_function("program_bare", |b| {
        b.iter(|| Context::bare().compile_source(black_box(PROGRAM)));
    });

    let macro_source = "{def macro twice [ns] ns = {regular ns} [ns@0 ns@0]} {twice {print 1}}";
    group.bench_function("macro_expansion", |b| {
        b.iter(|| Context::bare().compile_source(black_box(macro_source)));
    });

    group.bench_function("context_with_prelude", |b| {
        b.iter(Context::new);
    });

    group.finish();
}

// =============================================================================
// Interpreter Benchmarks
// =============================================================================

fn bench_interpreter(c: &mut Criterion) {
    let mut group = c.benchmark_group("interpreter");

    for n in [10, 15] {
        let source = format!("{NESTED} {{f {n}}}");
        group.bench_with_input(BenchmarkId::new("fib", n), &source, |b, s| {
            b.iter(|| Context::bare().eval_source(black_box(s)));
        });
    }

    group.bench_function("program", |b| {
        b.iter(|| Context::bare().eval_source(black_box(PROGRAM)));
    });

    group.finish();
}

criterion_group!(benches, bench_lexer, bench_tree, bench_compiler, bench_interpreter);

criterion_main!(benches);
