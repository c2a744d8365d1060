//! Benchmark harness for the etsc pipeline.
//!
//! Run with: cargo bench -p etsc_compiler

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use etsc_ast::{Ast, ProgramKind};
use etsc_binder::Binder;
use etsc_checker::Checker;
use etsc_compiler::{CompileUnit, Compiler, SourceText, UnitSource, CORE_PRELUDE, PRELUDE_FILE, PRELUDE_MODULE};
use etsc_core::StringInterner;
use etsc_options::{encode_base64_output, CompilerOptions};
use etsc_parser::parse_program;

/// Generate a program with `classes` classes and `functions` functions.
fn generate_large_source(classes: usize, functions: usize) -> String {
    let mut source = String::new();
    for i in 0..classes {
        source.push_str(&format!(
            "class Class{i} {{
    field{i}: int = {i};
    constructor() {{}}
    method{i}(x: int): long {{
        let total: long = 0;
        for (let k = 0; k < x; k++) {{
            total = total + this.field{i} * k;
        }}
        return total;
    }}
}}\n\n"
        ));
    }
    for i in 0..functions {
        source.push_str(&format!(
            "function func{i}(a: int, b: double): string {{
    let c = new Class{c}();
    let r = c.method{c}(a) + b;
    if (r > {i}) {{
        return \"big\" + r;
    }}
    return \"small\" + a;
}}\n\n",
            c = i % classes.max(1)
        ));
    }
    source
}

/// Parse, bind and check `source` against the built-in prelude.
fn check(source: &str) -> Checker {
    let mut ast = Ast::new(StringInterner::new());
    let prelude = parse_program(&mut ast, PRELUDE_FILE, CORE_PRELUDE, ProgramKind::Prelude, PRELUDE_MODULE);
    let main = parse_program(&mut ast, "bench.ets", source, ProgramKind::Main, "bench");
    let mut binder = Binder::new();
    binder.bind_program(&ast, prelude.program);
    binder.bind_program(&ast, main.program);
    let mut checker = Checker::new(ast, binder);
    let _ = checker.start_checker();
    checker
}

fn unit(source: &str) -> CompileUnit {
    CompileUnit {
        sources: vec![UnitSource {
            source: SourceText { name: "bench.ets".to_string(), text: source.to_string() },
            path: None,
            record_name: "bench".to_string(),
        }],
        output_name: String::new(),
    }
}

fn compiler(source: &str, function_threads: usize) -> Compiler {
    let options = CompilerOptions {
        base64_input: Some(encode_base64_output(source.as_bytes())),
        function_threads,
        ..CompilerOptions::default()
    };
    match Compiler::new(options) {
        Ok(compiler) => compiler,
        Err(e) => panic!("bench options rejected: {}", e),
    }
}

// ============================================================================
// Parser Benchmarks
// ============================================================================

fn bench_parser(c: &mut Criterion) {
    let mut group = c.benchmark_group("parser");

    group.bench_function("prelude", |b| {
        b.iter(|| {
            let mut ast = Ast::new(StringInterner::new());
            black_box(parse_program(&mut ast, PRELUDE_FILE, black_box(CORE_PRELUDE), ProgramKind::Prelude, PRELUDE_MODULE));
        });
    });

    let large = generate_large_source(50, 50);
    group.bench_function("large", |b| {
        b.iter(|| {
            let mut ast = Ast::new(StringInterner::new());
            black_box(parse_program(&mut ast, "bench.ets", black_box(&large), ProgramKind::Main, "bench"));
        });
    });

    group.finish();
}

// ============================================================================
// Checker Benchmarks
// ============================================================================

fn bench_checker(c: &mut Criterion) {
    let mut group = c.benchmark_group("checker");

    for size in [10, 50, 100] {
        let source = generate_large_source(size, size);
        group.bench_with_input(BenchmarkId::new("classes_and_functions", size), &source, |b, source| {
            b.iter(|| black_box(check(source)));
        });
    }

    group.finish();
}

// ============================================================================
// Full Pipeline Benchmarks
// ============================================================================

fn bench_full_pipeline(c: &mut Criterion) {
    let mut group = c.benchmark_group("full_pipeline");

    let source = generate_large_source(50, 50);
    let unit = unit(&source);
    for threads in [0, 2, 4] {
        let compiler = compiler(&source, threads);
        group.bench_with_input(BenchmarkId::new("function_threads", threads), &unit, |b, unit| {
            b.iter(|| black_box(compiler.compile_unit(unit)));
        });
    }

    group.finish();
}

criterion_group!(benches, bench_parser, bench_checker, bench_full_pipeline);
criterion_main!(benches);
