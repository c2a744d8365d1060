use etsc_ast::{Ast, ProgramKind};
use etsc_binder::Binder;
use etsc_codegen::*;
use etsc_core::StringInterner;
use etsc_lowering::{default_phases, run_phases};
use etsc_parser::parse_program;

const PRELUDE: &str = "\
class Object {
    constructor() {}
    native toString(): string;
    native equals(other: Object): boolean;
}
final class Void {}
final class String {
    native length(): int;
    native charAt(index: int): char;
    native equals(other: Object): boolean;
}
final class Boolean { native static valueOf(value: boolean): Boolean; native unboxed(): boolean; }
final class Byte { native static valueOf(value: byte): Byte; native unboxed(): byte; }
final class Char { native static valueOf(value: char): Char; native unboxed(): char; }
final class Short { native static valueOf(value: short): Short; native unboxed(): short; }
final class Int { native static valueOf(value: int): Int; native unboxed(): int; }
final class Long { native static valueOf(value: long): Long; native unboxed(): long; }
final class Float { native static valueOf(value: float): Float; native unboxed(): float; }
final class Double { native static valueOf(value: double): Double; native unboxed(): double; }
class Exception {
    message: string = \"\";
    constructor() {}
    constructor(message: string) { this.message = message; }
}
class Error { constructor() {} }
class ClassCastException extends Exception { constructor(message: string) { super(message); } }
class NullPointerException extends Exception { constructor(message: string) { super(message); } }
class ArithmeticException extends Exception { constructor(message: string) { super(message); } }
final class StringBuilder {
    constructor() {}
    native append(value: boolean): StringBuilder;
    native append(value: char): StringBuilder;
    native append(value: int): StringBuilder;
    native append(value: long): StringBuilder;
    native append(value: float): StringBuilder;
    native append(value: double): StringBuilder;
    native append(value: string): StringBuilder;
    native append(value: Object): StringBuilder;
    native toString(): string;
}
final class Promise<T> {
    constructor() {}
    native awaitResolution(): T;
}
";

const GLOBAL_INIT: &str = "main.ETSGLOBAL._$init$_:()void";

/// Parse, bind, check, lower and generate `source`.
fn compile_with(source: &str, options: &CodegenOptions) -> Result<ProgramOutput, CodegenError> {
    let mut ast = Ast::new(StringInterner::new());
    let prelude = parse_program(&mut ast, "std/core.ets", PRELUDE, ProgramKind::Prelude, "std.core");
    assert!(prelude.diagnostics.is_empty(), "prelude parse errors: {:?}", prelude.diagnostics.diagnostics());
    let main = parse_program(&mut ast, "main.ets", source, ProgramKind::Main, "main");
    assert!(main.diagnostics.is_empty(), "parse errors: {:?}", main.diagnostics.diagnostics());

    let mut binder = Binder::new();
    binder.bind_program(&ast, prelude.program);
    binder.bind_program(&ast, main.program);
    assert!(binder.take_diagnostics().is_empty());

    let mut checker = etsc_checker::Checker::new(ast, binder);
    if let Err(e) = checker.start_checker() {
        panic!("unexpected check error: {}", e);
    }
    let mut phases = default_phases();
    if let Err(e) = run_phases(&mut checker, &mut phases) {
        panic!("unexpected lowering error: {}", e);
    }
    let module = checker.finish();
    generate(&module, options)
}

fn compile_ok(source: &str) -> ProgramOutput {
    match compile_with(source, &CodegenOptions::default()) {
        Ok(program) => program,
        Err(e) => panic!("unexpected codegen error: {}", e),
    }
}

fn listing(program: &ProgramOutput, name: &str) -> Vec<String> {
    match program.function(name) {
        Some(function) => function.listing(),
        None => {
            let names: Vec<&str> = program.functions.iter().map(|f| f.name.as_str()).collect();
            panic!("no function '{}' among {:?}", name, names)
        }
    }
}

fn has_line(lines: &[String], prefix: &str) -> bool {
    lines.iter().any(|l| l.starts_with(prefix))
}

fn position(lines: &[String], prefix: &str) -> usize {
    lines
        .iter()
        .position(|l| l.starts_with(prefix))
        .unwrap_or_else(|| panic!("no line starting with '{}' in {:#?}", prefix, lines))
}

/// Every resolved branch target and catch range lies inside its function.
fn assert_targets_resolved(program: &ProgramOutput) {
    for function in &program.functions {
        let len = function.instructions.len();
        for insn in &function.instructions {
            for operand in &insn.operands {
                match operand {
                    Operand::Target(t) => assert!(*t < len, "{}: target @{} out of range", function.name, t),
                    Operand::Label(_) => panic!("{}: unresolved label in '{}'", function.name, insn),
                    _ => {}
                }
            }
        }
        for entry in &function.catch_table {
            assert!(entry.begin < entry.end && entry.end <= len, "{}: bad range {}", function.name, entry);
            assert!(entry.handler < len, "{}: bad handler {}", function.name, entry);
        }
    }
}

// ============================================================================
// Globals and constants
// ============================================================================

#[test]
fn test_constant_byte_store_is_narrow() {
    let program = compile_ok("let x: byte = 10 + 20;");
    let init = listing(&program, GLOBAL_INIT);
    assert_eq!(init, vec!["ldai 30", "ststatic main.ETSGLOBAL.x", "return.void"]);

    let global = program.record("main.ETSGLOBAL").expect("global record");
    assert_eq!(global.kind, RecordKind::Global);
    assert_eq!(global.fields, vec![FieldOutput { name: "x".into(), descriptor: "i8".into(), is_static: true }]);
}

#[test]
fn test_long_global_uses_wide_store() {
    let program = compile_ok("let big: long = 5;\nlet name: string = \"etsc\";");
    let init = listing(&program, GLOBAL_INIT);
    assert!(init.contains(&"ldai.64 5".to_string()), "{:#?}", init);
    assert!(init.contains(&"ststatic.64 main.ETSGLOBAL.big".to_string()));
    assert!(init.contains(&"lda.str \"etsc\"".to_string()));
    assert!(init.contains(&"ststatic.obj main.ETSGLOBAL.name".to_string()));
}

#[test]
fn test_prelude_is_not_emitted() {
    let program = compile_ok("let x: int = 1;");
    assert!(program.records.iter().all(|r| !r.name.starts_with("std.core.")));
    assert!(program.functions.iter().all(|f| !f.name.starts_with("std.core.")));
}

// ============================================================================
// Arithmetic
// ============================================================================

#[test]
fn test_arithmetic_width_selection() {
    let program = compile_ok(
        "function mul(a: int, b: int): int { return a * b; }\n\
         function add(a: long, b: long): long { return a + b; }\n\
         function mix(a: int, b: double): double { return a + b; }",
    );
    let mul = listing(&program, "main.ETSGLOBAL.mul:(i32,i32)i32");
    assert!(has_line(&mul, "mul2 "));
    assert_eq!(mul.last().map(String::as_str), Some("return"));

    let add = listing(&program, "main.ETSGLOBAL.add:(i64,i64)i64");
    assert!(has_line(&add, "add2.64 "));
    assert_eq!(add.last().map(String::as_str), Some("return.64"));

    let mix = listing(&program, "main.ETSGLOBAL.mix:(i32,f64)f64");
    assert!(has_line(&mix, "i32tof64"));
    assert!(has_line(&mix, "fadd2.64 "));
}

#[test]
fn test_narrowing_cast_truncates() {
    let program = compile_ok("function low(v: int): byte { return v as byte; }");
    let low = listing(&program, "main.ETSGLOBAL.low:(i32)i8");
    assert!(has_line(&low, "i32toi8"), "{:#?}", low);
}

#[test]
fn test_string_concatenation_uses_builder() {
    let program = compile_ok("function greet(name: string, n: int): string { return \"hi \" + name + n; }");
    let greet = listing(&program, "main.ETSGLOBAL.greet:(std.core.String,i32)std.core.String");
    let ctor = position(&greet, "initobj std.core.StringBuilder.<ctor>:()void");
    let append_string =
        position(&greet, "call.virt std.core.StringBuilder.append:(std.core.String)std.core.StringBuilder");
    let append_int = position(&greet, "call.virt std.core.StringBuilder.append:(i32)std.core.StringBuilder");
    let to_string = position(&greet, "call.virt std.core.StringBuilder.toString:()std.core.String");
    assert!(ctor < append_string && append_string < append_int && append_int < to_string);
    assert_eq!(greet.last().map(String::as_str), Some("return.obj"));
}

// ============================================================================
// Boxing and reference casts
// ============================================================================

#[test]
fn test_boxing_calls_value_of_per_kind() {
    let program = compile_ok(
        "function wrapInt(v: int): Int { return v; }\n\
         function wrapLong(v: long): Long { return v; }\n\
         function wrapDouble(v: double): Double { return v; }\n\
         function wrapBoolean(v: boolean): Boolean { return v; }",
    );
    let cases = [
        ("main.ETSGLOBAL.wrapInt:(i32)std.core.Int", "call.acc.short std.core.Int.valueOf:(i32)std.core.Int"),
        ("main.ETSGLOBAL.wrapLong:(i64)std.core.Long", "call.acc.short std.core.Long.valueOf:(i64)std.core.Long"),
        (
            "main.ETSGLOBAL.wrapDouble:(f64)std.core.Double",
            "call.acc.short std.core.Double.valueOf:(f64)std.core.Double",
        ),
        (
            "main.ETSGLOBAL.wrapBoolean:(u1)std.core.Boolean",
            "call.acc.short std.core.Boolean.valueOf:(u1)std.core.Boolean",
        ),
    ];
    for (function, call) in cases {
        let lines = listing(&program, function);
        assert!(has_line(&lines, call), "{}: {:#?}", function, lines);
        assert_eq!(lines.last().map(String::as_str), Some("return.obj"), "{}", function);
    }
}

#[test]
fn test_unboxing_calls_unboxed_per_kind() {
    let program = compile_ok(
        "function openInt(b: Int): int { return b; }\n\
         function openDouble(b: Double): double { return b; }",
    );
    let open_int = listing(&program, "main.ETSGLOBAL.openInt:(std.core.Int)i32");
    assert!(has_line(&open_int, "call.virt.acc.short std.core.Int.unboxed:()i32"), "{:#?}", open_int);
    assert_eq!(open_int.last().map(String::as_str), Some("return"));

    let open_double = listing(&program, "main.ETSGLOBAL.openDouble:(std.core.Double)f64");
    assert!(has_line(&open_double, "call.virt.acc.short std.core.Double.unboxed:()f64"), "{:#?}", open_double);
    assert_eq!(open_double.last().map(String::as_str), Some("return.64"));
}

#[test]
fn test_checked_downcast_throws_class_cast_exception() {
    let program = compile_ok("class A {}\nclass B extends A {}\nfunction down(a: A): B { return a as B; }");
    let down = listing(&program, "main.ETSGLOBAL.down:(main.A)main.B");
    let null_check = position(&down, "jeqz.obj");
    let test = position(&down, "isinstance main.B");
    let message = position(&down, "lda.str \"B\"");
    let construct = position(&down, "initobj std.core.ClassCastException.<ctor>:(std.core.String)void");
    let throw = position(&down, "throw");
    let checkcast = position(&down, "checkcast main.B");
    assert!(null_check < test && test < message && message < construct && construct < throw);
    assert!(throw < checkcast, "the success path narrows after the failure path: {:#?}", down);
    assert_eq!(down.last().map(String::as_str), Some("return.obj"));
    assert_targets_resolved(&program);
}

#[test]
fn test_upcast_needs_no_check() {
    let program = compile_ok("class A {}\nclass B extends A {}\nfunction up(b: B): A { return b as A; }");
    let up = listing(&program, "main.ETSGLOBAL.up:(main.B)main.A");
    assert!(!has_line(&up, "isinstance"), "{:#?}", up);
    assert!(!has_line(&up, "checkcast"), "{:#?}", up);
}

#[test]
fn test_instanceof_emits_isinstance() {
    let program = compile_ok("class A {}\nclass B extends A {}\nfunction isB(a: A): boolean { return a instanceof B; }");
    let is_b = listing(&program, "main.ETSGLOBAL.isB:(main.A)u1");
    let load = position(&is_b, "lda.obj v");
    let test = position(&is_b, "isinstance main.B");
    assert!(load < test);
    assert_eq!(is_b.last().map(String::as_str), Some("return"));
}

// ============================================================================
// Control flow
// ============================================================================

#[test]
fn test_while_loop_branches() {
    let program = compile_ok(
        "function total(n: int): int {\n\
           let s = 0;\n\
           let i = 0;\n\
           while (i < n) { s = s + i; i = i + 1; }\n\
           return s;\n\
         }",
    );
    let total = listing(&program, "main.ETSGLOBAL.total:(i32)i32");
    assert!(has_line(&total, "jmp @"));
    assert!(total.iter().any(|l| l.starts_with('j') && !l.starts_with("jmp")));
    assert_targets_resolved(&program);
}

#[test]
fn test_for_of_over_array() {
    let program = compile_ok(
        "function sum(xs: int[]): int {\n\
           let s = 0;\n\
           for (let x of xs) { s = s + x; }\n\
           return s;\n\
         }",
    );
    let sum = listing(&program, "main.ETSGLOBAL.sum:(i32[])i32");
    assert!(has_line(&sum, "lenarr "));
    assert!(has_line(&sum, "ldarr "));
    assert_targets_resolved(&program);
}

#[test]
fn test_try_catch_finally() {
    let program = compile_ok(
        "let count: int = 0;\n\
         function risky(n: int): void {\n\
           try {\n\
             if (n > 0) { throw new Exception(); }\n\
             count = 1;\n\
           } catch (e: Exception) {\n\
             count = 2;\n\
           } finally {\n\
             count = count + 10;\n\
           }\n\
         }",
    );
    let risky = program.function("main.ETSGLOBAL.risky:(i32)void").expect("risky");
    let lines = risky.listing();
    // Finalizer inlined on the normal path, after the catch and in the
    // catch-all rethrow.
    let stores = lines.iter().filter(|l| l.as_str() == "ststatic main.ETSGLOBAL.count").count();
    assert_eq!(stores, 5, "{:#?}", lines);

    let typed: Vec<_> = risky.catch_table.iter().filter(|e| e.exception.is_some()).collect();
    assert_eq!(typed.len(), 1);
    assert_eq!(typed[0].exception.as_deref(), Some("std.core.Exception"));
    assert_eq!(risky.catch_table.iter().filter(|e| e.exception.is_none()).count(), 2);
    assert!(has_line(&lines, "throw "));
    assert_targets_resolved(&program);
}

// ============================================================================
// Classes
// ============================================================================

#[test]
fn test_constructor_runs_super_then_field_initializers() {
    let program = compile_ok(
        "class Point {\n\
           x: int = 1;\n\
           y: int;\n\
           constructor(y: int) { this.y = y; }\n\
           sum(): int { return this.x + this.y; }\n\
         }\n\
         let p = new Point(2);",
    );
    let record = program.record("main.Point").expect("Point record");
    assert_eq!(record.kind, RecordKind::Class);
    assert_eq!(record.super_class.as_deref(), Some("std.core.Object"));
    let fields: Vec<(&str, &str)> = record.fields.iter().map(|f| (f.name.as_str(), f.descriptor.as_str())).collect();
    assert_eq!(fields, vec![("x", "i32"), ("y", "i32")]);

    let ctor = listing(&program, "main.Point.<ctor>:(i32)void");
    let super_call = position(&ctor, "call.short std.core.Object.<ctor>:()void");
    let init_x = ctor.iter().position(|l| l.starts_with("stobj ") && l.ends_with("main.Point.x")).expect("x init");
    let assign_y = ctor.iter().position(|l| l.starts_with("stobj ") && l.ends_with("main.Point.y")).expect("y store");
    assert!(super_call < init_x && init_x < assign_y);

    let sum = program.function("main.Point.sum:()i32").expect("sum");
    assert!(!sum.is_static);
    assert_eq!(sum.param_count, 1);

    let init = listing(&program, GLOBAL_INIT);
    assert!(has_line(&init, "initobj main.Point.<ctor>:(i32)void"));
}

#[test]
fn test_class_without_constructor_gets_default() {
    let program = compile_ok("class Counter { value: int = 7; }");
    let ctor = listing(&program, "main.Counter.<ctor>:()void");
    assert!(has_line(&ctor, "call.short std.core.Object.<ctor>:()void"));
    assert!(ctor.contains(&"ldai 7".to_string()));
}

#[test]
fn test_static_field_initializer() {
    let program = compile_ok("class Config { static limit: int = 3; }");
    let cctor = listing(&program, "main.Config.<cctor>:()void");
    assert_eq!(cctor, vec!["ldai 3", "ststatic main.Config.limit", "return.void"]);
}

// ============================================================================
// Lambdas, enums and async
// ============================================================================

#[test]
fn test_lambda_record_and_bridge() {
    let program = compile_ok(
        "function make(base: int): int {\n\
           let f = (x: int): int => x + base;\n\
           return base;\n\
         }",
    );
    let record = program.record("main.LambdaObject-0").expect("lambda record");
    assert_eq!(record.kind, RecordKind::Lambda);
    assert!(record.interfaces.contains(&"std.core.Function1".to_string()));
    assert_eq!(record.fields.len(), 1);
    assert_eq!(record.fields[0].name, "base");

    assert!(program.function("main.LambdaObject-0.<ctor>:(i32)void").is_some());
    let invoke = listing(&program, "main.LambdaObject-0.invoke:(i32)i32");
    assert!(has_line(&invoke, "ldobj "));
    let bridge = listing(&program, "main.LambdaObject-0.invoke:(std.core.Object)std.core.Object");
    assert!(has_line(&bridge, "call.short main.LambdaObject-0.invoke:(i32)i32"));
    assert_eq!(bridge.last().map(String::as_str), Some("return.obj"));

    let make = listing(&program, "main.ETSGLOBAL.make:(i32)i32");
    assert!(has_line(&make, "initobj main.LambdaObject-0.<ctor>:(i32)void"));
}

#[test]
fn test_enum_names_live_in_literal_buffer() {
    let program = compile_ok("enum Color { Red, Green = 5, Blue }\nlet c = Color.Blue;\nlet s = c.getName();");
    let names: Vec<LiteralValue> = ["Red", "Green", "Blue"].iter().map(|n| LiteralValue::Str(n.to_string())).collect();
    let index = program
        .literal_buffers
        .iter()
        .position(|b| b.values == names)
        .expect("buffer of enum names");
    let init = listing(&program, GLOBAL_INIT);
    assert!(init.contains(&format!("lda.const lit#{}", index)), "{:#?}", init);
}

#[test]
fn test_async_function_launches_body() {
    let program = compile_ok("async function work(): Promise<int> { return 1; }");
    let proxy = listing(&program, "main.ETSGLOBAL.work:()std.core.Promise");
    assert!(has_line(&proxy, "launch main.ETSGLOBAL.%%async-work:()std.core.Object"), "{:#?}", proxy);
    let body = listing(&program, "main.ETSGLOBAL.%%async-work:()std.core.Object");
    assert_eq!(body.last().map(String::as_str), Some("return.obj"));
}

// ============================================================================
// Options
// ============================================================================

#[test]
fn test_peephole_removes_reloads() {
    let source = "function inc(a: int): int { let b = a + 1; return b; }";
    let plain = compile_with(source, &CodegenOptions::default()).expect("plain");
    let optimized = compile_with(source, &CodegenOptions { opt_level: 1, function_threads: 0 }).expect("optimized");
    let name = "main.ETSGLOBAL.inc:(i32)i32";
    let before = plain.function(name).expect("inc").instructions.len();
    let after = optimized.function(name).expect("inc").instructions.len();
    assert!(after < before, "expected fewer instructions, {} vs {}", after, before);

    let lines = listing(&optimized, name);
    for pair in lines.windows(2) {
        if let Some(reg) = pair[0].strip_prefix("sta ") {
            assert_ne!(pair[1], format!("lda {}", reg), "reload survived in {:#?}", lines);
        }
    }
}

#[test]
fn test_parallel_output_matches_sequential() {
    let source = "\
enum Level { Low, High }
class Box { value: int = 0; get(): int { return this.value; } }
function a(x: int): int { return x * 2; }
function b(x: long): long { return x - 1; }
function c(s: string): string { return s + \"!\" + Level.High; }
function d(n: int): int { let t = 0; for (let i = 0; i < n; i++) { t += i; } return t; }
let l = Level.Low.getName();
let box = new Box();
";
    let sequential = compile_with(source, &CodegenOptions { opt_level: 1, function_threads: 1 }).expect("sequential");
    let parallel = compile_with(source, &CodegenOptions { opt_level: 1, function_threads: 4 }).expect("parallel");
    assert_eq!(sequential, parallel);
    assert_eq!(sequential.dump(), parallel.dump());
}

// ============================================================================
// Generated expressions
// ============================================================================

/// Small deterministic generator so failures reproduce.
struct Lcg(u64);

impl Lcg {
    fn next(&mut self) -> u32 {
        self.0 = self.0.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
        (self.0 >> 33) as u32
    }

    fn pick<'a>(&mut self, items: &[&'a str]) -> &'a str {
        items[self.next() as usize % items.len()]
    }
}

fn integral_expr(rng: &mut Lcg, depth: u32) -> String {
    if depth == 0 || rng.next() % 4 == 0 {
        return rng.pick(&["a", "b", "c", "1", "2", "3"]).to_string();
    }
    if rng.next() % 6 == 0 {
        return format!("(-{})", integral_expr(rng, depth - 1));
    }
    let op = rng.pick(&["+", "-", "*", "&", "|", "^"]);
    format!("({} {} {})", integral_expr(rng, depth - 1), op, integral_expr(rng, depth - 1))
}

fn floating_expr(rng: &mut Lcg, depth: u32) -> String {
    if depth == 0 || rng.next() % 4 == 0 {
        return rng.pick(&["a", "d", "f", "1.5", "2"]).to_string();
    }
    let op = rng.pick(&["+", "-", "*"]);
    format!("({} {} {})", floating_expr(rng, depth - 1), op, floating_expr(rng, depth - 1))
}

#[test]
fn test_generated_expressions_keep_registers_typed() {
    let mut rng = Lcg(0x5eed);
    for round in 0..40 {
        let source = format!(
            "function g(a: int, b: int, c: long): long {{ return {}; }}\n\
             function h(a: int, d: double, f: float): double {{ return {}; }}",
            integral_expr(&mut rng, 3),
            floating_expr(&mut rng, 4)
        );
        match compile_with(&source, &CodegenOptions { opt_level: (round % 2) as u8, function_threads: 0 }) {
            Ok(program) => assert_targets_resolved(&program),
            Err(e) => panic!("round {} failed on\n{}\n{}", round, source, e),
        }
    }
}
