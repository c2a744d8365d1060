use etsc_ast::*;
use etsc_binder::Binder;
use etsc_checker::*;
use etsc_core::StringInterner;
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
    native append(value: string): StringBuilder;
    native toString(): string;
}
final class Promise<T> {
    constructor() {}
}
";

fn check_source(source: &str) -> Result<CheckedModule, CheckerError> {
    let mut ast = Ast::new(StringInterner::new());
    let prelude = parse_program(&mut ast, "std/core.ets", PRELUDE, ProgramKind::Prelude, "std.core");
    assert!(prelude.diagnostics.is_empty(), "prelude parse errors: {:?}", prelude.diagnostics.diagnostics());
    let main = parse_program(&mut ast, "main.ets", source, ProgramKind::Main, "main");
    assert!(main.diagnostics.is_empty(), "parse errors: {:?}", main.diagnostics.diagnostics());

    let mut binder = Binder::new();
    binder.bind_program(&ast, prelude.program);
    binder.bind_program(&ast, main.program);
    let bind_errors = binder.take_diagnostics();
    assert!(bind_errors.is_empty(), "bind errors: {:?}", bind_errors.diagnostics());

    let mut checker = Checker::new(ast, binder);
    checker.start_checker()?;
    Ok(checker.finish())
}

fn check_ok(source: &str) -> CheckedModule {
    match check_source(source) {
        Ok(module) => module,
        Err(e) => panic!("unexpected error: {}", e),
    }
}

fn check_err(source: &str) -> TypeError {
    match check_source(source) {
        Ok(_) => panic!("expected a type error"),
        Err(CheckerError::Type(e)) => e,
        Err(e) => panic!("expected a type error, got {}", e),
    }
}

fn assert_error(source: &str, expected: &str) {
    let error = check_err(source);
    assert!(error.message.contains(expected), "expected '{}', got '{}'", expected, error.message);
}

/// Type of the declarator named `name` in the main program.
fn declared_type(module: &CheckedModule, name: &str) -> TypeId {
    let main = *module.ast.programs().last().expect("main program");
    let mut found = None;
    module.ast.walk(main, &mut |ast, id| {
        if found.is_none()
            && matches!(ast.kind(id), NodeKind::VariableDeclarator { .. })
            && ast.name_str(id) == name
        {
            found = ast.ts_type(id);
        }
    });
    found.unwrap_or_else(|| panic!("no typed declarator '{}'", name))
}

fn type_text(module: &CheckedModule, name: &str) -> String {
    module.table.type_to_string(declared_type(module, name))
}

/// Signature resolved for the `nth` call in the main program.
fn call_signature(module: &CheckedModule, nth: usize) -> SignatureId {
    let main = *module.ast.programs().last().expect("main program");
    let mut calls = Vec::new();
    module.ast.walk(main, &mut |ast, id| {
        if let NodeKind::Call { signature, .. } = ast.kind(id) {
            calls.push(*signature);
        }
    });
    calls[nth].expect("call was not resolved")
}

// ============================================================================
// Type factory
// ============================================================================

#[test]
fn test_unions_and_arrays_are_canonical() {
    let module = check_ok("let a: int | string | null = 1;\nlet b: string | null | int = 2;\nlet c: int[] = [1];\nlet d: int[] = [2];");
    assert_eq!(declared_type(&module, "a"), declared_type(&module, "b"));
    assert_eq!(declared_type(&module, "c"), declared_type(&module, "d"));
}

#[test]
fn test_generic_instantiations_are_cached() {
    let module = check_ok("class Box<T> { value: T; constructor(v: T) { this.value = v; } }\nlet a: Box<string> = new Box<string>(\"x\");\nlet b: Box<string> = new Box<string>(\"y\");\nlet c: Box<Int> = new Box<Int>(1);");
    assert_eq!(declared_type(&module, "a"), declared_type(&module, "b"));
    assert_ne!(declared_type(&module, "a"), declared_type(&module, "c"));
    assert_eq!(type_text(&module, "c"), "Box<Int>");
}

#[test]
fn test_literal_is_widened_for_let_but_not_const() {
    let module = check_ok("let a = 1;\nconst b = 2;");
    assert_eq!(type_text(&module, "a"), "int");
    let b = declared_type(&module, "b");
    assert_eq!(module.table.constant_value(b), Some(ConstValue::Int(2)));
}

// ============================================================================
// Primitives and constants
// ============================================================================

#[test]
fn test_constant_out_of_range_is_rejected() {
    assert_error("let b: byte = 200;", "is not compatible with type 'byte'");
}

#[test]
fn test_constant_in_range_narrows() {
    let module = check_ok("let b: byte = 10 + 20;");
    assert_eq!(type_text(&module, "b"), "byte");
}

#[test]
fn test_explicit_cast_wraps_constant() {
    let module = check_ok("const c = 200 as byte;");
    let c = declared_type(&module, "c");
    assert_eq!(module.table.constant_value(c), Some(ConstValue::Byte(-56)));
}

#[test]
fn test_numeric_promotion() {
    let module = check_ok("let i: int = 1;\nlet l: long = 2;\nlet d: double = 0.5;\nlet a = i + l;\nlet b = i * d;\nlet s: short = 3;\nlet c = s + s;");
    assert_eq!(type_text(&module, "a"), "long");
    assert_eq!(type_text(&module, "b"), "double");
    assert_eq!(type_text(&module, "c"), "int");
}

#[test]
fn test_string_concatenation() {
    let module = check_ok("let n: int = 1;\nlet s = \"n = \" + n;");
    assert_eq!(type_text(&module, "s"), "String");
}

#[test]
fn test_division_by_constant_zero() {
    assert_error("let a: int = 4;\nlet b = a / 0;", "Division by zero.");
}

#[test]
fn test_floating_division_by_zero_is_allowed() {
    check_ok("let a: double = 4.0;\nlet b = a / 0;");
}

// ============================================================================
// Overloads
// ============================================================================

#[test]
fn test_overload_prefers_exact_primitive_then_boxed() {
    let module = check_ok(
        "function f(a: int): int { return 1; }\n\
         function f(a: Int): int { return 2; }\n\
         let i: int = 1;\n\
         let boxed: Int = i;\n\
         f(i);\n\
         f(boxed);",
    );
    let first = module.table.signature(call_signature(&module, 0));
    let second = module.table.signature(call_signature(&module, 1));
    assert_eq!(module.table.type_to_string(first.params[0].ty), "int");
    assert_eq!(module.table.type_to_string(second.params[0].ty), "Int");
}

#[test]
fn test_no_matching_overload() {
    assert_error("function f(a: int): void {}\nf(\"x\");", "No matching call signature");
}

#[test]
fn test_default_parameter_is_optional() {
    check_ok("function f(a: int, b: int = 2): int { return a + b; }\nlet x = f(1);");
}

#[test]
fn test_generic_call_infers_argument() {
    let module = check_ok("function id<T>(v: T): T { return v; }\nlet s = id(\"x\");");
    assert_eq!(type_text(&module, "s"), "String");
}

// ============================================================================
// Nullish values and narrowing
// ============================================================================

#[test]
fn test_member_access_on_possibly_nullish_value() {
    assert_error("let o: Object | null = null;\nlet s = o.toString();", "Value is possibly nullish.");
}

#[test]
fn test_null_check_narrows() {
    check_ok("let o: Object | null = new Object();\nif (o != null) { let s = o.toString(); }");
}

#[test]
fn test_early_exit_narrows_top_level_let() {
    check_ok(
        "let o: Object | null = new Object();\n\
         if (o == null) { throw new Exception(); }\n\
         let s = o.toString();",
    );
}

#[test]
fn test_top_level_let_is_not_narrowed_inside_functions() {
    assert_error(
        "let o: Object | null = new Object();\n\
         function f(): void { if (o != null) { let s = o.toString(); } }",
        "Value is possibly nullish.",
    );
}

#[test]
fn test_optional_chaining_yields_undefined_union() {
    let module = check_ok("let o: Object | null = null;\nlet s = o?.toString();");
    assert!(type_text(&module, "s").contains("undefined"));
}

#[test]
fn test_union_members_must_agree() {
    assert_error(
        "class A { x: int = 1; }\nclass B { x: string = \"\"; }\nlet u: A | B = new A();\nlet v = u.x;",
        "Member type must be the same for all union objects.",
    );
}

#[test]
fn test_nullish_coalescing_needs_reference_left_side() {
    assert_error("let a: int = 1;\nlet b = a ?? 2;", "Left-hand side expression must be a reference type.");
}

#[test]
fn test_strict_equality_needs_references() {
    assert_error("let a: int = 1;\nlet b = a === 1;", "Both operands have to be reference types");
}

// ============================================================================
// Statements
// ============================================================================

#[test]
fn test_unreachable_statement() {
    assert_error("function f(): int {\n  return 1;\n  let x = 2;\n}", "Unreachable statement.");
}

#[test]
fn test_missing_return_value() {
    assert_error("function f(a: boolean): int {\n  if (a) { return 1; }\n}", "must return a value");
}

#[test]
fn test_infinite_loop_need_not_return() {
    check_ok("function f(): int {\n  while (true) {}\n}");
}

#[test]
fn test_condition_must_be_boolean() {
    assert_error("let a: int = 1;\nif (a) {}", "Condition must be of possible condition type");
}

#[test]
fn test_boxed_boolean_condition_is_unboxed() {
    check_ok("let a: Boolean = true;\nif (a) {}");
}

#[test]
fn test_duplicate_catch_type() {
    assert_error(
        "try {\n} catch (e: Exception) {\n} catch (e: Exception) {\n}",
        "Redeclaration of exception type",
    );
}

#[test]
fn test_assignment_to_constant() {
    assert_error("const a = 1;\na = 2;", "Cannot assign to a constant variable a");
}

#[test]
fn test_readonly_field_assigned_in_constructor() {
    check_ok("class P { readonly x: int; constructor() { this.x = 1; } }");
    assert_error(
        "class P { readonly x: int = 0; set(): void { this.x = 1; } }",
        "Cannot assign to",
    );
}

// ============================================================================
// Classes and enums
// ============================================================================

#[test]
fn test_abstract_class_cannot_be_instantiated() {
    assert_error("abstract class S {}\nlet s = new S();", "S is abstract therefore cannot be instantiated.");
}

#[test]
fn test_cyclic_inheritance() {
    assert_error("class A extends B {}\nclass B extends A {}", "Cyclic inheritance");
}

#[test]
fn test_private_member_visibility() {
    assert_error("class A { private x: int = 1; }\nlet a = new A();\nlet y = a.x;", "is not visible here");
}

#[test]
fn test_enum_auto_increment_and_helpers() {
    let module = check_ok("enum Color { Red, Green = 5, Blue }\nlet c = Color.Blue;\nlet n = c.getValue();\nlet s = c.getName();");
    assert_eq!(type_text(&module, "c"), "Color");
    assert_eq!(type_text(&module, "n"), "int");
    assert_eq!(type_text(&module, "s"), "String");
    let color = declared_type(&module, "c");
    let values: Vec<i32> = module
        .table
        .enum_type(color)
        .expect("enum")
        .members
        .iter()
        .filter_map(|m| match m.value {
            EnumValue::Int(v) => Some(v),
            EnumValue::Str(_) => None,
        })
        .collect();
    assert_eq!(values, vec![0, 5, 6]);
}

#[test]
fn test_enum_members_must_share_kind() {
    assert_error("enum E { A = 1, B = \"b\" }", "mixes numeric and string members");
}

#[test]
fn test_enum_comparison_needs_same_enum() {
    assert_error(
        "enum A { X }\nenum B { Y }\nlet a = A.X;\nlet b = B.Y;\nlet same = a == b;",
        "must be the same enum type",
    );
}

// ============================================================================
// Lambdas
// ============================================================================

#[test]
fn test_lambda_class_is_synthesized_with_captures() {
    let module = check_ok("function make(base: int): void {\n  let f = (x: int): int => x + base;\n}");
    let main = *module.ast.programs().last().expect("main program");
    let NodeKind::Program { statements, .. } = module.ast.kind(main) else { panic!() };
    let lambda = statements
        .iter()
        .copied()
        .find(|&s| matches!(module.ast.kind(s), NodeKind::ClassDeclaration { .. }) && module.ast.name_str(s).starts_with("LambdaObject-"))
        .expect("lambda class");
    let ty = module.ast.ts_type(lambda).expect("typed lambda class");
    let obj = module.table.object(ty).expect("object type");
    assert!(obj.flags.contains(ObjectFlags::LAMBDA_OBJECT));
    assert_eq!(obj.constructors.len(), 1);
    assert_eq!(module.table.signature(obj.constructors[0]).params.len(), 1);
}

#[test]
fn test_function_is_not_a_value() {
    assert_error("function f(): void {}\nlet g = f;", "cannot be used as a value");
}
