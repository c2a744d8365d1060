use etsc_ast::*;
use etsc_core::StringInterner;
use etsc_parser::parse_program;

fn parse(source: &str) -> (Ast, NodeId, Vec<String>) {
    let mut ast = Ast::new(StringInterner::new());
    let result = parse_program(&mut ast, "test.ets", source, ProgramKind::Main, "test");
    let errors = result.diagnostics.diagnostics().iter().map(|d| d.message_text.clone()).collect();
    (ast, result.program, errors)
}

fn statements(ast: &Ast, program: NodeId) -> Vec<NodeId> {
    match ast.kind(program) {
        NodeKind::Program { statements, .. } => statements.clone(),
        other => panic!("expected program, got {}", other.name()),
    }
}

fn parse_ok(source: &str) -> (Ast, Vec<NodeId>) {
    let (ast, program, errors) = parse(source);
    assert!(errors.is_empty(), "unexpected errors for {:?}: {:?}", source, errors);
    let stmts = statements(&ast, program);
    (ast, stmts)
}

/// Dump of the expression inside the first expression statement.
fn dump_expr(source: &str) -> String {
    let (ast, stmts) = parse_ok(source);
    match ast.kind(stmts[0]) {
        NodeKind::ExpressionStatement { expression } => ast.dump(*expression),
        other => panic!("expected expression statement, got {}", other.name()),
    }
}

// ============================================================================
// Expressions
// ============================================================================

#[test]
fn test_binary_precedence() {
    assert_eq!(
        dump_expr("1 + 2 * x;"),
        "Binary +\n  NumberLiteral 1\n  Binary *\n    NumberLiteral 2\n    Identifier x\n"
    );
}

#[test]
fn test_left_associativity() {
    assert_eq!(
        dump_expr("a - b - c;"),
        "Binary -\n  Binary -\n    Identifier a\n    Identifier b\n  Identifier c\n"
    );
}

#[test]
fn test_shift_operators_are_rescanned() {
    assert_eq!(dump_expr("a >>> 2;"), "Binary >>>\n  Identifier a\n  NumberLiteral 2\n");
    assert_eq!(dump_expr("a >= b;"), "Binary >=\n  Identifier a\n  Identifier b\n");
}

#[test]
fn test_compound_assignment() {
    let (ast, stmts) = parse_ok("x >>= 1;");
    let NodeKind::ExpressionStatement { expression } = ast.kind(stmts[0]) else { panic!() };
    match ast.kind(*expression) {
        NodeKind::Assignment { op, .. } => assert_eq!(*op, AssignOp::Compound(BinaryOp::Shr)),
        other => panic!("expected assignment, got {}", other.name()),
    }
}

#[test]
fn test_nullish_and_logical() {
    assert_eq!(
        dump_expr("a ?? b || c;"),
        "Binary ??\n  Identifier a\n  Binary ||\n    Identifier b\n    Identifier c\n"
    );
}

#[test]
fn test_as_binds_at_relational_level() {
    assert_eq!(
        dump_expr("a + b as int;"),
        "As\n  Binary +\n    Identifier a\n    Identifier b\n  PrimitiveType int\n"
    );
}

#[test]
fn test_numeric_literal_kinds() {
    assert_eq!(dump_expr("2147483647;"), "NumberLiteral 2147483647\n");
    assert_eq!(dump_expr("2147483648;"), "NumberLiteral 2147483648L\n");
    assert_eq!(dump_expr("0xFF;"), "NumberLiteral 255\n");
    assert_eq!(dump_expr("1.5;"), "NumberLiteral 1.5\n");
    assert_eq!(dump_expr("1.5f;"), "NumberLiteral 1.5f\n");
}

#[test]
fn test_call_with_type_arguments() {
    let (ast, stmts) = parse_ok("foo<int>(1, 2);");
    let NodeKind::ExpressionStatement { expression } = ast.kind(stmts[0]) else { panic!() };
    match ast.kind(*expression) {
        NodeKind::Call { type_args, arguments, .. } => {
            assert_eq!(type_args.len(), 1);
            assert_eq!(arguments.len(), 2);
        }
        other => panic!("expected call, got {}", other.name()),
    }
}

#[test]
fn test_less_than_is_not_type_arguments() {
    assert_eq!(dump_expr("a < b;"), "Binary <\n  Identifier a\n  Identifier b\n");
}

#[test]
fn test_arrow_function_forms() {
    let dump = dump_expr("(x: int): int => x + 1;");
    assert!(dump.starts_with("ArrowFunction\n  ScriptFunction\n"), "{}", dump);
    assert!(dump.contains("Return"), "{}", dump);

    let dump = dump_expr("y => y;");
    assert!(dump.starts_with("ArrowFunction"), "{}", dump);
}

#[test]
fn test_parenthesized_expression_is_not_arrow() {
    assert_eq!(dump_expr("(a + b) * c;"), "Binary *\n  Binary +\n    Identifier a\n    Identifier b\n  Identifier c\n");
}

#[test]
fn test_member_chain_and_non_null() {
    assert_eq!(
        dump_expr("a.b!.c;"),
        "Member\n  NonNull\n    Member\n      Identifier a\n      Identifier b\n  Identifier c\n"
    );
}

#[test]
fn test_new_array_and_object() {
    assert!(dump_expr("new int[5];").starts_with("NewArray\n  PrimitiveType int\n  NumberLiteral 5\n"));
    assert!(dump_expr("new Foo(1);").starts_with("New\n  TypeReference\n"));
}

#[test]
fn test_conditional_and_update() {
    assert_eq!(
        dump_expr("c ? i++ : --i;"),
        "Conditional\n  Identifier c\n  Update\n    Identifier i\n  Update\n    Identifier i\n"
    );
}

// ============================================================================
// Statements and declarations
// ============================================================================

#[test]
fn test_variable_declarations() {
    let (ast, stmts) = parse_ok("let a: int = 1, b = 2;\nconst c = \"s\";");
    assert_eq!(stmts.len(), 2);
    match ast.kind(stmts[0]) {
        NodeKind::VariableDeclaration { kind, declarators, .. } => {
            assert_eq!(*kind, VariableKind::Let);
            assert_eq!(declarators.len(), 2);
        }
        other => panic!("expected declaration, got {}", other.name()),
    }
}

#[test]
fn test_automatic_semicolon_on_newline() {
    let (_, stmts) = parse_ok("let a = 1\nlet b = 2\na = b");
    assert_eq!(stmts.len(), 3);
}

#[test]
fn test_for_and_for_of() {
    let (ast, stmts) = parse_ok("for (let i = 0; i < 10; i++) {}\nfor (let x of xs) {}");
    assert!(matches!(ast.kind(stmts[0]), NodeKind::For { init: Some(_), test: Some(_), update: Some(_), .. }));
    assert!(matches!(ast.kind(stmts[1]), NodeKind::ForOf { .. }));
}

#[test]
fn test_try_catch_finally() {
    let (ast, stmts) = parse_ok("try { f(); } catch (e: Error) { } catch (e) { } finally { }");
    match ast.kind(stmts[0]) {
        NodeKind::Try { handlers, finalizer, .. } => {
            assert_eq!(handlers.len(), 2);
            assert!(finalizer.is_some());
        }
        other => panic!("expected try, got {}", other.name()),
    }
}

#[test]
fn test_function_declaration() {
    let (ast, stmts) = parse_ok("function add<T extends Numeric>(a: T, b?: T, ...rest: T[]): T { return a; }");
    let NodeKind::FunctionDeclaration { function } = ast.kind(stmts[0]) else { panic!() };
    match ast.kind(*function) {
        NodeKind::ScriptFunction { type_params, params, return_type, body, .. } => {
            assert_eq!(type_params.len(), 1);
            assert_eq!(params.len(), 3);
            assert!(return_type.is_some());
            assert!(body.is_some());
            assert!(matches!(ast.kind(params[1]), NodeKind::Parameter { optional: true, .. }));
            assert!(matches!(ast.kind(params[2]), NodeKind::Parameter { rest: true, .. }));
        }
        other => panic!("expected function, got {}", other.name()),
    }
}

#[test]
fn test_async_and_native_functions() {
    let (ast, stmts) = parse_ok("async function f(): Promise<int> { return 1; }\nnative function g(): void;");
    let NodeKind::FunctionDeclaration { function } = ast.kind(stmts[0]) else { panic!() };
    let NodeKind::ScriptFunction { flags, .. } = ast.kind(*function) else { panic!() };
    assert!(flags.contains(ScriptFunctionFlags::ASYNC));
    let NodeKind::FunctionDeclaration { function } = ast.kind(stmts[1]) else { panic!() };
    let NodeKind::ScriptFunction { body, modifiers, .. } = ast.kind(*function) else { panic!() };
    assert!(body.is_none());
    assert!(modifiers.contains(ModifierFlags::NATIVE));
}

#[test]
fn test_class_members() {
    let source = "abstract class A<T> extends B implements I, J {\n\
                  private static readonly count: int = 0;\n\
                  value: T;\n\
                  constructor(v: T) { this.value = v; }\n\
                  get size(): int { return 1; }\n\
                  set size(v: int) {}\n\
                  abstract run(): void;\n\
                  }";
    let (ast, stmts) = parse_ok(source);
    let NodeKind::ClassDeclaration { members, implements, super_class, modifiers, .. } = ast.kind(stmts[0]) else {
        panic!()
    };
    assert!(modifiers.contains(ModifierFlags::ABSTRACT));
    assert!(super_class.is_some());
    assert_eq!(implements.len(), 2);
    assert_eq!(members.len(), 6);
    match ast.kind(members[0]) {
        NodeKind::ClassProperty { modifiers, .. } => {
            assert!(modifiers.contains(ModifierFlags::PRIVATE | ModifierFlags::STATIC | ModifierFlags::READONLY));
        }
        other => panic!("expected property, got {}", other.name()),
    }
    assert!(matches!(ast.kind(members[2]), NodeKind::MethodDefinition { kind: MethodKind::Constructor, .. }));
    assert!(matches!(ast.kind(members[3]), NodeKind::MethodDefinition { kind: MethodKind::Get, .. }));
    assert!(matches!(ast.kind(members[4]), NodeKind::MethodDefinition { kind: MethodKind::Set, .. }));
}

#[test]
fn test_interface_enum_alias_import() {
    let source = "import { a, b as c } from \"lib\";\n\
                  interface Shape { readonly area: double; name(): string; }\n\
                  enum Color { Red, Green = 5 }\n\
                  type Num = int | long | null;";
    let (ast, stmts) = parse_ok(source);
    assert_eq!(stmts.len(), 4);
    match ast.kind(stmts[0]) {
        NodeKind::ImportDeclaration { source, specifiers } => {
            assert_eq!(source, "lib");
            assert_eq!(specifiers.len(), 2);
        }
        other => panic!("expected import, got {}", other.name()),
    }
    let NodeKind::InterfaceDeclaration { members, .. } = ast.kind(stmts[1]) else { panic!() };
    assert_eq!(members.len(), 2);
    let NodeKind::EnumDeclaration { members, .. } = ast.kind(stmts[2]) else { panic!() };
    assert_eq!(members.len(), 2);
    let NodeKind::TypeAlias { aliased, .. } = ast.kind(stmts[3]) else { panic!() };
    assert!(matches!(ast.kind(*aliased), NodeKind::UnionType { types } if types.len() == 3));
}

#[test]
fn test_function_and_array_types() {
    let (ast, stmts) = parse_ok("let f: (a: int) => string[] = g;");
    let NodeKind::VariableDeclaration { declarators, .. } = ast.kind(stmts[0]) else { panic!() };
    let NodeKind::VariableDeclarator { type_annotation: Some(ty), .. } = ast.kind(declarators[0]) else { panic!() };
    match ast.kind(*ty) {
        NodeKind::FunctionType { return_type, .. } => {
            assert!(matches!(ast.kind(*return_type), NodeKind::ArrayType { .. }));
        }
        other => panic!("expected function type, got {}", other.name()),
    }
}

#[test]
fn test_parents_are_linked() {
    let (ast, stmts) = parse_ok("let a = 1 + 2;");
    for child in ast.children(stmts[0]) {
        assert_eq!(ast.parent(child), Some(stmts[0]));
    }
}

// ============================================================================
// Errors
// ============================================================================

#[test]
fn test_missing_expression_reports_and_recovers() {
    let (ast, program, errors) = parse("let a = ;\nlet b = 2;");
    assert!(!errors.is_empty());
    let stmts = statements(&ast, program);
    assert!(stmts.iter().any(|s| matches!(ast.kind(*s), NodeKind::VariableDeclaration { .. })));
}

#[test]
fn test_const_without_initializer() {
    let (_, _, errors) = parse("const x: int;");
    assert!(errors.iter().any(|e| e.contains("const")), "{:?}", errors);
}

#[test]
fn test_invalid_assignment_target() {
    let (_, _, errors) = parse("1 = 2;");
    assert_eq!(errors.len(), 1);
}

#[test]
fn test_try_without_handlers() {
    let (_, _, errors) = parse("try { }");
    assert_eq!(errors.len(), 1);
}

#[test]
fn test_diagnostics_carry_file_and_position() {
    let mut ast = Ast::new(StringInterner::new());
    let result = parse_program(&mut ast, "pos.ets", "let a = 1;\nlet = 2;", ProgramKind::Main, "pos");
    let first = result.diagnostics.first_error().expect("error expected");
    assert_eq!(first.file.as_deref(), Some("pos.ets"));
    assert_eq!(first.position.map(|p| p.line), Some(2));
}

#[test]
fn test_deep_nesting_does_not_overflow() {
    let source = format!("let a = {}1{};", "(".repeat(500), ")".repeat(500));
    let (_, _, errors) = parse(&source);
    assert!(!errors.is_empty());
}
