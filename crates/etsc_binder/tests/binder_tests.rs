use etsc_ast::*;
use etsc_binder::{Binder, DeclKind, ModuleResolution, ScopeKind, VariableFlags};
use etsc_core::collections::FxHashMap;
use etsc_core::StringInterner;
use etsc_parser::parse_program;

fn bind_source(source: &str) -> (Ast, Binder, NodeId, Vec<String>) {
    let mut ast = Ast::new(StringInterner::new());
    let parsed = parse_program(&mut ast, "main.ets", source, ProgramKind::Main, "main");
    assert!(parsed.diagnostics.is_empty(), "parse errors: {:?}", parsed.diagnostics.diagnostics());
    let mut binder = Binder::new();
    binder.bind_program(&ast, parsed.program);
    let errors = binder.take_diagnostics().diagnostics().iter().map(|d| d.message_text.clone()).collect();
    (ast, binder, parsed.program, errors)
}

/// Find the first identifier node named `name` inside `root` that is not a declaration name.
fn find_identifier(ast: &Ast, root: NodeId, name: &str, nth: usize) -> NodeId {
    let mut found = Vec::new();
    ast.walk(root, &mut |ast, id| {
        if let NodeKind::Identifier { name: n, .. } = ast.kind(id) {
            if ast.resolve(*n) == name {
                found.push(id);
            }
        }
    });
    found[nth]
}

fn lookup(ast: &Ast, binder: &Binder, at: NodeId, name: &str) -> Option<DeclKind> {
    let name = ast.interner.get(name)?;
    let scope = binder.scope_of(ast, at);
    binder.find(scope, name).map(|v| binder.variable(v).kind)
}

// ============================================================================
// Scopes and hoisting
// ============================================================================

#[test]
fn test_top_level_declarations() {
    let (ast, binder, program, errors) =
        bind_source("let a = 1;\nconst b = 2;\nfunction f() {}\nclass C {}\ninterface I {}\nenum E { A }\ntype T = int;");
    assert!(errors.is_empty(), "{:?}", errors);
    let scope = binder.node_scope(program).unwrap();
    assert_eq!(binder.scope(scope).kind, ScopeKind::Module);
    let kinds: Vec<DeclKind> = binder.scope(scope).bindings.values().map(|v| binder.variable(*v).kind).collect();
    assert_eq!(
        kinds,
        vec![
            DeclKind::Let,
            DeclKind::Const,
            DeclKind::Function,
            DeclKind::Class,
            DeclKind::Interface,
            DeclKind::Enum,
            DeclKind::TypeAlias
        ]
    );
    for var in binder.scope(scope).bindings.values() {
        assert!(binder.variable(*var).flags.contains(VariableFlags::TOP_LEVEL));
    }
}

#[test]
fn test_hoisting_makes_later_functions_visible() {
    let (ast, binder, program, errors) = bind_source("function f() { g(); }\nfunction g() {}");
    assert!(errors.is_empty());
    let use_site = find_identifier(&ast, program, "g", 0);
    assert_eq!(lookup(&ast, &binder, use_site, "g"), Some(DeclKind::Function));
}

#[test]
fn test_parameters_and_type_parameters() {
    let (ast, binder, program, errors) = bind_source("function f<T>(x: T): T { return x; }");
    assert!(errors.is_empty());
    let x_use = find_identifier(&ast, program, "x", 1);
    assert_eq!(lookup(&ast, &binder, x_use, "x"), Some(DeclKind::Param));
    assert_eq!(lookup(&ast, &binder, x_use, "T"), Some(DeclKind::TypeParameter));
    // Outside the function neither name exists.
    assert_eq!(lookup(&ast, &binder, program, "x"), None);
}

#[test]
fn test_block_scoping_and_shadowing() {
    let (ast, binder, program, errors) = bind_source("let a = 1;\n{ let a = 2; a; }\na;");
    assert!(errors.is_empty());
    let inner_use = find_identifier(&ast, program, "a", 2);
    let outer_use = find_identifier(&ast, program, "a", 3);
    let name = ast.interner.get("a").unwrap();
    let inner = binder.find(binder.scope_of(&ast, inner_use), name).unwrap();
    let outer = binder.find(binder.scope_of(&ast, outer_use), name).unwrap();
    assert_ne!(inner, outer);
    assert_eq!(binder.scope(binder.variable(inner).scope).kind, ScopeKind::Block);
}

#[test]
fn test_loop_and_catch_scopes() {
    let (ast, binder, program, errors) =
        bind_source("for (let i = 0; i < 3; i++) { i; }\ntry { } catch (e: Exception) { e; }");
    assert!(errors.is_empty(), "{:?}", errors);
    let i_use = find_identifier(&ast, program, "i", 3);
    assert_eq!(lookup(&ast, &binder, i_use, "i"), Some(DeclKind::Let));
    let e_use = find_identifier(&ast, program, "e", 1);
    assert_eq!(lookup(&ast, &binder, e_use, "e"), Some(DeclKind::CatchParam));
}

// ============================================================================
// Errors
// ============================================================================

#[test]
fn test_redeclaration_is_reported() {
    let (_, _, _, errors) = bind_source("let a = 1;\nlet a = 2;");
    assert_eq!(errors, vec!["Variable 'a' has already been declared.".to_string()]);
}

#[test]
fn test_function_overloads_are_not_redeclarations() {
    let (ast, binder, program, errors) = bind_source("function f(a: int) {}\nfunction f(a: string) {}");
    assert!(errors.is_empty());
    let name = ast.interner.get("f").unwrap();
    let var = binder.find(binder.node_scope(program).unwrap(), name).unwrap();
    assert_eq!(binder.variable(var).overloads.len(), 2);
}

#[test]
fn test_control_flow_outside_loop() {
    let (_, _, _, errors) = bind_source("function f() { break; }\nwhile (true) { continue; }");
    assert_eq!(errors.len(), 1);
    assert!(errors[0].contains("out of loop"));
}

#[test]
fn test_return_outside_function() {
    let (_, _, _, errors) = bind_source("return 1;");
    assert_eq!(errors.len(), 1);
}

// ============================================================================
// Imports
// ============================================================================

#[test]
fn test_static_import_resolves_to_export() {
    let mut ast = Ast::new(StringInterner::new());
    let lib = parse_program(&mut ast, "lib.ets", "export function helper(): int { return 1; }\nfunction hidden() {}", ProgramKind::External, "lib");
    let main = parse_program(&mut ast, "main.ets", "import { helper, hidden } from \"./lib\";\nhelper();", ProgramKind::Main, "main");
    let mut binder = Binder::new();
    binder.bind_program(&ast, lib.program);
    binder.bind_program(&ast, main.program);
    let mut modules = FxHashMap::default();
    modules.insert("./lib".to_string(), ModuleResolution::Static(lib.program));
    binder.resolve_imports(&ast, &modules);

    let errors = binder.take_diagnostics();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors.diagnostics()[0].message_text, "Module './lib' has no exported member 'hidden'.");

    let name = ast.interner.get("helper").unwrap();
    let found = binder.find(binder.node_scope(main.program).unwrap(), name).unwrap();
    assert_eq!(binder.variable(found).kind, DeclKind::Function);
    assert_eq!(binder.variable(found).decl_node, lib_function(&ast, lib.program));
}

fn lib_function(ast: &Ast, program: NodeId) -> NodeId {
    match ast.kind(program) {
        NodeKind::Program { statements, .. } => statements[0],
        _ => unreachable!(),
    }
}

#[test]
fn test_dynamic_import_and_missing_module() {
    let mut ast = Ast::new(StringInterner::new());
    let main = parse_program(
        &mut ast,
        "main.ets",
        "import { foo } from \"js_mod\";\nimport { bar } from \"missing\";",
        ProgramKind::Main,
        "main",
    );
    let mut binder = Binder::new();
    binder.bind_program(&ast, main.program);
    let mut modules = FxHashMap::default();
    modules.insert("js_mod".to_string(), ModuleResolution::Dynamic { language: "js".into() });
    binder.resolve_imports(&ast, &modules);

    let errors = binder.take_diagnostics();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors.diagnostics()[0].message_text, "Cannot find module 'missing'.");

    let name = ast.interner.get("foo").unwrap();
    let foo = binder.find(binder.node_scope(main.program).unwrap(), name).unwrap();
    assert!(binder.variable(foo).is_dynamic_import());
}

#[test]
fn test_prelude_binds_into_global_scope() {
    let mut ast = Ast::new(StringInterner::new());
    let prelude = parse_program(&mut ast, "std/core.ets", "export class Object {}", ProgramKind::Prelude, "std.core");
    let main = parse_program(&mut ast, "main.ets", "let o: Object = new Object();", ProgramKind::Main, "main");
    let mut binder = Binder::new();
    binder.bind_program(&ast, prelude.program);
    binder.bind_program(&ast, main.program);
    assert_eq!(binder.node_scope(prelude.program), Some(binder.global_scope()));
    let name = ast.interner.get("Object").unwrap();
    let found = binder.find(binder.node_scope(main.program).unwrap(), name).unwrap();
    assert_eq!(binder.variable(found).scope, binder.global_scope());
}
