use etsc_ast::*;
use etsc_binder::Binder;
use etsc_checker::*;
use etsc_core::StringInterner;
use etsc_lowering::*;
use etsc_parser::parse_program;

const PRELUDE: &str = "\
class Object {
    constructor() {}
    native toString(): string;
}
final class Void {}
final class String {
    native length(): int;
}
final class Int { native static valueOf(value: int): Int; native unboxed(): int; }
final class Double { native static valueOf(value: double): Double; native unboxed(): double; }
class Exception { constructor() {} }
";

/// Parse, bind, check and lower `source`.
fn lower_source(source: &str) -> Result<Checker, LoweringError> {
    let mut ast = Ast::new(StringInterner::new());
    let prelude = parse_program(&mut ast, "std/core.ets", PRELUDE, ProgramKind::Prelude, "std.core");
    assert!(prelude.diagnostics.is_empty(), "prelude parse errors: {:?}", prelude.diagnostics.diagnostics());
    let main = parse_program(&mut ast, "main.ets", source, ProgramKind::Main, "main");
    assert!(main.diagnostics.is_empty(), "parse errors: {:?}", main.diagnostics.diagnostics());

    let mut binder = Binder::new();
    binder.bind_program(&ast, prelude.program);
    binder.bind_program(&ast, main.program);
    assert!(binder.take_diagnostics().is_empty());

    let mut checker = Checker::new(ast, binder);
    checker.start_checker()?;
    let mut phases = default_phases();
    run_phases(&mut checker, &mut phases)?;
    Ok(checker)
}

fn lower_ok(source: &str) -> Checker {
    match lower_source(source) {
        Ok(checker) => checker,
        Err(e) => panic!("unexpected error: {}", e),
    }
}

fn main_nodes(checker: &Checker, pred: impl Fn(&Ast, NodeId) -> bool) -> Vec<NodeId> {
    let main = *checker.ast.programs().last().expect("main program");
    let mut found = Vec::new();
    checker.ast.walk(main, &mut |ast, id| {
        if pred(ast, id) {
            found.push(id);
        }
    });
    found
}

fn member_names(checker: &Checker, owner: NodeId) -> Vec<(String, MethodKind)> {
    let members = match checker.ast.kind(owner) {
        NodeKind::InterfaceDeclaration { members, .. } | NodeKind::ClassDeclaration { members, .. } => members.clone(),
        _ => Vec::new(),
    };
    members
        .into_iter()
        .filter_map(|m| match checker.ast.kind(m) {
            NodeKind::MethodDefinition { kind, .. } => Some((checker.ast.name_str(m).to_string(), *kind)),
            _ => None,
        })
        .collect()
}

fn declaration(checker: &Checker, name: &str) -> NodeId {
    main_nodes(checker, |ast, id| {
        matches!(ast.kind(id), NodeKind::ClassDeclaration { .. } | NodeKind::InterfaceDeclaration { .. })
            && ast.name_str(id) == name
    })
    .first()
    .copied()
    .unwrap_or_else(|| panic!("no declaration '{}'", name))
}

/// Names of the methods called in the main program, in preorder.
fn called_methods(checker: &Checker) -> Vec<String> {
    main_nodes(checker, |ast, id| matches!(ast.kind(id), NodeKind::Call { .. }))
        .into_iter()
        .filter_map(|call| {
            let NodeKind::Call { callee, .. } = *checker.ast.kind(call) else { return None };
            match *checker.ast.kind(callee) {
                NodeKind::Member { property, computed: false, .. } => Some(checker.ast.name_str(property).to_string()),
                _ => None,
            }
        })
        .collect()
}

const INDEXABLE: &str = "\
class Cells {
    data: int[] = [0, 0, 0];
    $_get(index: int): int { return this.data[index]; }
    $_set(index: int, value: int): void { this.data[index] = value; }
}
";

// ============================================================================
// Interface properties
// ============================================================================

#[test]
fn test_interface_property_becomes_accessors() {
    let checker = lower_ok("interface Shape { area: int; readonly label: string; }");
    let shape = declaration(&checker, "Shape");
    let methods = member_names(&checker, shape);
    assert!(methods.contains(&("area".to_string(), MethodKind::Get)));
    assert!(methods.contains(&("area".to_string(), MethodKind::Set)));
    assert!(methods.contains(&("label".to_string(), MethodKind::Get)));
    assert!(!methods.contains(&("label".to_string(), MethodKind::Set)), "readonly property must not get a setter");
}

#[test]
fn test_implementing_class_gets_field_accessors() {
    let checker = lower_ok(
        "interface Shape { area: int; }\nclass Square implements Shape { area: int = 4; side: int = 2; }",
    );
    let square = declaration(&checker, "Square");
    let methods = member_names(&checker, square);
    assert_eq!(methods.len(), 2);
    assert!(methods.iter().all(|(name, _)| name == "area"));

    let ty = checker.ast.ts_type(square).expect("class type");
    let area = checker.ast.interner.intern("area");
    let prop = checker.table.find_property(ty, area, false).expect("area field");
    assert!(prop.getter.is_some());
    assert!(prop.setter.is_some());
}

#[test]
fn test_class_without_interfaces_is_untouched() {
    let checker = lower_ok("class Point { x: int = 0; }");
    let point = declaration(&checker, "Point");
    assert!(member_names(&checker, point).is_empty());
}

// ============================================================================
// Object literals
// ============================================================================

#[test]
fn test_object_literal_becomes_block_expression() {
    let checker = lower_ok("class Point { x: int = 0; y: int = 0; }\nlet p: Point = { x: 1, y: 2 };");
    assert!(main_nodes(&checker, |ast, id| matches!(ast.kind(id), NodeKind::ObjectLiteral { .. })).is_empty());

    let blocks = main_nodes(&checker, |ast, id| matches!(ast.kind(id), NodeKind::BlockExpression { .. }));
    assert_eq!(blocks.len(), 1);
    let NodeKind::BlockExpression { statements } = checker.ast.kind(blocks[0]) else { unreachable!() };
    // Temporary, two stores, result.
    assert_eq!(statements.len(), 4);
    assert!(matches!(checker.ast.kind(statements[0]), NodeKind::VariableDeclaration { .. }));

    let point = checker.ast.ts_type(declaration(&checker, "Point")).expect("class type");
    assert_eq!(checker.ast.ts_type(blocks[0]), Some(point));
}

#[test]
fn test_nested_object_literals_are_lowered_inside_out() {
    let checker = lower_ok(
        "class Inner { v: int = 0; }\nclass Outer { inner: Inner = new Inner(); }\nlet o: Outer = { inner: { v: 3 } };",
    );
    assert!(main_nodes(&checker, |ast, id| matches!(ast.kind(id), NodeKind::ObjectLiteral { .. })).is_empty());
    let blocks = main_nodes(&checker, |ast, id| matches!(ast.kind(id), NodeKind::BlockExpression { .. }));
    assert_eq!(blocks.len(), 2);
    // The inner block sits inside the outer one.
    assert_eq!(
        checker.ast.ts_type(blocks[1]),
        checker.ast.ts_type(declaration(&checker, "Inner"))
    );
}

#[test]
fn test_object_literal_as_argument() {
    let checker = lower_ok(
        "class Options { verbose: boolean = false; }\nfunction run(o: Options): boolean { return o.verbose; }\nlet r = run({ verbose: true });",
    );
    assert!(main_nodes(&checker, |ast, id| matches!(ast.kind(id), NodeKind::ObjectLiteral { .. })).is_empty());
}

// ============================================================================
// Object indexing
// ============================================================================

#[test]
fn test_index_read_becomes_get_call() {
    let checker = lower_ok(&format!("{INDEXABLE}let c = new Cells();\nlet x: int = c[1];"));
    assert!(called_methods(&checker).iter().any(|m| m == "$_get"));
    // Only the array accesses inside `Cells` stay computed.
    let computed = main_nodes(&checker, |ast, id| {
        matches!(ast.kind(id), NodeKind::Member { computed: true, obj_type: Some(ty), .. }
            if checker.table.element_type(*ty).is_none())
    });
    assert!(computed.is_empty());
}

#[test]
fn test_index_store_statement_becomes_set_call() {
    let checker = lower_ok(&format!("{INDEXABLE}let c = new Cells();\nc[2] = 7;"));
    assert!(called_methods(&checker).iter().any(|m| m == "$_set"));
    assert!(main_nodes(&checker, |ast, id| matches!(ast.kind(id), NodeKind::BlockExpression { .. })).is_empty());
}

#[test]
fn test_compound_index_assignment_uses_temporaries() {
    let checker = lower_ok(&format!("{INDEXABLE}let c = new Cells();\nc[0] += 5;"));
    let blocks = main_nodes(&checker, |ast, id| matches!(ast.kind(id), NodeKind::BlockExpression { .. }));
    assert_eq!(blocks.len(), 1);
    let methods = called_methods(&checker);
    assert!(methods.iter().any(|m| m == "$_get"));
    assert!(methods.iter().any(|m| m == "$_set"));
}

#[test]
fn test_postfix_increment_on_index() {
    let checker = lower_ok(&format!("{INDEXABLE}let c = new Cells();\nlet old: int = c[1]++;"));
    assert!(main_nodes(&checker, |ast, id| matches!(ast.kind(id), NodeKind::Update { .. })).is_empty());
    let int = checker.table.primitive(PrimitiveKind::Int);
    let blocks = main_nodes(&checker, |ast, id| matches!(ast.kind(id), NodeKind::BlockExpression { .. }));
    assert_eq!(blocks.len(), 1);
    assert_eq!(checker.ast.ts_type(blocks[0]).map(|t| checker.table.widen(t)), Some(int));
}

#[test]
fn test_array_indexing_is_untouched() {
    let checker = lower_ok("let a: int[] = [1, 2];\na[0] = a[1];");
    let computed = main_nodes(&checker, |ast, id| matches!(ast.kind(id), NodeKind::Member { computed: true, .. }));
    assert_eq!(computed.len(), 2);
}

// ============================================================================
// Driver
// ============================================================================

#[test]
fn test_phase_order() {
    let names: Vec<&str> = default_phases().iter().map(|p| p.name()).collect();
    assert_eq!(names, ["interface-property", "object-literal", "object-index"]);
}

#[test]
fn test_postcondition_failure_is_reported() {
    struct Broken;
    impl Phase for Broken {
        fn name(&self) -> &'static str {
            "broken"
        }
        fn perform(&mut self, _: &mut Checker) -> LoweringResult<()> {
            Ok(())
        }
        fn postcondition(&self, _: &Checker) -> bool {
            false
        }
    }

    let mut checker = lower_ok("let a = 1;");
    let mut phases: Vec<Box<dyn Phase>> = vec![Box::new(Broken)];
    match run_phases(&mut checker, &mut phases) {
        Err(LoweringError::Postcondition(name)) => assert_eq!(name, "broken"),
        other => panic!("expected a postcondition error, got {:?}", other.err()),
    }
}
