//! End-to-end tests of the driver: inputs, imports, errors and outputs.

use etsc_codegen::ProgramOutput;
use etsc_compiler::*;
use etsc_diagnostics::DiagnosticCategory;
use etsc_options::{encode_base64_output, CompilerOptions, OptionsError};
use std::path::{Path, PathBuf};

const GLOBAL_INIT: &str = "main.ETSGLOBAL._$init$_:()void";

/// A fresh directory under the system temp dir, unique per test.
fn scratch_dir(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("etsc_compiler_{}_{}", name, std::process::id()));
    let _ = std::fs::remove_dir_all(&dir);
    std::fs::create_dir_all(&dir).unwrap();
    dir
}

fn write(dir: &Path, name: &str, text: &str) -> PathBuf {
    let path = dir.join(name);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(&path, text).unwrap();
    path
}

fn options_for(path: &Path) -> CompilerOptions {
    CompilerOptions { input: Some(path.display().to_string()), ..CompilerOptions::default() }
}

/// Compile `source` as `main.ets` in a fresh directory.
fn compile_source(test: &str, source: &str) -> CompileResult<CompileOutput> {
    let dir = scratch_dir(test);
    let main = write(&dir, "main.ets", source);
    Compiler::compile(options_for(&main))
}

fn program_of(output: &CompileOutput) -> &ProgramOutput {
    output.main().and_then(|u| u.program.as_ref()).expect("a generated program")
}

fn compile_ok(test: &str, source: &str) -> CompileOutput {
    match compile_source(test, source) {
        Ok(output) => output,
        Err(e) => panic!("unexpected compile error: {}", e),
    }
}

fn user_messages(error: &CompileError) -> Vec<String> {
    match error {
        CompileError::User { diagnostics, .. } => diagnostics.iter().map(|d| d.message_text.clone()).collect(),
        other => panic!("expected a user error, got {:?}", other),
    }
}

fn listing(program: &ProgramOutput, name: &str) -> Vec<String> {
    match program.function(name) {
        Some(function) => function.listing(),
        None => panic!("no function '{}'", name),
    }
}

// ============================================================================
// Single file
// ============================================================================

#[test]
fn test_compile_simple_program() {
    let output = compile_ok("simple", "function add(a: int, b: int): int { return a + b; }\nlet x = add(1, 2);");
    let unit = output.main().unwrap();
    assert_eq!(unit.record_name, "main");
    assert_eq!(unit.output_name, "main.abc");

    let program = program_of(&output);
    assert!(program.function("main.ETSGLOBAL.add:(i32,i32)i32").is_some());
    let init = listing(program, GLOBAL_INIT);
    assert!(init.iter().any(|l| l.contains("main.ETSGLOBAL.add:(i32,i32)i32")));
}

#[test]
fn test_prelude_is_not_emitted() {
    let output = compile_ok("prelude", "let s: string = \"a\";");
    let program = program_of(&output);
    assert!(program.records.iter().all(|r| !r.name.starts_with("std.core")));
    assert!(program.functions.iter().all(|f| !f.name.starts_with("std.core")));
}

#[test]
fn test_assembly_listing() {
    let output = compile_ok("assembly", "let x: long = 5;");
    let assembly = output.main().unwrap().assembly().unwrap();
    assert!(assembly.contains(".record"));
    assert!(assembly.contains("main.ETSGLOBAL"));
    assert!(assembly.contains(".function main.ETSGLOBAL._$init$_:()void"));
}

#[test]
fn test_opt_level_never_grows_output() {
    let dir = scratch_dir("opt");
    let main = write(
        &dir,
        "main.ets",
        "function f(n: int): int {\n  let s = 0;\n  let i = 0;\n  while (i < n) { s = s + i; i++; }\n  return s;\n}",
    );
    let plain = Compiler::compile(options_for(&main)).unwrap();
    let optimized = Compiler::compile(CompilerOptions { opt_level: 2, ..options_for(&main) }).unwrap();
    assert!(program_of(&optimized).instruction_count() <= program_of(&plain).instruction_count());
}

// ============================================================================
// User errors
// ============================================================================

#[test]
fn test_syntax_error_is_user_error() {
    let err = compile_source("syntax", "let x = ;").unwrap_err();
    assert_eq!(err.exit_code(), 2);
    let CompileError::User { diagnostics, sources } = &err else { panic!("expected a user error") };
    assert_eq!(diagnostics[0].category, DiagnosticCategory::SyntaxError);
    assert!(diagnostics[0].file.as_deref().is_some_and(|f| f.ends_with("main.ets")));
    assert!(sources.iter().any(|s| s.name.ends_with("main.ets") && s.text == "let x = ;"));
}

#[test]
fn test_type_error_is_user_error() {
    let err = compile_source("type_error", "let b: byte = 200;").unwrap_err();
    assert_eq!(err.exit_code(), 2);
    let messages = user_messages(&err);
    assert_eq!(messages.len(), 1);
    assert!(messages[0].contains("is not compatible with type 'byte'"), "{:?}", messages);
    let CompileError::User { diagnostics, .. } = &err else { unreachable!() };
    assert_eq!(diagnostics[0].position.map(|p| p.line), Some(1));
}

#[test]
fn test_parse_only_skips_checking() {
    let dir = scratch_dir("parse_only");
    let main = write(&dir, "main.ets", "let b: byte = 200;");
    let output = Compiler::compile(CompilerOptions { parse_only: true, ..options_for(&main) }).unwrap();
    assert!(output.main().unwrap().program.is_none());
}

#[test]
fn test_dump_ast_outlines_main_program() {
    let dir = scratch_dir("dump_ast");
    let main = write(&dir, "main.ets", "let x = 1;");
    let output = Compiler::compile(CompilerOptions { dump_ast: true, parse_only: true, ..options_for(&main) }).unwrap();
    let dump = output.main().unwrap().ast_dump.clone().unwrap();
    assert!(dump.starts_with("Program"));
    assert!(dump.contains("NumberLiteral 1"));
}

// ============================================================================
// Imports
// ============================================================================

#[test]
fn test_relative_import_across_files() {
    let dir = scratch_dir("relative");
    write(&dir, "lib.ets", "export function helper(): int { return 41; }");
    let main = write(&dir, "main.ets", "import { helper } from \"./lib\";\nlet x: int = helper() + 1;");

    let output = Compiler::compile(options_for(&main)).unwrap();
    let program = program_of(&output);
    assert!(program.record("lib.ETSGLOBAL").is_some());
    assert!(program.function("lib.ETSGLOBAL.helper:()i32").is_some());
    let init = listing(program, GLOBAL_INIT);
    assert!(init.iter().any(|l| l.contains("lib.ETSGLOBAL.helper:()i32")));
}

#[test]
fn test_shared_import_is_loaded_once() {
    let dir = scratch_dir("diamond");
    write(&dir, "c.ets", "export function base(): int { return 1; }");
    write(&dir, "a.ets", "import { base } from \"./c\";\nexport function fa(): int { return base(); }");
    write(&dir, "b.ets", "import { base } from \"./c\";\nexport function fb(): int { return base() + 1; }");
    let main = write(&dir, "main.ets", "import { fa } from \"./a\";\nimport { fb } from \"./b\";\nlet x = fa() + fb();");

    let output = Compiler::compile(options_for(&main)).unwrap();
    let program = program_of(&output);
    let globals: Vec<&str> =
        program.records.iter().map(|r| r.name.as_str()).filter(|n| n.ends_with(".ETSGLOBAL")).collect();
    assert_eq!(globals.iter().filter(|n| **n == "c.ETSGLOBAL").count(), 1);
    assert_eq!(globals.len(), 4);
}

#[test]
fn test_missing_module() {
    let err = compile_source("missing_module", "import { a } from \"./nope\";").unwrap_err();
    assert_eq!(user_messages(&err), vec!["Cannot find module './nope'.".to_string()]);
}

#[test]
fn test_unexported_member() {
    let dir = scratch_dir("unexported");
    write(&dir, "lib.ets", "function hidden(): void {}");
    let main = write(&dir, "main.ets", "import { hidden } from \"./lib\";");
    let err = Compiler::compile(options_for(&main)).unwrap_err();
    assert_eq!(user_messages(&err), vec!["Module './lib' has no exported member 'hidden'.".to_string()]);
}

#[test]
fn test_import_through_arktsconfig_paths() {
    let dir = scratch_dir("paths");
    write(&dir, "geometry/shapes.ets", "export function area(w: int, h: int): int { return w * h; }");
    let config = write(&dir, "arktsconfig.json", r#"{ "compilerOptions": { "paths": { "geo": ["./geometry"] } } }"#);
    let main = write(&dir, "src/main.ets", "import { area } from \"geo/shapes\";\nlet a = area(2, 3);");

    let options = CompilerOptions { arkts_config: Some(config.display().to_string()), ..options_for(&main) };
    let output = Compiler::compile(options).unwrap();
    assert!(program_of(&output).function("geo.shapes.ETSGLOBAL.area:(i32,i32)i32").is_some());
}

#[test]
fn test_dynamic_import_loads_module_at_runtime() {
    let dir = scratch_dir("dynamic");
    let config = write(
        &dir,
        "arktsconfig.json",
        r#"{ "compilerOptions": { "dynamicPaths": { "js_mod": { "language": "js", "hasDecl": false } } } }"#,
    );
    let main = write(&dir, "main.ets", "import { foo } from \"js_mod\";\nlet r = foo(1);");

    let options = CompilerOptions { arkts_config: Some(config.display().to_string()), ..options_for(&main) };
    let output = Compiler::compile(options).unwrap();
    let assembly = output.main().unwrap().assembly().unwrap();
    assert!(assembly.contains("loadModule"));
    assert!(assembly.contains("%%dynamic_import"));
}

#[test]
fn test_dynamic_value_to_object_is_type_checked() {
    let dir = scratch_dir("dynamic_object");
    let config = write(
        &dir,
        "arktsconfig.json",
        r#"{ "compilerOptions": { "dynamicPaths": { "js_mod": { "language": "js", "hasDecl": false } } } }"#,
    );
    let main = write(
        &dir,
        "main.ets",
        "import { foo } from \"js_mod\";\nclass Box {}\nfunction get(): Box { return foo(1); }",
    );

    let options = CompilerOptions { arkts_config: Some(config.display().to_string()), ..options_for(&main) };
    let output = Compiler::compile(options).unwrap();
    let get = listing(program_of(&output), "main.ETSGLOBAL.get:()main.Box");
    let position = |prefix: &str| {
        get.iter().position(|l| l.starts_with(prefix)).unwrap_or_else(|| panic!("no '{}' in {:#?}", prefix, get))
    };
    let load_type = position("lda.type main.Box");
    let unwrap = position(
        "call.short std.core.JSRuntime.getValueObject:(std.core.JSValue,std.core.Object)std.core.Object",
    );
    let checkcast = position("checkcast main.Box");
    assert!(load_type < unwrap && unwrap < checkcast);
}

// ============================================================================
// Inputs
// ============================================================================

#[test]
fn test_base64_input() {
    let source = "function twice(a: int): int { return a * 2; }";
    let options = CompilerOptions {
        base64_input: Some(encode_base64_output(source.as_bytes())),
        base64_output: true,
        ..CompilerOptions::default()
    };
    let output = Compiler::compile(options).unwrap();
    let unit = output.main().unwrap();
    assert_eq!(unit.record_name, "Base64Output");
    assert_eq!(unit.output_name, "");
    assert!(program_of(&output).function("Base64Output.ETSGLOBAL.twice:(i32)i32").is_some());
}

#[test]
fn test_invalid_base64_is_rejected_before_parsing() {
    let options = CompilerOptions { base64_input: Some("%%%".into()), ..CompilerOptions::default() };
    let err = Compiler::compile(options).unwrap_err();
    assert!(matches!(err, CompileError::Options(OptionsError::InvalidBase64)));
    assert_eq!(err.exit_code(), 1);
    assert_eq!(err.to_string(), "The input string is not a valid base64 data");
}

#[test]
fn test_missing_input_file() {
    let err = Compiler::compile(options_for(Path::new("/no/such/main.ets"))).unwrap_err();
    assert!(matches!(err, CompileError::Io { .. }));
    assert_eq!(err.exit_code(), 1);
}

#[test]
fn test_conflicting_options() {
    let options = CompilerOptions { module: true, commonjs: true, ..options_for(Path::new("main.ets")) };
    let err = Compiler::compile(options).unwrap_err();
    assert_eq!(err.to_string(), "--module and --commonjs can not be used simultaneously");
}

fn list_file_project(test: &str) -> (PathBuf, PathBuf) {
    let dir = scratch_dir(test);
    let app = write(&dir, "app.ets", "function run(): int { return 1; }");
    let util = write(&dir, "util.ets", "function twice(a: int): int { return a * 2; }");
    let list = write(
        &dir,
        "files.txt",
        &format!(
            "{};app;esm;app.ets;{}\n{};util;esm;util.ets;{}\n",
            app.display(),
            dir.join("app.abc").display(),
            util.display(),
            dir.join("util.abc").display()
        ),
    );
    (dir, list)
}

#[test]
fn test_list_file_compiles_one_unit_per_entry() {
    let (dir, list) = list_file_project("list_units");
    let output = Compiler::compile(options_for(Path::new(&format!("@{}", list.display())))).unwrap();
    assert_eq!(output.units.len(), 2);
    assert_eq!(output.units[0].record_name, "app");
    assert_eq!(output.units[1].output_name, dir.join("util.abc").display().to_string());
    let util = output.units[1].program.as_ref().unwrap();
    assert!(util.function("util.ETSGLOBAL.twice:(i32)i32").is_some());
    assert!(util.record("app.ETSGLOBAL").is_none());
}

#[test]
fn test_list_file_merged_into_one_unit() {
    let (_, list) = list_file_project("list_merged");
    let options = CompilerOptions { merge_abc: true, ..options_for(Path::new(&format!("@{}", list.display()))) };
    let output = Compiler::compile(options).unwrap();
    assert_eq!(output.units.len(), 1);
    let program = program_of(&output);
    assert!(program.record("app.ETSGLOBAL").is_some());
    assert!(program.record("util.ETSGLOBAL").is_some());
    assert_eq!(output.units[0].output_name, "files.abc");
}

#[test]
fn test_file_threads_match_sequential() {
    let (_, list) = list_file_project("list_threads");
    let input = format!("@{}", list.display());
    let sequential = Compiler::compile(options_for(Path::new(&input))).unwrap();
    let parallel = Compiler::compile(CompilerOptions { file_threads: 2, ..options_for(Path::new(&input)) }).unwrap();
    assert_eq!(sequential.units.len(), parallel.units.len());
    for (a, b) in sequential.units.iter().zip(&parallel.units) {
        assert_eq!(a.program, b.program);
    }
}

// ============================================================================
// Prelude override
// ============================================================================

#[test]
fn test_prelude_without_object_is_internal_error() {
    let dir = scratch_dir("bad_prelude");
    let prelude = write(&dir, "core.ets", "final class Void {}");
    let main = write(&dir, "main.ets", "let x = 1;");
    let options = CompilerOptions { std_lib: Some(prelude.display().to_string()), ..options_for(&main) };
    let err = Compiler::compile(options).unwrap_err();
    assert!(err.is_internal(), "{:?}", err);
    assert_eq!(err.exit_code(), 3);
}
