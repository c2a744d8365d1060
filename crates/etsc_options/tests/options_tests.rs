//! Option validation, defaults and input resolution.

use etsc_options::*;
use std::path::{Path, PathBuf};

fn with_input(input: &str) -> CompilerOptions {
    CompilerOptions { input: Some(input.to_string()), ..CompilerOptions::default() }
}

/// A fresh directory under the system temp dir, unique per test.
fn scratch_dir(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("etsc_options_{}_{}", name, std::process::id()));
    let _ = std::fs::remove_dir_all(&dir);
    std::fs::create_dir_all(&dir).unwrap();
    dir
}

// ============================================================================
// Validation
// ============================================================================

#[test]
fn test_valid_minimal_options() {
    assert_eq!(with_input("main.ets").validate(), Ok(()));
}

#[test]
fn test_no_input_is_rejected() {
    assert_eq!(CompilerOptions::default().validate(), Err(OptionsError::NoInput));
}

#[test]
fn test_input_conflicts_with_base64_input() {
    let options = CompilerOptions { base64_input: Some("YQ==".into()), ..with_input("main.ets") };
    let err = options.validate().unwrap_err();
    assert_eq!(err.to_string(), "--input and --base64Input can not be used simultaneously");
}

#[test]
fn test_output_conflicts_with_base64_output() {
    let options = CompilerOptions { output: Some("a.abc".into()), base64_output: true, ..with_input("a.ets") };
    assert!(matches!(options.validate(), Err(OptionsError::Conflict { first: "--output", .. })));
}

#[test]
fn test_module_conflicts_with_commonjs() {
    let options = CompilerOptions { module: true, commonjs: true, ..with_input("a.ets") };
    assert!(matches!(options.validate(), Err(OptionsError::Conflict { first: "--module", second: "--commonjs" })));
}

#[test]
fn test_opt_level_range() {
    let options = CompilerOptions { opt_level: 2, ..with_input("a.ets") };
    assert!(options.validate().is_ok());
    let options = CompilerOptions { opt_level: 3, ..with_input("a.ets") };
    assert_eq!(options.validate(), Err(OptionsError::OptLevel(3)));
}

#[test]
fn test_unknown_extension() {
    let options = CompilerOptions { extension: "py".into(), ..with_input("a.ets") };
    assert_eq!(options.validate(), Err(OptionsError::Extension("py".into())));
}

#[test]
fn test_patch_flags() {
    let options = CompilerOptions { hot_reload: true, ..with_input("a.ets") };
    assert_eq!(options.validate(), Err(OptionsError::PatchWithoutGenerate));

    let options = CompilerOptions { hot_reload: true, cold_fix: true, generate_patch: true, ..with_input("a.ets") };
    assert!(matches!(options.validate(), Err(OptionsError::Conflict { first: "--hot-reload", .. })));

    let options = CompilerOptions { cold_fix: true, generate_patch: true, ..with_input("a.ets") };
    assert!(options.validate().is_ok());
}

#[test]
fn test_missing_cache_list_file() {
    let options = CompilerOptions { cache_file: Some("@/definitely/not/here.txt".into()), ..with_input("a.ets") };
    assert_eq!(options.validate(), Err(OptionsError::MissingListFile("/definitely/not/here.txt".into())));
}

// ============================================================================
// Defaults
// ============================================================================

#[test]
fn test_output_defaults_to_input_stem() {
    let options = with_input("src/app/main.ets");
    assert_eq!(options.output_name(), "main.abc");
    assert_eq!(options.record_name(), "main");
}

#[test]
fn test_explicit_output_and_record() {
    let options = CompilerOptions {
        output: Some("out/bundle.abc".into()),
        record_name: Some("com.example".into()),
        ..with_input("main.ets")
    };
    assert_eq!(options.output_name(), "out/bundle.abc");
    assert_eq!(options.record_name(), "com.example");

    let options = CompilerOptions { output: Some("out/bundle.abc".into()), ..with_input("main.ets") };
    assert_eq!(options.record_name(), "bundle");
}

#[test]
fn test_base64_output_record_name() {
    let options = CompilerOptions { base64_output: true, ..with_input("main.ets") };
    assert_eq!(options.output_name(), "");
    assert_eq!(options.record_name(), "Base64Output");
}

#[test]
fn test_options_from_json_use_defaults() {
    let options: CompilerOptions = serde_json::from_str(r#"{ "input": "a.ets", "optLevel": 1 }"#).unwrap();
    assert_eq!(options.opt_level, 1);
    assert_eq!(options.extension(), Extension::Ets);
    assert_eq!(options.script_kind(), ScriptKind::Script);
}

// ============================================================================
// Input files
// ============================================================================

#[test]
fn test_resolve_list_file_input() {
    let dir = scratch_dir("list");
    let list = dir.join("files.txt");
    std::fs::write(&list, "a.ets;app;esm;src/a.ets;a.abc\nb.ets;lib;commonjs;src/b.ets;b.abc\n").unwrap();

    let mut options = with_input(&format!("@{}", list.display()));
    assert_eq!(options.list_file(), Some(list.to_str().unwrap()));
    options.resolve_inputs().unwrap();
    assert_eq!(options.source_files.len(), 2);
    assert_eq!(options.source_files[1].kind, EntryKind::CommonJs);
    assert_eq!(options.output_name(), "files.abc");
}

#[test]
fn test_missing_list_file() {
    let mut options = with_input("@/no/such/list.txt");
    assert_eq!(options.resolve_inputs(), Err(OptionsError::MissingListFile("/no/such/list.txt".into())));
}

#[test]
fn test_plain_input_has_no_list() {
    let mut options = with_input("main.ets");
    options.resolve_inputs().unwrap();
    assert!(options.source_files.is_empty());
}

#[test]
fn test_base64_source_roundtrip_through_options() {
    let source = "function main(): void {}";
    let options = CompilerOptions { base64_input: Some(encode_base64_output(source.as_bytes())), ..Default::default() };
    assert!(options.validate().is_ok());
    assert_eq!(decode_base64_input(options.base64_input.as_deref().unwrap()).unwrap(), source);
}

// ============================================================================
// arktsconfig.json
// ============================================================================

#[test]
fn test_load_arktsconfig_from_disk() {
    let dir = scratch_dir("config");
    let path = dir.join("arktsconfig.json");
    std::fs::write(
        &path,
        r#"{ "compilerOptions": { "paths": { "geometry": ["./lib/geometry"] },
             "dynamicPaths": { "js_mod": { "language": "js" } } } }"#,
    )
    .unwrap();

    let config = ArkTsConfig::load(&path).unwrap();
    assert_eq!(config.config_dir, dir);
    assert_eq!(
        config.resolve("geometry/shapes", Path::new("/elsewhere"), "ets"),
        ImportResolution::Static(vec![dir.join("./lib/geometry").join("shapes.ets")])
    );
    assert_eq!(
        config.resolve("js_mod", Path::new("/elsewhere"), "ets"),
        ImportResolution::Dynamic { language: "js".into() }
    );
    assert!(!config.compiler_options.dynamic_paths["js_mod"].has_decl);
}

#[test]
fn test_unaliased_import_uses_base_url() {
    let config = ArkTsConfig::parse(r#"{ "compilerOptions": { "baseUrl": "src" } }"#, "/proj").unwrap();
    assert_eq!(
        config.resolve("util/strings", Path::new("/proj/src/app"), "ets"),
        ImportResolution::Static(vec![PathBuf::from("/proj/src/util/strings.ets")])
    );
}

#[test]
fn test_alias_prefix_must_end_at_separator() {
    let config = ArkTsConfig::parse(r#"{ "compilerOptions": { "paths": { "std": ["stdlib"] } } }"#, "/p").unwrap();
    assert_eq!(
        config.resolve("stdx", Path::new("/p"), "ets"),
        ImportResolution::Static(vec![PathBuf::from("/p/stdx.ets")])
    );
}

#[test]
fn test_missing_arktsconfig() {
    let err = ArkTsConfig::load(Path::new("/no/such/arktsconfig.json")).unwrap_err();
    assert!(matches!(err, OptionsError::Io { .. }));
}
