//! etsc: The ETS compiler CLI.
//!
//! Usage:
//!   etsc [options] <file | @listfile>
//!   etsc [options] --base64Input <data>
//!
//! Exit status: 0 on success, 1 for bad options or unreadable files, 2 for
//! errors in the compiled sources, 3 for internal compiler errors.

mod logging;
mod report;

use clap::Parser as ClapParser;
use etsc_compiler::{CompileOutput, Compiler};
use etsc_options::{encode_base64_output, CompilerOptions};
use std::process;
use std::time::Instant;

#[derive(ClapParser, Debug)]
#[command(name = "etsc", about = "etsc - An ETS to register bytecode compiler", version)]
struct Cli {
    /// Source file to compile, or @path to a list file.
    #[arg(value_name = "FILE")]
    input: Option<String>,

    /// Output file. Defaults to <input stem>.abc.
    #[arg(short = 'o', long)]
    output: Option<String>,

    /// Record name of the main program. Defaults to the output stem.
    #[arg(long = "record-name")]
    record_name: Option<String>,

    /// Optimization level (0, 1, 2).
    #[arg(long = "opt-level", default_value_t = 0)]
    opt_level: u8,

    /// Source file extension: ets, ts or js.
    #[arg(long, default_value = "ets")]
    extension: String,

    /// Parse the input as a module.
    #[arg(long)]
    module: bool,

    /// Parse the input as a CommonJS module.
    #[arg(long)]
    commonjs: bool,

    /// Merge all list file entries into one output.
    #[arg(long = "merge-abc")]
    merge_abc: bool,

    /// Source text, base64-encoded, instead of an input file.
    #[arg(long = "base64Input", value_name = "DATA")]
    base64_input: Option<String>,

    /// Print the output program base64-encoded to stdout.
    #[arg(long = "base64Output")]
    base64_output: bool,

    /// Cache file, or @path to a list of them.
    #[arg(long = "cache-file")]
    cache_file: Option<String>,

    /// Generate a patch against a previous build.
    #[arg(long = "generate-patch")]
    generate_patch: bool,

    /// Generate the patch for hot reload.
    #[arg(long = "hot-reload")]
    hot_reload: bool,

    /// Generate the patch for cold fix.
    #[arg(long = "cold-fix")]
    cold_fix: bool,

    /// Target API version.
    #[arg(long = "target-api-version")]
    target_api_version: Option<u32>,

    /// Worker threads for generating functions (0 = sequential).
    #[arg(long = "function-threads", default_value_t = 0)]
    function_threads: usize,

    /// Worker threads for compiling list file entries (0 = sequential).
    #[arg(long = "file-threads", default_value_t = 0)]
    file_threads: usize,

    /// Stop after parsing.
    #[arg(long = "parse-only")]
    parse_only: bool,

    /// Print the parsed AST of the main program.
    #[arg(long = "dump-ast")]
    dump_ast: bool,

    /// Print the generated assembly.
    #[arg(long = "dump-assembly")]
    dump_assembly: bool,

    /// Path to arktsconfig.json.
    #[arg(long = "arktsconfig")]
    arkts_config: Option<String>,

    /// Prelude source overriding the built-in std/core.
    #[arg(long = "stdlib")]
    std_lib: Option<String>,
}

impl Cli {
    fn to_options(&self) -> CompilerOptions {
        CompilerOptions {
            input: self.input.clone(),
            extension: self.extension.clone(),
            module: self.module,
            commonjs: self.commonjs,
            source_files: Vec::new(),
            base64_input: self.base64_input.clone(),
            base64_output: self.base64_output,
            output: self.output.clone(),
            record_name: self.record_name.clone(),
            cache_file: self.cache_file.clone(),
            opt_level: self.opt_level,
            function_threads: self.function_threads,
            file_threads: self.file_threads,
            parse_only: self.parse_only,
            dump_ast: self.dump_ast,
            dump_assembly: self.dump_assembly,
            target_api_version: self.target_api_version,
            generate_patch: self.generate_patch,
            hot_reload: self.hot_reload,
            cold_fix: self.cold_fix,
            arkts_config: self.arkts_config.clone(),
            merge_abc: self.merge_abc,
            std_lib: self.std_lib.clone(),
        }
    }
}

fn main() {
    logging::init_tracing();
    let cli = Cli::parse();
    let exit_code = run_compile(&cli);
    process::exit(exit_code);
}

fn run_compile(cli: &Cli) -> i32 {
    let start = Instant::now();
    let output = match Compiler::compile(cli.to_options()) {
        Ok(output) => output,
        Err(e) => {
            report::report_error(&e);
            return e.exit_code();
        }
    };
    if let Err(message) = write_outputs(cli, &output) {
        report::print_error(&message);
        return 1;
    }
    tracing::info!(units = output.units.len(), elapsed_ms = start.elapsed().as_millis() as u64, "done");
    0
}

fn write_outputs(cli: &Cli, output: &CompileOutput) -> Result<(), String> {
    for unit in &output.units {
        for warning in &unit.warnings {
            report::print_warning(warning);
        }
        if let Some(dump) = &unit.ast_dump {
            print!("{}", dump);
        }
        let Some(assembly) = unit.assembly() else { continue };
        if cli.dump_assembly {
            print!("{}", assembly);
        }
        if cli.base64_output {
            println!("{}", encode_base64_output(assembly.as_bytes()));
        } else if unit.output_name.is_empty() {
            if !cli.dump_assembly {
                print!("{}", assembly);
            }
        } else {
            std::fs::write(&unit.output_name, &assembly)
                .map_err(|e| format!("failed to write '{}': {}", unit.output_name, e))?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flags_map_to_options() {
        let cli = Cli::parse_from([
            "etsc",
            "main.ets",
            "--opt-level",
            "2",
            "--function-threads",
            "4",
            "--arktsconfig",
            "arktsconfig.json",
            "--dump-assembly",
        ]);
        let options = cli.to_options();
        assert_eq!(options.input.as_deref(), Some("main.ets"));
        assert_eq!(options.opt_level, 2);
        assert_eq!(options.function_threads, 4);
        assert_eq!(options.arkts_config.as_deref(), Some("arktsconfig.json"));
        assert!(options.dump_assembly);
        assert_eq!(options.extension, "ets");
        assert!(options.validate().is_ok());
    }

    #[test]
    fn test_base64_flags() {
        let cli = Cli::parse_from(["etsc", "--base64Input", "YQ==", "--base64Output"]);
        let options = cli.to_options();
        assert_eq!(options.base64_input.as_deref(), Some("YQ=="));
        assert!(options.base64_output);
        assert_eq!(options.record_name(), "Base64Output");
    }

    #[test]
    fn test_conflicting_flags_fail_validation() {
        let cli = Cli::parse_from(["etsc", "a.ets", "--hot-reload", "--cold-fix", "--generate-patch"]);
        assert!(cli.to_options().validate().is_err());
    }
}
