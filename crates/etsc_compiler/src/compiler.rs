//! The compilation pipeline.

use crate::error::{CompileError, CompileResult, SourceText};
use crate::loader::{LoadedUnit, Loader};
use crate::prelude::load_prelude;
use etsc_ast::ProgramKind;
use etsc_binder::Binder;
use etsc_checker::Checker;
use etsc_codegen::{generate, CodegenOptions, ProgramOutput};
use etsc_diagnostics::Diagnostic;
use etsc_lowering::{default_phases, run_phases};
use etsc_options::{decode_base64_input, ArkTsConfig, CompilerOptions};
use rayon::prelude::*;
use std::path::{Path, PathBuf};

/// One root source of a unit.
#[derive(Debug, Clone)]
pub struct UnitSource {
    pub source: SourceText,
    /// The file the text was read from; imports resolve relative to it.
    pub path: Option<PathBuf>,
    pub record_name: String,
}

/// Sources compiled together into one output. The first source is the
/// main program.
#[derive(Debug, Clone)]
pub struct CompileUnit {
    pub sources: Vec<UnitSource>,
    /// Empty when the output goes to stdout.
    pub output_name: String,
}

#[derive(Debug, Clone)]
pub struct UnitOutput {
    pub output_name: String,
    pub record_name: String,
    /// `None` when only parsing was requested.
    pub program: Option<ProgramOutput>,
    /// Outline of the main program as parsed, with `dump_ast`.
    pub ast_dump: Option<String>,
    /// Warnings from parsing and binding.
    pub warnings: Vec<Diagnostic>,
}

impl UnitOutput {
    /// The text listing of the generated program.
    pub fn assembly(&self) -> Option<String> {
        self.program.as_ref().map(ProgramOutput::dump)
    }
}

#[derive(Debug, Clone)]
pub struct CompileOutput {
    pub units: Vec<UnitOutput>,
}

impl CompileOutput {
    /// The unit of the first input.
    pub fn main(&self) -> Option<&UnitOutput> {
        self.units.first()
    }
}

/// Drives units through parse, bind, check, lowering and codegen.
pub struct Compiler {
    options: CompilerOptions,
    config: ArkTsConfig,
    prelude: SourceText,
}

impl Compiler {
    /// Validate `options`, load the project config and the prelude.
    pub fn new(mut options: CompilerOptions) -> CompileResult<Self> {
        options.validate()?;
        options.resolve_inputs()?;
        let config = match options.arkts_config.as_deref() {
            Some(path) => ArkTsConfig::load(Path::new(path))?,
            None => ArkTsConfig::default(),
        };
        let prelude = load_prelude(options.std_lib.as_deref())?;
        tracing::debug!(
            script_kind = ?options.script_kind(),
            opt_level = options.opt_level,
            generate_patch = options.generate_patch,
            target_api_version = ?options.target_api_version,
            "compiler options"
        );
        Ok(Self { options, config, prelude })
    }

    /// Compile everything `options` names.
    pub fn compile(options: CompilerOptions) -> CompileResult<CompileOutput> {
        let compiler = Compiler::new(options)?;
        let units = compiler.units()?;
        compiler.compile_units(&units)
    }

    pub fn options(&self) -> &CompilerOptions {
        &self.options
    }

    /// Split the inputs into units. A list file yields one unit per entry,
    /// or a single unit with `merge_abc`.
    pub fn units(&self) -> CompileResult<Vec<CompileUnit>> {
        let options = &self.options;
        if let Some(encoded) = options.base64_input.as_deref() {
            let text = decode_base64_input(encoded)?;
            let source = UnitSource {
                source: SourceText { name: "base64-input.ets".to_string(), text },
                path: None,
                record_name: options.record_name(),
            };
            return Ok(vec![CompileUnit { sources: vec![source], output_name: options.output_name() }]);
        }

        if options.list_file().is_some() {
            let mut sources = Vec::with_capacity(options.source_files.len());
            for entry in &options.source_files {
                let mut source = read_source(&entry.file, &entry.record_name)?;
                if !entry.source_file.is_empty() {
                    source.source.name = entry.source_file.clone();
                }
                sources.push((source, entry.output.clone()));
            }
            if options.merge_abc {
                let sources = sources.into_iter().map(|(s, _)| s).collect();
                return Ok(vec![CompileUnit { sources, output_name: options.output_name() }]);
            }
            return Ok(sources
                .into_iter()
                .map(|(source, output_name)| CompileUnit { sources: vec![source], output_name })
                .collect());
        }

        let input = options.input.as_deref().unwrap_or_default();
        let source = read_source(input, &options.record_name())?;
        Ok(vec![CompileUnit { sources: vec![source], output_name: options.output_name() }])
    }

    /// Compile units, on `file_threads` workers when more than one.
    pub fn compile_units(&self, units: &[CompileUnit]) -> CompileResult<CompileOutput> {
        let threads = self.options.file_threads;
        let units = if threads <= 1 || units.len() <= 1 {
            units.iter().map(|unit| self.compile_unit(unit)).collect::<CompileResult<Vec<_>>>()?
        } else {
            let pool = rayon::ThreadPoolBuilder::new()
                .num_threads(threads)
                .build()
                .map_err(|e| CompileError::Internal(format!("cannot start the file thread pool: {}", e)))?;
            pool.install(|| units.par_iter().map(|unit| self.compile_unit(unit)).collect::<CompileResult<Vec<_>>>())?
        };
        Ok(CompileOutput { units })
    }

    pub fn compile_unit(&self, unit: &CompileUnit) -> CompileResult<UnitOutput> {
        let record_name = unit.sources.first().map(|s| s.record_name.clone()).unwrap_or_default();
        let _span = tracing::info_span!("compile unit", record = record_name.as_str()).entered();

        let loaded = self.load(unit)?;
        let LoadedUnit { ast, modules, diagnostics, sources } = loaded;
        if diagnostics.has_errors() {
            return Err(user_error(diagnostics.into_diagnostics(), sources));
        }
        let mut warnings = diagnostics.into_diagnostics();
        let ast_dump = if self.options.dump_ast { ast.main_program().map(|p| ast.dump(p)) } else { None };
        if self.options.parse_only {
            return Ok(UnitOutput { output_name: unit.output_name.clone(), record_name, program: None, ast_dump, warnings });
        }

        let mut binder = Binder::new();
        {
            let _bind = tracing::info_span!("bind").entered();
            for &program in ast.programs() {
                binder.bind_program(&ast, program);
            }
            binder.resolve_imports(&ast, &modules);
        }
        let bind_diagnostics = binder.take_diagnostics();
        if bind_diagnostics.has_errors() {
            return Err(user_error(bind_diagnostics.into_diagnostics(), sources));
        }
        warnings.extend(bind_diagnostics.into_diagnostics());

        let mut checker = Checker::new(ast, binder);
        checker.start_checker().map_err(|e| CompileError::from_checker(e, &sources))?;
        let mut phases = default_phases();
        run_phases(&mut checker, &mut phases).map_err(|e| CompileError::from_lowering(e, &sources))?;
        let module = checker.finish();

        let codegen_options =
            CodegenOptions { opt_level: self.options.opt_level, function_threads: self.options.function_threads };
        let program = generate(&module, &codegen_options).map_err(|e| CompileError::from_codegen(e, &sources))?;
        tracing::info!(functions = program.functions.len(), instructions = program.instruction_count(), "compiled");
        Ok(UnitOutput { output_name: unit.output_name.clone(), record_name, program: Some(program), ast_dump, warnings })
    }

    fn load(&self, unit: &CompileUnit) -> CompileResult<LoadedUnit> {
        let _span = tracing::info_span!("load").entered();
        let extension = self.options.extension().as_str();
        let mut loader = Loader::new(&self.config, extension);
        loader.add_prelude(&self.prelude);
        for (index, source) in unit.sources.iter().enumerate() {
            let kind = if index == 0 { ProgramKind::Main } else { ProgramKind::External };
            loader.add_root(&source.source, source.path.as_deref(), kind, &source.record_name)?;
        }
        Ok(loader.finish())
    }
}

fn read_source(path: &str, record_name: &str) -> CompileResult<UnitSource> {
    let text = std::fs::read_to_string(path).map_err(|e| CompileError::io(path, &e))?;
    Ok(UnitSource {
        source: SourceText { name: path.to_string(), text },
        path: Some(PathBuf::from(path)),
        record_name: record_name.to_string(),
    })
}

fn user_error(diagnostics: Vec<Diagnostic>, sources: Vec<SourceText>) -> CompileError {
    let diagnostics = diagnostics.into_iter().filter(Diagnostic::is_error).collect();
    CompileError::User { diagnostics, sources }
}
