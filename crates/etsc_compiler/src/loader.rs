//! Parsing the programs of one compilation unit: the prelude, the root
//! sources, and every program reachable through their imports.

use crate::error::{CompileError, CompileResult, SourceText};
use crate::prelude::PRELUDE_MODULE;
use etsc_ast::{Ast, NodeId, NodeKind, ProgramKind};
use etsc_binder::ModuleResolution;
use etsc_core::collections::FxHashMap;
use etsc_core::StringInterner;
use etsc_diagnostics::DiagnosticCollection;
use etsc_options::{ArkTsConfig, ImportResolution};
use etsc_parser::parse_program;
use std::path::{Path, PathBuf};

/// Every program of a unit, parsed and ordered for checking.
pub(crate) struct LoadedUnit {
    pub ast: Ast,
    pub modules: FxHashMap<String, ModuleResolution>,
    pub diagnostics: DiagnosticCollection,
    pub sources: Vec<SourceText>,
}

pub(crate) struct Loader<'a> {
    config: &'a ArkTsConfig,
    extension: &'a str,
    ast: Ast,
    sources: Vec<SourceText>,
    diagnostics: DiagnosticCollection,
    /// Import path as written to what it resolved to. The first
    /// resolution of a path wins for the whole unit.
    modules: FxHashMap<String, ModuleResolution>,
    loaded: FxHashMap<PathBuf, NodeId>,
    prelude: Option<NodeId>,
    /// Non-main programs, each after the programs it imports.
    order: Vec<NodeId>,
}

impl<'a> Loader<'a> {
    pub fn new(config: &'a ArkTsConfig, extension: &'a str) -> Self {
        Self {
            config,
            extension,
            ast: Ast::new(StringInterner::new()),
            sources: Vec::new(),
            diagnostics: DiagnosticCollection::new(),
            modules: FxHashMap::default(),
            loaded: FxHashMap::default(),
            prelude: None,
            order: Vec::new(),
        }
    }

    pub fn add_prelude(&mut self, prelude: &SourceText) {
        let program = self.parse(&prelude.name, &prelude.text, ProgramKind::Prelude, PRELUDE_MODULE);
        self.prelude = Some(program);
    }

    /// Parse a root source and everything it imports. `path` is the file
    /// the text came from, if any; imports resolve relative to its
    /// directory, or to the working directory otherwise.
    pub fn add_root(
        &mut self,
        source: &SourceText,
        path: Option<&Path>,
        kind: ProgramKind,
        module_name: &str,
    ) -> CompileResult<NodeId> {
        let program = self.parse(&source.name, &source.text, kind, module_name);
        let dir = match path {
            Some(path) => {
                self.loaded.insert(canonical(path), program);
                path.parent().map(Path::to_path_buf).unwrap_or_default()
            }
            None => PathBuf::from("."),
        };
        self.load_imports(program, &dir)?;
        if kind != ProgramKind::Main {
            self.order.push(program);
        }
        Ok(program)
    }

    pub fn finish(mut self) -> LoadedUnit {
        let order: Vec<NodeId> = self.prelude.into_iter().chain(self.order.iter().copied()).collect();
        self.ast.reorder_programs(&order);
        tracing::debug!(programs = self.ast.programs().len(), imports = self.modules.len(), "loaded unit");
        LoadedUnit { ast: self.ast, modules: self.modules, diagnostics: self.diagnostics, sources: self.sources }
    }

    fn parse(&mut self, name: &str, text: &str, kind: ProgramKind, module_name: &str) -> NodeId {
        let result = parse_program(&mut self.ast, name, text, kind, module_name);
        self.diagnostics.extend(result.diagnostics);
        self.sources.push(SourceText { name: name.to_string(), text: text.to_string() });
        result.program
    }

    fn load_imports(&mut self, program: NodeId, from_dir: &Path) -> CompileResult<()> {
        for import in import_sources(&self.ast, program) {
            if self.modules.contains_key(&import) {
                continue;
            }
            match self.config.resolve(&import, from_dir, self.extension) {
                ImportResolution::Dynamic { language } => {
                    tracing::debug!(import = import.as_str(), language = language.as_str(), "dynamic import");
                    self.modules.insert(import, ModuleResolution::Dynamic { language });
                }
                ImportResolution::Static(candidates) => {
                    // An unresolved import is left for the binder to report.
                    let Some(path) = candidates.into_iter().find(|p| p.is_file()) else {
                        tracing::debug!(import = import.as_str(), "import not found");
                        continue;
                    };
                    let target = match self.loaded.get(&canonical(&path)) {
                        Some(&loaded) => loaded,
                        None => self.load_external(&path, &import)?,
                    };
                    self.modules.insert(import, ModuleResolution::Static(target));
                }
            }
        }
        Ok(())
    }

    fn load_external(&mut self, path: &Path, import: &str) -> CompileResult<NodeId> {
        let name = path.display().to_string();
        let text = std::fs::read_to_string(path).map_err(|e| CompileError::io(name.clone(), &e))?;
        let program = self.parse(&name, &text, ProgramKind::External, &module_name_of(import));
        self.loaded.insert(canonical(path), program);
        let dir = path.parent().map(Path::to_path_buf).unwrap_or_default();
        self.load_imports(program, &dir)?;
        self.order.push(program);
        Ok(program)
    }
}

fn canonical(path: &Path) -> PathBuf {
    std::fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
}

/// Import paths of the top-level import declarations of `program`.
fn import_sources(ast: &Ast, program: NodeId) -> Vec<String> {
    let NodeKind::Program { statements, .. } = ast.kind(program) else {
        return Vec::new();
    };
    statements
        .iter()
        .filter_map(|&s| match ast.kind(s) {
            NodeKind::ImportDeclaration { source, .. } => Some(source.clone()),
            _ => None,
        })
        .collect()
}

/// Record prefix for an imported program: the import path with relative
/// segments, alias markers and the extension dropped, `/` becoming `.`.
pub(crate) fn module_name_of(import: &str) -> String {
    let trimmed = import.trim_end_matches(".ets");
    let segments: Vec<&str> = trimmed
        .split(['/', '\\'])
        .filter(|s| !s.is_empty() && *s != "." && *s != "..")
        .map(|s| s.trim_start_matches('@'))
        .collect();
    if segments.is_empty() {
        "module".to_string()
    } else {
        segments.join(".")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_module_name_of() {
        assert_eq!(module_name_of("./lib/util"), "lib.util");
        assert_eq!(module_name_of("../../shapes.ets"), "shapes");
        assert_eq!(module_name_of("@app/models/user"), "app.models.user");
        assert_eq!(module_name_of("./"), "module");
    }
}
