//! The compiler options structure and its validation.

use crate::error::{OptionsError, OptionsResult};
use crate::list_file::{self, SourceEntry};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// How a source file is parsed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Extension {
    #[default]
    Ets,
    Ts,
    Js,
}

impl Extension {
    pub fn parse(text: &str) -> OptionsResult<Self> {
        match text {
            "ets" => Ok(Extension::Ets),
            "ts" => Ok(Extension::Ts),
            "js" => Ok(Extension::Js),
            other => Err(OptionsError::Extension(other.to_string())),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Extension::Ets => "ets",
            Extension::Ts => "ts",
            Extension::Js => "js",
        }
    }
}

/// Module system of a source file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScriptKind {
    #[default]
    Script,
    Module,
    CommonJs,
}

/// Options of one compilation. Field names follow the command-line flags.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CompilerOptions {
    // -- Input --
    /// A source file, or `@path` naming a list file.
    pub input: Option<String>,
    pub extension: String,
    pub module: bool,
    pub commonjs: bool,
    /// Entries of the list file, filled by [`CompilerOptions::resolve_inputs`].
    #[serde(skip)]
    pub source_files: Vec<SourceEntry>,
    pub base64_input: Option<String>,
    pub base64_output: bool,
    pub output: Option<String>,
    pub record_name: Option<String>,
    /// A cache file, or `@path` naming a list of them.
    pub cache_file: Option<String>,

    // -- Compilation --
    pub opt_level: u8,
    /// Worker threads for per-function code generation; 0 is sequential.
    pub function_threads: usize,
    pub file_threads: usize,
    pub parse_only: bool,
    pub dump_ast: bool,
    pub dump_assembly: bool,
    pub target_api_version: Option<u32>,

    // -- Patches --
    pub generate_patch: bool,
    pub hot_reload: bool,
    pub cold_fix: bool,

    // -- Project --
    /// Path of `arktsconfig.json`.
    pub arkts_config: Option<String>,
    pub merge_abc: bool,
    /// Overrides the built-in `std/core` prelude.
    pub std_lib: Option<String>,
}

impl Default for CompilerOptions {
    fn default() -> Self {
        Self {
            input: None,
            extension: Extension::Ets.as_str().to_string(),
            module: false,
            commonjs: false,
            source_files: Vec::new(),
            base64_input: None,
            base64_output: false,
            output: None,
            record_name: None,
            cache_file: None,
            opt_level: 0,
            function_threads: 0,
            file_threads: 0,
            parse_only: false,
            dump_ast: false,
            dump_assembly: false,
            target_api_version: None,
            generate_patch: false,
            hot_reload: false,
            cold_fix: false,
            arkts_config: None,
            merge_abc: false,
            std_lib: None,
        }
    }
}

impl CompilerOptions {
    /// Reject contradictory or out-of-range options.
    pub fn validate(&self) -> OptionsResult<()> {
        if self.input.is_some() && self.base64_input.is_some() {
            return Err(OptionsError::Conflict { first: "--input", second: "--base64Input" });
        }
        if self.input.is_none() && self.base64_input.is_none() {
            return Err(OptionsError::NoInput);
        }
        if self.output.is_some() && self.base64_output {
            return Err(OptionsError::Conflict { first: "--output", second: "--base64Output" });
        }
        if self.module && self.commonjs {
            return Err(OptionsError::Conflict { first: "--module", second: "--commonjs" });
        }
        if self.opt_level > 2 {
            return Err(OptionsError::OptLevel(self.opt_level));
        }
        Extension::parse(&self.extension)?;
        if self.hot_reload && self.cold_fix {
            return Err(OptionsError::Conflict { first: "--hot-reload", second: "--cold-fix" });
        }
        if (self.hot_reload || self.cold_fix) && !self.generate_patch {
            return Err(OptionsError::PatchWithoutGenerate);
        }
        if let Some(list) = self.cache_file.as_deref().and_then(|c| c.strip_prefix('@')) {
            if !Path::new(list).is_file() {
                return Err(OptionsError::MissingListFile(list.to_string()));
            }
        }
        Ok(())
    }

    pub fn script_kind(&self) -> ScriptKind {
        if self.module {
            ScriptKind::Module
        } else if self.commonjs {
            ScriptKind::CommonJs
        } else {
            ScriptKind::Script
        }
    }

    /// The validated extension; `ets` when unparsable.
    pub fn extension(&self) -> Extension {
        Extension::parse(&self.extension).unwrap_or_default()
    }

    /// The list file named by `@path` input, if any.
    pub fn list_file(&self) -> Option<&str> {
        self.input.as_deref().and_then(|i| i.strip_prefix('@'))
    }

    /// The output file. Empty when the program goes to stdout.
    pub fn output_name(&self) -> String {
        if self.base64_output {
            return String::new();
        }
        if let Some(output) = &self.output {
            return output.clone();
        }
        match self.input.as_deref() {
            Some(input) => {
                let input = input.strip_prefix('@').unwrap_or(input);
                format!("{}.abc", file_stem(input))
            }
            None => String::new(),
        }
    }

    /// The record name, defaulting to the output stem, or `Base64Output`
    /// when writing to stdout.
    pub fn record_name(&self) -> String {
        if let Some(name) = &self.record_name {
            return name.clone();
        }
        let output = self.output_name();
        if output.is_empty() {
            "Base64Output".to_string()
        } else {
            file_stem(&output).to_string()
        }
    }

    /// Read the list file, if the input names one, into `source_files`.
    pub fn resolve_inputs(&mut self) -> OptionsResult<()> {
        if let Some(path) = self.list_file().map(str::to_owned) {
            self.source_files = list_file::read_list_file(&path)?;
            tracing::debug!(path = %path, entries = self.source_files.len(), "read list file");
        }
        Ok(())
    }
}

/// File name without directories and without its last extension.
fn file_stem(path: &str) -> &str {
    let name = path.rsplit(['/', '\\']).next().unwrap_or(path);
    match name.rfind('.') {
        Some(dot) if dot > 0 => &name[..dot],
        _ => name,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_stem() {
        assert_eq!(file_stem("dir/sub/main.ets"), "main");
        assert_eq!(file_stem("main"), "main");
        assert_eq!(file_stem(".hidden"), ".hidden");
        assert_eq!(file_stem("a.b.ets"), "a.b");
    }

    #[test]
    fn test_script_kind_follows_flags() {
        let mut options = CompilerOptions::default();
        assert_eq!(options.script_kind(), ScriptKind::Script);
        options.commonjs = true;
        assert_eq!(options.script_kind(), ScriptKind::CommonJs);
    }
}
