//! `arktsconfig.json`: import path aliases and dynamic modules.
//!
//! ```json
//! {
//!   "compilerOptions": {
//!     "baseUrl": ".",
//!     "paths": { "std": ["./stdlib/std"], "@app": ["./src"] },
//!     "dynamicPaths": { "lodash": { "language": "js", "hasDecl": false } }
//!   }
//! }
//! ```

use crate::error::{OptionsError, OptionsResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArkTsConfig {
    #[serde(default)]
    pub compiler_options: ArkTsCompilerOptions,
    /// Directory of the config file; relative paths resolve against it.
    #[serde(skip)]
    pub config_dir: PathBuf,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ArkTsCompilerOptions {
    pub base_url: Option<String>,
    /// Import prefix to the directories it maps to, tried in order.
    pub paths: BTreeMap<String, Vec<String>>,
    pub dynamic_paths: BTreeMap<String, DynamicPath>,
}

/// A module provided by a foreign dynamic runtime.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DynamicPath {
    pub language: String,
    #[serde(default)]
    pub has_decl: bool,
}

/// Where an import path leads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImportResolution {
    /// Candidate source files, in the order they should be tried.
    Static(Vec<PathBuf>),
    Dynamic { language: String },
}

impl ArkTsConfig {
    pub fn parse(text: &str, config_dir: impl Into<PathBuf>) -> OptionsResult<Self> {
        let mut config: ArkTsConfig = serde_json::from_str(text)
            .map_err(|e| OptionsError::Config { path: "arktsconfig.json".to_string(), message: e.to_string() })?;
        config.config_dir = config_dir.into();
        Ok(config)
    }

    pub fn load(path: &Path) -> OptionsResult<Self> {
        let display = path.display().to_string();
        let text = std::fs::read_to_string(path).map_err(|e| OptionsError::io(display.clone(), &e))?;
        let dir = path.parent().map(Path::to_path_buf).unwrap_or_default();
        let mut config: ArkTsConfig = serde_json::from_str(&text)
            .map_err(|e| OptionsError::Config { path: display, message: e.to_string() })?;
        config.config_dir = dir;
        tracing::debug!(
            path = %path.display(),
            paths = config.compiler_options.paths.len(),
            dynamic = config.compiler_options.dynamic_paths.len(),
            "loaded arktsconfig"
        );
        Ok(config)
    }

    fn base_dir(&self) -> PathBuf {
        match &self.compiler_options.base_url {
            Some(base) => self.config_dir.join(base),
            None => self.config_dir.clone(),
        }
    }

    /// Resolve `import` as written in a file located in `from_dir`.
    /// Relative imports resolve against `from_dir`; others go through the
    /// longest matching `paths` alias, then `baseUrl`.
    pub fn resolve(&self, import: &str, from_dir: &Path, extension: &str) -> ImportResolution {
        if let Some(dynamic) = self.compiler_options.dynamic_paths.get(import) {
            return ImportResolution::Dynamic { language: dynamic.language.clone() };
        }
        if import.starts_with("./") || import.starts_with("../") {
            return ImportResolution::Static(vec![with_extension(from_dir.join(import), extension)]);
        }

        let alias = self
            .compiler_options
            .paths
            .keys()
            .filter(|key| import == key.as_str() || import.starts_with(&format!("{}/", key)))
            .max_by_key(|key| key.len());
        let base = self.base_dir();
        let candidates = match alias {
            Some(alias) => {
                let rest = import[alias.len()..].trim_start_matches('/');
                self.compiler_options.paths[alias]
                    .iter()
                    .map(|dir| {
                        let dir = base.join(dir);
                        if rest.is_empty() {
                            with_extension(dir, extension)
                        } else {
                            with_extension(dir.join(rest), extension)
                        }
                    })
                    .collect()
            }
            None => vec![with_extension(base.join(import), extension)],
        };
        ImportResolution::Static(candidates)
    }
}

/// Append `.ext` unless the path already names a file with that
/// extension.
fn with_extension(path: PathBuf, extension: &str) -> PathBuf {
    if path.extension().is_some_and(|e| e == extension) {
        return path;
    }
    let mut text = path.into_os_string();
    text.push(".");
    text.push(extension);
    PathBuf::from(text)
}

#[cfg(test)]
mod tests {
    use super::*;

    const CONFIG: &str = r#"{
        "compilerOptions": {
            "baseUrl": "root",
            "paths": { "std": ["lib/std"], "std/math": ["math"], "@app": ["src", "gen"] },
            "dynamicPaths": { "lodash": { "language": "js", "hasDecl": true } }
        }
    }"#;

    #[test]
    fn test_longest_alias_wins() {
        let config = ArkTsConfig::parse(CONFIG, "/proj").unwrap();
        let resolved = config.resolve("std/math/trig", Path::new("/proj/src"), "ets");
        assert_eq!(resolved, ImportResolution::Static(vec![PathBuf::from("/proj/root/math/trig.ets")]));
    }

    #[test]
    fn test_alias_with_several_directories() {
        let config = ArkTsConfig::parse(CONFIG, "/proj").unwrap();
        let ImportResolution::Static(candidates) = config.resolve("@app/util", Path::new("/x"), "ets") else {
            panic!("expected a static import");
        };
        assert_eq!(
            candidates,
            vec![PathBuf::from("/proj/root/src/util.ets"), PathBuf::from("/proj/root/gen/util.ets")]
        );
    }

    #[test]
    fn test_relative_and_dynamic_imports() {
        let config = ArkTsConfig::parse(CONFIG, "/proj").unwrap();
        assert_eq!(
            config.resolve("./shapes.ets", Path::new("/proj/src"), "ets"),
            ImportResolution::Static(vec![PathBuf::from("/proj/src/./shapes.ets")])
        );
        assert_eq!(config.resolve("lodash", Path::new("/"), "ets"), ImportResolution::Dynamic { language: "js".into() });
    }

    #[test]
    fn test_invalid_json_is_a_config_error() {
        assert!(matches!(ArkTsConfig::parse("{", "/"), Err(OptionsError::Config { .. })));
    }
}
