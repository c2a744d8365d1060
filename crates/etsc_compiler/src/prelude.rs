//! The `std/core` prelude program.

use crate::error::{CompileError, CompileResult};
use crate::SourceText;

/// Module name of the prelude; prefixes the names of its records.
pub const PRELUDE_MODULE: &str = "std.core";

pub const PRELUDE_FILE: &str = "std/core.ets";

/// The built-in prelude source.
pub const CORE_PRELUDE: &str = include_str!("../stdlib/core.ets");

/// The prelude text, read from `std_lib` when it names an override.
pub fn load_prelude(std_lib: Option<&str>) -> CompileResult<SourceText> {
    match std_lib {
        Some(path) => {
            let text = std::fs::read_to_string(path).map_err(|e| CompileError::io(path, &e))?;
            tracing::debug!(path, "using prelude override");
            Ok(SourceText { name: path.to_string(), text })
        }
        None => Ok(SourceText { name: PRELUDE_FILE.to_string(), text: CORE_PRELUDE.to_string() }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_prelude_declares_root_classes() {
        let prelude = load_prelude(None).unwrap();
        assert_eq!(prelude.name, PRELUDE_FILE);
        assert!(prelude.text.contains("class Object"));
        assert!(prelude.text.contains("final class Void"));
    }

    #[test]
    fn test_missing_override_is_io_error() {
        assert!(matches!(load_prelude(Some("/no/such/core.ets")), Err(CompileError::Io { .. })));
    }
}
