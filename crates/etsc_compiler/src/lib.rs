//! etsc_compiler: Compiler orchestration.
//!
//! Resolves the inputs named by the options into compilation units, then
//! runs each unit through the pipeline:
//! 1. parse the `std/core` prelude, the root sources and every program
//!    reachable through their imports (`arktsconfig.json` paths)
//! 2. bind all programs and resolve imports across them
//! 3. check, prelude first, imported programs in dependency order, main last
//! 4. run the lowering phases, each followed by its postcondition
//! 5. generate code
//!
//! Units are independent and may compile in parallel.

mod compiler;
mod error;
mod loader;
mod prelude;

pub use compiler::{CompileOutput, CompileUnit, Compiler, UnitOutput, UnitSource};
pub use error::{CompileError, CompileResult, SourceText};
pub use prelude::{load_prelude, CORE_PRELUDE, PRELUDE_FILE, PRELUDE_MODULE};
