//! Compiler options: command-line settings, list files, base64 input and
//! `arktsconfig.json` import resolution.

mod arktsconfig;
mod base64_input;
mod error;
mod list_file;
mod options;

pub use arktsconfig::{ArkTsCompilerOptions, ArkTsConfig, DynamicPath, ImportResolution};
pub use base64_input::{decode_base64_input, encode_base64_output};
pub use error::{OptionsError, OptionsResult};
pub use list_file::{parse_list_file, read_list_file, EntryKind, SourceEntry};
pub use options::{CompilerOptions, Extension, ScriptKind};
