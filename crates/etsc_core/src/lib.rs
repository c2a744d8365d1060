//! etsc_core: Core utilities shared by every stage of the ETS compiler.
//!
//! Provides index-based arenas, string interning, source positions, and
//! the hash collections used throughout the pipeline.

pub mod arena;
pub mod collections;
pub mod intern;
pub mod text;

pub use arena::{Idx, IndexVec};
pub use intern::{Name, StringInterner};
pub use text::{LineIndex, SourcePosition, TextSpan};
