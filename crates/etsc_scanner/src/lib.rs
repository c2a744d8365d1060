//! etsc_scanner: Tokenizer for ETS source text.
//!
//! Produces one token at a time on demand. The parser drives it and may
//! rescan `>` when it needs a shift or comparison operator instead of the
//! end of a type argument list.

mod char_codes;
mod scanner;
mod token;

pub use scanner::{Scanner, ScannerState};
pub use token::{TokenFlags, TokenKind};
