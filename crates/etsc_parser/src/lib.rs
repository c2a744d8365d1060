//! etsc_parser: Recursive descent parser for ETS.
//!
//! Parses the token stream of one source file into nodes of the shared
//! [`Ast`](etsc_ast::Ast) arena and returns the program root.

mod parser;
mod precedence;

pub use parser::{parse_program, ParseResult, Parser};
pub use precedence::{get_binary_operator_precedence, OperatorPrecedence};
