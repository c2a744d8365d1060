//! etsc_checker: The ETS type checker.
//!
//! The checker owns the [`TypeTable`], the arena every type and signature
//! lives in, and walks each program once: it resolves names through the
//! binder, computes and memoizes the type of every expression, resolves
//! overloads, instantiates generics, and synthesizes the classes behind
//! lambdas and dynamic-runtime calls. The first type error aborts checking.
//!
//! Checking leaves its results on the AST: `ts_type` on expressions and
//! declarations, boxing flags on converted operands, resolved signatures on
//! calls. Lowering and codegen read them from there.

mod alive;
mod check_decl;
mod check_expr;
mod check_stmt;
mod check_types;
pub mod checker;
pub mod contexts;
mod enums;
pub mod error;
mod members;
mod operators;
pub mod relation;
mod resolve_call;
pub mod synth;
pub mod type_table;
pub mod types;

pub use checker::{CheckedModule, Checker, DynamicCallShape};
pub use contexts::{ContextFlags, ResolutionContext};
pub use error::{CheckResult, CheckerError, TypeError};
pub use relation::{box_flag, conversion_of, unbox_flag, RelationResult, TypeRelationFlags};
pub use type_table::{GlobalTypesHolder, TypeTable};
pub use types::*;
