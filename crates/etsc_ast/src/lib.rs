//! etsc_ast: The ETS abstract syntax tree.
//!
//! All nodes of a compilation live in one [`Ast`] arena and are addressed by
//! [`NodeId`]. Each node carries a parent index, an optional checked type
//! and the boxing/unboxing conversions the code generator has to emit.

pub mod ast;
pub mod flags;
pub mod node;
pub mod visitor;

pub use ast::{Ast, SourceFile};
pub use flags::{BoxingUnboxingFlags, ModifierFlags, ScriptFunctionFlags};
pub use node::*;

use etsc_core::define_idx;

define_idx! {
    /// Handle of an AST node.
    pub struct NodeId;
}

define_idx! {
    /// Handle of a checked type, owned by the checker's type table.
    pub struct TypeId;
}

define_idx! {
    /// Handle of a call signature, owned by the checker's type table.
    pub struct SignatureId;
}

define_idx! {
    /// Handle of a binder scope.
    pub struct ScopeId;
}

define_idx! {
    /// Handle of a binder variable.
    pub struct VariableId;
}

define_idx! {
    /// Handle of a source file registered with the [`Ast`].
    pub struct FileId;
}
