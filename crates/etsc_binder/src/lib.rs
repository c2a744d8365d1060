//! etsc_binder: Scope construction and name lookup.
//!
//! The binder walks every program once, creating a scope tree and one
//! [`Variable`] per declaration. The checker consumes it through
//! [`Binder::scope_of`], [`Binder::find`] and [`Binder::find_local`], and is
//! the only writer of a variable's memoized type.

pub mod binder;
pub mod scope;
pub mod variable;

pub use binder::{Binder, ModuleResolution};
pub use scope::{Scope, ScopeKind};
pub use variable::{DeclKind, ImportTarget, Variable, VariableFlags};
