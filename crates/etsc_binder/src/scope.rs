//! Scopes form a tree stored in an index arena; each scope maps names to
//! the variables declared directly inside it.

use etsc_ast::{NodeId, ScopeId, VariableId};
use etsc_core::collections::FxIndexMap;
use etsc_core::Name;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeKind {
    /// Holds the prelude's declarations. Every module scope hangs off it.
    Global,
    Module,
    /// Type parameters of a class.
    Class,
    /// Type parameters of an interface or type alias.
    Interface,
    /// Type parameters, parameters and the top-level body statements.
    Function,
    Block,
    Catch,
    /// The init declarations of `for` and `for..of`.
    Loop,
}

#[derive(Debug)]
pub struct Scope {
    pub kind: ScopeKind,
    pub parent: Option<ScopeId>,
    /// The node that opened this scope.
    pub node: NodeId,
    pub bindings: FxIndexMap<Name, VariableId>,
}

impl Scope {
    pub fn new(kind: ScopeKind, parent: Option<ScopeId>, node: NodeId) -> Self {
        Self { kind, parent, node, bindings: FxIndexMap::default() }
    }

    pub fn get(&self, name: Name) -> Option<VariableId> {
        self.bindings.get(&name).copied()
    }

    pub fn is_function_like(&self) -> bool {
        matches!(self.kind, ScopeKind::Function)
    }
}
