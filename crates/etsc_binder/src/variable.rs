//! Variables: one per declared name.

use etsc_ast::{NodeId, ScopeId, TypeId, VariableId};
use etsc_core::Name;

/// What kind of declaration introduced a variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeclKind {
    Let,
    Const,
    Function,
    Param,
    Class,
    Interface,
    Enum,
    TypeAlias,
    TypeParameter,
    Import,
    CatchParam,
}

impl DeclKind {
    /// Declarations that name a type rather than a value.
    pub fn is_type(self) -> bool {
        matches!(
            self,
            DeclKind::Class | DeclKind::Interface | DeclKind::Enum | DeclKind::TypeAlias | DeclKind::TypeParameter
        )
    }

    /// Declarations whose value can be reassigned.
    pub fn is_mutable(self) -> bool {
        matches!(self, DeclKind::Let | DeclKind::Param | DeclKind::CatchParam)
    }
}

bitflags::bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct VariableFlags: u32 {
        const NONE      = 0;
        const EXPORTED  = 1 << 0;
        /// `declare` or `native`: no body or initializer expected.
        const AMBIENT   = 1 << 1;
        /// Created for compiler-synthesized code.
        const SYNTHETIC = 1 << 2;
        /// Declared directly in the global or a module scope.
        const TOP_LEVEL = 1 << 3;
    }
}

/// Where an imported name comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportTarget {
    pub module: String,
    pub imported: Name,
    /// The exported variable, once the module has been resolved.
    pub resolved: Option<VariableId>,
    /// Set when the module belongs to a dynamic foreign runtime.
    pub dynamic_language: Option<String>,
}

#[derive(Debug, Clone)]
pub struct Variable {
    pub name: Name,
    pub kind: DeclKind,
    /// The declaring node: a declarator, parameter, function, class, ...
    pub decl_node: NodeId,
    pub scope: ScopeId,
    pub flags: VariableFlags,
    /// Memoized type, written by the checker only.
    pub ts_type: Option<TypeId>,
    /// Every `function` declaration sharing this name, in source order.
    pub overloads: Vec<NodeId>,
    pub import: Option<ImportTarget>,
}

impl Variable {
    pub fn new(name: Name, kind: DeclKind, decl_node: NodeId, scope: ScopeId) -> Self {
        Self {
            name,
            kind,
            decl_node,
            scope,
            flags: VariableFlags::NONE,
            ts_type: None,
            overloads: Vec::new(),
            import: None,
        }
    }

    pub fn is_dynamic_import(&self) -> bool {
        self.import.as_ref().is_some_and(|i| i.dynamic_language.is_some())
    }
}
