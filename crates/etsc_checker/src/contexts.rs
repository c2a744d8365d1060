//! Resolution contexts.
//!
//! A context is a plain value describing where a node is checked: the
//! enclosing class and signature, whether the code is static, and the
//! flow-sensitive narrowings in effect. Nested constructs build a new
//! context from their parent's and drop it when they are done.

use etsc_ast::{NodeId, SignatureId, TypeId, VariableId};

bitflags::bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct ContextFlags: u32 {
        const NONE              = 0;
        const STATIC            = 1 << 0;
        const CONSTRUCTOR       = 1 << 1;
        /// Synthesized code may reach private members.
        const IGNORE_VISIBILITY = 1 << 2;
        const LAMBDA            = 1 << 3;
        const ASYNC             = 1 << 4;
        /// Initializer of a class field.
        const FIELD_INIT        = 1 << 5;
    }
}

#[derive(Debug, Clone, Default)]
pub struct ResolutionContext {
    pub containing_class: Option<TypeId>,
    pub containing_signature: Option<SignatureId>,
    /// The `ScriptFunction` whose body is being checked.
    pub containing_function: Option<NodeId>,
    pub flags: ContextFlags,
    /// Variables known to hold a narrower type at this point.
    pub smart_casts: Vec<(VariableId, TypeId)>,
}

impl ResolutionContext {
    pub fn top_level() -> Self {
        Self::default()
    }

    pub fn with_flags(&self, flags: ContextFlags) -> Self {
        Self { flags: self.flags | flags, ..self.clone() }
    }

    pub fn smart_cast(&self, var: VariableId) -> Option<TypeId> {
        self.smart_casts.iter().rev().find(|(v, _)| *v == var).map(|(_, t)| *t)
    }

    /// A copy with `casts` added on top of the existing narrowings.
    pub fn with_smart_casts(&self, casts: &[(VariableId, TypeId)]) -> Self {
        let mut next = self.clone();
        next.smart_casts.extend_from_slice(casts);
        next
    }

    pub fn drop_smart_cast(&mut self, var: VariableId) {
        self.smart_casts.retain(|(v, _)| *v != var);
    }

    pub fn is_static(&self) -> bool {
        self.flags.contains(ContextFlags::STATIC)
    }

    pub fn ignores_visibility(&self) -> bool {
        self.flags.contains(ContextFlags::IGNORE_VISIBILITY)
    }
}
