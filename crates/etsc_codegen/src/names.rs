//! Record, field and method ids of the emitted program.
//!
//! A record is named `<module>.<Class>`; top-level functions and variables
//! live on the module's `ETSGLOBAL` record. Methods are identified by
//! owner, name and erased descriptor, e.g.
//! `main.Point.<ctor>:(i32,i32)void`.

use crate::context::CodegenContext;
use etsc_ast::{NodeId, NodeKind, SignatureId, TypeId, VariableId};
use etsc_checker::{PrimitiveKind, Property, SignatureFlags, Type};

/// Name of the record holding a module's top-level declarations.
pub const GLOBAL_RECORD: &str = "ETSGLOBAL";
/// Name of the function running a module's top-level code.
pub const GLOBAL_INIT: &str = "_$init$_";

pub fn global_record(module: &str) -> String {
    format!("{}.{}", module, GLOBAL_RECORD)
}

pub fn primitive_descriptor(kind: PrimitiveKind) -> &'static str {
    match kind {
        PrimitiveKind::Boolean => "u1",
        PrimitiveKind::Byte => "i8",
        PrimitiveKind::Char => "u16",
        PrimitiveKind::Short => "i16",
        PrimitiveKind::Int => "i32",
        PrimitiveKind::Long => "i64",
        PrimitiveKind::Float => "f32",
        PrimitiveKind::Double => "f64",
    }
}

impl<'a> CodegenContext<'a> {
    // ========================================================================
    // Records and descriptors
    // ========================================================================

    /// Record of a class, interface or synthesized class type. Generic
    /// instantiations share the record of their declaration.
    pub fn record_name(&self, ty: TypeId) -> String {
        let ty = self.table.generic_base(ty);
        match self.table.get(ty) {
            Type::Object(obj) => {
                let module = obj.decl.map(|d| self.module_of(d)).unwrap_or("std.core");
                format!("{}.{}", module, self.table.interner().resolve(obj.name))
            }
            Type::String { .. } => self.builtin_record(self.table.global.string_class, "String"),
            Type::Dynamic { .. } => self.js_value_record(),
            _ => self.object_record(),
        }
    }

    fn builtin_record(&self, ty: Option<TypeId>, fallback: &str) -> String {
        match ty {
            Some(ty) if matches!(self.table.get(ty), Type::Object(_)) => self.record_name(ty),
            _ => format!("std.core.{}", fallback),
        }
    }

    pub fn object_record(&self) -> String {
        self.builtin_record(Some(self.table.global.object), "Object")
    }

    pub fn string_record(&self) -> String {
        self.builtin_record(self.table.global.string_class, "String")
    }

    pub fn js_value_record(&self) -> String {
        self.builtin_record(self.table.global.js_value, "JSValue")
    }

    pub fn js_runtime_record(&self) -> String {
        self.builtin_record(self.table.global.js_runtime, "JSRuntime")
    }

    pub fn boxed_record(&self, kind: PrimitiveKind) -> String {
        self.builtin_record(self.table.global.boxed(kind), kind.boxed_name())
    }

    /// Record of the interface every lambda of `arity` parameters
    /// implements.
    pub fn function_record(arity: usize) -> String {
        format!("std.core.Function{}", arity)
    }

    /// Erased type descriptor used in method and field ids.
    pub fn descriptor(&self, ty: TypeId) -> String {
        match self.table.get(ty) {
            Type::Primitive { kind, .. } => primitive_descriptor(*kind).to_string(),
            Type::Void => "void".to_string(),
            Type::String { .. } => self.string_record(),
            Type::Enum(_) => "i32".to_string(),
            Type::Dynamic { .. } => self.js_value_record(),
            Type::Function { signatures } => {
                let arity = signatures.first().map(|s| self.table.signature(*s).params.len()).unwrap_or(0);
                Self::function_record(arity)
            }
            Type::Array { element } => format!("{}[]", self.descriptor(*element)),
            Type::Object(_) => self.record_name(ty),
            _ => self.object_record(),
        }
    }

    // ========================================================================
    // Methods
    // ========================================================================

    /// The declared signature behind an instantiated or substituted one.
    /// Calls are emitted against it so every instantiation of a generic
    /// method names the same erased function.
    pub fn base_signature(&self, sig: SignatureId) -> SignatureId {
        let s = self.table.signature(sig);
        if s.flags.contains(SignatureFlags::ASYNC_IMPL) {
            return sig;
        }
        match s.decl {
            Some(function) => match self.ast.kind(function) {
                NodeKind::ScriptFunction { signature: Some(base), .. }
                    if !self.table.signature(*base).flags.contains(SignatureFlags::FUNCTIONAL) =>
                {
                    *base
                }
                _ => sig,
            },
            None => self.undeclared_base(sig),
        }
    }

    /// Bodiless signatures of instantiated types, such as interface field
    /// accessors, resolve through the member table of the generic
    /// declaration.
    fn undeclared_base(&self, sig: SignatureId) -> SignatureId {
        let s = self.table.signature(sig);
        let Some(owner) = s.owner else { return sig };
        let base_owner = self.table.generic_base(owner);
        if base_owner == owner {
            return sig;
        }
        let Some(obj) = self.table.object(base_owner) else { return sig };
        if s.flags.contains(SignatureFlags::CONSTRUCTOR) {
            return obj.constructors.first().copied().unwrap_or(sig);
        }
        let Some(prop) = obj.members(s.is_static()).get(&s.name) else { return sig };
        let found = if s.flags.contains(SignatureFlags::SETTER) {
            prop.setter
        } else if s.flags.contains(SignatureFlags::GETTER) {
            prop.getter
        } else {
            None
        };
        found.unwrap_or(sig)
    }

    /// Whether `function` is the body of an arrow function.
    pub fn arrow_of(&self, function: NodeId) -> Option<NodeId> {
        let parent = self.ast.parent(function)?;
        matches!(self.ast.kind(parent), NodeKind::ArrowFunction { .. }).then_some(parent)
    }

    /// The synthesized class of an arrow function.
    pub fn lambda_class_of(&self, arrow: NodeId) -> Option<TypeId> {
        match self.ast.kind(arrow) {
            NodeKind::ArrowFunction { proxy_class: Some(class), .. } => self.ast.ts_type(*class),
            _ => None,
        }
    }

    fn method_owner_record(&self, sig: SignatureId) -> String {
        let s = self.table.signature(sig);
        if let Some(owner) = s.owner {
            return self.record_name(owner);
        }
        match s.decl {
            Some(function) => match self.arrow_of(function).and_then(|a| self.lambda_class_of(a)) {
                Some(lambda) => self.record_name(lambda),
                None => global_record(self.module_of(function)),
            },
            None => global_record(&self.main_module),
        }
    }

    /// Whether a call to `sig` passes no receiver.
    pub fn is_static_call(&self, sig: SignatureId) -> bool {
        let s = self.table.signature(sig);
        if s.is_static() {
            return true;
        }
        s.owner.is_none() && s.decl.and_then(|f| self.arrow_of(f)).is_none()
    }

    pub fn method_name(&self, sig: SignatureId) -> String {
        let s = self.table.signature(sig);
        let name = self.table.interner().resolve(s.name);
        if s.flags.contains(SignatureFlags::CONSTRUCTOR) {
            "<ctor>".to_string()
        } else if s.flags.contains(SignatureFlags::GETTER) {
            format!("<get>{}", name)
        } else if s.flags.contains(SignatureFlags::SETTER) {
            format!("<set>{}", name)
        } else {
            name.to_string()
        }
    }

    /// `(params)ret` of a signature, with the rest array last.
    pub fn signature_descriptor(&self, sig: SignatureId) -> String {
        let s = self.table.signature(sig);
        let params: Vec<String> =
            s.params.iter().chain(s.rest.as_ref()).map(|p| self.descriptor(p.ty)).collect();
        let ret = if s.flags.contains(SignatureFlags::CONSTRUCTOR) {
            "void".to_string()
        } else {
            self.descriptor(s.return_type)
        };
        format!("({}){}", params.join(","), ret)
    }

    /// Full id of the function a call to `sig` reaches.
    pub fn method_id(&self, sig: SignatureId) -> String {
        let base = self.base_signature(sig);
        format!("{}.{}:{}", self.method_owner_record(base), self.method_name(base), self.signature_descriptor(base))
    }

    // ========================================================================
    // Fields and variables
    // ========================================================================

    /// The member as declared on the generic declaration of its owner.
    pub fn declared_property(&self, prop: &Property) -> Option<&'a Property> {
        let base = self.table.generic_base(prop.owner);
        self.table.object(base)?.members(prop.is_static()).get(&prop.name)
    }

    pub fn field_id(&self, prop: &Property) -> String {
        format!("{}.{}", self.record_name(prop.owner), self.table.interner().resolve(prop.name))
    }

    /// Storage type of a field, before any instantiation.
    pub fn declared_field_type(&self, prop: &Property) -> TypeId {
        self.declared_property(prop).map(|p| p.ty).unwrap_or(prop.ty)
    }

    /// Static field backing a top-level variable or a dynamic import.
    pub fn static_var_id(&self, var: VariableId) -> String {
        let variable = self.binder.variable(var);
        let name = self.table.interner().resolve(variable.name);
        if variable.is_dynamic_import() {
            format!("{}.%%dynamic_import.{}", self.main_module, name)
        } else {
            format!("{}.{}", global_record(self.module_of(variable.decl_node)), name)
        }
    }

    // ========================================================================
    // Runtime entry points
    // ========================================================================

    pub fn box_method(&self, kind: PrimitiveKind) -> String {
        let boxed = self.boxed_record(kind);
        format!("{}.valueOf:({}){}", boxed, primitive_descriptor(kind), boxed)
    }

    pub fn unbox_method(&self, kind: PrimitiveKind) -> String {
        format!("{}.unboxed:(){}", self.boxed_record(kind), primitive_descriptor(kind))
    }

    /// A static method of `JSRuntime`.
    pub fn js_runtime_method(&self, name: &str, params: &[String], ret: &str) -> String {
        format!("{}.{}:({}){}", self.js_runtime_record(), name, params.join(","), ret)
    }

    /// `callN` or `callMethodN` of the glue class of a dynamic runtime.
    pub fn dynamic_call_id(&self, language: &str, is_method: bool, arity: usize) -> String {
        let js_value = self.js_value_record();
        let mut params = vec![js_value.clone()];
        if is_method {
            params.push(self.string_record());
        }
        params.extend(std::iter::repeat(js_value.clone()).take(arity));
        let name = if is_method { format!("callMethod{}", arity) } else { format!("call{}", arity) };
        format!("{}.%%dynamic_call-{}.{}:({}){}", self.main_module, language, name, params.join(","), js_value)
    }

    /// `invoke` of the function interface, taking and returning objects.
    pub fn function_invoke_id(&self, arity: usize) -> String {
        let object = self.object_record();
        let params = vec![object.clone(); arity];
        format!("{}.invoke:({}){}", Self::function_record(arity), params.join(","), object)
    }
}
