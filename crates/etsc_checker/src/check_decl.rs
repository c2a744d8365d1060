//! Declarations: class and interface shells, headers and member tables,
//! signatures, function bodies and class-level checks.

use crate::checker::Checker;
use crate::error::{CheckResult, CheckerError};
use crate::types::*;
use etsc_ast::*;
use etsc_core::collections::FxIndexMap;
use etsc_core::Name;
use etsc_diagnostics::messages;

impl Checker {
    // ========================================================================
    // Collection
    // ========================================================================

    /// Create the types of every top-level class, interface and enum, then
    /// resolve their headers and member tables.
    pub(crate) fn collect_declarations(&mut self, programs: &[NodeId]) -> CheckResult<()> {
        let mut decls = Vec::new();
        for &program in programs {
            let NodeKind::Program { kind, statements, .. } = self.ast.kind(program).clone() else { continue };
            let is_prelude = kind == ProgramKind::Prelude;
            for stmt in statements {
                if matches!(
                    self.ast.kind(stmt),
                    NodeKind::ClassDeclaration { .. } | NodeKind::InterfaceDeclaration { .. } | NodeKind::EnumDeclaration { .. }
                ) {
                    self.declare_shell(stmt, is_prelude)?;
                    decls.push(stmt);
                }
            }
        }
        self.verify_builtins()?;

        for &decl in &decls {
            self.resolve_header(decl)?;
        }
        for &decl in &decls {
            self.check_inheritance_cycle(decl)?;
        }
        for &decl in &decls {
            if let Some(ty) = self.ast.ts_type(decl) {
                self.ensure_members(ty)?;
            }
        }
        tracing::debug!(declarations = decls.len(), types = self.table.len(), "collected declarations");
        Ok(())
    }

    /// Declare a class, interface or enum that is not at the top level of
    /// a program, on first use.
    pub(crate) fn ensure_declared(&mut self, decl: NodeId) -> CheckResult<TypeId> {
        if let Some(ty) = self.ast.ts_type(decl) {
            return Ok(ty);
        }
        self.declare_shell(decl, false)?;
        self.resolve_header(decl)?;
        self.check_inheritance_cycle(decl)?;
        self.declared_type(decl)
    }

    fn declare_shell(&mut self, decl: NodeId, is_prelude: bool) -> CheckResult<()> {
        let name = self.ast.name_of(decl).ok_or_else(|| CheckerError::internal("declaration without a name"))?;
        let (mut flags, type_params) = match self.ast.kind(decl).clone() {
            NodeKind::ClassDeclaration { type_params, modifiers, .. } => {
                let mut flags = ObjectFlags::CLASS;
                if modifiers.contains(ModifierFlags::ABSTRACT) {
                    flags |= ObjectFlags::ABSTRACT;
                }
                if modifiers.contains(ModifierFlags::FINAL) {
                    flags |= ObjectFlags::FINAL;
                }
                (flags, type_params)
            }
            NodeKind::InterfaceDeclaration { type_params, .. } => (ObjectFlags::INTERFACE | ObjectFlags::ABSTRACT, type_params),
            NodeKind::EnumDeclaration { .. } => {
                let ty = crate::enums::declare_enum(self, decl)?;
                self.ast.set_ts_type(decl, ty);
                return Ok(());
            }
            _ => return Err(CheckerError::internal("not a type declaration")),
        };
        if is_prelude {
            flags |= ObjectFlags::PRELUDE | ObjectFlags::BUILTIN;
        }

        let text = self.name_str(name);
        let reused = match (is_prelude, text.as_str()) {
            (true, "Object") => Some(self.table.global.object),
            (true, "Void") => Some(self.table.global.void_class),
            _ => None,
        };
        let ty = match reused {
            Some(id) => {
                if let Some(obj) = self.table.object_mut(id) {
                    *obj = ObjectType::new(name, Some(decl), flags);
                }
                id
            }
            None => self.table.create_object(name, Some(decl), flags),
        };
        self.ast.set_ts_type(decl, ty);

        let params: Vec<TypeId> = type_params.iter().map(|&p| self.create_type_parameter_shell(p)).collect();
        if let Some(obj) = self.table.object_mut(ty) {
            obj.type_params = params;
        }
        if is_prelude {
            self.record_builtin(&text, ty);
        }
        Ok(())
    }

    fn record_builtin(&mut self, name: &str, ty: TypeId) {
        let g = &mut self.table.global;
        let mut value_typed = false;
        match name {
            "String" => {
                g.string_class = Some(ty);
                value_typed = true;
            }
            "Exception" => g.exception = Some(ty),
            "Error" => g.error = Some(ty),
            "ClassCastException" => g.class_cast_exception = Some(ty),
            "NullPointerException" => g.null_pointer_exception = Some(ty),
            "ArithmeticException" => g.arithmetic_exception = Some(ty),
            "StringBuilder" => g.string_builder = Some(ty),
            "Promise" => g.promise = Some(ty),
            "JSValue" => g.js_value = Some(ty),
            "JSRuntime" => g.js_runtime = Some(ty),
            other => {
                if let Some(kind) = PrimitiveKind::ALL.into_iter().find(|k| k.boxed_name() == other) {
                    g.boxed[kind.index()] = Some(ty);
                    value_typed = true;
                }
            }
        }
        if value_typed {
            if let Some(obj) = self.table.object_mut(ty) {
                obj.flags |= ObjectFlags::VALUE_TYPED;
            }
        }
    }

    // ========================================================================
    // Headers
    // ========================================================================

    fn resolve_header(&mut self, decl: NodeId) -> CheckResult<()> {
        let ty = self.declared_type(decl)?;
        let Some(obj) = self.table.object(ty) else { return Ok(()) };
        if obj.flags.contains(ObjectFlags::HEADER_RESOLVED) {
            return Ok(());
        }
        let class_name = self.name_str(obj.name);
        let (super_type, interfaces) = match self.ast.kind(decl).clone() {
            NodeKind::ClassDeclaration { type_params, super_class, implements, .. } => {
                for p in type_params {
                    self.resolve_constraint(p)?;
                }
                let super_type = match super_class {
                    Some(node) => {
                        let sup = self.resolve_type_annotation(node)?;
                        let extensible = self.table.object(sup).is_some_and(|o| {
                            !o.is_interface() && !o.flags.intersects(ObjectFlags::FINAL | ObjectFlags::VALUE_TYPED)
                        });
                        if !extensible || sup == ty {
                            return Err(self.error(node, &messages::EXTENDS_MUST_BE_CLASS, &[&class_name]));
                        }
                        Some(sup)
                    }
                    None if ty == self.table.global.object => None,
                    None => Some(self.table.global.object),
                };
                (super_type, self.resolve_interface_list(&implements)?)
            }
            NodeKind::InterfaceDeclaration { type_params, extends, .. } => {
                for p in type_params {
                    self.resolve_constraint(p)?;
                }
                (None, self.resolve_interface_list(&extends)?)
            }
            _ => return Ok(()),
        };
        if let Some(obj) = self.table.object_mut(ty) {
            obj.super_type = super_type;
            obj.interfaces = interfaces;
            obj.flags |= ObjectFlags::HEADER_RESOLVED;
        }
        Ok(())
    }

    fn resolve_interface_list(&mut self, nodes: &[NodeId]) -> CheckResult<Vec<TypeId>> {
        let mut out = Vec::with_capacity(nodes.len());
        for &node in nodes {
            let ty = self.resolve_type_annotation(node)?;
            if !self.table.object(ty).is_some_and(|o| o.is_interface()) {
                return Err(self.error(node, &messages::IMPLEMENTS_MUST_BE_INTERFACE, &[]));
            }
            out.push(ty);
        }
        Ok(out)
    }

    fn check_inheritance_cycle(&mut self, decl: NodeId) -> CheckResult<()> {
        let ty = self.declared_type(decl)?;
        let Some(obj) = self.table.object(ty) else { return Ok(()) };
        let mut stack: Vec<TypeId> = obj.super_type.into_iter().chain(obj.interfaces.iter().copied()).collect();
        let mut seen = Vec::new();
        while let Some(current) = stack.pop() {
            let base = self.table.generic_base(current);
            if base == ty {
                let name = self.ast.name_str(decl).to_string();
                return Err(self.error(decl, &messages::CYCLIC_INHERITANCE_INVOLVING_0, &[&name]));
            }
            if seen.contains(&base) {
                continue;
            }
            seen.push(base);
            if let Some(o) = self.table.object(base) {
                stack.extend(o.super_type);
                stack.extend(o.interfaces.iter().copied());
            }
        }
        Ok(())
    }

    // ========================================================================
    // Type parameters and aliases
    // ========================================================================

    fn create_type_parameter_shell(&mut self, decl: NodeId) -> TypeId {
        if let Some(ty) = self.ast.ts_type(decl) {
            return ty;
        }
        let name = self.ast.name_of(decl).unwrap_or_else(|| self.ast.interner.intern("T"));
        let ty = self.table.create_type_parameter(name, Some(decl));
        self.ast.set_ts_type(decl, ty);
        if let Some(var) = self.binder.variable_of_decl(decl) {
            self.binder.set_variable_type(var, ty);
        }
        ty
    }

    fn resolve_constraint(&mut self, decl: NodeId) -> CheckResult<()> {
        let ty = self.create_type_parameter_shell(decl);
        if let NodeKind::TypeParameter { constraint: Some(bound), .. } = *self.ast.kind(decl) {
            let bound = self.resolve_type_annotation(bound)?;
            self.table.set_constraint(ty, bound);
        }
        Ok(())
    }

    pub(crate) fn type_of_type_parameter(&mut self, decl: NodeId) -> CheckResult<TypeId> {
        if let Some(ty) = self.ast.ts_type(decl) {
            return Ok(ty);
        }
        self.resolve_constraint(decl)?;
        self.declared_type(decl)
    }

    pub(crate) fn resolve_type_alias(&mut self, decl: NodeId) -> CheckResult<TypeId> {
        let NodeKind::TypeAlias { aliased, .. } = *self.ast.kind(decl) else {
            return Err(CheckerError::internal("type alias variable without alias declaration"));
        };
        self.resolve_type_annotation(aliased)
    }

    // ========================================================================
    // Member tables
    // ========================================================================

    /// Make sure the member tables of `ty` (and of its generic base) exist.
    pub(crate) fn ensure_members(&mut self, ty: TypeId) -> CheckResult<()> {
        let Some(obj) = self.table.object(ty) else { return Ok(()) };
        if obj.flags.contains(ObjectFlags::MEMBERS_RESOLVED) {
            return Ok(());
        }
        match obj.base {
            Some(base) => {
                self.ensure_members(base)?;
                self.table.fill_instantiated_header(ty);
                self.table.fill_instantiated_members(ty);
                Ok(())
            }
            None => {
                if !self.resolving_members.insert(ty) {
                    return Ok(());
                }
                let result = self.collect_members(ty);
                self.resolving_members.remove(&ty);
                result
            }
        }
    }

    fn collect_members(&mut self, ty: TypeId) -> CheckResult<()> {
        let Some(decl) = self.table.object(ty).and_then(|o| o.decl) else {
            if let Some(obj) = self.table.object_mut(ty) {
                obj.flags |= ObjectFlags::MEMBERS_RESOLVED;
            }
            return Ok(());
        };
        let (members, is_interface) = match self.ast.kind(decl) {
            NodeKind::ClassDeclaration { members, .. } => (members.clone(), false),
            NodeKind::InterfaceDeclaration { members, .. } => (members.clone(), true),
            _ => return Ok(()),
        };
        if let Some(sup) = self.table.object(ty).and_then(|o| o.super_type) {
            self.ensure_members(sup)?;
        }

        let mut instance: FxIndexMap<Name, Property> = FxIndexMap::default();
        let mut statics: FxIndexMap<Name, Property> = FxIndexMap::default();
        let mut constructors = Vec::new();
        let mut deferred = Vec::new();
        let mut has_field_inits = false;

        for member in members {
            match self.ast.kind(member).clone() {
                NodeKind::ClassProperty { name, type_annotation, init, modifiers } => {
                    if init.is_some() && !modifiers.contains(ModifierFlags::STATIC) {
                        has_field_inits = true;
                    }
                    let Some(annotation) = type_annotation else {
                        deferred.push(member);
                        continue;
                    };
                    let prop_name = self.ast.name_of(name).ok_or_else(|| CheckerError::internal("unnamed field"))?;
                    let prop_ty = self.resolve_type_annotation(annotation)?;
                    let prop = self.field_property(ty, member, prop_name, prop_ty, modifiers, is_interface);
                    let table = if modifiers.contains(ModifierFlags::STATIC) { &mut statics } else { &mut instance };
                    table.insert(prop_name, prop);
                }
                NodeKind::MethodDefinition { name, kind, function, modifiers } => {
                    let prop_name = self.ast.name_of(name).ok_or_else(|| CheckerError::internal("unnamed method"))?;
                    let sig = self.ensure_signature(function)?;
                    let table = if modifiers.contains(ModifierFlags::STATIC) { &mut statics } else { &mut instance };
                    match kind {
                        MethodKind::Constructor => constructors.push(sig),
                        MethodKind::Method => {
                            let existing = table.get(&prop_name).filter(|p| p.is_method()).map(|p| p.ty);
                            let signatures = match existing.map(|t| self.table.get(t).clone()) {
                                Some(Type::Function { mut signatures }) => {
                                    signatures.push(sig);
                                    signatures
                                }
                                _ => vec![sig],
                            };
                            let fn_ty = self.table.create_function(signatures);
                            let flags = property_flags(modifiers) | PropertyFlags::METHOD;
                            table.insert(
                                prop_name,
                                Property { name: prop_name, ty: fn_ty, decl: Some(member), owner: ty, flags, getter: None, setter: None },
                            );
                        }
                        MethodKind::Get | MethodKind::Set => {
                            let is_get = kind == MethodKind::Get;
                            let value_ty = if is_get {
                                self.table.signature(sig).return_type
                            } else {
                                self.table.signature(sig).params.first().map(|p| p.ty).unwrap_or(self.table.global.void)
                            };
                            let synthetic = modifiers.contains(ModifierFlags::SYNTHETIC);
                            match table.get_mut(&prop_name) {
                                Some(existing) => {
                                    if is_get {
                                        existing.getter = Some(sig);
                                    } else {
                                        existing.setter = Some(sig);
                                    }
                                    if !synthetic {
                                        existing.flags |= if is_get { PropertyFlags::GETTER } else { PropertyFlags::SETTER };
                                    }
                                }
                                None => {
                                    let accessor = if is_get { PropertyFlags::GETTER } else { PropertyFlags::SETTER };
                                    let flags = property_flags(modifiers) | accessor;
                                    table.insert(
                                        prop_name,
                                        Property {
                                            name: prop_name,
                                            ty: value_ty,
                                            decl: Some(member),
                                            owner: ty,
                                            flags,
                                            getter: is_get.then_some(sig),
                                            setter: (!is_get).then_some(sig),
                                        },
                                    );
                                }
                            }
                        }
                    }
                }
                _ => {}
            }
        }

        if constructors.is_empty() && !is_interface {
            let name = self.ast.interner.intern("constructor");
            let mut sig = Signature::new(name, Vec::new(), self.table.global.void);
            sig.flags = SignatureFlags::CONSTRUCTOR;
            sig.owner = Some(ty);
            constructors.push(self.table.add_signature(sig));
        }
        if let Some(obj) = self.table.object_mut(ty) {
            obj.instance_members = instance;
            obj.static_members = statics;
            obj.constructors = constructors;
            obj.flags |= ObjectFlags::MEMBERS_RESOLVED;
            if has_field_inits {
                obj.flags |= ObjectFlags::HAS_FIELD_INITS;
            }
        }

        // Fields typed by their initializer see the rest of the class.
        for member in deferred {
            let NodeKind::ClassProperty { name, init, modifiers, .. } = *self.ast.kind(member) else { continue };
            let prop_name = self.ast.name_of(name).ok_or_else(|| CheckerError::internal("unnamed field"))?;
            let Some(init) = init else {
                let text = self.name_str(prop_name);
                return Err(self.error(member, &messages::CANNOT_INFER_TYPE_OF_0, &[&text]));
            };
            let ctx = self.context_for(init);
            let init_ty = self.check_expr(init, &ctx)?;
            let prop_ty = self.table.widen(init_ty);
            let prop = self.field_property(ty, member, prop_name, prop_ty, modifiers, is_interface);
            if let Some(obj) = self.table.object_mut(ty) {
                if modifiers.contains(ModifierFlags::STATIC) {
                    obj.static_members.insert(prop_name, prop);
                } else {
                    obj.instance_members.insert(prop_name, prop);
                }
            }
        }
        Ok(())
    }

    /// A field. Interface properties become abstract accessors.
    fn field_property(
        &mut self,
        owner: TypeId,
        decl: NodeId,
        name: Name,
        ty: TypeId,
        modifiers: ModifierFlags,
        is_interface: bool,
    ) -> Property {
        let mut flags = property_flags(modifiers);
        let mut getter = None;
        let mut setter = None;
        if is_interface {
            flags |= PropertyFlags::GETTER | PropertyFlags::ABSTRACT;
            let mut get = Signature::new(name, Vec::new(), ty);
            get.flags = SignatureFlags::GETTER | SignatureFlags::ABSTRACT;
            get.owner = Some(owner);
            getter = Some(self.table.add_signature(get));
            if !modifiers.contains(ModifierFlags::READONLY) {
                flags |= PropertyFlags::SETTER;
                let value = self.ast.interner.intern("value");
                let param = SignatureParam { name: value, ty, optional: false, default: None };
                let mut set = Signature::new(name, vec![param], self.table.global.void);
                set.flags = SignatureFlags::SETTER | SignatureFlags::ABSTRACT;
                set.owner = Some(owner);
                setter = Some(self.table.add_signature(set));
            }
        }
        Property { name, ty, decl: Some(decl), owner, flags, getter, setter }
    }

    // ========================================================================
    // Signatures
    // ========================================================================

    /// The signature of a function, built on first request.
    pub(crate) fn ensure_signature(&mut self, function: NodeId) -> CheckResult<SignatureId> {
        match self.ast.kind(function) {
            NodeKind::ScriptFunction { signature: Some(sig), .. } => Ok(*sig),
            NodeKind::ScriptFunction { .. } => self.build_signature(function, &[], None),
            _ => Err(CheckerError::internal("signature requested for a non-function")),
        }
    }

    /// Build and record the signature of `function`. Unannotated parameters
    /// take their type from `param_hints`, an unannotated return type from
    /// `return_hint` or, failing that, from the body.
    pub(crate) fn build_signature(
        &mut self,
        function: NodeId,
        param_hints: &[TypeId],
        return_hint: Option<TypeId>,
    ) -> CheckResult<SignatureId> {
        let NodeKind::ScriptFunction { name, type_params, params, return_type, body, flags, modifiers, .. } =
            self.ast.kind(function).clone()
        else {
            return Err(CheckerError::internal("signature requested for a non-function"));
        };
        let is_ctor = flags.contains(ScriptFunctionFlags::CONSTRUCTOR);
        let is_arrow = flags.contains(ScriptFunctionFlags::ARROW);
        let sig_name = match name.and_then(|n| self.ast.name_of(n)) {
            Some(n) => n,
            None => self.ast.interner.intern(if is_ctor { "constructor" } else { "invoke" }),
        };

        let mut type_param_types = Vec::with_capacity(type_params.len());
        for p in type_params {
            type_param_types.push(self.type_of_type_parameter(p)?);
        }

        let mut sig_params = Vec::with_capacity(params.len());
        let mut rest = None;
        for (index, &param) in params.iter().enumerate() {
            let NodeKind::Parameter { type_annotation, init, optional, rest: is_rest, .. } = *self.ast.kind(param) else {
                continue;
            };
            let param_name = self.ast.name_of(param).ok_or_else(|| CheckerError::internal("unnamed parameter"))?;
            let mut ty = match (type_annotation, param_hints.get(index)) {
                (Some(annotation), _) => self.resolve_type_annotation(annotation)?,
                (None, Some(&hint)) => hint,
                (None, None) => {
                    let text = self.name_str(param_name);
                    return Err(self.error(param, &messages::CANNOT_INFER_LAMBDA_PARAMETER_0, &[&text]));
                }
            };
            if is_rest {
                if self.table.element_type(ty).is_none() {
                    ty = self.table.create_array(ty);
                }
                rest = Some(SignatureParam { name: param_name, ty, optional: true, default: None });
                continue;
            }
            if optional && init.is_none() {
                ty = self.table.create_union(&[ty, self.table.global.undefined]);
            }
            sig_params.push(SignatureParam { name: param_name, ty, optional: optional || init.is_some(), default: init });
        }

        let mut sig_flags = SignatureFlags::NONE;
        let (ret, inferring) = if is_ctor {
            (self.table.global.void, false)
        } else {
            match (return_type, return_hint) {
                (Some(annotation), _) => (self.resolve_type_annotation(annotation)?, false),
                (None, Some(hint)) => (hint, false),
                (None, None) if body.is_some() => (self.table.global.void, true),
                (None, None) => (self.table.global.void, false),
            }
        };
        if inferring {
            sig_flags |= SignatureFlags::INFERRING;
        }
        for (modifier, flag) in [
            (ModifierFlags::STATIC, SignatureFlags::STATIC),
            (ModifierFlags::ABSTRACT, SignatureFlags::ABSTRACT),
            (ModifierFlags::NATIVE, SignatureFlags::NATIVE),
            (ModifierFlags::PRIVATE, SignatureFlags::PRIVATE),
            (ModifierFlags::PROTECTED, SignatureFlags::PROTECTED),
        ] {
            if modifiers.contains(modifier) {
                sig_flags |= flag;
            }
        }
        for (fflag, flag) in [
            (ScriptFunctionFlags::CONSTRUCTOR, SignatureFlags::CONSTRUCTOR),
            (ScriptFunctionFlags::ASYNC, SignatureFlags::ASYNC),
            (ScriptFunctionFlags::GETTER, SignatureFlags::GETTER),
            (ScriptFunctionFlags::SETTER, SignatureFlags::SETTER),
            (ScriptFunctionFlags::ARROW, SignatureFlags::FUNCTIONAL),
        ] {
            if flags.contains(fflag) {
                sig_flags |= flag;
            }
        }

        let owner = if is_arrow { None } else { self.context_for(function).containing_class };
        let mut sig = Signature::new(sig_name, sig_params, ret);
        sig.rest = rest;
        sig.type_params = type_param_types;
        sig.flags = sig_flags;
        sig.owner = owner;
        sig.decl = Some(function);

        let async_impl = if flags.contains(ScriptFunctionFlags::ASYNC) {
            if inferring || !self.table.is_promise(ret) {
                let at = return_type.unwrap_or(function);
                return Err(self.error(at, &messages::ASYNC_MUST_RETURN_PROMISE, &[]));
            }
            let impl_name = self.ast.interner.intern(&format!("%%async-{}", self.name_str(sig_name)));
            let mut impl_sig = sig.clone();
            impl_sig.name = impl_name;
            impl_sig.return_type = self.table.global.object;
            impl_sig.flags = (sig_flags & (SignatureFlags::STATIC | SignatureFlags::PRIVATE | SignatureFlags::PROTECTED))
                | SignatureFlags::ASYNC_IMPL;
            Some(self.table.add_signature(impl_sig))
        } else {
            None
        };

        let id = self.table.add_signature(sig);
        if let NodeKind::ScriptFunction { signature, async_impl: impl_slot, .. } = self.ast.kind_mut(function) {
            *signature = Some(id);
            *impl_slot = async_impl;
        }
        Ok(id)
    }

    /// The return type of `sig`, checking the body first when it is inferred.
    pub(crate) fn signature_return_type(&mut self, sig: SignatureId, at: NodeId) -> CheckResult<TypeId> {
        let s = self.table.signature(sig);
        if !s.flags.contains(SignatureFlags::INFERRING) {
            return Ok(s.return_type);
        }
        let Some(function) = s.decl else { return Ok(s.return_type) };
        if self.checking_bodies.contains(&function) {
            let name = self.name_str(s.name);
            return Err(self.error(at, &messages::CIRCULAR_DEPENDENCY_FOR_0, &[&name]));
        }
        self.check_function_body(function)?;
        let base = match self.ast.kind(function) {
            NodeKind::ScriptFunction { signature: Some(base), .. } => *base,
            _ => sig,
        };
        let mut ret = self.table.signature(base).return_type;
        if base != sig {
            if let Some(owner) = self.table.signature(sig).owner {
                let map = self.table.substitution_of(owner);
                ret = self.table.substitute(ret, &map);
            }
            let s = self.table.signature_mut(sig);
            s.return_type = ret;
            s.flags.remove(SignatureFlags::INFERRING);
        }
        Ok(ret)
    }

    // ========================================================================
    // Bodies
    // ========================================================================

    /// Whether a function may omit its body: native, abstract, declared or
    /// inside an interface or a `declare` class.
    fn is_ambient(&self, function: NodeId, modifiers: ModifierFlags) -> bool {
        if modifiers.intersects(ModifierFlags::NATIVE | ModifierFlags::DECLARE | ModifierFlags::ABSTRACT) {
            return true;
        }
        let mut current = self.ast.parent(function);
        while let Some(id) = current {
            match self.ast.kind(id) {
                NodeKind::InterfaceDeclaration { .. } => return true,
                NodeKind::ClassDeclaration { modifiers, .. } => return modifiers.contains(ModifierFlags::DECLARE),
                NodeKind::FunctionDeclaration { .. } | NodeKind::MethodDefinition { .. } => {}
                _ => return false,
            }
            current = self.ast.parent(id);
        }
        false
    }

    /// Check the body of a function or method once.
    pub(crate) fn check_function_body(&mut self, function: NodeId) -> CheckResult<()> {
        if self.checked_bodies.contains(&function) || self.checking_bodies.contains(&function) {
            return Ok(());
        }
        let sig = self.ensure_signature(function)?;
        let NodeKind::ScriptFunction { body, modifiers, .. } = self.ast.kind(function).clone() else {
            return Ok(());
        };
        let name = self.name_str(self.table.signature(sig).name);
        let Some(body) = body else {
            if !self.is_ambient(function, modifiers) {
                return Err(self.error(function, &messages::MISSING_BODY_0, &[&name]));
            }
            self.checked_bodies.insert(function);
            return Ok(());
        };
        if modifiers.contains(ModifierFlags::NATIVE) {
            return Err(self.error(function, &messages::NATIVE_WITH_BODY_0, &[&name]));
        }

        self.checking_bodies.insert(function);
        // Another body may be checked while a lambda is open.
        let saved_frames = std::mem::take(&mut self.lambda_frames);
        let saved_collectors = std::mem::take(&mut self.return_collectors);
        let mut ctx = self.context_for(body);
        ctx.containing_signature = Some(sig);
        ctx.containing_function = Some(function);
        let result = self.check_body_statements(sig, body, ctx);
        self.lambda_frames = saved_frames;
        self.return_collectors = saved_collectors;
        self.checking_bodies.remove(&function);
        result?;
        self.checked_bodies.insert(function);
        Ok(())
    }

    /// Default values, then the statements, then the inferred return type.
    pub(crate) fn check_body_statements(
        &mut self,
        sig: SignatureId,
        body: NodeId,
        mut ctx: crate::contexts::ResolutionContext,
    ) -> CheckResult<()> {
        self.check_parameter_defaults(sig, &ctx)?;

        let inferring = self.table.signature(sig).flags.contains(SignatureFlags::INFERRING);
        if inferring {
            self.return_collectors.push(Vec::new());
        }
        let statements = match self.ast.kind(body) {
            NodeKind::Block { statements } => statements.clone(),
            _ => vec![body],
        };
        let result = self.check_statement_list(&statements, &mut ctx);
        let collected = if inferring { self.return_collectors.pop().unwrap_or_default() } else { Vec::new() };
        result?;
        if inferring {
            let mut ret: Option<TypeId> = None;
            for ty in collected {
                ret = Some(match ret {
                    None => self.table.widen(ty),
                    Some(acc) => self.table.least_upper_bound(acc, ty),
                });
            }
            let s = self.table.signature_mut(sig);
            s.return_type = ret.unwrap_or(s.return_type);
            s.flags.remove(SignatureFlags::INFERRING);
        }
        Ok(())
    }

    fn check_parameter_defaults(&mut self, sig: SignatureId, ctx: &crate::contexts::ResolutionContext) -> CheckResult<()> {
        let sig_params = self.table.signature(sig).params.clone();
        for p in sig_params {
            let Some(default) = p.default else { continue };
            let ty = self.check_expr_expected(default, Some(p.ty), ctx)?;
            self.check_assignable(default, ty, p.ty, crate::relation::TypeRelationFlags::NONE)?;
        }
        Ok(())
    }

    /// Check a method the lowering phases added to a class and attach its
    /// accessor signature to the existing property.
    pub fn check_synthesized_method(&mut self, method: NodeId) -> CheckResult<()> {
        let NodeKind::MethodDefinition { name, kind, function, modifiers } = *self.ast.kind(method) else {
            return Err(CheckerError::internal("not a method definition"));
        };
        let class = self
            .ast
            .parent(method)
            .ok_or_else(|| CheckerError::internal("synthesized method outside of a class"))?;
        let owner = self.declared_type(class)?;
        let sig = self.ensure_signature(function)?;
        let prop_name = self.ast.name_of(name).ok_or_else(|| CheckerError::internal("unnamed method"))?;
        let is_static = modifiers.contains(ModifierFlags::STATIC);
        if let Some(obj) = self.table.object_mut(owner) {
            let table = if is_static { &mut obj.static_members } else { &mut obj.instance_members };
            if let Some(prop) = table.get_mut(&prop_name) {
                match kind {
                    MethodKind::Get => prop.getter = Some(sig),
                    MethodKind::Set => prop.setter = Some(sig),
                    _ => {}
                }
            }
        }
        self.check_function_body(function)
    }

    // ========================================================================
    // Classes
    // ========================================================================

    pub(crate) fn check_class(&mut self, decl: NodeId) -> CheckResult<()> {
        let ty = self.ensure_declared(decl)?;
        self.ensure_members(ty)?;
        let NodeKind::ClassDeclaration { members, .. } = self.ast.kind(decl).clone() else { return Ok(()) };

        for member in members {
            match *self.ast.kind(member) {
                NodeKind::ClassProperty { name, init: Some(init), modifiers, .. } => {
                    let prop_name = self.ast.name_of(name).ok_or_else(|| CheckerError::internal("unnamed field"))?;
                    let is_static = modifiers.contains(ModifierFlags::STATIC);
                    let field_ty = self
                        .table
                        .object(ty)
                        .and_then(|o| o.members(is_static).get(&prop_name))
                        .map(|p| p.ty)
                        .ok_or_else(|| CheckerError::internal("field missing from member table"))?;
                    let ctx = self.context_for(init);
                    let init_ty = self.check_expr_expected(init, Some(field_ty), &ctx)?;
                    self.check_assignable(init, init_ty, field_ty, crate::relation::TypeRelationFlags::NONE)?;
                }
                NodeKind::MethodDefinition { function, .. } => self.check_function_body(function)?,
                _ => {}
            }
        }

        self.check_overrides(ty)?;
        let is_abstract = self.table.object(ty).is_some_and(|o| o.flags.contains(ObjectFlags::ABSTRACT));
        if !is_abstract {
            self.check_implements(decl, ty)?;
        }
        Ok(())
    }

    pub(crate) fn check_interface(&mut self, decl: NodeId) -> CheckResult<()> {
        let ty = self.ensure_declared(decl)?;
        self.ensure_members(ty)
    }

    /// `ty` and its ancestor classes with their member tables resolved.
    pub(crate) fn resolved_chain(&mut self, ty: TypeId) -> CheckResult<Vec<TypeId>> {
        let mut chain = Vec::new();
        let mut current = Some(ty);
        while let Some(class) = current {
            if chain.contains(&class) {
                break;
            }
            self.ensure_members(class)?;
            self.table.fill_instantiated_header(class);
            chain.push(class);
            current = self.table.object(class).and_then(|o| o.super_type);
        }
        Ok(chain)
    }

    /// Override-equivalent methods must have compatible return types.
    fn check_overrides(&mut self, ty: TypeId) -> CheckResult<()> {
        let chain = self.resolved_chain(ty)?;
        let methods: Vec<Property> =
            self.table.object(ty).map(|o| o.instance_members.values().filter(|p| p.is_method()).cloned().collect()).unwrap_or_default();
        for prop in methods {
            let own = self.function_signatures(prop.ty);
            for &ancestor in chain.iter().skip(1) {
                let Some(base_prop) = self
                    .table
                    .object(ancestor)
                    .and_then(|o| o.instance_members.get(&prop.name))
                    .filter(|p| p.is_method())
                    .cloned()
                else {
                    continue;
                };
                for &sig in &own {
                    for base_sig in self.function_signatures(base_prop.ty) {
                        if !self.override_equivalent(sig, base_sig) {
                            continue;
                        }
                        let (ret, base_ret) = (self.table.signature(sig).return_type, self.table.signature(base_sig).return_type);
                        let compatible = self.table.is_identical(ret, base_ret) || self.table.is_supertype_of(base_ret, ret);
                        if !compatible {
                            let Some(at) = prop.decl.or_else(|| self.table.object(ty).and_then(|o| o.decl)) else { continue };
                            let method = self.name_str(prop.name);
                            let (class, base) = (self.declaration_name(ty), self.declaration_name(ancestor));
                            return Err(self.error(at, &messages::_0_IN_1_CANNOT_OVERRIDE_0_IN_2, &[&method, &class, &base]));
                        }
                    }
                }
            }
        }
        Ok(())
    }

    pub(crate) fn function_signatures(&self, ty: TypeId) -> Vec<SignatureId> {
        match self.table.get(ty) {
            Type::Function { signatures } => signatures.clone(),
            _ => Vec::new(),
        }
    }

    fn override_equivalent(&mut self, a: SignatureId, b: SignatureId) -> bool {
        let (sa, sb) = (self.table.signature(a).clone(), self.table.signature(b).clone());
        sa.params.len() == sb.params.len()
            && sa.rest.is_some() == sb.rest.is_some()
            && sa.params.iter().zip(&sb.params).all(|(x, y)| self.table.is_identical(x.ty, y.ty))
    }

    /// A concrete class must implement every abstract member it inherits.
    fn check_implements(&mut self, decl: NodeId, ty: TypeId) -> CheckResult<()> {
        let chain = self.resolved_chain(ty)?;
        let mut required: Vec<(Property, TypeId)> = Vec::new();
        let mut interfaces: Vec<TypeId> = Vec::new();
        for &class in &chain {
            self.ensure_members(class)?;
            if let Some(obj) = self.table.object(class) {
                interfaces.extend(obj.interfaces.iter().copied());
                if class != ty {
                    required.extend(
                        obj.instance_members.values().filter(|p| p.flags.contains(PropertyFlags::ABSTRACT)).map(|p| (p.clone(), class)),
                    );
                }
            }
        }
        let mut seen = Vec::new();
        while let Some(iface) = interfaces.pop() {
            if seen.contains(&iface) {
                continue;
            }
            seen.push(iface);
            self.ensure_members(iface)?;
            if let Some(obj) = self.table.object(iface) {
                interfaces.extend(obj.interfaces.iter().copied());
                required.extend(obj.instance_members.values().map(|p| (p.clone(), iface)));
            }
        }

        for (prop, owner) in required {
            if !self.has_implementation(&chain, &prop) {
                let class = self.declaration_name(ty);
                let member = self.name_str(prop.name);
                let owner = self.declaration_name(owner);
                return Err(self.error(decl, &messages::_0_NOT_ABSTRACT_DOES_NOT_OVERRIDE_1_IN_2, &[&class, &member, &owner]));
            }
        }
        Ok(())
    }

    fn has_implementation(&self, chain: &[TypeId], required: &Property) -> bool {
        let wanted_params: Vec<usize> = self
            .function_signatures(required.ty)
            .iter()
            .map(|s| self.table.signature(*s).params.len())
            .collect();
        chain.iter().any(|&class| {
            let Some(candidate) = self.table.object(class).and_then(|o| o.instance_members.get(&required.name)) else {
                return false;
            };
            if candidate.flags.contains(PropertyFlags::ABSTRACT) {
                return false;
            }
            if !required.is_method() {
                return !candidate.is_method();
            }
            if !candidate.is_method() {
                return false;
            }
            let have: Vec<usize> = self
                .function_signatures(candidate.ty)
                .iter()
                .map(|s| self.table.signature(*s).params.len())
                .collect();
            wanted_params.iter().all(|n| have.contains(n))
        })
    }
}

pub(crate) fn property_flags(modifiers: ModifierFlags) -> PropertyFlags {
    let mut flags = PropertyFlags::NONE;
    for (modifier, flag) in [
        (ModifierFlags::STATIC, PropertyFlags::STATIC),
        (ModifierFlags::READONLY, PropertyFlags::READONLY),
        (ModifierFlags::PRIVATE, PropertyFlags::PRIVATE),
        (ModifierFlags::PROTECTED, PropertyFlags::PROTECTED),
        (ModifierFlags::ABSTRACT, PropertyFlags::ABSTRACT),
        (ModifierFlags::SYNTHETIC, PropertyFlags::SYNTHETIC),
    ] {
        if modifiers.contains(modifier) {
            flags |= flag;
        }
    }
    flags
}
