//! Expressions.

use crate::checker::{Checker, LambdaFrame};
use crate::contexts::{ContextFlags, ResolutionContext};
use crate::error::{CheckResult, CheckerError};
use crate::relation::{unbox_flag, TypeRelationFlags};
use crate::types::*;
use etsc_ast::*;
use etsc_binder::DeclKind;
use etsc_core::collections::FxIndexSet;
use etsc_diagnostics::messages;

/// What a non-computed member expression resolved to.
pub(crate) struct MemberAccess {
    /// `None` for an enum constant.
    pub prop: Option<Property>,
    /// Type of the receiver with nullish constituents removed.
    pub receiver: TypeId,
    /// `?.` was applied to a possibly nullish receiver.
    pub optional_chain: bool,
}

impl Checker {
    pub fn check_expr(&mut self, node: NodeId, ctx: &ResolutionContext) -> CheckResult<TypeId> {
        self.check_expr_expected(node, None, ctx)
    }

    /// Check `node`, using `expected` to type array literals, object
    /// literals and lambda parameters. The result is memoized on the node.
    pub fn check_expr_expected(
        &mut self,
        node: NodeId,
        expected: Option<TypeId>,
        ctx: &ResolutionContext,
    ) -> CheckResult<TypeId> {
        if let Some(ty) = self.ast.ts_type(node) {
            return Ok(ty);
        }
        let ty = self.compute_expr(node, expected, ctx)?;
        self.ast.set_ts_type(node, ty);
        Ok(ty)
    }

    fn compute_expr(&mut self, node: NodeId, expected: Option<TypeId>, ctx: &ResolutionContext) -> CheckResult<TypeId> {
        match self.ast.kind(node).clone() {
            NodeKind::NumberLiteral(number) => Ok(self.table.constant(match number {
                Number::Int(v) => ConstValue::Int(v),
                Number::Long(v) => ConstValue::Long(v),
                Number::Float(v) => ConstValue::Float(v),
                Number::Double(v) => ConstValue::Double(v),
            })),
            NodeKind::CharLiteral(c) => Ok(self.table.constant(ConstValue::Char(c))),
            NodeKind::StringLiteral(s) => Ok(self.table.string_constant(s)),
            NodeKind::BooleanLiteral(b) => Ok(self.table.constant(ConstValue::Boolean(b))),
            NodeKind::NullLiteral => Ok(self.table.global.null),
            NodeKind::UndefinedLiteral => Ok(self.table.global.undefined),
            NodeKind::Identifier { name, .. } => self.check_identifier(node, name, ctx),
            NodeKind::This => self.check_this(node, ctx),
            NodeKind::Super => {
                let this = self.check_this(node, ctx)?;
                self.table
                    .object(this)
                    .and_then(|o| o.super_type)
                    .ok_or_else(|| self.error(node, &messages::SUPER_OUTSIDE_DERIVED_CLASS, &[]))
            }
            NodeKind::Member { computed: true, object, property, .. } => self.check_index_access(node, object, property, ctx),
            NodeKind::Member { .. } => self.check_member(node, ctx),
            NodeKind::Call { .. } => self.check_call(node, ctx),
            NodeKind::New { .. } => self.check_new(node, ctx),
            NodeKind::NewArray { element_type, dimension } => {
                let element = self.resolve_type_annotation(element_type)?;
                let dim = self.check_expr(dimension, ctx)?;
                self.require_index(dimension, dim)?;
                Ok(self.table.create_array(element))
            }
            NodeKind::ArrayLiteral { elements, .. } => self.check_array_literal(node, &elements, expected, ctx),
            NodeKind::ObjectLiteral { properties, .. } => self.check_object_literal(node, &properties, expected, ctx),
            NodeKind::ArrowFunction { function, .. } => self.check_arrow(node, function, expected, ctx),
            NodeKind::Unary { op, argument } => self.check_unary(node, op, argument, ctx),
            NodeKind::Update { argument, .. } => self.check_update(node, argument, ctx),
            NodeKind::Binary { op, left, right, .. } => self.check_binary(node, op, left, right, ctx),
            NodeKind::Conditional { test, consequent, alternate } => {
                self.check_condition(test, ctx)?;
                let (when_true, when_false) = self.narrowing_of(test, ctx)?;
                let then_ty = self.check_expr_expected(consequent, expected, &ctx.with_smart_casts(&when_true))?;
                let else_ty = self.check_expr_expected(alternate, expected, &ctx.with_smart_casts(&when_false))?;
                let result = self.table.least_upper_bound(then_ty, else_ty);
                self.check_assignable(consequent, then_ty, result, TypeRelationFlags::NONE)?;
                self.check_assignable(alternate, else_ty, result, TypeRelationFlags::NONE)?;
                Ok(result)
            }
            NodeKind::Assignment { op, target, value, .. } => self.check_assignment(node, op, target, value, ctx),
            NodeKind::As { expression, type_annotation } => {
                let target = self.resolve_type_annotation(type_annotation)?;
                let source = self.check_expr(expression, ctx)?;
                let result = self.table.is_castable(source, target);
                if !result.related {
                    let (a, b) = (self.type_str(source), self.type_str(target));
                    return Err(self.error(node, &messages::CANNOT_CAST_0_TO_1, &[&a, &b]));
                }
                if !result.boxing.is_empty() {
                    self.ast.add_boxing_flags(expression, result.boxing);
                }
                Ok(result.converted.unwrap_or(target))
            }
            NodeKind::InstanceOf { expression, type_annotation } => {
                let source = self.check_expr(expression, ctx)?;
                let target = self.resolve_type_annotation(type_annotation)?;
                if !self.table.is_reference(source) || !self.table.is_reference(target) {
                    return Err(self.error(node, &messages::BAD_OPERAND_MUST_BE_SAME_TYPE, &[]));
                }
                Ok(self.table.primitive(PrimitiveKind::Boolean))
            }
            NodeKind::NonNull { expression } => {
                let ty = self.check_expr_expected(expression, expected, ctx)?;
                Ok(self.table.remove_nullish(ty))
            }
            NodeKind::Await { argument } => {
                let ty = self.check_expr(argument, ctx)?;
                if !self.table.is_promise(ty) {
                    let text = self.type_str(ty);
                    return Err(self.error(argument, &messages::AWAIT_REQUIRES_PROMISE, &[&text]));
                }
                Ok(self.table.object(ty).and_then(|o| o.type_args.first().copied()).unwrap_or(self.table.global.object))
            }
            NodeKind::TypeOf { argument } => {
                self.check_expr(argument, ctx)?;
                Ok(self.table.global.string)
            }
            NodeKind::BlockExpression { statements } => {
                let mut inner = ctx.clone();
                self.check_statement_list(&statements, &mut inner)?;
                let last = statements.last().and_then(|s| match self.ast.kind(*s) {
                    NodeKind::ExpressionStatement { expression } => self.ast.ts_type(*expression),
                    _ => None,
                });
                Ok(last.unwrap_or(self.table.global.void))
            }
            other => Err(CheckerError::internal(format!("'{}' is not an expression", other.name()))),
        }
    }

    // ========================================================================
    // Names
    // ========================================================================

    fn check_identifier(&mut self, node: NodeId, name: etsc_core::Name, ctx: &ResolutionContext) -> CheckResult<TypeId> {
        let text = self.name_str(name);
        let Some(var) = self.lookup(node, name) else {
            return Err(self.error(node, &messages::UNRESOLVED_REFERENCE_0, &[&text]));
        };
        if let NodeKind::Identifier { variable, .. } = self.ast.kind_mut(node) {
            *variable = Some(var);
        }
        let variable = self.binder.variable(var).clone();
        let parent = self.ast.parent(node);
        match variable.kind {
            kind if kind.is_type() => {
                let as_receiver = parent.is_some_and(|p| matches!(*self.ast.kind(p), NodeKind::Member { object, .. } if object == node));
                if as_receiver && matches!(kind, DeclKind::Class | DeclKind::Interface | DeclKind::Enum) {
                    self.ensure_declared(variable.decl_node)
                } else {
                    Err(self.error(node, &messages::TYPE_0_USED_AS_VALUE, &[&text]))
                }
            }
            DeclKind::Function => {
                let as_callee = parent.is_some_and(|p| matches!(*self.ast.kind(p), NodeKind::Call { callee, .. } if callee == node));
                if !as_callee {
                    return Err(self.error(node, &messages::FUNCTION_0_USED_AS_VALUE, &[&text]));
                }
                self.get_type_of_variable(var)
            }
            _ => {
                self.record_capture(var);
                match ctx.smart_cast(var) {
                    Some(ty) => Ok(ty),
                    None => self.get_type_of_variable(var),
                }
            }
        }
    }

    fn check_this(&mut self, node: NodeId, ctx: &ResolutionContext) -> CheckResult<TypeId> {
        let class = match ctx.containing_class {
            Some(class) if !ctx.is_static() => class,
            _ => return Err(self.error(node, &messages::CANNOT_REFERENCE_THIS, &[])),
        };
        if !self.lambda_frames.is_empty() {
            self.record_this_capture();
        }
        Ok(class)
    }

    // ========================================================================
    // Members
    // ========================================================================

    /// The variable a class, interface or enum name used as a receiver
    /// refers to.
    fn static_receiver(&self, object: NodeId) -> Option<VariableId> {
        let NodeKind::Identifier { name, .. } = *self.ast.kind(object) else { return None };
        let var = self.lookup(object, name)?;
        matches!(self.binder.variable(var).kind, DeclKind::Class | DeclKind::Interface | DeclKind::Enum).then_some(var)
    }

    pub(crate) fn member_access(&mut self, node: NodeId, ctx: &ResolutionContext) -> CheckResult<MemberAccess> {
        let NodeKind::Member { object, property, optional, .. } = *self.ast.kind(node) else {
            return Err(CheckerError::internal("expected a member expression"));
        };
        let name = self.ast.name_of(property).ok_or_else(|| CheckerError::internal("member without a name"))?;
        let is_static = self.static_receiver(object).is_some();
        let obj_ty = self.check_expr(object, ctx)?;

        if is_static {
            self.set_obj_type(node, obj_ty);
            if let Some(e) = self.table.enum_type(obj_ty) {
                if e.ordinal_of(name).is_some() {
                    return Ok(MemberAccess { prop: None, receiver: obj_ty, optional_chain: false });
                }
            }
            let prop = self.member_of(property, obj_ty, name, true, ctx)?;
            return Ok(MemberAccess { prop: Some(prop), receiver: obj_ty, optional_chain: false });
        }

        let mut receiver = obj_ty;
        let mut optional_chain = false;
        if self.table.possibly_nullish(obj_ty) {
            if !optional {
                return Err(self.error(object, &messages::VALUE_IS_POSSIBLY_NULLISH, &[]));
            }
            receiver = self.table.remove_nullish(obj_ty);
            optional_chain = true;
        }
        self.set_obj_type(node, receiver);
        let prop = self.member_of(property, receiver, name, false, ctx)?;
        Ok(MemberAccess { prop: Some(prop), receiver, optional_chain })
    }

    fn set_obj_type(&mut self, node: NodeId, ty: TypeId) {
        if let NodeKind::Member { obj_type, .. } = self.ast.kind_mut(node) {
            *obj_type = Some(ty);
        }
    }

    fn check_member(&mut self, node: NodeId, ctx: &ResolutionContext) -> CheckResult<TypeId> {
        let access = self.member_access(node, ctx)?;
        let Some(prop) = access.prop else {
            return Ok(access.receiver);
        };
        if prop.is_method() {
            let as_callee = self
                .ast
                .parent(node)
                .is_some_and(|p| matches!(*self.ast.kind(p), NodeKind::Call { callee, .. } if callee == node));
            if !as_callee {
                let text = self.name_str(prop.name);
                return Err(self.error(node, &messages::FUNCTION_0_USED_AS_VALUE, &[&text]));
            }
        }
        let ty = self.property_read_type(&prop, node)?;
        if access.optional_chain {
            Ok(self.table.create_union(&[ty, self.table.global.undefined]))
        } else {
            Ok(ty)
        }
    }

    /// `a[i]` on arrays, on classes with `$_get`, and on dynamic values.
    fn check_index_access(
        &mut self,
        node: NodeId,
        object: NodeId,
        property: NodeId,
        ctx: &ResolutionContext,
    ) -> CheckResult<TypeId> {
        let mut obj_ty = self.check_expr(object, ctx)?;
        if self.table.possibly_nullish(obj_ty) {
            let optional = matches!(*self.ast.kind(node), NodeKind::Member { optional: true, .. });
            if !optional {
                return Err(self.error(object, &messages::VALUE_IS_POSSIBLY_NULLISH, &[]));
            }
            obj_ty = self.table.remove_nullish(obj_ty);
        }
        self.set_obj_type(node, obj_ty);
        let index_ty = self.check_expr(property, ctx)?;
        match self.table.get(obj_ty).clone() {
            Type::Array { element } => {
                self.require_index(property, index_ty)?;
                Ok(element)
            }
            Type::Dynamic { .. } => Ok(obj_ty),
            Type::Object(_) | Type::String { .. } => {
                let target = self.member_target(obj_ty);
                let getter = self.ast.interner.intern("$_get");
                match self.find_member(target, getter, false)? {
                    Some(prop) if prop.is_method() => {
                        let sig = self.function_signatures(prop.ty).first().copied();
                        match sig {
                            Some(sig) => {
                                let param = self.table.signature(sig).params.first().map(|p| p.ty);
                                if let Some(param) = param {
                                    self.check_assignable(property, index_ty, param, TypeRelationFlags::NONE)?;
                                }
                                self.signature_return_type(sig, node)
                            }
                            None => Err(self.error(node, &messages::INDEXED_ACCESS_NOT_SUPPORTED, &[])),
                        }
                    }
                    _ => Err(self.error(node, &messages::INDEXED_ACCESS_NOT_SUPPORTED, &[])),
                }
            }
            _ => Err(self.error(node, &messages::INDEXED_ACCESS_NOT_SUPPORTED, &[])),
        }
    }

    /// Array indices and dimensions are integral values no wider than `int`.
    fn require_index(&mut self, node: NodeId, ty: TypeId) -> CheckResult<()> {
        if let Some(kind) = self.table.primitive_kind(ty) {
            if kind.is_integral() && kind != PrimitiveKind::Long {
                return Ok(());
            }
        } else if let Some(kind) = self.table.unboxed_kind(ty) {
            if kind.is_integral() && kind != PrimitiveKind::Long {
                self.ast.add_boxing_flags(node, unbox_flag(kind));
                return Ok(());
            }
        }
        let text = self.type_str(ty);
        Err(self.error(node, &messages::TYPE_0_CANNOT_BE_USED_AS_INDEX, &[&text]))
    }

    // ========================================================================
    // Object creation
    // ========================================================================

    fn check_new(&mut self, node: NodeId, ctx: &ResolutionContext) -> CheckResult<TypeId> {
        let NodeKind::New { class, arguments, .. } = self.ast.kind(node).clone() else {
            return Err(CheckerError::internal("expected a new expression"));
        };
        let ty = self.resolve_type_annotation(class)?;
        let Some(obj) = self.table.object(ty) else {
            return Err(self.error(node, &messages::EXPRESSION_NOT_CONSTRUCTIBLE, &[]));
        };
        if obj.is_interface() || obj.flags.contains(ObjectFlags::DYNAMIC_GLUE) {
            return Err(self.error(node, &messages::EXPRESSION_NOT_CONSTRUCTIBLE, &[]));
        }
        if obj.flags.contains(ObjectFlags::ABSTRACT) {
            let text = self.declaration_name(ty);
            return Err(self.error(node, &messages::_0_IS_ABSTRACT_CANNOT_BE_INSTANTIATED, &[&text]));
        }
        self.ensure_members(ty)?;
        let constructors = self.table.object(ty).map(|o| o.constructors.clone()).unwrap_or_default();
        let name = self.declaration_name(ty);
        let (sig, _) = self.resolve_call_signatures(node, &name, &constructors, &[], &arguments, ctx)?;
        if let NodeKind::New { signature, .. } = self.ast.kind_mut(node) {
            *signature = Some(sig);
        }
        Ok(ty)
    }

    fn check_array_literal(
        &mut self,
        node: NodeId,
        elements: &[NodeId],
        expected: Option<TypeId>,
        ctx: &ResolutionContext,
    ) -> CheckResult<TypeId> {
        let expected_element = expected.and_then(|e| {
            let e = self.table.remove_nullish(e);
            match self.table.union_constituents(e) {
                Some(members) => members.iter().find_map(|m| self.table.element_type(*m)),
                None => self.table.element_type(e),
            }
        });
        let element = match expected_element {
            Some(element) => {
                for &e in elements {
                    let ty = self.check_expr_expected(e, Some(element), ctx)?;
                    self.check_assignable(e, ty, element, TypeRelationFlags::NONE)?;
                }
                element
            }
            None => {
                let mut element: Option<TypeId> = None;
                let mut types = Vec::with_capacity(elements.len());
                for &e in elements {
                    let ty = self.check_expr(e, ctx)?;
                    types.push(ty);
                    element = Some(match element {
                        None => self.table.widen(ty),
                        Some(acc) => self.table.least_upper_bound(acc, ty),
                    });
                }
                let element = element.unwrap_or(self.table.global.object);
                for (&e, ty) in elements.iter().zip(types) {
                    self.check_assignable(e, ty, element, TypeRelationFlags::NONE)?;
                }
                element
            }
        };
        let array = self.table.create_array(element);
        if let NodeKind::ArrayLiteral { preferred_type, .. } = self.ast.kind_mut(node) {
            *preferred_type = Some(array);
        }
        Ok(array)
    }

    fn check_object_literal(
        &mut self,
        node: NodeId,
        properties: &[NodeId],
        expected: Option<TypeId>,
        ctx: &ResolutionContext,
    ) -> CheckResult<TypeId> {
        let target = expected.map(|e| self.table.remove_nullish(e));
        let class = target.filter(|t| {
            self.table
                .object(*t)
                .is_some_and(|o| o.flags.contains(ObjectFlags::CLASS) && !o.flags.contains(ObjectFlags::ABSTRACT))
        });
        let Some(class) = class else {
            return Err(self.error(node, &messages::CLASS_COMPOSITE_NEEDS_OBJECT_TYPE, &[]));
        };
        self.ensure_members(class)?;
        let has_default_ctor = self
            .table
            .object(class)
            .is_some_and(|o| o.constructors.iter().any(|c| self.table.signature(*c).accepts_arity(0)));
        if !has_default_ctor {
            let text = self.declaration_name(class);
            return Err(self.error(node, &messages::TYPE_0_HAS_NO_PARAMETERLESS_CONSTRUCTOR, &[&text]));
        }
        for &property in properties {
            let NodeKind::Property { key, value } = *self.ast.kind(property) else { continue };
            let name = self.ast.name_of(key).ok_or_else(|| CheckerError::internal("property without a key"))?;
            let member = self.find_member(class, name, false)?.filter(|p| !p.is_method());
            let Some(member) = member else {
                let (class_text, key_text) = (self.declaration_name(class), self.name_str(name));
                return Err(self.error(key, &messages::TYPE_0_HAS_NO_PROPERTY_NAMED_1, &[&class_text, &key_text]));
            };
            let ty = self.check_expr_expected(value, Some(member.ty), ctx)?;
            self.check_assignable(value, ty, member.ty, TypeRelationFlags::NONE)?;
            self.ast.set_ts_type(property, member.ty);
        }
        if let NodeKind::ObjectLiteral { preferred_type, .. } = self.ast.kind_mut(node) {
            *preferred_type = Some(class);
        }
        Ok(class)
    }

    // ========================================================================
    // Lambdas
    // ========================================================================

    fn check_arrow(
        &mut self,
        node: NodeId,
        function: NodeId,
        expected: Option<TypeId>,
        ctx: &ResolutionContext,
    ) -> CheckResult<TypeId> {
        let hint = expected.and_then(|e| {
            let e = self.table.remove_nullish(e);
            self.function_signatures(e).first().copied()
        });
        let (param_hints, return_hint) = match hint {
            Some(h) => {
                let s = self.table.signature(h).clone();
                let params: Vec<TypeId> = s.params.iter().map(|p| p.ty).collect();
                let ret = s.return_type;
                let usable = !matches!(self.table.get(ret), Type::Void) && !self.mentions_type_parameter(ret);
                (params, usable.then_some(ret))
            }
            None => (Vec::new(), None),
        };
        let sig = match self.ast.kind(function) {
            NodeKind::ScriptFunction { signature: Some(sig), .. } => *sig,
            _ => self.build_signature(function, &param_hints, return_hint)?,
        };
        let Some(body) = (match self.ast.kind(function) {
            NodeKind::ScriptFunction { body, .. } => *body,
            _ => None,
        }) else {
            return Err(CheckerError::internal("lambda without a body"));
        };
        let scope = self
            .binder
            .node_scope(function)
            .ok_or_else(|| CheckerError::internal("lambda was not bound"))?;

        let mut flags = (ctx.flags & (ContextFlags::STATIC | ContextFlags::IGNORE_VISIBILITY)) | ContextFlags::LAMBDA;
        if self.table.signature(sig).flags.contains(SignatureFlags::ASYNC) {
            flags |= ContextFlags::ASYNC;
        }
        let body_ctx = ResolutionContext {
            containing_class: ctx.containing_class,
            containing_signature: Some(sig),
            containing_function: Some(function),
            flags,
            smart_casts: ctx.smart_casts.clone(),
        };

        self.lambda_frames.push(LambdaFrame { scope, captures: FxIndexSet::default() });
        let result = self.check_body_statements(sig, body, body_ctx);
        let frame = self.lambda_frames.pop();
        result?;
        self.checked_bodies.insert(function);

        let captures: Vec<Capture> = frame.map(|f| f.captures.into_iter().collect()).unwrap_or_default();
        let this_type = ctx.containing_class;
        let proxy = crate::synth::build_lambda_class(self, node, sig, &captures, this_type)?;
        if let NodeKind::ArrowFunction { captures: slot, proxy_class, .. } = self.ast.kind_mut(node) {
            *slot = captures;
            *proxy_class = Some(proxy);
        }
        Ok(self.table.create_function(vec![sig]))
    }

    /// Whether a type parameter occurs anywhere inside `ty`.
    pub(crate) fn mentions_type_parameter(&self, ty: TypeId) -> bool {
        self.mentions_type_parameter_depth(ty, 0)
    }

    fn mentions_type_parameter_depth(&self, ty: TypeId, depth: u32) -> bool {
        if depth > 16 {
            return false;
        }
        match self.table.get(ty) {
            Type::TypeParameter { .. } | Type::NonNullish { .. } => true,
            Type::Array { element } => self.mentions_type_parameter_depth(*element, depth + 1),
            Type::Union { constituents } => constituents.iter().any(|c| self.mentions_type_parameter_depth(*c, depth + 1)),
            Type::Object(o) => o.type_args.iter().any(|a| self.mentions_type_parameter_depth(*a, depth + 1)),
            Type::Function { signatures } => signatures.iter().any(|s| {
                let sig = self.table.signature(*s);
                sig.params.iter().any(|p| self.mentions_type_parameter_depth(p.ty, depth + 1))
                    || self.mentions_type_parameter_depth(sig.return_type, depth + 1)
            }),
            _ => false,
        }
    }

    // ========================================================================
    // Assignment
    // ========================================================================

    /// Require `source` to be assignable to `target` and record the
    /// conversion on `node`. Returns `target`.
    pub(crate) fn check_assignable(
        &mut self,
        node: NodeId,
        source: TypeId,
        target: TypeId,
        flags: TypeRelationFlags,
    ) -> CheckResult<TypeId> {
        let result = self.table.is_assignable(source, target, flags);
        if !result.related {
            let (a, b) = (self.type_str(source), self.type_str(target));
            return Err(self.error(node, &messages::TYPE_0_NOT_COMPATIBLE_WITH_1, &[&a, &b]));
        }
        if !result.boxing.is_empty() {
            self.ast.add_boxing_flags(node, result.boxing);
        }
        if let Some(converted) = result.converted {
            self.ast.set_ts_type(node, converted);
        }
        Ok(target)
    }

    fn check_assignment(
        &mut self,
        node: NodeId,
        op: AssignOp,
        target: NodeId,
        value: NodeId,
        ctx: &ResolutionContext,
    ) -> CheckResult<TypeId> {
        let target_ty = self.check_assignment_target(target, ctx)?;
        match op {
            AssignOp::Assign => {
                let value_ty = self.check_expr_expected(value, Some(target_ty), ctx)?;
                if matches!(self.table.get(value_ty), Type::Void) {
                    return Err(self.error(value, &messages::VOID_USED_AS_VALUE, &[]));
                }
                self.check_assignable(value, value_ty, target_ty, TypeRelationFlags::NONE)?;
            }
            AssignOp::Compound(bop) => {
                let value_ty = self.check_expr(value, ctx)?;
                let result = self.binary_result(node, bop, target, value, target_ty, value_ty)?;
                // `x op= y` converts the result back to the type of `x`.
                let back = self.table.is_castable(result, target_ty);
                if !back.related {
                    let (a, b) = (self.type_str(result), self.type_str(target_ty));
                    return Err(self.error(node, &messages::TYPE_0_NOT_COMPATIBLE_WITH_1, &[&a, &b]));
                }
            }
        }
        Ok(target_ty)
    }

    /// The declared type of an assignment target, after checking that it
    /// can be written.
    pub(crate) fn check_assignment_target(&mut self, target: NodeId, ctx: &ResolutionContext) -> CheckResult<TypeId> {
        if let Some(ty) = self.ast.ts_type(target) {
            return Ok(ty);
        }
        let ty = match *self.ast.kind(target) {
            NodeKind::Identifier { name, .. } => {
                let text = self.name_str(name);
                let Some(var) = self.lookup(target, name) else {
                    return Err(self.error(target, &messages::UNRESOLVED_REFERENCE_0, &[&text]));
                };
                if let NodeKind::Identifier { variable, .. } = self.ast.kind_mut(target) {
                    *variable = Some(var);
                }
                match self.binder.variable(var).kind {
                    DeclKind::Const => return Err(self.error(target, &messages::CANNOT_ASSIGN_TO_CONSTANT_0, &[&text])),
                    kind if kind.is_mutable() => {
                        self.record_capture(var);
                        self.get_type_of_variable(var)?
                    }
                    _ => return Err(self.error(target, &messages::CANNOT_ASSIGN_TO_0, &[&text])),
                }
            }
            NodeKind::Member { computed: true, object, property, .. } => {
                self.check_index_target(target, object, property, ctx)?
            }
            NodeKind::Member { object, .. } => {
                let access = self.member_access(target, ctx)?;
                let Some(prop) = access.prop else {
                    let text = self.ast.name_str(target).to_string();
                    return Err(self.error(target, &messages::CANNOT_ASSIGN_TO_0, &[&text]));
                };
                let text = self.name_str(prop.name);
                if prop.is_method() || access.optional_chain {
                    return Err(self.error(target, &messages::CANNOT_ASSIGN_TO_0, &[&text]));
                }
                if prop.flags.contains(PropertyFlags::READONLY) {
                    let in_own_ctor = ctx.flags.contains(ContextFlags::CONSTRUCTOR)
                        && !ctx.flags.contains(ContextFlags::LAMBDA)
                        && matches!(self.ast.kind(object), NodeKind::This)
                        && ctx.containing_class.map(|c| self.table.generic_base(c)) == Some(self.table.generic_base(prop.owner));
                    if !in_own_ctor && !ctx.ignores_visibility() {
                        return Err(self.error(target, &messages::CANNOT_ASSIGN_TO_READONLY_0, &[&text]));
                    }
                }
                if prop.is_accessor() && !prop.flags.contains(PropertyFlags::SETTER) && prop.setter.is_none() {
                    return Err(self.error(target, &messages::CANNOT_ASSIGN_TO_READONLY_0, &[&text]));
                }
                match prop.setter {
                    Some(setter) if prop.flags.contains(PropertyFlags::SETTER) => {
                        self.table.signature(setter).params.first().map(|p| p.ty).unwrap_or(prop.ty)
                    }
                    _ => prop.ty,
                }
            }
            _ => return Err(self.error(target, &messages::INVALID_ASSIGNMENT_TARGET, &[])),
        };
        self.ast.set_ts_type(target, ty);
        Ok(ty)
    }

    fn check_index_target(
        &mut self,
        target: NodeId,
        object: NodeId,
        property: NodeId,
        ctx: &ResolutionContext,
    ) -> CheckResult<TypeId> {
        let obj_ty = self.check_expr(object, ctx)?;
        if self.table.possibly_nullish(obj_ty) {
            return Err(self.error(object, &messages::VALUE_IS_POSSIBLY_NULLISH, &[]));
        }
        self.set_obj_type(target, obj_ty);
        let index_ty = self.check_expr(property, ctx)?;
        match self.table.get(obj_ty).clone() {
            Type::Array { element } => {
                self.require_index(property, index_ty)?;
                Ok(element)
            }
            Type::Dynamic { .. } => Ok(obj_ty),
            Type::Object(_) => {
                let setter = self.ast.interner.intern("$_set");
                let sig = match self.find_member(obj_ty, setter, false)? {
                    Some(prop) if prop.is_method() => self.function_signatures(prop.ty).first().copied(),
                    _ => None,
                };
                let Some(sig) = sig else {
                    return Err(self.error(target, &messages::INDEXED_ACCESS_NOT_SUPPORTED, &[]));
                };
                let params = self.table.signature(sig).params.clone();
                if let Some(index_param) = params.first() {
                    self.check_assignable(property, index_ty, index_param.ty, TypeRelationFlags::NONE)?;
                }
                params
                    .get(1)
                    .map(|p| p.ty)
                    .ok_or_else(|| self.error(target, &messages::INDEXED_ACCESS_NOT_SUPPORTED, &[]))
            }
            _ => Err(self.error(target, &messages::INDEXED_ACCESS_NOT_SUPPORTED, &[])),
        }
    }
}
